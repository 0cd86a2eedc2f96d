//! Shared application state injected into every Axum handler.

use std::sync::Arc;

use crate::config::Config;
use crate::entities::SqliteStore;
use crate::throttle::{RateThrottle, ThrottlePolicy};

/// State shared across all HTTP handlers.
#[derive(Clone, Debug)]
pub struct AppState {
    /// Server configuration (env-derived).
    pub config: Arc<Config>,
    pub store: Arc<SqliteStore>,
    /// `user` and `matricula_anon` throttles guarding `/matriculas`.
    pub matricula_throttle: Arc<ThrottlePolicy>,
}

impl AppState {
    pub fn new(config: Config, store: SqliteStore) -> Self {
        let matricula_throttle = ThrottlePolicy::new(vec![
            RateThrottle::user(config.user_rate),
            RateThrottle::anon("matricula_anon", config.matricula_anon_rate),
        ]);
        Self {
            config: Arc::new(config),
            store: Arc::new(store),
            matricula_throttle: Arc::new(matricula_throttle),
        }
    }
}
