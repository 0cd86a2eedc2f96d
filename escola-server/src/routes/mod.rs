//! Axum router construction.
//!
//! [`build`] assembles the complete application router, including:
//! - Middleware layers (trace-ID injection, CORS, token authentication)
//! - Optional Swagger UI / OpenAPI spec endpoint (disable with `ESCOLA_ENABLE_SWAGGER=false`)
//! - Health / heartbeat route
//! - `/estudantes`, `/cursos` and `/matriculas` resources

mod api;
pub mod doc;
mod health;

use std::sync::Arc;

use axum::{middleware, Router};
use utoipa_swagger_ui::SwaggerUi;

use crate::error::ServerError;
use crate::middleware::{auth, cors, trace};
use crate::state::AppState;

/// Build the complete Axum [`Router`] for the application.
pub fn build(state: Arc<AppState>) -> Router {
    let mut app = Router::new()
        .merge(health::router())
        .merge(api::router(&state));

    if state.config.enable_swagger {
        app = app.merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", doc::get_docs()));
    }

    app.fallback(|| async { ServerError::NotFound("Not found.".to_owned()) })
        // Each layer wraps the ones above it: trace, then CORS, then auth.
        .layer(middleware::from_fn_with_state(state.clone(), auth::authenticate))
        .layer(middleware::from_fn_with_state(
            cors::cors_layer(&state.config),
            cors::cors_middleware,
        ))
        .layer(middleware::from_fn(trace::trace_middleware))
        .with_state(state)
}
