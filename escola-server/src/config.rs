//! Server configuration, loaded from environment variables at startup.

use anyhow::Context;

use crate::middleware::permission::Permission;
use crate::throttle::Rate;

const DEFAULT_BIND: &str = "0.0.0.0:8000";
const DEFAULT_DATABASE_URL: &str = "sqlite://escola.db";
const DEFAULT_PAGE_SIZE: u32 = 10;
const DEFAULT_USER_RATE: &str = "50/day";
const DEFAULT_MATRICULA_ANON_RATE: &str = "5/day";

/// Runtime configuration for escola-server.
///
/// Every field has a sensible default so the server works out-of-the-box
/// without any environment variables set.
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP address to bind (default: `"0.0.0.0:8000"`).
    pub bind_address: String,

    /// SQLite database URL (default: `"sqlite://escola.db"`). The file is
    /// created on first start.
    pub database_url: String,

    /// `tracing` filter string, e.g. `"info"` or `"debug,sqlx=warn"`.
    pub log_level: String,

    /// When `true`, emit log records as newline-delimited JSON.
    pub log_json: bool,

    /// Optional directory for a daily-rolling log file, in addition to stdout.
    pub log_dir: Option<String>,

    /// Comma-separated CORS origins; `None` allows any origin.
    pub cors_allowed_origins: Option<String>,

    /// Serve `/swagger-ui` and `/api-docs/openapi.json`.
    pub enable_swagger: bool,

    /// Items per page on list endpoints. `0` disables pagination.
    pub page_size: u32,

    /// Permission applied to resources that do not declare their own.
    pub default_permission: Permission,

    /// `UserRateThrottle` rate (per user id, or per client address for
    /// anonymous callers).
    pub user_rate: Rate,

    /// `MatriculaAnonRateThrottle` rate (anonymous callers only).
    pub matricula_anon_rate: Rate,

    /// Reverse proxies in front of the server. `Some(n)` takes the client
    /// address `n` entries from the right of `X-Forwarded-For` (`0` ignores
    /// the header); `None` trusts its first entry.
    pub trusted_proxies: Option<usize>,
}

impl Config {
    /// Build [`Config`] from environment variables, falling back to defaults.
    ///
    /// Fails only when a value is present but cannot be interpreted (an
    /// unknown permission name or a malformed rate).
    pub fn from_env() -> anyhow::Result<Self> {
        let default_permission = match std::env::var("ESCOLA_DEFAULT_PERMISSION") {
            Ok(v) => v
                .parse::<Permission>()
                .with_context(|| format!("ESCOLA_DEFAULT_PERMISSION='{v}' is not a known permission"))?,
            Err(_) => Permission::AllowAny,
        };

        Ok(Self {
            bind_address: env_or("ESCOLA_BIND", DEFAULT_BIND),
            database_url: env_or("ESCOLA_DATABASE_URL", DEFAULT_DATABASE_URL),
            log_level: env_or("ESCOLA_LOG", "info"),
            log_json: env_flag("ESCOLA_LOG_JSON", false),
            log_dir: std::env::var("ESCOLA_LOG_DIR").ok().filter(|v| !v.trim().is_empty()),
            cors_allowed_origins: std::env::var("ESCOLA_CORS_ORIGINS").ok(),
            enable_swagger: env_flag("ESCOLA_ENABLE_SWAGGER", true),
            page_size: parse_env("ESCOLA_PAGE_SIZE", DEFAULT_PAGE_SIZE),
            default_permission,
            user_rate: rate_env("ESCOLA_THROTTLE_USER", DEFAULT_USER_RATE)?,
            matricula_anon_rate: rate_env(
                "ESCOLA_THROTTLE_MATRICULA_ANON",
                DEFAULT_MATRICULA_ANON_RATE,
            )?,
            trusted_proxies: std::env::var("ESCOLA_TRUSTED_PROXIES")
                .ok()
                .and_then(|v| v.trim().parse().ok()),
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_BIND.to_owned(),
            database_url: DEFAULT_DATABASE_URL.to_owned(),
            log_level: "info".to_owned(),
            log_json: false,
            log_dir: None,
            cors_allowed_origins: None,
            enable_swagger: true,
            page_size: DEFAULT_PAGE_SIZE,
            default_permission: Permission::AllowAny,
            user_rate: Rate::new(50, Rate::DAY),
            matricula_anon_rate: Rate::new(5, Rate::DAY),
            trusted_proxies: None,
        }
    }
}

// ── private helpers ──────────────────────────────────────────────────────────

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn env_flag(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(default)
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn rate_env(key: &str, default: &str) -> anyhow::Result<Rate> {
    let raw = env_or(key, default);
    raw.parse::<Rate>()
        .with_context(|| format!("{key}='{raw}' is not a valid rate (expected e.g. '5/day')"))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults_match_documented_rates() {
        let cfg = Config::default();
        assert_eq!(cfg.page_size, 10);
        assert_eq!(cfg.user_rate, "50/day".parse().unwrap());
        assert_eq!(cfg.matricula_anon_rate, "5/d".parse().unwrap());
        assert_eq!(cfg.default_permission, Permission::AllowAny);
    }
}
