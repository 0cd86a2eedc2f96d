use axum::extract::{Request, State};
use axum::http::{header, Method};
use axum::middleware::Next;
use axum::response::Response;
use tower::{Layer, ServiceExt};
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;

/// CORS layer from `ESCOLA_CORS_ORIGINS`; any origin when unset or when no
/// entry parses.
pub fn cors_layer(config: &Config) -> CorsLayer {
    let base = CorsLayer::new().allow_headers(Any).allow_methods(Any);
    let origins: Vec<axum::http::HeaderValue> = config
        .cors_allowed_origins
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse().ok())
        .collect();
    if origins.is_empty() {
        base.allow_origin(Any)
    } else {
        base.allow_origin(origins)
    }
}

/// Apply `cors` to everything except plain `OPTIONS` requests.
///
/// `CorsLayer` answers every `OPTIONS` itself; only a real preflight (one
/// carrying `Access-Control-Request-Method`) should skip the resource's own
/// `OPTIONS` handler.
pub async fn cors_middleware(State(cors): State<CorsLayer>, req: Request, next: Next) -> Response {
    let plain_options = req.method() == Method::OPTIONS
        && !req.headers().contains_key(header::ACCESS_CONTROL_REQUEST_METHOD);
    if plain_options {
        return next.run(req).await;
    }
    match cors.layer(next).oneshot(req).await {
        Ok(res) => res,
        Err(never) => match never {},
    }
}
