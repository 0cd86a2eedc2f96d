//! `OPTIONS` answers and JSON 405s for resource routes.

use axum::http::{header, HeaderValue, Method};
use axum::response::{IntoResponse, Response};
use axum::routing::MethodRouter;
use axum::Json;
use serde_json::json;

use crate::error::{allow_header, ServerError};

pub const COLLECTION: &[Method] = &[Method::GET, Method::POST, Method::HEAD, Method::OPTIONS];
pub const DETAIL: &[Method] = &[
    Method::GET,
    Method::PUT,
    Method::PATCH,
    Method::DELETE,
    Method::HEAD,
    Method::OPTIONS,
];
pub const READ_ONLY: &[Method] = &[Method::GET, Method::HEAD, Method::OPTIONS];
pub const NOTHING: &[Method] = &[];

fn options_response(name: &'static str, allow: &'static [Method]) -> Response {
    let allowed_methods: Vec<&str> = allow.iter().map(Method::as_str).collect();
    let mut res = Json(json!({ "name": name, "allowed_methods": allowed_methods })).into_response();
    if let Ok(v) = HeaderValue::from_str(&allow_header(allow)) {
        res.headers_mut().insert(header::ALLOW, v);
    }
    res
}

/// Complete a resource's method router with `OPTIONS` and a 405 fallback.
///
/// Call after any `route_layer`, so that neither is permission-checked or
/// throttled.
pub fn resource<S>(
    name: &'static str,
    allow: &'static [Method],
    router: MethodRouter<S>,
) -> MethodRouter<S>
where
    S: Clone + Send + Sync + 'static,
{
    router
        .options(move || async move { options_response(name, allow) })
        .fallback(move |method: Method| async move { ServerError::MethodNotAllowed { method, allow } })
}

/// A path that exists but accepts no method at all.
pub fn closed<S>() -> MethodRouter<S>
where
    S: Clone + Send + Sync + 'static,
{
    MethodRouter::new().fallback(|method: Method| async move {
        ServerError::MethodNotAllowed {
            method,
            allow: NOTHING,
        }
    })
}
