//! Extractors whose rejections render as [`ServerError`] JSON bodies.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{FromRequest, FromRequestParts, Json, Path, Query};
use serde::Deserialize;

use crate::error::ServerError;

/// `Json<T>` with a 400 `{"error": ...}` rejection.
#[derive(Debug, FromRequest)]
#[from_request(via(Json), rejection(ServerError))]
pub struct JsonBody<T>(pub T);

/// An integer `{id}` path segment.
#[derive(Debug, Clone, Copy, Deserialize, FromRequestParts)]
#[from_request(via(Path), rejection(ServerError))]
pub struct IdPath(pub i64);

/// `Query<T>` with a 400 `{"error": ...}` rejection.
#[derive(Debug, FromRequestParts)]
#[from_request(via(Query), rejection(ServerError))]
pub struct QueryParams<T>(pub T);

impl From<JsonRejection> for ServerError {
    fn from(rejection: JsonRejection) -> Self {
        ServerError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ServerError {
    fn from(rejection: PathRejection) -> Self {
        ServerError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ServerError {
    fn from(rejection: QueryRejection) -> Self {
        ServerError::BadRequest(rejection.body_text())
    }
}
