//! Unified server error type.
//!
//! Every handler returns `Result<T, ServerError>`, which implements
//! [`axum::response::IntoResponse`] so errors are automatically converted
//! to a JSON-body HTTP response with an appropriate status code.
//!
//! **Security note:** Database and internal errors are logged with full
//! detail but only a generic message is returned to the caller so that SQL
//! or file paths never leak to clients.

use std::collections::BTreeMap;
use std::time::Duration;

use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};
use validator::ValidationErrors;

/// Field name used for errors that are not tied to a single field.
pub const NON_FIELD_ERRORS: &str = "non_field_errors";

/// Per-field validation messages, keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Single-message shorthand.
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    /// `Ok(())` when empty, otherwise a [`ServerError::Validation`].
    pub fn into_result(self) -> Result<(), ServerError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(ServerError::Validation(self))
        }
    }
}

impl From<ValidationErrors> for FieldErrors {
    fn from(errors: ValidationErrors) -> Self {
        let mut out = FieldErrors::new();
        for (field, errs) in errors.field_errors() {
            for e in errs {
                let message = e
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("invalid value ({})", e.code));
                out.add(field.to_string(), message);
            }
        }
        out
    }
}

/// All errors that can occur in the escola-server request lifecycle.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Propagated from the SQLite store.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// One or more fields failed validation.
    #[error("validation failed: {0:?}")]
    Validation(FieldErrors),

    /// The caller sent a malformed request (bad JSON, bad path id, ...).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Credentials are missing or invalid for an operation that needs them.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The caller referenced a resource that does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The resource exists but does not support this verb.
    #[error("method {method} not allowed")]
    MethodNotAllowed {
        method: Method,
        allow: &'static [Method],
    },

    /// The operation would break referential integrity.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A rate limit was exceeded; `wait` is how long until it admits again.
    #[error("request was throttled")]
    Throttled { wait: Duration },

    /// An unclassified internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Body of the 409 returned when enrollments still point at a row.
pub const STILL_REFERENCED: &str =
    "Cannot delete: the record is still referenced by enrollments.";

/// Whether `e` is a foreign key failure. SQLite reports `ON DELETE RESTRICT`
/// as `SQLITE_CONSTRAINT_TRIGGER` (1811), not `SQLITE_CONSTRAINT_FOREIGNKEY` (787).
pub fn is_foreign_key_violation(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::Database(db) => {
            db.is_foreign_key_violation() || db.code().as_deref() == Some("1811")
        }
        _ => false,
    }
}

impl ServerError {
    /// Map a store write error, turning a UNIQUE violation into a field error.
    ///
    /// `unique` names the field reported when a UNIQUE constraint fires.
    pub fn from_constraint(e: sqlx::Error, unique: &str) -> Self {
        if let sqlx::Error::Database(db) = &e {
            if db.is_unique_violation() {
                return ServerError::Validation(FieldErrors::single(
                    unique,
                    format!("a record with this {unique} already exists."),
                ));
            }
        }
        ServerError::Database(e)
    }

    /// Map a store delete error; a restricted foreign key becomes 409.
    pub fn from_delete(e: sqlx::Error) -> Self {
        if is_foreign_key_violation(&e) {
            ServerError::Conflict(STILL_REFERENCED.to_owned())
        } else {
            ServerError::Database(e)
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        match self {
            ServerError::Validation(fields) => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "validation failed", "fields": fields })),
            )
                .into_response(),
            ServerError::BadRequest(m) => error_body(StatusCode::BAD_REQUEST, m),
            ServerError::Unauthorized(m) => {
                let mut res = error_body(StatusCode::UNAUTHORIZED, m);
                res.headers_mut()
                    .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Token"));
                res
            }
            ServerError::NotFound(m) => error_body(StatusCode::NOT_FOUND, m),
            ServerError::MethodNotAllowed { method, allow } => {
                let mut res = error_body(
                    StatusCode::METHOD_NOT_ALLOWED,
                    format!("Method \"{method}\" not allowed."),
                );
                if let Ok(v) = HeaderValue::from_str(&allow_header(allow)) {
                    res.headers_mut().insert(header::ALLOW, v);
                }
                res
            }
            ServerError::Conflict(m) => error_body(StatusCode::CONFLICT, m),
            ServerError::Throttled { wait } => {
                // Round up so clients never retry a moment too early.
                let secs = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
                warn!(retry_after = secs, "request throttled");
                let mut res = (
                    StatusCode::TOO_MANY_REQUESTS,
                    Json(json!({
                        "error": format!("Request was throttled. Expected available in {secs} seconds."),
                        "retry_after": secs,
                    })),
                )
                    .into_response();
                res.headers_mut()
                    .insert(header::RETRY_AFTER, HeaderValue::from(secs));
                res
            }
            ServerError::Database(e) => {
                error!(error = %e, "database error");
                error_body(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
            }
            ServerError::Internal(m) => {
                error!(message = %m, "internal server error");
                error_body(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
            }
        }
    }
}

impl From<anyhow::Error> for ServerError {
    fn from(e: anyhow::Error) -> Self {
        error!(error = ?e, "converting anyhow error to ServerError::Internal");
        ServerError::Internal(e.to_string())
    }
}

impl From<ValidationErrors> for ServerError {
    fn from(e: ValidationErrors) -> Self {
        ServerError::Validation(e.into())
    }
}

/// `GET, POST, ...` as used in `Allow` headers.
pub fn allow_header(methods: &[Method]) -> String {
    methods
        .iter()
        .map(Method::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

fn error_body(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}
