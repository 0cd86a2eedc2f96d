//! Token authentication.
//!
//! [`authenticate`] runs on every request and attaches a [`Caller`] to the
//! request extensions. A missing `Authorization` header, or one using a
//! scheme other than `Token`/`Bearer`, leaves the caller anonymous; a token
//! that does not resolve is rejected with 401.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{header, HeaderMap};
use axum::middleware::Next;
use axum::response::Response;
use tracing::debug;

use crate::entities::TokenStore;
use crate::error::ServerError;
use crate::state::AppState;

/// Who is making the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Caller {
    User { id: i64, username: String },
    /// `ident` is the client address used to bucket anonymous throttles.
    Anonymous { ident: String },
}

impl Caller {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Caller::User { .. })
    }

    fn unknown() -> Self {
        Caller::Anonymous {
            ident: "unknown".to_owned(),
        }
    }

    /// The caller attached by [`authenticate`], or an unidentified anonymous
    /// caller when the middleware did not run.
    pub fn from_extensions(extensions: &axum::http::Extensions) -> Self {
        extensions.get::<Caller>().cloned().unwrap_or_else(Caller::unknown)
    }
}

impl std::fmt::Display for Caller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Caller::User { username, .. } => write!(f, "user {username}"),
            Caller::Anonymous { ident } => write!(f, "anonymous {ident}"),
        }
    }
}

pub async fn authenticate(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ServerError> {
    let caller = match bearer_token(req.headers())? {
        Some(raw) => {
            let token = state
                .store
                .find_token(&raw)
                .await?
                .ok_or_else(|| ServerError::Unauthorized("Invalid token.".to_owned()))?;
            debug!(user = %token.username, "authenticated request");
            Caller::User {
                id: token.id,
                username: token.username,
            }
        }
        None => Caller::Anonymous {
            ident: client_ident(&req, state.config.trusted_proxies),
        },
    };
    req.extensions_mut().insert(caller);
    Ok(next.run(req).await)
}

/// Extract the raw token from `Authorization: Token <key>` (or `Bearer`).
fn bearer_token(headers: &HeaderMap) -> Result<Option<String>, ServerError> {
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };
    let value = value
        .to_str()
        .map_err(|_| ServerError::Unauthorized("Invalid token header.".to_owned()))?;

    let mut parts = value.split_whitespace();
    let scheme = parts.next().unwrap_or_default();
    if !scheme.eq_ignore_ascii_case("token") && !scheme.eq_ignore_ascii_case("bearer") {
        return Ok(None);
    }
    match (parts.next(), parts.next()) {
        (Some(key), None) => Ok(Some(key.to_owned())),
        (None, _) => Err(ServerError::Unauthorized(
            "Invalid token header. No credentials provided.".to_owned(),
        )),
        (Some(_), Some(_)) => Err(ServerError::Unauthorized(
            "Invalid token header. Token string should not contain spaces.".to_owned(),
        )),
    }
}

/// Client address used to bucket anonymous throttles.
///
/// With `trusted_proxies = Some(n)` the address `n` hops from the right of
/// `X-Forwarded-For` is used, falling back to the peer when `n` is 0 or the
/// header is absent. `None` takes the first entry as is.
fn client_ident(req: &Request, trusted_proxies: Option<usize>) -> String {
    let forwarded: Vec<&str> = req
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(',').map(str::trim).filter(|a| !a.is_empty()).collect())
        .unwrap_or_default();
    let chosen = match trusted_proxies {
        None => forwarded.first(),
        Some(0) => None,
        Some(n) => forwarded.get(forwarded.len() - n.min(forwarded.len())),
    };
    if let Some(addr) = chosen {
        return (*addr).to_owned();
    }
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_owned())
}

#[cfg(test)]
mod test {
    use super::*;
    use axum::body::Body;
    use axum::http::HeaderValue;

    fn headers(auth: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(header::AUTHORIZATION, HeaderValue::from_str(auth).unwrap());
        h
    }

    #[test]
    fn token_and_bearer_schemes_are_accepted() {
        assert_eq!(bearer_token(&headers("Token abc")).unwrap(), Some("abc".into()));
        assert_eq!(bearer_token(&headers("bearer abc")).unwrap(), Some("abc".into()));
        assert_eq!(bearer_token(&HeaderMap::new()).unwrap(), None);
    }

    #[test]
    fn other_schemes_stay_anonymous() {
        assert_eq!(bearer_token(&headers("Basic dXNlcjpwYXNz")).unwrap(), None);
    }

    #[test]
    fn malformed_token_headers_are_rejected() {
        assert!(bearer_token(&headers("Token")).is_err());
        assert!(bearer_token(&headers("Token a b")).is_err());
    }

    #[test]
    fn callers_display_for_logs() {
        let user = Caller::User { id: 3, username: "secretaria".into() };
        assert_eq!(user.to_string(), "user secretaria");
        assert_eq!(Caller::unknown().to_string(), "anonymous unknown");
    }

    #[test]
    fn client_ident_prefers_forwarded_for() {
        let req = Request::builder()
            .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
            .body(Body::empty())
            .unwrap();
        assert_eq!(client_ident(&req, None), "203.0.113.7");

        let mut req = Request::builder().body(Body::empty()).unwrap();
        assert_eq!(client_ident(&req, None), "unknown");
        req.extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([192, 0, 2, 1], 5000))));
        assert_eq!(client_ident(&req, None), "192.0.2.1");
    }

    #[test]
    fn trusted_proxy_count_ignores_spoofed_hops() {
        let mut req = Request::builder()
            .header("x-forwarded-for", "198.51.100.9, 203.0.113.7, 10.0.0.1")
            .body(Body::empty())
            .unwrap();
        req.extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([10, 0, 0, 2], 5000))));

        assert_eq!(client_ident(&req, Some(2)), "203.0.113.7");
        assert_eq!(client_ident(&req, Some(1)), "10.0.0.1");
        assert_eq!(client_ident(&req, Some(9)), "198.51.100.9");
        assert_eq!(client_ident(&req, Some(0)), "10.0.0.2");
    }
}
