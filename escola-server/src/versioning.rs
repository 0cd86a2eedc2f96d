//! API version negotiation.
//!
//! The version comes from `?version=` when present, otherwise from a
//! `version=` parameter on the `Accept` media type, otherwise defaults to
//! [`ApiVersion::V1`]. Unknown versions are a 404.

use std::collections::HashMap;

use axum::extract::{FromRequestParts, Query};
use axum::http::request::Parts;
use axum::http::{header, HeaderMap};
use strum::{Display, EnumString};

use crate::error::ServerError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, EnumString, Display)]
#[strum(serialize_all = "lowercase")]
pub enum ApiVersion {
    #[default]
    V1,
    V2,
}

impl ApiVersion {
    pub fn resolve(query: Option<&str>, headers: &HeaderMap) -> Result<Self, ServerError> {
        if let Some(v) = query {
            return v
                .parse()
                .map_err(|_| ServerError::NotFound("Invalid version in query parameter.".to_owned()));
        }
        match accept_version(headers) {
            Some(v) => v
                .parse()
                .map_err(|_| ServerError::NotFound("Invalid version in \"Accept\" header.".to_owned())),
            None => Ok(ApiVersion::default()),
        }
    }
}

/// `version` parameter of the first `Accept` media range carrying one.
fn accept_version(headers: &HeaderMap) -> Option<String> {
    let accept = headers.get(header::ACCEPT)?.to_str().ok()?;
    accept.split(',').find_map(|range| {
        range.split(';').skip(1).find_map(|param| {
            let (key, value) = param.split_once('=')?;
            (key.trim() == "version").then(|| value.trim().trim_matches('"').to_owned())
        })
    })
}

impl<S: Send + Sync> FromRequestParts<S> for ApiVersion {
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let query = Query::<HashMap<String, String>>::try_from_uri(&parts.uri)
            .map(|Query(q)| q)
            .unwrap_or_default();
        ApiVersion::resolve(query.get("version").map(String::as_str), &parts.headers)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use axum::http::HeaderValue;

    fn accept(value: &'static str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(header::ACCEPT, HeaderValue::from_static(value));
        h
    }

    #[test]
    fn defaults_to_v1() {
        assert_eq!(ApiVersion::resolve(None, &HeaderMap::new()).unwrap(), ApiVersion::V1);
        assert_eq!(
            ApiVersion::resolve(None, &accept("application/json")).unwrap(),
            ApiVersion::V1
        );
    }

    #[test]
    fn query_parameter_wins_over_accept_header() {
        let headers = accept("application/json; version=v1");
        assert_eq!(ApiVersion::resolve(Some("v2"), &headers).unwrap(), ApiVersion::V2);
    }

    #[test]
    fn reads_version_from_accept_header() {
        let headers = accept("text/html, application/json; q=0.9; version=v2");
        assert_eq!(ApiVersion::resolve(None, &headers).unwrap(), ApiVersion::V2);
    }

    #[test]
    fn unknown_versions_are_not_found() {
        match ApiVersion::resolve(Some("v9"), &HeaderMap::new()) {
            Err(ServerError::NotFound(m)) => assert!(m.contains("query parameter")),
            other => panic!("expected not found, got {other:?}"),
        }
        match ApiVersion::resolve(None, &accept("application/json; version=v3")) {
            Err(ServerError::NotFound(m)) => assert!(m.contains("Accept")),
            other => panic!("expected not found, got {other:?}"),
        }
    }
}
