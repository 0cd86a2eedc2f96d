//! Per-resource permission policies, applied as route layers.

use axum::extract::{Request, State};
use axum::http::Method;
use axum::middleware::Next;
use axum::response::Response;
use strum::{Display, EnumString};

use crate::error::ServerError;
use crate::middleware::auth::Caller;

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display)]
#[strum(serialize_all = "snake_case")]
pub enum Permission {
    AllowAny,
    Authenticated,
    /// Anyone may read; writes need an authenticated caller.
    AuthenticatedOrReadOnly,
}

fn is_safe(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

impl Permission {
    pub fn check(self, method: &Method, caller: &Caller) -> Result<(), ServerError> {
        let allowed = match self {
            Permission::AllowAny => true,
            Permission::Authenticated => caller.is_authenticated(),
            Permission::AuthenticatedOrReadOnly => is_safe(method) || caller.is_authenticated(),
        };
        if allowed {
            Ok(())
        } else {
            Err(ServerError::Unauthorized(
                "Authentication credentials were not provided.".to_owned(),
            ))
        }
    }
}

pub async fn enforce(
    State(permission): State<Permission>,
    req: Request,
    next: Next,
) -> Result<Response, ServerError> {
    let caller = Caller::from_extensions(req.extensions());
    permission.check(req.method(), &caller)?;
    Ok(next.run(req).await)
}

#[cfg(test)]
mod test {
    use super::*;

    fn anon() -> Caller {
        Caller::Anonymous { ident: "unknown".into() }
    }

    fn user() -> Caller {
        Caller::User { id: 1, username: "secretaria".into() }
    }

    #[test]
    fn read_only_policy_allows_safe_methods_for_anyone() {
        let p = Permission::AuthenticatedOrReadOnly;
        for m in [Method::GET, Method::HEAD, Method::OPTIONS] {
            assert!(p.check(&m, &anon()).is_ok());
        }
        for m in [Method::POST, Method::PUT, Method::PATCH, Method::DELETE] {
            assert!(matches!(p.check(&m, &anon()), Err(ServerError::Unauthorized(_))));
            assert!(p.check(&m, &user()).is_ok());
        }
    }

    #[test]
    fn names_parse_from_config() {
        assert_eq!("allow_any".parse::<Permission>().unwrap(), Permission::AllowAny);
        assert_eq!(
            "authenticated_or_read_only".parse::<Permission>().unwrap(),
            Permission::AuthenticatedOrReadOnly
        );
        assert!("admin".parse::<Permission>().is_err());
        assert!(Permission::Authenticated.check(&Method::GET, &anon()).is_err());
    }
}
