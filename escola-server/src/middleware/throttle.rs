use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;

use crate::error::ServerError;
use crate::middleware::auth::Caller;
use crate::throttle::ThrottlePolicy;

/// Route layer rejecting requests the policy refuses with 429.
pub async fn enforce(
    State(policy): State<Arc<ThrottlePolicy>>,
    req: Request,
    next: Next,
) -> Result<Response, ServerError> {
    let caller = Caller::from_extensions(req.extensions());
    policy.check(&caller)?;
    Ok(next.run(req).await)
}
