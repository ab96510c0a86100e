//! Request extractors.
//!
//! Authentication happens upstream; the gateway in front of this service forwards
//! the verified identity as `X-Actor-Id` and `X-Actor-Role`.

use crate::{
    api::error::ApiError,
    core::approval::{Actor, Role},
};
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{HeaderMap, request::Parts},
};

/// Header carrying the authenticated user ID.
pub const ACTOR_ID_HEADER: &str = "X-Actor-Id";
/// Header carrying the authenticated user's role.
pub const ACTOR_ROLE_HEADER: &str = "X-Actor-Role";

/// The actor making the request.
#[derive(Debug, Clone, Copy)]
pub struct CurrentActor(pub Actor);

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Result<&'a str, ApiError> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| ApiError::unauthorized(format!("missing {name} header")))
}

fn actor_from_headers(headers: &HeaderMap) -> Result<Actor, ApiError> {
    let id = header(headers, ACTOR_ID_HEADER)?
        .parse::<i64>()
        .map_err(|_| ApiError::unauthorized(format!("{ACTOR_ID_HEADER} must be an integer")))?;
    let role = header(headers, ACTOR_ROLE_HEADER)?
        .parse::<Role>()
        .map_err(|e| ApiError::unauthorized(e.to_string()))?;
    Ok(Actor::new(id, role))
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentActor
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        actor_from_headers(&parts.headers).map(Self)
    }
}
