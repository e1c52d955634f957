//! Bearer-token authentication for protected routes.
//!
//! `require_auth` verifies the access token and stores the caller in the
//! request extensions; handlers pick it up through the [`AuthUser`]
//! extractor. `require_admin` must run after `require_auth`.

use axum::extract::{FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::http::{header, HeaderMap};
use axum::middleware::Next;
use axum::response::Response;
use std::sync::Arc;

use super::response::ApiError;
use crate::auth::TokenKind;
use crate::AppState;

/// The authenticated caller of a request
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: String,
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))
    }
}

fn bearer_from_header(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_from_header(request.headers())
        .ok_or_else(|| ApiError::unauthorized("No token provided"))?;

    let claims = state
        .issuer
        .verify(token, TokenKind::Access)
        .map_err(|e| {
            tracing::debug!(reason = %e, "Rejected access token");
            ApiError::unauthorized("Invalid or expired token")
        })?;

    request.extensions_mut().insert(AuthUser { id: claims.sub });
    Ok(next.run(request).await)
}

pub async fn require_admin(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let caller = request
        .extensions()
        .get::<AuthUser>()
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    let user = state
        .db
        .get_user(&caller.id)?
        .ok_or_else(|| ApiError::unauthorized("User not found"))?;

    if !user.is_admin() {
        return Err(ApiError::forbidden("Admin access required"));
    }

    Ok(next.run(request).await)
}
