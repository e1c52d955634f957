use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::api::middleware::AuthUser;
use crate::api::response::{ApiError, AppJson, Envelope, Message};
use crate::auth::cookie::refresh_token_from;
use crate::auth::service::{self, Credentials, Registration, SignedIn, UserSnapshot};
use crate::AppState;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub access_token: String,
    pub message: String,
    pub user: UserSnapshot,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshData {
    pub access_token: String,
    pub user: UserSnapshot,
}

type WithCookie<T> = (StatusCode, [(header::HeaderName, String); 1], Json<T>);

fn signed_in_response(
    state: &AppState,
    status: StatusCode,
    message: &str,
    signed_in: SignedIn,
) -> WithCookie<AuthResponse> {
    let cookie = state.cookies.issue(&signed_in.tokens.refresh);
    (
        status,
        [(header::SET_COOKIE, cookie)],
        Json(AuthResponse {
            access_token: signed_in.tokens.access,
            message: message.to_string(),
            user: signed_in.user,
        }),
    )
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn register(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<Registration>,
) -> Result<WithCookie<AuthResponse>, ApiError> {
    let signed_in = service::register(&state.db, &state.issuer, req)?;
    Ok(signed_in_response(
        &state,
        StatusCode::CREATED,
        "User registered successfully",
        signed_in,
    ))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<Credentials>,
) -> Result<WithCookie<AuthResponse>, ApiError> {
    let signed_in = service::login(&state.db, &state.issuer, req)?;
    tracing::debug!(user_id = %signed_in.user.id, "User logged in");
    Ok(signed_in_response(
        &state,
        StatusCode::OK,
        "Login successful",
        signed_in,
    ))
}

pub async fn refresh(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Envelope<RefreshData>>, ApiError> {
    let cookie = refresh_token_from(&headers);
    let (access_token, user) = service::refresh(&state.db, &state.issuer, cookie.as_deref())?;

    tracing::debug!(user_id = %user.id, "Issued access token from refresh token");
    Ok(Envelope::success(RefreshData { access_token, user }))
}

/// Clears the refresh cookie. Always succeeds, with or without a session.
pub async fn logout(State(state): State<Arc<AppState>>) -> WithCookie<Message> {
    (
        StatusCode::OK,
        [(header::SET_COOKIE, state.cookies.clear())],
        Message::new("Logged out successfully"),
    )
}

pub async fn current_user(
    State(state): State<Arc<AppState>>,
    caller: AuthUser,
) -> Result<Json<Envelope<UserSnapshot>>, ApiError> {
    let user = state
        .db
        .get_user(&caller.id)?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(Envelope::success(UserSnapshot::from(&user)))
}
