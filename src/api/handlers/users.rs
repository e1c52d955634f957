use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;

use super::required_text;
use crate::api::middleware::AuthUser;
use crate::api::response::{ApiError, AppJson};
use crate::auth::service::UserSnapshot;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ProfileUpdate {
    #[serde(default)]
    pub name: Option<String>,
}

pub async fn get_user_profile(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<UserSnapshot>, ApiError> {
    let user = state
        .db
        .get_user(&id)?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(Json(UserSnapshot::from(&user)))
}

/// Users may only rename themselves.
pub async fn update_user_profile(
    State(state): State<Arc<AppState>>,
    caller: AuthUser,
    Path(id): Path<String>,
    AppJson(req): AppJson<ProfileUpdate>,
) -> Result<Json<UserSnapshot>, ApiError> {
    if caller.id != id {
        return Err(ApiError::forbidden(
            "You are not authorized to update this profile",
        ));
    }

    let name = required_text(req.name.as_deref())
        .ok_or_else(|| ApiError::bad_request("Name is required"))?;

    let user = state
        .db
        .update_user_name(&id, &name)?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    tracing::debug!(user_id = %user.id, "Updated profile");
    Ok(Json(UserSnapshot::from(&user)))
}
