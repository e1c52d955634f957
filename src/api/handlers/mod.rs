mod auth;
mod books;
mod reviews;
mod users;

use axum::Json;

use crate::api::response::{ApiError, Message};
use crate::storage::models::User;
use crate::AppState;

pub use auth::{current_user, login, logout, refresh, register};
pub use books::{create_book, delete_book, get_book, list_books, update_book};
pub use reviews::{create_review, delete_review, list_all_reviews, list_book_reviews, update_review};
pub use users::{get_user_profile, update_user_profile};

pub async fn health() -> Json<Message> {
    Message::new("Book Review Platform API is running")
}

/// Load the caller's account. A valid token for a deleted account is
/// treated as unauthenticated.
fn load_caller(state: &AppState, id: &str) -> Result<User, ApiError> {
    state
        .db
        .get_user(id)?
        .ok_or_else(|| ApiError::unauthorized("User not found"))
}

/// Trim a required text field, rejecting blanks.
fn required_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
