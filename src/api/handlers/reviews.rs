use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::load_caller;
use crate::api::middleware::AuthUser;
use crate::api::response::{ApiError, AppJson, AppQuery, Envelope};
use crate::auth::generator::generate_id;
use crate::catalog::{self, Page, ReviewFilter, ReviewListing, ReviewView, SortOrder, UserRef};
use crate::storage::models::Review;
use crate::AppState;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ReviewInput {
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub rating: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ReviewListParams {
    pub book: Option<String>,
    pub limit: Option<String>,
    pub page: Option<String>,
    pub sort: Option<String>,
    pub user: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DeleteReviewResponse {
    pub message: String,
    pub success: bool,
}

fn validate_rating(rating: i64) -> Result<u8, ApiError> {
    if (1..=5).contains(&rating) {
        Ok(rating as u8)
    } else {
        Err(ApiError::bad_request("Rating must be between 1 and 5"))
    }
}

fn review_view(state: &AppState, review: Review) -> Result<ReviewView, ApiError> {
    let user = state.db.get_user(&review.user_id)?.as_ref().map(UserRef::from);
    Ok(ReviewView::new(review, user, None))
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn list_book_reviews(
    State(state): State<Arc<AppState>>,
    Path(book_id): Path<String>,
) -> Result<Json<Envelope<Vec<ReviewView>>>, ApiError> {
    let reviews = catalog::reviews_for_book(&state.db, &book_id)?;
    Ok(Envelope::success(reviews))
}

pub async fn list_all_reviews(
    State(state): State<Arc<AppState>>,
    AppQuery(params): AppQuery<ReviewListParams>,
) -> Result<Json<ReviewListing>, ApiError> {
    let filter = ReviewFilter {
        book_id: params.book.filter(|b| !b.is_empty()),
        page: Page::parse(params.page.as_deref(), params.limit.as_deref()),
        sort: SortOrder::parse(params.sort.as_deref()),
        user_id: params.user.filter(|u| !u.is_empty()),
    };
    Ok(Json(catalog::list_reviews(&state.db, &filter)?))
}

pub async fn create_review(
    State(state): State<Arc<AppState>>,
    caller: AuthUser,
    Path(book_id): Path<String>,
    AppJson(req): AppJson<ReviewInput>,
) -> Result<(StatusCode, Json<Envelope<ReviewView>>), ApiError> {
    let rating = validate_rating(req.rating.unwrap_or(0))?;

    if state.db.get_book(&book_id)?.is_none() {
        return Err(ApiError::not_found("Book not found"));
    }

    let now = Utc::now();
    let review = Review {
        book_id,
        comment: req.comment.unwrap_or_default(),
        created_at: now,
        id: generate_id(),
        rating,
        updated_at: now,
        user_id: caller.id,
    };

    if !state.db.create_review(&review)? {
        return Err(ApiError::conflict("You have already reviewed this book"));
    }
    tracing::debug!(id = %review.id, book_id = %review.book_id, "Created review");

    Ok((StatusCode::CREATED, Envelope::success(review_view(&state, review)?)))
}

pub async fn update_review(
    State(state): State<Arc<AppState>>,
    caller: AuthUser,
    Path(review_id): Path<String>,
    AppJson(req): AppJson<ReviewInput>,
) -> Result<Json<Envelope<ReviewView>>, ApiError> {
    let mut review = state
        .db
        .get_review(&review_id)?
        .ok_or_else(|| ApiError::not_found("Review not found"))?;

    if review.user_id != caller.id {
        return Err(ApiError::forbidden(
            "You are not authorized to update this review",
        ));
    }

    if let Some(rating) = req.rating {
        review.rating = validate_rating(rating)?;
    }
    if let Some(comment) = req.comment {
        review.comment = comment;
    }
    review.updated_at = Utc::now();

    state.db.update_review(&review)?;
    tracing::debug!(id = %review.id, "Updated review");

    Ok(Envelope::success(review_view(&state, review)?))
}

/// The author or an admin may delete a review.
pub async fn delete_review(
    State(state): State<Arc<AppState>>,
    caller: AuthUser,
    Path(review_id): Path<String>,
) -> Result<Json<DeleteReviewResponse>, ApiError> {
    let review = state
        .db
        .get_review(&review_id)?
        .ok_or_else(|| ApiError::not_found("Review not found"))?;

    let user = load_caller(&state, &caller.id)?;
    if !user.is_admin() && review.user_id != user.id {
        return Err(ApiError::forbidden(
            "You are not authorized to delete this review",
        ));
    }

    if !state.db.delete_review(&review_id)? {
        return Err(ApiError::not_found("Review not found"));
    }
    tracing::debug!(id = %review_id, "Deleted review");

    Ok(Json(DeleteReviewResponse {
        message: "Review deleted successfully".to_string(),
        success: true,
    }))
}
