use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{load_caller, required_text};
use crate::api::middleware::AuthUser;
use crate::api::response::{ApiError, AppJson, AppQuery, Envelope};
use crate::auth::generator::generate_id;
use crate::catalog::{self, BookFilter, BookListing, BookView, Page, SortOrder};
use crate::images::destroy_best_effort;
use crate::storage::models::Book;
use crate::AppState;

// ============================================================================
// Types
// ============================================================================

/// Genres arrive either as a list or as a single string, which may itself
/// hold a JSON-encoded list.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum GenresInput {
    List(Vec<String>),
    Text(String),
}

impl GenresInput {
    fn into_vec(self) -> Vec<String> {
        let genres = match self {
            GenresInput::List(list) => list,
            GenresInput::Text(text) => {
                serde_json::from_str::<Vec<String>>(&text).unwrap_or_else(|_| vec![text])
            }
        };
        genres
            .into_iter()
            .map(|g| g.trim().to_string())
            .filter(|g| !g.is_empty())
            .collect()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookInput {
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub cover_image: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub genres: Option<GenresInput>,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BookListParams {
    pub genre: Option<String>,
    pub limit: Option<String>,
    pub page: Option<String>,
    pub search: Option<String>,
    pub sort: Option<String>,
}

impl BookListParams {
    fn into_filter(self) -> BookFilter {
        BookFilter {
            genre: self.genre.filter(|g| !g.is_empty()),
            page: Page::parse(self.page.as_deref(), self.limit.as_deref()),
            search: self.search.filter(|s| !s.trim().is_empty()),
            sort: SortOrder::parse(self.sort.as_deref()),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteBookResponse {
    pub deleted_reviews_count: usize,
    pub message: String,
    pub success: bool,
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn list_books(
    State(state): State<Arc<AppState>>,
    AppQuery(params): AppQuery<BookListParams>,
) -> Result<Json<BookListing>, ApiError> {
    let filter = params.into_filter();
    Ok(Json(catalog::list_books(&state.db, &filter)?))
}

pub async fn get_book(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<BookView>, ApiError> {
    catalog::book_detail(&state.db, &id)?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Book not found"))
}

/// Admin only; enforced by the route's middleware.
pub async fn create_book(
    State(state): State<Arc<AppState>>,
    caller: AuthUser,
    AppJson(req): AppJson<BookInput>,
) -> Result<(StatusCode, Json<Envelope<BookView>>), ApiError> {
    let (Some(title), Some(author)) = (
        required_text(req.title.as_deref()),
        required_text(req.author.as_deref()),
    ) else {
        return Err(ApiError::bad_request("Title and author are required"));
    };

    let now = Utc::now();
    let book = Book {
        author,
        cover_image: req.cover_image.map(|c| c.trim().to_string()).unwrap_or_default(),
        created_at: now,
        created_by: caller.id,
        description: req.description.unwrap_or_default(),
        genres: req.genres.map(GenresInput::into_vec).unwrap_or_default(),
        id: generate_id(),
        title,
        updated_at: now,
    };

    state.db.put_book(&book)?;
    tracing::debug!(id = %book.id, created_by = %book.created_by, "Created book");

    let view = catalog::book_view(&state.db, book)?;
    Ok((StatusCode::CREATED, Envelope::success(view)))
}

pub async fn update_book(
    State(state): State<Arc<AppState>>,
    caller: AuthUser,
    Path(id): Path<String>,
    AppJson(req): AppJson<BookInput>,
) -> Result<Json<Envelope<BookView>>, ApiError> {
    let mut book = state
        .db
        .get_book(&id)?
        .ok_or_else(|| ApiError::not_found("Book not found"))?;

    if book.created_by != caller.id {
        return Err(ApiError::forbidden(
            "You are not authorized to update this book",
        ));
    }

    if let Some(title) = req.title {
        book.title = required_text(Some(&title))
            .ok_or_else(|| ApiError::bad_request("Title cannot be empty"))?;
    }
    if let Some(author) = req.author {
        book.author = required_text(Some(&author))
            .ok_or_else(|| ApiError::bad_request("Author cannot be empty"))?;
    }
    if let Some(description) = req.description {
        book.description = description;
    }
    if let Some(genres) = req.genres {
        book.genres = genres.into_vec();
    }

    let replaced_cover = match req.cover_image.map(|c| c.trim().to_string()) {
        Some(cover) if cover != book.cover_image => {
            Some(std::mem::replace(&mut book.cover_image, cover))
        }
        _ => None,
    };

    book.updated_at = Utc::now();
    state.db.put_book(&book)?;
    tracing::debug!(id = %book.id, "Updated book");

    if let Some(old) = replaced_cover.filter(|c| !c.is_empty()) {
        destroy_best_effort(state.images.as_ref(), &old).await;
    }

    let view = catalog::book_view(&state.db, book)?;
    Ok(Envelope::success(view))
}

/// Delete a book together with all of its reviews. The cover image is
/// removed from the image store only after the database commit.
pub async fn delete_book(
    State(state): State<Arc<AppState>>,
    caller: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<DeleteBookResponse>, ApiError> {
    let book = state
        .db
        .get_book(&id)?
        .ok_or_else(|| ApiError::not_found("Book not found"))?;

    let user = load_caller(&state, &caller.id)?;
    if !user.is_admin() && book.created_by != user.id {
        return Err(ApiError::forbidden(
            "You are not authorized to delete this book",
        ));
    }

    let outcome = state
        .db
        .delete_book_cascade(&id)?
        .ok_or_else(|| ApiError::not_found("Book not found"))?;

    tracing::info!(
        id = %id,
        deleted_reviews = outcome.deleted_reviews,
        "Deleted book and its reviews"
    );

    if !outcome.book.cover_image.is_empty() {
        destroy_best_effort(state.images.as_ref(), &outcome.book.cover_image).await;
    }

    Ok(Json(DeleteBookResponse {
        deleted_reviews_count: outcome.deleted_reviews,
        message: "Book and all associated reviews deleted successfully".to_string(),
        success: true,
    }))
}
