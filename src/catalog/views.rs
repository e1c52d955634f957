use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::storage::models::{Book, Review, User};

/// The public part of a user, embedded in book and review responses.
#[derive(Debug, Clone, Serialize)]
pub struct UserRef {
    pub email: String,
    pub id: String,
    pub name: String,
}

impl From<&User> for UserRef {
    fn from(user: &User) -> Self {
        Self {
            email: user.email.clone(),
            id: user.id.clone(),
            name: user.name.clone(),
        }
    }
}

/// Aggregate rating of a book
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RatingStats {
    /// Mean rating rounded to one decimal; `None` without reviews
    pub average_rating: Option<f64>,
    pub review_count: usize,
}

impl RatingStats {
    pub fn from_ratings(ratings: impl IntoIterator<Item = u8>) -> Self {
        let (sum, count) = ratings
            .into_iter()
            .fold((0u64, 0usize), |(sum, count), r| (sum + r as u64, count + 1));

        if count == 0 {
            return Self::default();
        }

        let mean = sum as f64 / count as f64;
        Self {
            average_rating: Some((mean * 10.0).round() / 10.0),
            review_count: count,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookView {
    pub author: String,
    pub average_rating: Option<f64>,
    pub cover_image: Option<String>,
    pub created_at: DateTime<Utc>,
    /// `None` when the creating account no longer exists
    pub created_by: Option<UserRef>,
    pub description: String,
    pub genres: Vec<String>,
    pub id: String,
    pub review_count: usize,
    pub title: String,
    pub updated_at: DateTime<Utc>,
}

impl BookView {
    pub fn new(book: Book, created_by: Option<UserRef>, stats: RatingStats) -> Self {
        Self {
            author: book.author,
            average_rating: stats.average_rating,
            cover_image: Some(book.cover_image).filter(|c| !c.is_empty()),
            created_at: book.created_at,
            created_by,
            description: book.description,
            genres: book.genres,
            id: book.id,
            review_count: stats.review_count,
            title: book.title,
            updated_at: book.updated_at,
        }
    }
}

/// The book summary attached to reviews in cross-book listings
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookRef {
    pub author: String,
    pub cover_image: Option<String>,
    pub genres: Vec<String>,
    pub id: String,
    pub title: String,
}

impl From<&Book> for BookRef {
    fn from(book: &Book) -> Self {
        Self {
            author: book.author.clone(),
            cover_image: Some(book.cover_image.clone()).filter(|c| !c.is_empty()),
            genres: book.genres.clone(),
            id: book.id.clone(),
            title: book.title.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewView {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub book: Option<BookRef>,
    pub book_id: String,
    pub comment: String,
    pub created_at: DateTime<Utc>,
    pub id: String,
    pub rating: u8,
    pub updated_at: DateTime<Utc>,
    pub user: Option<UserRef>,
    pub user_id: String,
}

impl ReviewView {
    pub fn new(review: Review, user: Option<UserRef>, book: Option<BookRef>) -> Self {
        Self {
            book,
            book_id: review.book_id,
            comment: review.comment,
            created_at: review.created_at,
            id: review.id,
            rating: review.rating,
            updated_at: review.updated_at,
            user,
            user_id: review.user_id,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookListing {
    pub books: Vec<BookView>,
    pub limit: u32,
    pub page: u32,
    pub total_books: usize,
    pub total_pages: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewListing {
    pub limit: u32,
    pub page: u32,
    pub reviews: Vec<ReviewView>,
    pub success: bool,
    pub total_pages: usize,
    pub total_reviews: usize,
}
