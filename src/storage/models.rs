use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[default]
    User,
}

/// A registered account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub created_at: DateTime<Utc>,
    /// Lower-cased, unique
    pub email: String,
    pub id: String,
    pub name: String,
    /// Argon2 PHC string
    pub password_hash: String,
    pub role: Role,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// A catalog entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Book {
    pub author: String,
    /// Image URL, empty when the book has no cover
    pub cover_image: String,
    pub created_at: DateTime<Utc>,
    /// Id of the user who added the book
    pub created_by: String,
    pub description: String,
    pub genres: Vec<String>,
    pub id: String,
    pub title: String,
    pub updated_at: DateTime<Utc>,
}

/// A user's rating of a book. At most one per (book, user).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    pub book_id: String,
    pub comment: String,
    pub created_at: DateTime<Utc>,
    pub id: String,
    /// 1..=5
    pub rating: u8,
    pub updated_at: DateTime<Utc>,
    pub user_id: String,
}

impl Review {
    /// Key of the (book, user) uniqueness index
    pub fn owner_key(&self) -> String {
        owner_key(&self.book_id, &self.user_id)
    }
}

pub fn owner_key(book_id: &str, user_id: &str) -> String {
    format!("{book_id}:{user_id}")
}

/// Result of deleting a book together with its reviews
#[derive(Debug, Clone)]
pub struct CascadeOutcome {
    pub book: Book,
    pub deleted_reviews: usize,
}
