//! Shared test helpers, available to all `#[cfg(test)]` modules in the crate.

use std::sync::Arc;

use chrono::Utc;
use tempfile::TempDir;

use crate::config::{Config, CorsConfig, Environment, ServerConfig, TokenConfig};
use crate::images::NoopImageStore;
use crate::storage::models::{Book, Review, Role, User};
use crate::storage::Database;
use crate::AppState;

/// Open a fresh database in a temporary directory.
///
/// Returns both the `Database` and the `TempDir` guard; the caller must
/// keep the `TempDir` alive for the duration of the test.
pub fn setup_db() -> (Database, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db = Database::open(temp_dir.path()).unwrap();
    (db, temp_dir)
}

/// A development `Config` with fixed secrets and no image store.
pub fn test_config() -> Config {
    Config {
        cors: CorsConfig::default(),
        environment: Environment::Development,
        images: None,
        server: ServerConfig {
            bind_address: "127.0.0.1:0".to_string(),
            data_dir: "/tmp/test".to_string(),
        },
        tokens: TokenConfig::new("test-access-secret".into(), "test-refresh-secret".into()),
    }
}

/// Build a full `Arc<AppState>` around the given database.
pub fn test_state(db: Database) -> Arc<AppState> {
    AppState::new(test_config(), db, Arc::new(NoopImageStore))
}

/// Create a `User` with the given id and email. The password hash is not
/// a real argon2 hash; use the auth service to create loginable users.
pub fn make_user(id: &str, email: &str) -> User {
    let now = Utc::now();
    User {
        created_at: now,
        email: email.to_string(),
        id: id.to_string(),
        name: format!("user-{id}"),
        password_hash: String::new(),
        role: Role::User,
        updated_at: now,
    }
}

pub fn make_book(id: &str, created_by: &str) -> Book {
    let now = Utc::now();
    Book {
        author: format!("author-{id}"),
        cover_image: String::new(),
        created_at: now,
        created_by: created_by.to_string(),
        description: String::new(),
        genres: vec!["fiction".to_string()],
        id: id.to_string(),
        title: format!("title-{id}"),
        updated_at: now,
    }
}

pub fn make_review(id: &str, book_id: &str, user_id: &str, rating: u8) -> Review {
    let now = Utc::now();
    Review {
        book_id: book_id.to_string(),
        comment: String::new(),
        created_at: now,
        id: id.to_string(),
        rating,
        updated_at: now,
        user_id: user_id.to_string(),
    }
}
