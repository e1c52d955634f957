//! bookshelf - A book review platform with a token-refresh session protocol
//!
//! This crate provides both halves of the platform:
//! - REST API: accounts, a book catalog, reviews and user profiles (axum)
//! - Short-lived access tokens plus cookie-borne refresh tokens (HS256 JWT)
//! - redb embedded database, with book deletion cascading to reviews atomically
//! - Client library: session store, request pipeline with retries, a
//!   single-flight refresh coordinator and a reactive auth context

pub mod api;
pub mod auth;
pub mod catalog;
pub mod client;
pub mod config;
pub mod error;
pub mod images;
pub mod storage;
#[cfg(test)]
pub mod testutil;

use std::sync::Arc;

use auth::cookie::CookiePolicy;
use auth::TokenIssuer;
use config::Config;
use images::ImageStore;
use storage::Database;

/// Shared application state
pub struct AppState {
    pub config: Config,
    pub cookies: CookiePolicy,
    pub db: Database,
    pub images: Arc<dyn ImageStore>,
    pub issuer: TokenIssuer,
}

impl AppState {
    pub fn new(config: Config, db: Database, images: Arc<dyn ImageStore>) -> Arc<Self> {
        Arc::new(Self {
            cookies: CookiePolicy::from_config(&config),
            issuer: TokenIssuer::new(&config.tokens),
            config,
            db,
            images,
        })
    }
}
