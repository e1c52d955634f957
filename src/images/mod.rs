//! Cover image storage.
//!
//! Images live in an external object store; the API only keeps their URLs.
//! Removing an image is always best-effort: callers log failures and move on.

mod cloudinary;

use async_trait::async_trait;
use thiserror::Error;

pub use cloudinary::CloudinaryStore;

const COVER_FOLDER: &str = "book-covers";

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("Image store request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Image store rejected the request: {0}")]
    Rejected(String),
}

#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Remove the image with the given public id.
    async fn destroy(&self, public_id: &str) -> Result<(), ImageError>;
}

/// Used when no image store is configured.
pub struct NoopImageStore;

#[async_trait]
impl ImageStore for NoopImageStore {
    async fn destroy(&self, public_id: &str) -> Result<(), ImageError> {
        tracing::debug!(public_id, "No image store configured, skipping destroy");
        Ok(())
    }
}

/// Derive the store's public id from a delivery URL such as
/// `https://res.cloudinary.com/demo/image/upload/v123/book-covers/abc.jpg`.
pub fn extract_public_id(url: &str) -> Option<String> {
    if !url.contains("cloudinary.com") {
        return None;
    }

    let parts: Vec<&str> = url.split('/').collect();
    let upload_index = parts.iter().position(|p| *p == "upload")?;

    // Skip the version segment that follows "upload"
    let file_name = parts.get(upload_index + 2..)?.last()?;
    let public_id = file_name.split('.').next().filter(|s| !s.is_empty())?;

    Some(format!("{COVER_FOLDER}/{public_id}"))
}

/// Destroy the image behind `url`, logging instead of failing.
pub async fn destroy_best_effort(store: &dyn ImageStore, url: &str) {
    let Some(public_id) = extract_public_id(url) else {
        return;
    };

    if let Err(e) = store.destroy(&public_id).await {
        tracing::warn!(error = %e, public_id = %public_id, "Failed to delete cover image");
    }
}
