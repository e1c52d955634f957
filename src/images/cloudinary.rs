use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use sha2::{Digest, Sha256};

use super::{ImageError, ImageStore};
use crate::config::CloudinaryConfig;

const API_BASE: &str = "https://api.cloudinary.com/v1_1";

/// Cloudinary admin client, limited to the signed destroy call.
pub struct CloudinaryStore {
    config: CloudinaryConfig,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct DestroyResponse {
    result: String,
}

impl CloudinaryStore {
    pub fn new(config: CloudinaryConfig, http: reqwest::Client) -> Self {
        Self { config, http }
    }

    /// Signature over the alphabetically sorted parameters followed by the
    /// API secret.
    fn sign(&self, params: &[(&str, &str)]) -> String {
        let mut sorted = params.to_vec();
        sorted.sort_by_key(|(k, _)| *k);
        let joined = sorted
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");

        let mut hasher = Sha256::new();
        hasher.update(joined.as_bytes());
        hasher.update(self.config.api_secret.as_bytes());
        hex::encode(hasher.finalize())
    }
}

#[async_trait]
impl ImageStore for CloudinaryStore {
    async fn destroy(&self, public_id: &str) -> Result<(), ImageError> {
        let timestamp = Utc::now().timestamp().to_string();
        let signature = self.sign(&[("public_id", public_id), ("timestamp", timestamp.as_str())]);

        let url = format!("{API_BASE}/{}/image/destroy", self.config.cloud_name);
        let response = self
            .http
            .post(&url)
            .form(&[
                ("public_id", public_id),
                ("timestamp", timestamp.as_str()),
                ("api_key", self.config.api_key.as_str()),
                ("signature", signature.as_str()),
                ("signature_algorithm", "sha256"),
            ])
            .send()
            .await?
            .error_for_status()?
            .json::<DestroyResponse>()
            .await?;

        match response.result.as_str() {
            "ok" => {
                tracing::debug!(public_id, "Deleted cover image");
                Ok(())
            }
            other => Err(ImageError::Rejected(other.to_string())),
        }
    }
}
