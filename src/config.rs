use thiserror::Error;

use crate::auth::generator::generate_secret;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub cors: CorsConfig,
    pub environment: Environment,
    pub images: Option<CloudinaryConfig>,
    pub server: ServerConfig,
    pub tokens: TokenConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_address: String,
    pub data_dir: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum Environment {
    #[default]
    Development,
    Production,
}

#[derive(Debug, Clone)]
pub struct TokenConfig {
    pub access_secret: String,
    pub access_ttl_seconds: i64,
    pub refresh_secret: String,
    pub refresh_ttl_seconds: i64,
}

#[derive(Debug, Clone)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct CloudinaryConfig {
    pub api_key: String,
    pub api_secret: String,
    pub cloud_name: String,
}

impl TokenConfig {
    /// Token lifetimes are fixed; only the secrets vary.
    pub fn new(access_secret: String, refresh_secret: String) -> Self {
        Self {
            access_secret,
            access_ttl_seconds: 30 * 60,
            refresh_secret,
            refresh_ttl_seconds: 7 * 24 * 60 * 60,
        }
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: [
                "http://localhost:5173",
                "http://localhost:3000",
                "http://localhost:4173",
                "http://127.0.0.1:5173",
                "http://127.0.0.1:3000",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let bind_address =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:5000".to_string());

        let data_dir = std::env::var("DATA_DIR").unwrap_or_else(|_| "./data".to_string());

        let environment = std::env::var("APP_ENV")
            .map(|v| match v.to_lowercase().as_str() {
                "production" | "prod" => Environment::Production,
                _ => Environment::Development,
            })
            .unwrap_or_default();

        let access_secret = secret_from_env("JWT_SECRET", environment)?;
        let refresh_secret = secret_from_env("JWT_REFRESH_SECRET", environment)?;

        let mut cors = CorsConfig::default();
        if let Some(client_url) = non_empty_env("CLIENT_URL") {
            tracing::info!(origin = %client_url, "Added CLIENT_URL to CORS origins");
            cors.allowed_origins.push(client_url);
        }

        let images = match (
            non_empty_env("CLOUDINARY_CLOUD_NAME"),
            non_empty_env("CLOUDINARY_API_KEY"),
            non_empty_env("CLOUDINARY_API_SECRET"),
        ) {
            (Some(cloud_name), Some(api_key), Some(api_secret)) => Some(CloudinaryConfig {
                api_key,
                api_secret,
                cloud_name,
            }),
            _ => None,
        };

        let config = Config {
            cors,
            environment,
            images,
            server: ServerConfig {
                bind_address,
                data_dir,
            },
            tokens: TokenConfig::new(access_secret, refresh_secret),
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.tokens.access_secret.is_empty() || self.tokens.refresh_secret.is_empty() {
            return Err(ConfigError::ValidationError(
                "JWT secrets cannot be empty".to_string(),
            ));
        }

        if self.tokens.access_secret == self.tokens.refresh_secret {
            return Err(ConfigError::ValidationError(
                "JWT_SECRET and JWT_REFRESH_SECRET must differ".to_string(),
            ));
        }

        if self.images.is_none() {
            tracing::warn!("Cloudinary is not configured; cover image cleanup is disabled");
        }

        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Read a signing secret. Development falls back to a random per-process
/// secret, which invalidates every issued token on restart.
fn secret_from_env(key: &str, environment: Environment) -> Result<String, ConfigError> {
    match non_empty_env(key) {
        Some(secret) => Ok(secret),
        None if environment == Environment::Production => Err(ConfigError::ValidationError(
            format!("{key} must be set in production"),
        )),
        None => {
            tracing::warn!("{key} not set; using a random development secret");
            Ok(generate_secret())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::test_config;

    #[test]
    fn test_token_lifetimes() {
        let tokens = TokenConfig::new("a".into(), "b".into());
        assert_eq!(tokens.access_ttl_seconds, 1800);
        assert_eq!(tokens.refresh_ttl_seconds, 604_800);
    }

    #[test]
    fn test_validate_rejects_shared_secret() {
        let mut config = test_config();
        config.tokens.refresh_secret = config.tokens.access_secret.clone();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_secret() {
        let mut config = test_config();
        config.tokens.access_secret.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_cors_origins() {
        let cors = CorsConfig::default();
        assert!(cors
            .allowed_origins
            .contains(&"http://localhost:5173".to_string()));
        assert_eq!(cors.allowed_origins.len(), 5);
    }
}
