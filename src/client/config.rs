use std::time::Duration;

const DEFAULT_API_URL: &str = "http://localhost:5000";

/// Bounds for the pipeline's automatic retries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Retry budget per request, shared by network failures, 429 and 5xx
    /// responses
    pub max_attempts: u32,
    pub base_delay: Duration,
    /// Wait after a 429 without a usable `Retry-After` header
    pub default_retry_after: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            default_retry_after: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Linear backoff for requests that got no response at all.
    pub fn network_delay(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }

    /// Exponential backoff for retryable server errors.
    pub fn server_delay(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub retry: RetryPolicy,
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            retry: RetryPolicy::default(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            ..Self::default()
        }
    }

    /// Base URL from `API_URL`, everything else default.
    pub fn from_env() -> Self {
        match std::env::var("API_URL") {
            Ok(url) if !url.trim().is_empty() => Self::new(url.trim()),
            _ => Self::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff() {
        let policy = RetryPolicy {
            base_delay: Duration::from_millis(100),
            ..RetryPolicy::default()
        };

        assert_eq!(policy.network_delay(1), Duration::from_millis(100));
        assert_eq!(policy.network_delay(3), Duration::from_millis(300));

        assert_eq!(policy.server_delay(1), Duration::from_millis(100));
        assert_eq!(policy.server_delay(2), Duration::from_millis(200));
        assert_eq!(policy.server_delay(3), Duration::from_millis(400));
    }

    #[test]
    fn test_base_url_is_normalised() {
        assert_eq!(ClientConfig::new("http://api/").base_url, "http://api");
        assert_eq!(ClientConfig::default().base_url, "http://localhost:5000");
    }
}
