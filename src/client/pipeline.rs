//! Request pipeline: every API call goes through [`ApiClient::send`].
//!
//! Outbound, the stored access token is attached as a bearer token.
//! Inbound failures are handled in this order:
//!
//! 1. No response: retry with linear backoff, then `Network`.
//! 2. 401 on the bootstrap probe: returned as is for the auth context.
//! 3. 401 on an auth endpoint or on a request already re-issued after a
//!    refresh: the session is cleared, a redirect signalled and
//!    `SessionExpired` returned.
//! 4. Any other 401: one shared refresh, then the request is re-issued
//!    once with the new token.
//! 5. 429: wait for `Retry-After` and retry.
//! 6. 500/502/503/504: retry with exponential backoff.
//! 7. Everything else is returned as a status error.

use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use super::config::{ClientConfig, RetryPolicy};
use super::error::ClientError;
use super::notify::Notifier;
use super::refresh::{HttpRefresher, RefreshCoordinator, TokenRefresher};
use super::store::SessionStore;

/// Description of one API call, replayable across retries.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    body: Option<Value>,
    bootstrap_probe: bool,
    method: Method,
    path: String,
    query: Vec<(String, String)>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            body: None,
            bootstrap_probe: false,
            method,
            path: path.into(),
            query: Vec::new(),
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    /// Mark this as the "who am I" probe made while bootstrapping, whose
    /// 401 is left for the auth context to interpret.
    pub fn bootstrap_probe(mut self) -> Self {
        self.bootstrap_probe = true;
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    fn is_auth_endpoint(&self) -> bool {
        self.path.contains("/auth/")
    }
}

/// Seconds from a numeric `Retry-After` header.
fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// HTTP client for the bookshelf API. Cheap to clone; clones share the
/// cookie jar, the session store and the refresh coordinator.
#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    coordinator: RefreshCoordinator,
    http: reqwest::Client,
    notifier: Arc<dyn Notifier>,
    refresher: Arc<dyn TokenRefresher>,
    retry: RetryPolicy,
    store: SessionStore,
}

impl ApiClient {
    /// Client with a cookie jar and an HTTP refresher sharing it.
    pub fn new(
        config: ClientConfig,
        store: SessionStore,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(config.timeout)
            .build()
            .map_err(|e| ClientError::Network(format!("Failed to create HTTP client: {e}")))?;

        let refresher = Arc::new(HttpRefresher::new(http.clone(), &config.base_url));
        Ok(Self::with_refresher(config, http, store, notifier, refresher))
    }

    pub fn with_refresher(
        config: ClientConfig,
        http: reqwest::Client,
        store: SessionStore,
        notifier: Arc<dyn Notifier>,
        refresher: Arc<dyn TokenRefresher>,
    ) -> Self {
        let coordinator =
            RefreshCoordinator::new(Arc::clone(&refresher), store.clone(), Arc::clone(&notifier));
        Self {
            base_url: config.base_url,
            coordinator,
            http,
            notifier,
            refresher,
            retry: config.retry,
            store,
        }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn refresher(&self) -> &Arc<dyn TokenRefresher> {
        &self.refresher
    }

    pub fn coordinator(&self) -> &RefreshCoordinator {
        &self.coordinator
    }

    /// Send and decode a JSON response body.
    pub async fn send_json<T: DeserializeOwned>(&self, request: &ApiRequest) -> Result<T, ClientError> {
        self.send(request)
            .await?
            .json::<T>()
            .await
            .map_err(|e| ClientError::InvalidResponse(e.to_string()))
    }

    /// Send a request, applying the retry and refresh rules. Returns only
    /// successful responses.
    pub async fn send(&self, request: &ApiRequest) -> Result<reqwest::Response, ClientError> {
        let mut attempt: u32 = 0;
        let mut refreshed_token: Option<String> = None;

        loop {
            let token = refreshed_token
                .clone()
                .or_else(|| self.store.access_token());

            let response = match self.dispatch(request, token.as_deref()).await {
                Ok(response) => response,
                Err(e) => {
                    if attempt < self.retry.max_attempts {
                        attempt += 1;
                        tracing::debug!(path = %request.path, attempt, error = %e, "Request failed, retrying");
                        tokio::time::sleep(self.retry.network_delay(attempt)).await;
                        continue;
                    }
                    return Err(ClientError::Network(e.to_string()));
                }
            };

            let status = response.status();
            if status.is_success() {
                return Ok(response);
            }

            match status {
                StatusCode::UNAUTHORIZED => {
                    if request.bootstrap_probe {
                        return Err(ClientError::from_response(response).await);
                    }

                    if request.is_auth_endpoint() {
                        tracing::debug!(path = %request.path, "401 from auth endpoint, ending session");
                        self.end_session();
                        return Err(ClientError::SessionExpired);
                    }

                    if refreshed_token.is_some() {
                        tracing::debug!(path = %request.path, "401 after refresh, ending session");
                        self.end_session();
                        return Err(ClientError::SessionExpired);
                    }

                    refreshed_token = Some(self.coordinator.refresh().await?);
                }
                StatusCode::TOO_MANY_REQUESTS if attempt < self.retry.max_attempts => {
                    attempt += 1;
                    let wait = retry_after(response.headers()).unwrap_or(self.retry.default_retry_after);
                    tracing::debug!(path = %request.path, attempt, wait_ms = wait.as_millis() as u64, "Rate limited, retrying");
                    tokio::time::sleep(wait).await;
                }
                StatusCode::INTERNAL_SERVER_ERROR
                | StatusCode::BAD_GATEWAY
                | StatusCode::SERVICE_UNAVAILABLE
                | StatusCode::GATEWAY_TIMEOUT
                    if attempt < self.retry.max_attempts =>
                {
                    attempt += 1;
                    tracing::debug!(path = %request.path, attempt, status = status.as_u16(), "Server error, retrying");
                    tokio::time::sleep(self.retry.server_delay(attempt)).await;
                }
                _ => return Err(ClientError::from_response(response).await),
            }
        }
    }

    async fn dispatch(
        &self,
        request: &ApiRequest,
        token: Option<&str>,
    ) -> Result<reqwest::Response, reqwest::Error> {
        let url = format!("{}{}", self.base_url, request.path);
        let mut builder = self.http.request(request.method.clone(), &url);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        builder.send().await
    }

    fn end_session(&self) {
        self.store.clear();
        self.notifier.redirect_to_login();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_auth_endpoint_detection() {
        assert!(ApiRequest::post("/auth/login").is_auth_endpoint());
        assert!(ApiRequest::get("/auth/me").is_auth_endpoint());
        assert!(!ApiRequest::get("/api/books").is_auth_endpoint());
        assert!(!ApiRequest::get("/users/u1").is_auth_endpoint());
    }

    #[test]
    fn test_retry_after() {
        let mut headers = HeaderMap::new();
        assert_eq!(retry_after(&headers), None);

        headers.insert(RETRY_AFTER, HeaderValue::from_static("2"));
        assert_eq!(retry_after(&headers), Some(Duration::from_secs(2)));

        headers.insert(
            RETRY_AFTER,
            HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"),
        );
        assert_eq!(retry_after(&headers), None);
    }
}
