//! Single-flight access token refresh.
//!
//! However many requests fail with 401 at once, only one refresh call
//! reaches the server. The first caller installs a shared future in the
//! coordinator's slot; everyone arriving while it runs clones and awaits
//! the same future. The future itself applies the outcome to the session
//! store and empties the slot before any waiter observes the result, so
//! every waiter sees exactly one outcome and the next 401 after settlement
//! starts a fresh refresh.

use async_trait::async_trait;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use serde::Deserialize;
use std::sync::Arc;

use super::error::ClientError;
use super::notify::Notifier;
use super::store::SessionStore;
use crate::auth::service::UserSnapshot;

/// A new access token, optionally with a fresh copy of the user.
#[derive(Debug, Clone, PartialEq)]
pub struct RefreshGrant {
    pub access_token: String,
    pub user: Option<UserSnapshot>,
}

/// Exchanges the refresh credential for a new access token.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self) -> Result<RefreshGrant, ClientError>;
}

// ============================================================================
// HTTP refresher
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshData {
    #[serde(default)]
    access_token: String,
    #[serde(default)]
    user: Option<UserSnapshot>,
}

#[derive(Debug, Deserialize)]
struct RefreshEnvelope {
    #[serde(default)]
    data: Option<RefreshData>,
    #[serde(default)]
    success: bool,
}

/// Validate a `/auth/refresh` body: `{success: true, data: {accessToken, user?}}`.
pub(crate) fn parse_refresh_body(body: &[u8]) -> Result<RefreshGrant, ClientError> {
    let envelope: RefreshEnvelope = serde_json::from_slice(body)
        .map_err(|e| ClientError::InvalidResponse(e.to_string()))?;

    match envelope.data {
        Some(data) if envelope.success && !data.access_token.is_empty() => Ok(RefreshGrant {
            access_token: data.access_token,
            user: data.user,
        }),
        _ => Err(ClientError::InvalidResponse(
            "refresh response carries no access token".into(),
        )),
    }
}

/// Calls `POST /auth/refresh` directly, outside the request pipeline. The
/// refresh cookie travels in the cookie jar of the shared `reqwest::Client`.
pub struct HttpRefresher {
    http: reqwest::Client,
    url: String,
}

impl HttpRefresher {
    pub fn new(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            http,
            url: format!("{base_url}/auth/refresh"),
        }
    }
}

#[async_trait]
impl TokenRefresher for HttpRefresher {
    async fn refresh(&self) -> Result<RefreshGrant, ClientError> {
        let response = self
            .http
            .post(&self.url)
            .send()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ClientError::from_response(response).await);
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| ClientError::InvalidResponse(e.to_string()))?;
        parse_refresh_body(&body)
    }
}

// ============================================================================
// Coordinator
// ============================================================================

type InFlight = Shared<BoxFuture<'static, Result<String, ClientError>>>;

struct Inner {
    in_flight: Mutex<Option<InFlight>>,
    notifier: Arc<dyn Notifier>,
    refresher: Arc<dyn TokenRefresher>,
    store: SessionStore,
}

/// Shares one in-flight refresh between all concurrent callers.
#[derive(Clone)]
pub struct RefreshCoordinator {
    inner: Arc<Inner>,
}

impl RefreshCoordinator {
    pub fn new(
        refresher: Arc<dyn TokenRefresher>,
        store: SessionStore,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                in_flight: Mutex::new(None),
                notifier,
                refresher,
                store,
            }),
        }
    }

    /// Get a new access token, joining the refresh already in flight if
    /// there is one.
    ///
    /// On failure the session has been cleared and a redirect signalled
    /// once for the whole refresh, and every caller gets
    /// [`ClientError::SessionExpired`].
    pub async fn refresh(&self) -> Result<String, ClientError> {
        let in_flight = {
            let mut slot = self.inner.in_flight.lock();
            match slot.as_ref() {
                Some(existing) => {
                    tracing::debug!("Joining in-flight token refresh");
                    existing.clone()
                }
                None => {
                    let started = Self::run(Arc::clone(&self.inner)).boxed().shared();
                    *slot = Some(started.clone());
                    started
                }
            }
        };

        in_flight.await
    }

    /// Whether a refresh is currently in flight.
    pub fn is_refreshing(&self) -> bool {
        self.inner.in_flight.lock().is_some()
    }

    async fn run(inner: Arc<Inner>) -> Result<String, ClientError> {
        tracing::debug!("Refreshing access token");

        let outcome = match inner.refresher.refresh().await {
            Ok(grant) => match inner.store.save(&grant.access_token, grant.user.as_ref()) {
                Ok(()) => Ok(grant.access_token),
                Err(e) => Err(ClientError::Storage(e.to_string())),
            },
            Err(e) => Err(e),
        };

        let settled = match outcome {
            Ok(token) => {
                tracing::debug!("Access token refreshed");
                Ok(token)
            }
            Err(e) => {
                tracing::info!(error = %e, "Token refresh failed, ending session");
                inner.store.clear();
                inner.notifier.redirect_to_login();
                Err(ClientError::SessionExpired)
            }
        };

        inner.in_flight.lock().take();
        settled
    }
}
