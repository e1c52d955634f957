//! Reactive authentication state for an application.
//!
//! [`AuthContext`] owns the client, resolves the session on startup and
//! publishes every transition on a `watch` channel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

use super::config::ClientConfig;
use super::error::ClientError;
use super::notify::Notifier;
use super::pipeline::ApiClient;
use super::services::{AuthService, AuthSession};
use super::store::SessionStore;
use crate::auth::service::UserSnapshot;
use crate::error::ErrorKind;

#[derive(Debug, Clone, PartialEq)]
pub enum AuthState {
    Uninitialized,
    Loading,
    Authenticated(UserSnapshot),
    Anonymous,
}

impl AuthState {
    pub fn user(&self) -> Option<&UserSnapshot> {
        match self {
            AuthState::Authenticated(user) => Some(user),
            _ => None,
        }
    }
}

/// Moves the context to `Anonymous` whenever the pipeline or the refresh
/// coordinator ends the session, then forwards the notice.
struct StateNotifier {
    inner: Arc<dyn Notifier>,
    state: Arc<watch::Sender<AuthState>>,
}

impl Notifier for StateNotifier {
    fn success(&self, message: &str) {
        self.inner.success(message);
    }

    fn error(&self, message: &str) {
        self.inner.error(message);
    }

    fn redirect_to_login(&self) {
        self.state.send_replace(AuthState::Anonymous);
        self.inner.redirect_to_login();
    }
}

#[derive(Clone)]
pub struct AuthContext {
    auth: AuthService,
    first_load: Arc<AtomicBool>,
    notifier: Arc<dyn Notifier>,
    state: Arc<watch::Sender<AuthState>>,
}

impl AuthContext {
    pub fn new(
        config: ClientConfig,
        store: SessionStore,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, ClientError> {
        let (state, _) = watch::channel(AuthState::Uninitialized);
        let state = Arc::new(state);

        let wrapped: Arc<dyn Notifier> = Arc::new(StateNotifier {
            inner: Arc::clone(&notifier),
            state: Arc::clone(&state),
        });
        let client = ApiClient::new(config, store, wrapped)?;

        Ok(Self {
            auth: AuthService::new(client),
            first_load: Arc::new(AtomicBool::new(true)),
            notifier,
            state,
        })
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> AuthState {
        self.state.borrow().clone()
    }

    pub fn current_user(&self) -> Option<UserSnapshot> {
        self.state.borrow().user().cloned()
    }

    pub fn client(&self) -> &ApiClient {
        self.auth.client()
    }

    pub fn auth(&self) -> &AuthService {
        &self.auth
    }

    /// Resolve the stored session once at startup.
    pub async fn bootstrap(&self) -> AuthState {
        self.set(AuthState::Loading);
        let state = self.resolve().await;
        self.first_load.store(false, Ordering::SeqCst);
        state
    }

    /// Re-check the session against the server.
    pub async fn refresh_user(&self) -> AuthState {
        self.resolve().await
    }

    async fn resolve(&self) -> AuthState {
        let store = self.client().store();

        // A token without its user (or the reverse) is cleared by `session`
        if store.session().is_none() {
            return self.set(AuthState::Anonymous);
        }

        match self.auth.probe_current_user().await {
            Ok(user) => self.authenticate(&user),
            Err(e) if e.kind() == ErrorKind::Unauthorized => self.recover().await,
            Err(e) => {
                tracing::warn!(error = %e, "Could not verify session");
                store.clear();
                self.set(AuthState::Anonymous)
            }
        }
    }

    /// One refresh straight through the refresher, outside the pipeline.
    async fn recover(&self) -> AuthState {
        let store = self.client().store();

        let user = match self.client().refresher().refresh().await {
            Ok(grant) => match store.save(&grant.access_token, grant.user.as_ref()) {
                Ok(()) => match grant.user {
                    Some(user) => Ok(user),
                    None => self.auth.probe_current_user().await,
                },
                Err(e) => Err(ClientError::Storage(e.to_string())),
            },
            Err(e) => Err(e),
        };

        match user {
            Ok(user) => self.authenticate(&user),
            Err(e) => {
                tracing::info!(error = %e, "Session could not be renewed");
                store.clear();
                if !self.first_load.load(Ordering::SeqCst) {
                    self.notifier.error(&ClientError::SessionExpired.to_string());
                }
                self.set(AuthState::Anonymous)
            }
        }
    }

    fn authenticate(&self, user: &UserSnapshot) -> AuthState {
        let store = self.client().store();
        if let Some(token) = store.access_token() {
            if let Err(e) = store.save(&token, Some(user)) {
                tracing::warn!(error = %e, "Failed to persist refreshed user");
            }
        }
        self.set(AuthState::Authenticated(user.clone()))
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<UserSnapshot, ClientError> {
        let result = self.auth.login_user(email, password).await;
        self.sign_in(result, |user| format!("Welcome back, {}!", user.name))
    }

    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<UserSnapshot, ClientError> {
        let result = self.auth.register_user(name, email, password).await;
        self.sign_in(result, |user| format!("Welcome to BookReview, {}!", user.name))
    }

    fn sign_in(
        &self,
        result: Result<AuthSession, ClientError>,
        greeting: impl FnOnce(&UserSnapshot) -> String,
    ) -> Result<UserSnapshot, ClientError> {
        let store = self.client().store();

        let saved = result.and_then(|session| {
            store
                .save(&session.access_token, Some(&session.user))
                .map_err(|e| ClientError::Storage(e.to_string()))
                .map(|()| session.user)
        });

        match saved {
            Ok(user) => {
                self.set(AuthState::Authenticated(user.clone()));
                self.notifier.success(&greeting(&user));
                Ok(user)
            }
            Err(e) => {
                store.clear();
                self.set(AuthState::Anonymous);
                self.notifier.error(&e.to_string());
                Err(e)
            }
        }
    }

    /// Sign out. Always ends anonymous.
    pub async fn logout(&self) {
        self.auth.logout_user().await;
        self.set(AuthState::Anonymous);
        self.notifier.success("Logged out successfully!");
    }

    fn set(&self, state: AuthState) -> AuthState {
        self.state.send_replace(state.clone());
        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::notify::{ChannelNotifier, Notice};
    use crate::storage::models::Role;

    fn context() -> (AuthContext, tokio::sync::mpsc::UnboundedReceiver<Notice>) {
        let (notifier, rx) = ChannelNotifier::new();
        let context = AuthContext::new(
            ClientConfig::new("http://127.0.0.1:9"),
            SessionStore::in_memory(),
            Arc::new(notifier),
        )
        .unwrap();
        (context, rx)
    }

    #[tokio::test]
    async fn test_bootstrap_without_token_is_anonymous() {
        let (context, mut rx) = context();
        assert_eq!(context.state(), AuthState::Uninitialized);

        assert_eq!(context.bootstrap().await, AuthState::Anonymous);
        assert_eq!(context.state(), AuthState::Anonymous);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_redirect_moves_state_to_anonymous() {
        let (context, mut rx) = context();
        context.set(AuthState::Authenticated(UserSnapshot {
            email: "ada@example.com".into(),
            id: "u1".into(),
            name: "Ada".into(),
            role: Role::User,
        }));
        let mut watcher = context.subscribe();

        context.client().store().clear();
        StateNotifier {
            inner: Arc::clone(&context.notifier),
            state: Arc::clone(&context.state),
        }
        .redirect_to_login();

        assert!(watcher.has_changed().unwrap());
        assert_eq!(*watcher.borrow_and_update(), AuthState::Anonymous);
        assert_eq!(rx.try_recv().unwrap(), Notice::RedirectToLogin);
    }

    #[tokio::test]
    async fn test_failed_login_validation_notifies() {
        let (context, mut rx) = context();

        let err = context.login("ada@example.com", "").await.unwrap_err();
        assert_eq!(err, ClientError::Validation("Password is required".into()));
        assert_eq!(context.state(), AuthState::Anonymous);
        assert_eq!(rx.try_recv().unwrap(), Notice::Error("Password is required".into()));
    }
}
