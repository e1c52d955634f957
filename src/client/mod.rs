//! Client side of the session protocol.
//!
//! [`AuthContext`] is the entry point for applications. It wraps an
//! [`ApiClient`] whose pipeline attaches the stored access token, retries
//! transient failures and renews the token through a single shared
//! [`RefreshCoordinator`] when the server answers 401.

pub mod config;
pub mod context;
pub mod error;
pub mod notify;
pub mod pipeline;
pub mod refresh;
pub mod services;
pub mod store;

pub use config::{ClientConfig, RetryPolicy};
pub use context::{AuthContext, AuthState};
pub use error::ClientError;
pub use notify::{ChannelNotifier, Notice, Notifier, TracingNotifier};
pub use pipeline::{ApiClient, ApiRequest};
pub use refresh::{HttpRefresher, RefreshCoordinator, RefreshGrant, TokenRefresher};
pub use services::{AuthService, AuthSession};
pub use store::{FileStorage, MemoryStorage, Session, SessionStore, Storage, StorageError};
