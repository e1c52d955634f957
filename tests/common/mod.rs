//! Helpers for running the API on a local port.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Request, State};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::Router;
use bookshelf::auth::password::hash_password;
use bookshelf::client::{
    AuthContext, ChannelNotifier, ClientConfig, Notice, RetryPolicy, SessionStore,
};
use bookshelf::config::{Config, CorsConfig, Environment, ServerConfig, TokenConfig};
use bookshelf::images::NoopImageStore;
use bookshelf::storage::models::{Role, User};
use bookshelf::storage::Database;
use bookshelf::AppState;
use chrono::Utc;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::sync::mpsc::UnboundedReceiver;

pub const PASSWORD: &str = "secret123";

pub fn test_config() -> Config {
    Config {
        cors: CorsConfig::default(),
        environment: Environment::Development,
        images: None,
        server: ServerConfig {
            bind_address: "127.0.0.1:0".to_string(),
            data_dir: "/tmp/test".to_string(),
        },
        tokens: TokenConfig::new("it-access-secret".into(), "it-refresh-secret".into()),
    }
}

/// Retries fast enough for tests.
pub fn client_config(url: &str) -> ClientConfig {
    ClientConfig {
        retry: RetryPolicy {
            base_delay: Duration::from_millis(10),
            default_retry_after: Duration::from_millis(10),
            ..RetryPolicy::default()
        },
        ..ClientConfig::new(url)
    }
}

/// Serve `router` on an ephemeral port and return its base URL.
pub async fn serve(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

#[derive(Default)]
pub struct RefreshCounter {
    hits: AtomicUsize,
}

/// Count `/auth/refresh` calls and hold each one briefly so concurrent
/// 401s pile up behind it.
async fn count_refreshes(
    State(counter): State<Arc<RefreshCounter>>,
    request: Request,
    next: Next,
) -> Response {
    if request.uri().path() == "/auth/refresh" {
        counter.hits.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
    next.run(request).await
}

pub struct TestServer {
    pub config: Config,
    pub counter: Arc<RefreshCounter>,
    pub db: Database,
    pub url: String,
    _temp: TempDir,
}

impl TestServer {
    pub async fn start() -> Self {
        let temp = TempDir::new().unwrap();
        let db = Database::open(temp.path()).unwrap();
        let config = test_config();
        let counter = Arc::new(RefreshCounter::default());

        let state = AppState::new(config.clone(), db.clone(), Arc::new(NoopImageStore));
        let router = bookshelf::api::create_router(state).layer(middleware::from_fn_with_state(
            Arc::clone(&counter),
            count_refreshes,
        ));

        Self {
            config,
            counter,
            db,
            url: serve(router).await,
            _temp: temp,
        }
    }

    pub fn refresh_hits(&self) -> usize {
        self.counter.hits.load(Ordering::SeqCst)
    }

    /// Insert a loginable admin account directly into the database.
    pub fn create_admin(&self, email: &str) -> User {
        let now = Utc::now();
        let user = User {
            created_at: now,
            email: email.to_string(),
            id: format!("admin-{email}"),
            name: "Admin".to_string(),
            password_hash: hash_password(PASSWORD).unwrap(),
            role: Role::Admin,
            updated_at: now,
        };
        assert!(self.db.create_user(&user).unwrap());
        user
    }

    pub fn context(&self) -> (AuthContext, SessionStore, UnboundedReceiver<Notice>) {
        context_for(&self.url)
    }
}

pub fn context_for(url: &str) -> (AuthContext, SessionStore, UnboundedReceiver<Notice>) {
    let store = SessionStore::in_memory();
    let (notifier, rx) = ChannelNotifier::new();
    let context = AuthContext::new(client_config(url), store.clone(), Arc::new(notifier)).unwrap();
    (context, store, rx)
}

/// Everything currently queued on the notice channel.
pub fn drain(rx: &mut UnboundedReceiver<Notice>) -> Vec<Notice> {
    let mut notices = Vec::new();
    while let Ok(notice) = rx.try_recv() {
        notices.push(notice);
    }
    notices
}
