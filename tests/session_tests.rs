//! Client session behaviour against a live server.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use bookshelf::auth::{TokenIssuer, TokenKind};
use bookshelf::client::store::ACCESS_TOKEN_KEY;
use bookshelf::client::{
    ApiClient, ApiRequest, AuthContext, AuthState, ChannelNotifier, ClientError, MemoryStorage,
    Notice, SessionStore, Storage,
};
use bookshelf::config::TokenConfig;
use bookshelf::error::ErrorKind;
use futures_util::future::join_all;
use serde_json::{json, Value};

use common::{client_config, context_for, drain, serve, TestServer, PASSWORD};

/// Fire `n` concurrent profile updates through one client.
async fn update_profile_concurrently(
    client: &ApiClient,
    user_id: &str,
    n: usize,
) -> Vec<Result<Value, ClientError>> {
    join_all((0..n).map(|i| {
        let client = client.clone();
        let request = ApiRequest::put(format!("/users/{user_id}")).json(json!({ "name": format!("Ada {i}") }));
        async move { client.send_json::<Value>(&request).await }
    }))
    .await
}

#[tokio::test]
async fn test_concurrent_unauthorized_requests_share_one_refresh() {
    let server = TestServer::start().await;
    let (context, store, _rx) = server.context();
    let user = context
        .register("Ada Lovelace", "ada@example.com", PASSWORD)
        .await
        .unwrap();

    // The refresh cookie stays valid; only the access token is broken.
    store.save("not-a-jwt", None).unwrap();

    let results = update_profile_concurrently(context.client(), &user.id, 5).await;
    for result in results {
        assert_eq!(result.unwrap()["id"], user.id.as_str());
    }

    assert_eq!(server.refresh_hits(), 1);
    assert_ne!(store.access_token().unwrap(), "not-a-jwt");
    assert!(matches!(context.state(), AuthState::Authenticated(_)));
}

#[tokio::test]
async fn test_failed_refresh_clears_once_and_rejects_all() {
    let server = TestServer::start().await;

    // Register elsewhere so this context has a user but no refresh cookie.
    let (other, other_store, _) = server.context();
    let user = other
        .register("Grace Hopper", "grace@example.com", PASSWORD)
        .await
        .unwrap();
    let token = other_store.access_token().unwrap();

    let (context, store, mut rx) = server.context();
    store.save("not-a-jwt", Some(&user)).unwrap();
    assert!(!token.is_empty());

    let results = update_profile_concurrently(context.client(), &user.id, 5).await;
    for result in results {
        assert_eq!(result.unwrap_err(), ClientError::SessionExpired);
    }

    assert_eq!(server.refresh_hits(), 1);
    assert!(store.session().is_none());
    assert_eq!(context.state(), AuthState::Anonymous);
    assert_eq!(drain(&mut rx), vec![Notice::RedirectToLogin]);
}

#[tokio::test]
async fn test_expired_access_tokens_renewed_once() {
    let server = TestServer::start().await;
    let (context, store, _rx) = server.context();
    let user = context
        .register("Ada Lovelace", "ada@example.com", PASSWORD)
        .await
        .unwrap();

    let expired = TokenIssuer::new(&TokenConfig {
        access_ttl_seconds: -3600,
        ..server.config.tokens.clone()
    })
    .issue(&user.id, TokenKind::Access)
    .unwrap();
    store.save(&expired, None).unwrap();

    let results = update_profile_concurrently(context.client(), &user.id, 2).await;
    assert!(results.iter().all(Result::is_ok));
    assert_eq!(server.refresh_hits(), 1);
    assert_ne!(store.access_token().unwrap(), expired);
}

#[tokio::test]
async fn test_login_round_trip() {
    let server = TestServer::start().await;
    let (first, _, _) = server.context();
    let registered = first
        .register("Ada Lovelace", "Ada@Example.com", PASSWORD)
        .await
        .unwrap();
    assert_eq!(registered.email, "ada@example.com");

    let (context, store, mut rx) = server.context();
    let user = context.login("ada@example.com", PASSWORD).await.unwrap();
    assert_eq!(user.id, registered.id);
    assert_eq!(context.state(), AuthState::Authenticated(user.clone()));
    assert_eq!(store.user().unwrap(), user);

    let me = context.auth().get_current_user().await.unwrap();
    assert_eq!(me.id, user.id);

    assert_eq!(
        drain(&mut rx),
        vec![Notice::Success("Welcome back, Ada Lovelace!".into())]
    );
}

#[tokio::test]
async fn test_wrong_password_is_reported() {
    let server = TestServer::start().await;
    let (first, _, _) = server.context();
    first
        .register("Ada Lovelace", "ada@example.com", PASSWORD)
        .await
        .unwrap();

    let (context, store, mut rx) = server.context();
    let err = context.login("ada@example.com", "wrong-password").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);
    assert_eq!(err.to_string(), "Invalid credentials");
    assert_eq!(context.state(), AuthState::Anonymous);
    assert!(store.session().is_none());
    assert!(drain(&mut rx).contains(&Notice::Error("Invalid credentials".into())));
    assert_eq!(server.refresh_hits(), 0);
}

#[tokio::test]
async fn test_duplicate_registration_conflicts() {
    let server = TestServer::start().await;
    let (first, _, _) = server.context();
    first
        .register("Ada Lovelace", "ada@example.com", PASSWORD)
        .await
        .unwrap();

    let (context, _, _) = server.context();
    let err = context
        .register("Ada Again", "ada@example.com", PASSWORD)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(err.to_string(), "Account already exists");
}

#[tokio::test]
async fn test_refresh_without_cookie_ends_session() {
    let server = TestServer::start().await;
    let (other, _, _) = server.context();
    let user = other
        .register("Ada Lovelace", "ada@example.com", PASSWORD)
        .await
        .unwrap();

    let (context, store, mut rx) = server.context();
    store.save("stale", Some(&user)).unwrap();

    let err = context.auth().refresh_token().await.unwrap_err();
    assert_eq!(err, ClientError::SessionExpired);
    assert!(store.session().is_none());
    assert_eq!(server.refresh_hits(), 1);
    assert_eq!(drain(&mut rx), vec![Notice::RedirectToLogin]);
}

#[tokio::test]
async fn test_refresh_token_renews_session() {
    let server = TestServer::start().await;
    let (context, store, _) = server.context();
    context
        .register("Ada Lovelace", "ada@example.com", PASSWORD)
        .await
        .unwrap();
    store.save("stale", None).unwrap();

    let token = context.auth().refresh_token().await.unwrap();
    assert_eq!(store.access_token().unwrap(), token);
    assert_eq!(store.user().unwrap().email, "ada@example.com");
}

#[tokio::test]
async fn test_bootstrap_probe_does_not_clear() {
    let server = TestServer::start().await;
    let (other, _, _) = server.context();
    let user = other
        .register("Ada Lovelace", "ada@example.com", PASSWORD)
        .await
        .unwrap();

    let (context, store, mut rx) = server.context();
    store.save("not-a-jwt", Some(&user)).unwrap();

    let err = context.auth().probe_current_user().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);
    assert_eq!(store.access_token().unwrap(), "not-a-jwt");
    assert_eq!(server.refresh_hits(), 0);

    // No cookie, so the bootstrap refresh fails quietly on first load.
    assert_eq!(context.bootstrap().await, AuthState::Anonymous);
    assert!(store.session().is_none());
    assert!(drain(&mut rx).is_empty());

    // Later checks do tell the user.
    store.save("not-a-jwt", Some(&user)).unwrap();
    assert_eq!(context.refresh_user().await, AuthState::Anonymous);
    assert_eq!(
        drain(&mut rx),
        vec![Notice::Error("Session expired. Please log in again.".into())]
    );
}

#[tokio::test]
async fn test_bootstrap_renews_expired_session() {
    let server = TestServer::start().await;
    let (context, store, _) = server.context();
    let user = context
        .register("Ada Lovelace", "ada@example.com", PASSWORD)
        .await
        .unwrap();
    store.save("not-a-jwt", None).unwrap();

    let mut watcher = context.subscribe();
    assert_eq!(context.bootstrap().await, AuthState::Authenticated(user.clone()));
    assert_eq!(*watcher.borrow_and_update(), AuthState::Authenticated(user));
    assert_eq!(server.refresh_hits(), 1);
    assert_ne!(store.access_token().unwrap(), "not-a-jwt");
}

#[tokio::test]
async fn test_bootstrap_with_token_but_no_user_is_anonymous() {
    let server = TestServer::start().await;
    let (other, other_store, _) = server.context();
    other
        .register("Ada Lovelace", "ada@example.com", PASSWORD)
        .await
        .unwrap();
    let token = other_store.access_token().unwrap();

    // A valid token on its own is not a session.
    let storage = Arc::new(MemoryStorage::new());
    storage.set_all(&[(ACCESS_TOKEN_KEY, token.as_str())]).unwrap();
    let (notifier, mut rx) = ChannelNotifier::new();
    let context = AuthContext::new(
        client_config(&server.url),
        SessionStore::new(storage.clone()),
        Arc::new(notifier),
    )
    .unwrap();

    assert_eq!(context.bootstrap().await, AuthState::Anonymous);
    assert!(storage.keys().is_empty());
    assert_eq!(server.refresh_hits(), 0);
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test]
async fn test_logout_twice_is_idempotent() {
    let server = TestServer::start().await;
    let (context, store, mut rx) = server.context();
    context
        .register("Ada Lovelace", "ada@example.com", PASSWORD)
        .await
        .unwrap();
    drain(&mut rx);

    context.logout().await;
    context.logout().await;

    assert_eq!(context.state(), AuthState::Anonymous);
    assert!(store.session().is_none());
    assert_eq!(
        drain(&mut rx),
        vec![
            Notice::Success("Logged out successfully!".into()),
            Notice::Success("Logged out successfully!".into()),
        ]
    );

    // The refresh cookie is gone too.
    let err = context.auth().refresh_token().await.unwrap_err();
    assert_eq!(err, ClientError::SessionExpired);
}

#[tokio::test]
async fn test_logout_survives_server_error() {
    let router = Router::new().route(
        "/auth/logout",
        post(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
    );
    let url = serve(router).await;

    let (context, store, mut rx) = context_for(&url);
    store
        .save(
            "tok",
            Some(&bookshelf::auth::service::UserSnapshot {
                email: "ada@example.com".into(),
                id: "u1".into(),
                name: "Ada".into(),
                role: bookshelf::storage::models::Role::User,
            }),
        )
        .unwrap();

    context.logout().await;
    assert_eq!(context.state(), AuthState::Anonymous);
    assert!(store.session().is_none());
    assert_eq!(
        drain(&mut rx),
        vec![Notice::Success("Logged out successfully!".into())]
    );
}

// ============================================================================
// Retries
// ============================================================================

/// Answers `failures` times with `failure`, then with `{"ok": true}`.
fn flaky_router(
    hits: Arc<AtomicUsize>,
    failures: usize,
    failure: fn() -> axum::response::Response,
) -> Router {
    Router::new().route(
        "/flaky",
        get(move || {
            let hits = Arc::clone(&hits);
            async move {
                if hits.fetch_add(1, Ordering::SeqCst) < failures {
                    failure()
                } else {
                    Json(json!({ "ok": true })).into_response()
                }
            }
        }),
    )
}

#[tokio::test]
async fn test_retries_unavailable_then_succeeds() {
    let hits = Arc::new(AtomicUsize::new(0));
    let url = serve(flaky_router(Arc::clone(&hits), 2, || {
        StatusCode::SERVICE_UNAVAILABLE.into_response()
    }))
    .await;
    let (context, _, _) = context_for(&url);

    let body: Value = context
        .client()
        .send_json(&ApiRequest::get("/flaky"))
        .await
        .unwrap();
    assert_eq!(body["ok"], true);
    assert_eq!(hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_server_errors_give_up_after_three_retries() {
    let hits = Arc::new(AtomicUsize::new(0));
    let url = serve(flaky_router(Arc::clone(&hits), usize::MAX, || {
        StatusCode::INTERNAL_SERVER_ERROR.into_response()
    }))
    .await;
    let (context, _, _) = context_for(&url);

    let err = context
        .client()
        .send(&ApiRequest::get("/flaky"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Server);
    assert_eq!(hits.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_rate_limit_honours_retry_after() {
    let hits = Arc::new(AtomicUsize::new(0));
    let url = serve(flaky_router(Arc::clone(&hits), 1, || {
        (StatusCode::TOO_MANY_REQUESTS, [(header::RETRY_AFTER, "0")]).into_response()
    }))
    .await;
    let (context, _, _) = context_for(&url);

    context
        .client()
        .send(&ApiRequest::get("/flaky"))
        .await
        .unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_retry_budget_is_shared_across_failure_kinds() {
    let hits = Arc::new(AtomicUsize::new(0));
    let router = Router::new().route(
        "/mixed",
        get({
            let hits = Arc::clone(&hits);
            move || {
                let hits = Arc::clone(&hits);
                async move {
                    if hits.fetch_add(1, Ordering::SeqCst) < 2 {
                        StatusCode::SERVICE_UNAVAILABLE.into_response()
                    } else {
                        (StatusCode::TOO_MANY_REQUESTS, [(header::RETRY_AFTER, "0")]).into_response()
                    }
                }
            }
        }),
    );
    let url = serve(router).await;
    let (context, _, _) = context_for(&url);

    let err = context
        .client()
        .send(&ApiRequest::get("/mixed"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RateLimited);
    // Two 503 retries leave one retry for the 429s
    assert_eq!(hits.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_unreachable_server_is_network_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let (context, _, _) = context_for(&format!("http://{addr}"));
    let err = context
        .client()
        .send(&ApiRequest::get("/api/books"))
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Network(_)));
}

#[tokio::test]
async fn test_not_found_passes_through() {
    let server = TestServer::start().await;
    let (context, _, _) = server.context();

    let err = context
        .client()
        .send(&ApiRequest::get("/api/books/missing"))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        ClientError::Status {
            kind: ErrorKind::NotFound,
            message: "Book not found".into(),
            status: 404,
        }
    );
}

// ============================================================================
// 401s that must not trigger another refresh
// ============================================================================

/// `/auth/refresh` always grants a token; `/x` and `/auth/me` always
/// answer 401.
fn rejecting_router(refreshes: Arc<AtomicUsize>, hits: Arc<AtomicUsize>) -> Router {
    Router::new()
        .route(
            "/auth/refresh",
            post(move || {
                let refreshes = Arc::clone(&refreshes);
                async move {
                    refreshes.fetch_add(1, Ordering::SeqCst);
                    Json(json!({ "success": true, "data": { "accessToken": "fresh" } }))
                }
            }),
        )
        .route(
            "/x",
            get(move || {
                let hits = Arc::clone(&hits);
                async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    StatusCode::UNAUTHORIZED
                }
            }),
        )
        .route("/auth/me", get(|| async { StatusCode::UNAUTHORIZED }))
}

fn stored_user() -> bookshelf::auth::service::UserSnapshot {
    bookshelf::auth::service::UserSnapshot {
        email: "ada@example.com".into(),
        id: "u1".into(),
        name: "Ada".into(),
        role: bookshelf::storage::models::Role::User,
    }
}

#[tokio::test]
async fn test_unauthorized_after_refresh_ends_session() {
    let refreshes = Arc::new(AtomicUsize::new(0));
    let hits = Arc::new(AtomicUsize::new(0));
    let url = serve(rejecting_router(Arc::clone(&refreshes), Arc::clone(&hits))).await;

    let (context, store, mut rx) = context_for(&url);
    store.save("stale", Some(&stored_user())).unwrap();

    let err = context
        .client()
        .send(&ApiRequest::get("/x"))
        .await
        .unwrap_err();
    assert_eq!(err, ClientError::SessionExpired);
    assert_eq!(refreshes.load(Ordering::SeqCst), 1);
    assert_eq!(hits.load(Ordering::SeqCst), 2);
    assert!(store.session().is_none());
    assert_eq!(context.state(), AuthState::Anonymous);
    assert_eq!(drain(&mut rx), vec![Notice::RedirectToLogin]);
}

#[tokio::test]
async fn test_unauthorized_auth_endpoint_does_not_refresh() {
    let refreshes = Arc::new(AtomicUsize::new(0));
    let hits = Arc::new(AtomicUsize::new(0));
    let url = serve(rejecting_router(Arc::clone(&refreshes), hits)).await;

    let (context, store, mut rx) = context_for(&url);
    store.save("dead", Some(&stored_user())).unwrap();

    let err = context.auth().get_current_user().await.unwrap_err();
    assert_eq!(err, ClientError::SessionExpired);
    assert_eq!(refreshes.load(Ordering::SeqCst), 0);
    assert!(store.session().is_none());
    assert_eq!(drain(&mut rx), vec![Notice::RedirectToLogin]);
}
