use axum::{
    http::{header, HeaderValue, Method},
    middleware,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::handlers;
use super::middleware::{require_admin, require_auth};
use crate::AppState;

fn cors_layer(state: &AppState) -> CorsLayer {
    let origins: Vec<HeaderValue> = state
        .config
        .cors
        .allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

pub fn create_router(state: Arc<AppState>) -> Router {
    // Admin routes -- require_auth runs first, then require_admin
    let admin_routes = Router::new()
        .route("/api/books", post(handlers::create_book))
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            require_admin,
        ))
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            require_auth,
        ));

    // Routes that need a valid access token
    let protected_routes = Router::new()
        .route("/auth/me", get(handlers::current_user))
        .route(
            "/api/books/:id",
            put(handlers::update_book).delete(handlers::delete_book),
        )
        .route(
            "/api/reviews/:id",
            post(handlers::create_review)
                .put(handlers::update_review)
                .delete(handlers::delete_review),
        )
        .route("/users/:id", put(handlers::update_user_profile))
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            require_auth,
        ));

    // Public routes -- the refresh cookie is the only credential /auth/refresh needs
    let public_routes = Router::new()
        .route("/", get(handlers::health))
        .route("/auth/register", post(handlers::register))
        .route("/auth/login", post(handlers::login))
        .route("/auth/refresh", post(handlers::refresh))
        .route("/auth/logout", post(handlers::logout))
        .route("/api/books", get(handlers::list_books))
        .route("/api/books/:id", get(handlers::get_book))
        .route("/api/reviews", get(handlers::list_all_reviews))
        .route("/api/reviews/:id", get(handlers::list_book_reviews))
        .route("/users/:id", get(handlers::get_user_profile));

    let cors = cors_layer(&state);

    Router::new()
        .merge(admin_routes)
        .merge(protected_routes)
        .merge(public_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
