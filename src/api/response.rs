use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{FromRequest, FromRequestParts, Query, Request};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::auth::service::AuthError;
use crate::error::ErrorKind;
use crate::storage::DatabaseError;

// ============================================================================
// Success envelopes
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub data: T,
    pub success: bool,
}

impl<T: Serialize> Envelope<T> {
    pub fn success(data: T) -> Json<Envelope<T>> {
        Json(Envelope {
            data,
            success: true,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Message {
    pub message: String,
}

impl Message {
    pub fn new(message: impl Into<String>) -> Json<Message> {
        Json(Message {
            message: message.into(),
        })
    }
}

// ============================================================================
// Error envelope
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
    pub success: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
    pub status: u16,
}

// ============================================================================
// Unified error type for handlers
// ============================================================================

/// Error returned from every handler, rendered as the error envelope with
/// the status of its kind.
#[derive(Debug)]
pub struct ApiError {
    pub kind: ErrorKind,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.kind.status();
        let body = ErrorEnvelope {
            error: ErrorBody {
                message: self.message,
                status: status.as_u16(),
            },
            success: false,
        };
        (status, Json(body)).into_response()
    }
}

impl ApiError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unauthorized, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Forbidden, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Server, message)
    }

    pub fn status(&self) -> StatusCode {
        self.kind.status()
    }
}

impl From<DatabaseError> for ApiError {
    fn from(e: DatabaseError) -> Self {
        tracing::error!(error = %e, "Database error");
        ApiError::internal("Server error")
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::EmailTaken => ApiError::conflict(e.to_string()),
            AuthError::InvalidCredentials | AuthError::MissingToken | AuthError::UserNotFound => {
                ApiError::unauthorized(e.to_string())
            }
            AuthError::InvalidToken(ref reason) => {
                tracing::debug!(reason = %reason, "Rejected refresh token");
                ApiError::forbidden(e.to_string())
            }
            AuthError::Validation(message) => ApiError::bad_request(message),
            AuthError::Database(db) => db.into(),
            AuthError::Password(_) | AuthError::Token(_) => {
                tracing::error!(error = %e, "Failed to sign in user");
                ApiError::internal("Server error")
            }
        }
    }
}

// ============================================================================
// Extractors
// ============================================================================

/// `Json` that rejects with the error envelope instead of plain text.
pub struct AppJson<T>(pub T);

#[axum::async_trait]
impl<S, T> FromRequest<S> for AppJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(AppJson(value)),
            Err(rejection) => Err(ApiError::bad_request(rejection.body_text())),
        }
    }
}

/// `Query` that rejects with the error envelope instead of plain text.
pub struct AppQuery<T>(pub T);

#[axum::async_trait]
impl<S, T> FromRequestParts<S> for AppQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Query::<T>::from_request_parts(parts, state)
            .await
            .map(|Query(value)| AppQuery(value))
            .map_err(|rejection: QueryRejection| ApiError::bad_request(rejection.body_text()))
    }
}
