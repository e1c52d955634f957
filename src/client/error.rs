use serde_json::Value;
use thiserror::Error;

use crate::error::ErrorKind;

/// Every failure the client surfaces to its caller.
///
/// `Clone` so a single refresh outcome can be handed to every waiter.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ClientError {
    #[error("{message}")]
    Status {
        kind: ErrorKind,
        message: String,
        status: u16,
    },
    #[error("Network error. Please check your internet connection.")]
    Network(String),
    #[error("Session expired. Please log in again.")]
    SessionExpired,
    /// Rejected before anything was sent
    #[error("{0}")]
    Validation(String),
    #[error("Invalid response from server: {0}")]
    InvalidResponse(String),
    #[error("Session storage failed: {0}")]
    Storage(String),
}

impl ClientError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClientError::Status { kind, .. } => *kind,
            ClientError::Network(_) => ErrorKind::Network,
            ClientError::SessionExpired => ErrorKind::Unauthorized,
            ClientError::Validation(_) => ErrorKind::Validation,
            ClientError::InvalidResponse(_) | ClientError::Storage(_) => ErrorKind::Server,
        }
    }

    /// Build a status error from a non-success response, taking the
    /// server's message from the error envelope when there is one.
    pub async fn from_response(response: reqwest::Response) -> Self {
        let status = response.status();
        let body = response.json::<Value>().await.unwrap_or(Value::Null);

        let message = envelope_message(&body)
            .or_else(|| status.canonical_reason().map(str::to_string))
            .unwrap_or_else(|| format!("Request failed with status {}", status.as_u16()));

        ClientError::Status {
            kind: ErrorKind::from_status(status),
            message,
            status: status.as_u16(),
        }
    }
}

/// `{error: {message}}`, `{message}` or `{error: "..."}`
fn envelope_message(body: &Value) -> Option<String> {
    body.pointer("/error/message")
        .or_else(|| body.get("message"))
        .or_else(|| body.get("error").filter(|e| e.is_string()))
        .and_then(Value::as_str)
        .map(str::to_string)
}
