//! Typed calls to the `/auth` endpoints.

use serde::Deserialize;
use serde_json::json;

use super::error::ClientError;
use super::pipeline::{ApiClient, ApiRequest};
use crate::auth::service::UserSnapshot;
use crate::error::ErrorKind;

const MAX_INPUT_LEN: usize = 1000;
const MIN_NAME_LEN: usize = 2;
const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthBody {
    #[serde(default)]
    access_token: String,
    #[serde(default)]
    user: Option<UserSnapshot>,
}

#[derive(Debug, Deserialize)]
struct UserEnvelope {
    #[serde(default)]
    data: Option<UserSnapshot>,
}

/// Token and user returned by login and registration.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthSession {
    pub access_token: String,
    pub user: UserSnapshot,
}

fn sanitize(input: &str) -> String {
    input.trim().chars().take(MAX_INPUT_LEN).collect()
}

fn is_valid_email(email: &str) -> bool {
    crate::auth::service::is_valid_email(email)
}

/// Reword a failed login or registration for display.
fn friendly(err: ClientError) -> ClientError {
    let message = match err.kind() {
        ErrorKind::Unauthorized => "Invalid credentials",
        ErrorKind::Forbidden => "Access forbidden",
        ErrorKind::Conflict => "Account already exists",
        ErrorKind::RateLimited => "Too many requests. Please try again later.",
        ErrorKind::Server => "Server error. Please try again later.",
        _ => return err,
    };

    match err {
        ClientError::Status { kind, status, .. } => ClientError::Status {
            kind,
            message: message.to_string(),
            status,
        },
        ClientError::SessionExpired => ClientError::Status {
            kind: ErrorKind::Unauthorized,
            message: message.to_string(),
            status: 401,
        },
        other => other,
    }
}

fn into_session(body: AuthBody) -> Result<AuthSession, ClientError> {
    match body.user {
        Some(user) if !body.access_token.is_empty() && !user.id.is_empty() => Ok(AuthSession {
            access_token: body.access_token,
            user,
        }),
        _ => Err(ClientError::InvalidResponse(
            "missing access token or user".into(),
        )),
    }
}

#[derive(Clone)]
pub struct AuthService {
    client: ApiClient,
}

impl AuthService {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    /// Validate locally, then `POST /auth/register`. Does not touch the
    /// session store.
    pub async fn register_user(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<AuthSession, ClientError> {
        let name = sanitize(name);
        let email = sanitize(email).to_lowercase();

        if name.chars().count() < MIN_NAME_LEN {
            return Err(ClientError::Validation(
                "Name must be at least 2 characters long".into(),
            ));
        }
        if !is_valid_email(&email) {
            return Err(ClientError::Validation(
                "Please enter a valid email address".into(),
            ));
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ClientError::Validation(
                "Password must be at least 6 characters long".into(),
            ));
        }

        let request = ApiRequest::post("/auth/register").json(json!({
            "name": name,
            "email": email,
            "password": password,
        }));
        let body: AuthBody = self.client.send_json(&request).await.map_err(friendly)?;
        into_session(body)
    }

    /// Validate locally, then `POST /auth/login`. Does not touch the
    /// session store.
    pub async fn login_user(&self, email: &str, password: &str) -> Result<AuthSession, ClientError> {
        let email = sanitize(email).to_lowercase();

        if !is_valid_email(&email) {
            return Err(ClientError::Validation(
                "Please enter a valid email address".into(),
            ));
        }
        if password.is_empty() {
            return Err(ClientError::Validation("Password is required".into()));
        }

        let request = ApiRequest::post("/auth/login").json(json!({
            "email": email,
            "password": password,
        }));
        let body: AuthBody = self.client.send_json(&request).await.map_err(friendly)?;
        into_session(body)
    }

    /// `GET /auth/me` through the full pipeline.
    pub async fn get_current_user(&self) -> Result<UserSnapshot, ClientError> {
        self.fetch_user(ApiRequest::get("/auth/me")).await
    }

    /// `GET /auth/me` as the bootstrap probe: a 401 comes back as a status
    /// error and leaves the session alone.
    pub async fn probe_current_user(&self) -> Result<UserSnapshot, ClientError> {
        self.fetch_user(ApiRequest::get("/auth/me").bootstrap_probe())
            .await
    }

    async fn fetch_user(&self, request: ApiRequest) -> Result<UserSnapshot, ClientError> {
        let envelope: UserEnvelope = self.client.send_json(&request).await?;
        envelope
            .data
            .filter(|user| !user.id.is_empty())
            .ok_or_else(|| ClientError::InvalidResponse("missing user data".into()))
    }

    /// `POST /auth/refresh` through the pipeline, saving the result. Any
    /// failure ends the session.
    pub async fn refresh_token(&self) -> Result<String, ClientError> {
        let result = self
            .client
            .send(&ApiRequest::post("/auth/refresh"))
            .await;

        let grant = match result {
            Ok(response) => match response.bytes().await {
                Ok(body) => super::refresh::parse_refresh_body(&body),
                Err(e) => Err(ClientError::InvalidResponse(e.to_string())),
            },
            Err(e) => Err(e),
        };

        let saved = grant.and_then(|grant| {
            self.client
                .store()
                .save(&grant.access_token, grant.user.as_ref())
                .map(|()| grant.access_token)
                .map_err(|e| ClientError::Storage(e.to_string()))
        });

        saved.map_err(|e| {
            tracing::info!(error = %e, "Token refresh failed");
            self.client.store().clear();
            ClientError::SessionExpired
        })
    }

    /// `POST /auth/logout`, then clear the session whatever the outcome.
    pub async fn logout_user(&self) {
        if let Err(e) = self.client.send(&ApiRequest::post("/auth/logout")).await {
            tracing::warn!(error = %e, "Logout request failed, clearing session anyway");
        }
        self.client.store().clear();
    }

    pub fn is_authenticated(&self) -> bool {
        self.client.store().is_authenticated()
    }

    pub fn stored_user(&self) -> Option<UserSnapshot> {
        self.client.store().user()
    }
}
