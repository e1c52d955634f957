//! Account registration, login and token refresh.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::generator::generate_id;
use super::password::{hash_password, verify_password, PasswordError};
use super::tokens::{TokenError, TokenIssuer, TokenKind, TokenPair};
use crate::storage::models::{Role, User};
use crate::storage::{Database, DatabaseError};

const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
    #[error("Email already registered")]
    EmailTaken,
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Invalid or expired refresh token")]
    InvalidToken(TokenError),
    #[error("Refresh token missing")]
    MissingToken,
    #[error(transparent)]
    Password(#[from] PasswordError),
    #[error("Failed to issue token: {0}")]
    Token(TokenError),
    #[error("User not found")]
    UserNotFound,
    #[error("{0}")]
    Validation(String),
}

/// Public view of a user, as embedded in auth responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSnapshot {
    pub email: String,
    pub id: String,
    pub name: String,
    pub role: Role,
}

impl From<&User> for UserSnapshot {
    fn from(user: &User) -> Self {
        Self {
            email: user.email.clone(),
            id: user.id.clone(),
            name: user.name.clone(),
            role: user.role,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Registration {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// A signed-in user together with a fresh token pair.
#[derive(Debug)]
pub struct SignedIn {
    pub tokens: TokenPair,
    pub user: UserSnapshot,
}

/// Minimal structural email check: one `@`, non-empty local part, a dotted
/// domain and no whitespace.
pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && !email.chars().any(char::is_whitespace)
        && domain
            .split_once('.')
            .map(|(host, tld)| !host.is_empty() && !tld.is_empty() && !tld.ends_with('.'))
            .unwrap_or(false)
}

fn validate_email(email: &str) -> Result<(), AuthError> {
    if email.is_empty() {
        return Err(AuthError::Validation("Email is required".into()));
    }
    if !is_valid_email(email) {
        return Err(AuthError::Validation(
            "Please provide a valid email".into(),
        ));
    }
    Ok(())
}

/// Create an account and sign it in
pub fn register(
    db: &Database,
    issuer: &TokenIssuer,
    registration: Registration,
) -> Result<SignedIn, AuthError> {
    let name = registration.name.trim();
    let email = registration.email.trim().to_lowercase();
    let password = registration.password.trim();

    if name.is_empty() {
        return Err(AuthError::Validation("Name is required".into()));
    }
    validate_email(&email)?;
    if password.len() < MIN_PASSWORD_LEN {
        return Err(AuthError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters long"
        )));
    }

    let now = Utc::now();
    let user = User {
        created_at: now,
        email,
        id: generate_id(),
        name: name.to_string(),
        password_hash: hash_password(&registration.password)?,
        role: Role::User,
        updated_at: now,
    };

    if !db.create_user(&user)? {
        return Err(AuthError::EmailTaken);
    }

    tracing::info!(user_id = %user.id, "Registered user");
    sign_in(issuer, &user)
}

/// Check credentials and sign the user in
pub fn login(
    db: &Database,
    issuer: &TokenIssuer,
    credentials: Credentials,
) -> Result<SignedIn, AuthError> {
    let email = credentials.email.trim().to_lowercase();
    validate_email(&email)?;
    if credentials.password.trim().is_empty() {
        return Err(AuthError::Validation("Password is required".into()));
    }

    let user = db
        .get_user_by_email(&email)?
        .ok_or(AuthError::InvalidCredentials)?;

    if !verify_password(&credentials.password, &user.password_hash)? {
        tracing::debug!(user_id = %user.id, "Password mismatch");
        return Err(AuthError::InvalidCredentials);
    }

    sign_in(issuer, &user)
}

fn sign_in(issuer: &TokenIssuer, user: &User) -> Result<SignedIn, AuthError> {
    let tokens = issuer.issue_pair(&user.id).map_err(AuthError::Token)?;
    Ok(SignedIn {
        tokens,
        user: UserSnapshot::from(user),
    })
}

/// Mint a new access token from a refresh token. The refresh token itself
/// is left as is and stays valid until it expires.
pub fn refresh(
    db: &Database,
    issuer: &TokenIssuer,
    refresh_token: Option<&str>,
) -> Result<(String, UserSnapshot), AuthError> {
    let refresh_token = refresh_token.ok_or(AuthError::MissingToken)?;

    let claims = issuer
        .verify(refresh_token, TokenKind::Refresh)
        .map_err(AuthError::InvalidToken)?;

    let user = db.get_user(&claims.sub)?.ok_or_else(|| {
        tracing::debug!(user_id = %claims.sub, "Refresh for unknown user");
        AuthError::UserNotFound
    })?;

    let access = issuer
        .issue(&user.id, TokenKind::Access)
        .map_err(AuthError::Token)?;
    Ok((access, UserSnapshot::from(&user)))
}
