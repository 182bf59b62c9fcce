//! Authentication logic.
//!
//! Credential verification against the user store and issuance/resolution
//! of opaque bearer tokens. Tokens never expire; a new login replaces the
//! previous token.

pub mod password;
pub mod tokens;

use thiserror::Error;
use tracing::{debug, info};

use crate::StoreError;
use crate::models::User;
use crate::models::user::normalize_email;
use crate::store::{TokenRepository, UserRepository};

/// Authentication errors.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Wrong email, wrong password or inactive account. Deliberately vague.
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Password hashing failed: {0}")]
    Hash(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Verify an email/password pair and return the matching active user.
pub async fn authenticate<S: UserRepository + ?Sized>(
    users: &S,
    email: &str,
    password: &str,
) -> Result<User, AuthError> {
    let email = normalize_email(email);
    let Some(record) = users.find_user_by_email(&email).await? else {
        password::verify_against_dummy(password);
        debug!("login attempt for unknown account");
        return Err(AuthError::InvalidCredentials);
    };

    if !password::verify_password(password, &record.password_hash)? {
        debug!(user_id = record.user.id, "login attempt with wrong password");
        return Err(AuthError::InvalidCredentials);
    }
    if !record.user.is_active {
        debug!(user_id = record.user.id, "login attempt for inactive account");
        return Err(AuthError::InvalidCredentials);
    }
    Ok(record.user)
}

/// Mint a fresh token for `user_id`, replacing any previous one, and return
/// the plaintext. The plaintext is not recoverable afterwards.
pub async fn issue_token<S: TokenRepository + ?Sized>(
    store: &S,
    user_id: i64,
) -> Result<String, AuthError> {
    let token = tokens::generate_token();
    store
        .replace_token(user_id, &tokens::hash_token(&token))
        .await?;
    info!(user_id, "auth token issued");
    Ok(token)
}

/// Resolve a presented token to its active owner.
pub async fn resolve_token<S: TokenRepository + ?Sized>(
    store: &S,
    token: &str,
) -> Result<Option<User>, AuthError> {
    if token.is_empty() {
        return Ok(None);
    }
    let user = store
        .find_user_by_token(&tokens::hash_token(token))
        .await?
        .filter(|user| user.is_active);
    Ok(user)
}
