//! Authentication middleware: token extraction and resolution.

use axum::http::header::AUTHORIZATION;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use pantry_core::auth;
use pantry_core::models::User;

use crate::AppState;
use crate::error::AppError;

/// The resolved caller, stored in request extensions.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

/// Schemes accepted in the `Authorization` header.
const SCHEMES: [&str; 2] = ["Token ", "Bearer "];

/// Axum middleware: extracts `Authorization: Token <key>` (or `Bearer <key>`),
/// resolves the key to an active user and injects `AuthenticatedUser` into
/// request extensions.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            AppError::Unauthorized("Authentication credentials were not provided.".into())
        })?;

    let token = SCHEMES
        .iter()
        .find_map(|scheme| header.strip_prefix(scheme))
        .map(str::trim)
        .ok_or_else(|| AppError::Unauthorized("Invalid authorization scheme.".into()))?;

    let user = auth::resolve_token(&*state.store, token)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Invalid token.".into()))?;

    request.extensions_mut().insert(AuthenticatedUser(user));
    Ok(next.run(request).await)
}
