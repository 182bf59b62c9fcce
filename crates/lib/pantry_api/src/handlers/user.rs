//! User account and token request handlers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};
use pantry_core::auth::{self, password};
use pantry_core::models::{NewUser, UserChanges};
use tracing::info;

use crate::AppState;
use crate::error::AppResult;
use crate::extract::JsonObject;
use crate::middleware::auth::AuthenticatedUser;
use crate::serializers::{
    JsonMap, Registration, TokenRequest, TokenResponse, UserInput, UserResponse, Validator,
    WriteMode,
};

/// `POST /user/create`: Register an account.
pub async fn create_user_handler(
    State(state): State<AppState>,
    JsonObject(body): JsonObject,
) -> AppResult<(StatusCode, Json<UserResponse>)> {
    let registration =
        Registration::validate(&body, WriteMode::Create, &state.config.validation_rules())?;
    let password_hash = password::hash_password(&registration.password)?;
    let user = state
        .store
        .create_user(NewUser {
            email: registration.email,
            name: registration.name,
            password_hash,
        })
        .await?;
    info!(user_id = user.id, "user registered");
    Ok((StatusCode::CREATED, Json(UserResponse::from(&user))))
}

/// `POST /user/token`: Exchange email and password for an auth token.
pub async fn create_token_handler(
    State(state): State<AppState>,
    JsonObject(body): JsonObject,
) -> AppResult<Json<TokenResponse>> {
    let request =
        TokenRequest::validate(&body, WriteMode::Create, &state.config.validation_rules())?;
    let user = auth::authenticate(&*state.store, &request.email, &request.password).await?;
    let token = auth::issue_token(&*state.store, user.id).await?;
    Ok(Json(TokenResponse { token }))
}

/// `GET /user/me`: The caller's profile.
pub async fn get_me_handler(
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
) -> Json<UserResponse> {
    Json(UserResponse::from(&user))
}

/// `PUT /user/me`
pub async fn replace_me_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    JsonObject(body): JsonObject,
) -> AppResult<Json<UserResponse>> {
    update_me(&state, &user, &body, WriteMode::Replace).await
}

/// `PATCH /user/me`
pub async fn update_me_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    JsonObject(body): JsonObject,
) -> AppResult<Json<UserResponse>> {
    update_me(&state, &user, &body, WriteMode::Partial).await
}

async fn update_me(
    state: &AppState,
    AuthenticatedUser(user): &AuthenticatedUser,
    body: &JsonMap,
    mode: WriteMode,
) -> AppResult<Json<UserResponse>> {
    let input = UserInput::validate(body, mode, &state.config.validation_rules())?;
    let password_hash = match input.password {
        Some(plain) => Some(password::hash_password(&plain)?),
        None => None,
    };
    let updated = state
        .store
        .update_user(
            user.id,
            UserChanges {
                email: input.email,
                name: input.name,
                password_hash,
            },
        )
        .await?;
    Ok(Json(UserResponse::from(&updated)))
}

/// `DELETE /user/me`: Delete the caller together with everything they own.
pub async fn delete_me_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
) -> AppResult<StatusCode> {
    state.store.delete_user(user.id).await?;
    info!(user_id = user.id, "user deleted");
    Ok(StatusCode::NO_CONTENT)
}
