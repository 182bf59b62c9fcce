//! Recipe request handlers.

use axum::extract::multipart::{Multipart, MultipartRejection};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use pantry_core::models::{NewRecipe, RecipeChanges};
use tracing::info;

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::extract::{JsonObject, ResourceId};
use crate::media;
use crate::middleware::auth::AuthenticatedUser;
use crate::serializers::{
    JsonMap, RecipeDetailResponse, RecipeImageResponse, RecipeListParams, RecipeResponse,
    Validator, WriteMode,
};

/// Multipart field carrying the image.
const IMAGE_FIELD: &str = "image";

/// `GET /recipes`: The caller's recipes, newest first, optionally filtered by
/// `tags=1,2` and `ingredients=3,4`.
pub async fn list_recipes_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
    Query(params): Query<RecipeListParams>,
) -> AppResult<Json<Vec<RecipeResponse>>> {
    let query = params.into_query(user.id)?;
    let recipes = state.store.list_recipes(&query).await?;
    Ok(Json(recipes.iter().map(RecipeResponse::from).collect()))
}

/// `POST /recipes`: Create a recipe, get-or-creating nested tags and
/// ingredients.
pub async fn create_recipe_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
    JsonObject(body): JsonObject,
) -> AppResult<(StatusCode, Json<RecipeDetailResponse>)> {
    let new_recipe =
        NewRecipe::validate(&body, WriteMode::Create, &state.config.validation_rules())?;
    let recipe = state.store.create_recipe(user.id, new_recipe).await?;
    info!(recipe_id = recipe.id, user_id = user.id, "recipe created");
    Ok((StatusCode::CREATED, Json(RecipeDetailResponse::from(&recipe))))
}

/// `GET /recipes/{id}`
pub async fn get_recipe_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
    ResourceId(recipe_id): ResourceId,
) -> AppResult<Json<RecipeDetailResponse>> {
    let recipe = state.store.get_recipe(user.id, recipe_id).await?;
    Ok(Json(RecipeDetailResponse::from(&recipe)))
}

/// `PUT /recipes/{id}`
pub async fn replace_recipe_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    ResourceId(recipe_id): ResourceId,
    JsonObject(body): JsonObject,
) -> AppResult<Json<RecipeDetailResponse>> {
    update_recipe(&state, &user, recipe_id, &body, WriteMode::Replace).await
}

/// `PATCH /recipes/{id}`
pub async fn update_recipe_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    ResourceId(recipe_id): ResourceId,
    JsonObject(body): JsonObject,
) -> AppResult<Json<RecipeDetailResponse>> {
    update_recipe(&state, &user, recipe_id, &body, WriteMode::Partial).await
}

async fn update_recipe(
    state: &AppState,
    AuthenticatedUser(user): &AuthenticatedUser,
    recipe_id: i64,
    body: &JsonMap,
    mode: WriteMode,
) -> AppResult<Json<RecipeDetailResponse>> {
    // Missing or foreign ids are 404 even when the payload is invalid.
    state.store.get_recipe(user.id, recipe_id).await?;
    let changes = RecipeChanges::validate(body, mode, &state.config.validation_rules())?;
    let recipe = state.store.update_recipe(user.id, recipe_id, changes).await?;
    Ok(Json(RecipeDetailResponse::from(&recipe)))
}

/// `DELETE /recipes/{id}`
pub async fn delete_recipe_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
    ResourceId(recipe_id): ResourceId,
) -> AppResult<StatusCode> {
    let image = state.store.delete_recipe(user.id, recipe_id).await?;
    if let Some(image) = image {
        media::remove_file(&state.config.media_root, &image).await;
    }
    info!(recipe_id, user_id = user.id, "recipe deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /recipes/{id}/upload-image`: Attach an image from the multipart
/// field `image`, replacing any previous one.
pub async fn upload_recipe_image_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
    ResourceId(recipe_id): ResourceId,
    multipart: Result<Multipart, MultipartRejection>,
) -> AppResult<Json<RecipeImageResponse>> {
    state.store.get_recipe(user.id, recipe_id).await?;

    let mut multipart =
        multipart.map_err(|rejection| AppError::field(IMAGE_FIELD, rejection.body_text()))?;
    let data = read_image_field(&mut multipart, state.config.max_upload_bytes).await?;
    let format = media::validate_image(&data).map_err(|m| AppError::field(IMAGE_FIELD, m))?;

    let media_root = &state.config.media_root;
    let relative = media::save_recipe_image(media_root, &data, format)
        .await
        .map_err(|e| AppError::Internal(format!("failed to store image: {e}")))?;

    let (recipe, previous) = match state
        .store
        .set_recipe_image(user.id, recipe_id, &relative)
        .await
    {
        Ok(result) => result,
        Err(e) => {
            media::remove_file(media_root, &relative).await;
            return Err(e.into());
        }
    };
    if let Some(previous) = previous.filter(|p| *p != relative) {
        media::remove_file(media_root, &previous).await;
    }

    info!(recipe_id, path = %relative, "recipe image uploaded");
    Ok(Json(RecipeImageResponse::from(&recipe)))
}

/// Read the bytes of the `image` field, skipping any other fields.
async fn read_image_field(multipart: &mut Multipart, max_bytes: usize) -> AppResult<Vec<u8>> {
    loop {
        let field = multipart
            .next_field()
            .await
            .map_err(|e| AppError::field(IMAGE_FIELD, e.body_text()))?
            .ok_or_else(|| AppError::field(IMAGE_FIELD, "No file was submitted."))?;
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::field(IMAGE_FIELD, e.body_text()))?;
        if data.is_empty() {
            return Err(AppError::field(IMAGE_FIELD, "The submitted file is empty."));
        }
        if data.len() > max_bytes {
            return Err(AppError::field(
                IMAGE_FIELD,
                format!("Ensure the file is no larger than {max_bytes} bytes."),
            ));
        }
        return Ok(data.to_vec());
    }
}
