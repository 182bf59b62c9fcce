//! Tag and ingredient request handlers.
//!
//! Both resources share one implementation, selected per route by a marker
//! type. There is no create endpoint: attributes come into existence through
//! recipe writes.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use pantry_core::models::AttributeKind;

use crate::AppState;
use crate::error::AppResult;
use crate::extract::{JsonObject, ResourceId};
use crate::middleware::auth::AuthenticatedUser;
use crate::serializers::{
    AttributeInput, AttributeListParams, AttributeResponse, JsonMap, Validator, WriteMode,
};

/// Binds a route to an attribute table.
pub trait AttributeResource: Send + Sync + 'static {
    const KIND: AttributeKind;
}

/// `/tags`
pub struct Tags;

impl AttributeResource for Tags {
    const KIND: AttributeKind = AttributeKind::Tag;
}

/// `/ingredients`
pub struct Ingredients;

impl AttributeResource for Ingredients {
    const KIND: AttributeKind = AttributeKind::Ingredient;
}

/// `GET /tags`, `GET /ingredients`: Ordered by name descending; with
/// `assigned_only=1` only those used by one of the caller's recipes.
pub async fn list_attributes_handler<R: AttributeResource>(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
    Query(params): Query<AttributeListParams>,
) -> AppResult<Json<Vec<AttributeResponse>>> {
    let query = params.into_query(R::KIND, user.id)?;
    let attributes = state.store.list_attributes(&query).await?;
    Ok(Json(
        attributes.iter().map(AttributeResponse::from).collect(),
    ))
}

/// `PUT /tags/{id}`, `PUT /ingredients/{id}`
pub async fn replace_attribute_handler<R: AttributeResource>(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    ResourceId(attribute_id): ResourceId,
    JsonObject(body): JsonObject,
) -> AppResult<Json<AttributeResponse>> {
    update_attribute(&state, &user, R::KIND, attribute_id, &body, WriteMode::Replace).await
}

/// `PATCH /tags/{id}`, `PATCH /ingredients/{id}`
pub async fn update_attribute_handler<R: AttributeResource>(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    ResourceId(attribute_id): ResourceId,
    JsonObject(body): JsonObject,
) -> AppResult<Json<AttributeResponse>> {
    update_attribute(&state, &user, R::KIND, attribute_id, &body, WriteMode::Partial).await
}

async fn update_attribute(
    state: &AppState,
    AuthenticatedUser(user): &AuthenticatedUser,
    kind: AttributeKind,
    attribute_id: i64,
    body: &JsonMap,
    mode: WriteMode,
) -> AppResult<Json<AttributeResponse>> {
    let current = state.store.get_attribute(kind, user.id, attribute_id).await?;
    let input = AttributeInput::validate(body, mode, &state.config.validation_rules())?;
    let attribute = match input.name {
        Some(name) if name != current.name => {
            state
                .store
                .rename_attribute(kind, user.id, attribute_id, &name)
                .await?
        }
        _ => current,
    };
    Ok(Json(AttributeResponse::from(&attribute)))
}

/// `DELETE /tags/{id}`, `DELETE /ingredients/{id}`: Recipes keep existing and
/// only lose the association.
pub async fn delete_attribute_handler<R: AttributeResource>(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
    ResourceId(attribute_id): ResourceId,
) -> AppResult<StatusCode> {
    state
        .store
        .delete_attribute(R::KIND, user.id, attribute_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
