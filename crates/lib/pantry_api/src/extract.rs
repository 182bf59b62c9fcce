//! Request extractors with this API's error conventions.

use axum::Json;
use axum::extract::{FromRequest, FromRequestParts, Path, Request};
use axum::http::request::Parts;
use serde_json::Value;

use crate::error::AppError;
use crate::serializers::{JsonMap, NON_FIELD_ERRORS, json_type_name};

/// A JSON object body. Malformed JSON and non-object bodies are rejected with
/// a `non_field_errors` validation error.
#[derive(Debug)]
pub struct JsonObject(pub JsonMap);

impl<S> FromRequest<S> for JsonObject
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<Value>::from_request(req, state)
            .await
            .map_err(|rejection| AppError::field(NON_FIELD_ERRORS, rejection.body_text()))?;
        match value {
            Value::Object(map) => Ok(JsonObject(map)),
            other => Err(AppError::field(
                NON_FIELD_ERRORS,
                format!(
                    "Invalid data. Expected a dictionary, but got {}.",
                    json_type_name(&other)
                ),
            )),
        }
    }
}

/// Numeric `{id}` path segment. Anything that is not an integer cannot name a
/// row, so it is reported as 404.
#[derive(Debug, Clone, Copy)]
pub struct ResourceId(pub i64);

impl<S> FromRequestParts<S> for ResourceId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|_| AppError::NotFound)?;
        raw.parse::<i64>()
            .map(ResourceId)
            .map_err(|_| AppError::NotFound)
    }
}
