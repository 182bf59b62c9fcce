//! Query-string parameters for list endpoints.

use pantry_core::models::AttributeKind;
use pantry_core::query::{AttributeQuery, RecipeQuery};
use serde::Deserialize;

use super::{FieldErrors, NOT_AN_INTEGER};

/// `GET /recipes?tags=1,2&ingredients=3`
#[derive(Debug, Default, Deserialize)]
pub struct RecipeListParams {
    pub tags: Option<String>,
    pub ingredients: Option<String>,
}

impl RecipeListParams {
    pub fn into_query(self, owner: i64) -> Result<RecipeQuery, FieldErrors> {
        let mut errors = FieldErrors::new();
        let tags = parse_id_list("tags", self.tags.as_deref(), &mut errors);
        let ingredients = parse_id_list("ingredients", self.ingredients.as_deref(), &mut errors);
        if !errors.is_empty() {
            return Err(errors);
        }
        Ok(RecipeQuery::owned_by(owner)
            .with_tags(tags)
            .with_ingredients(ingredients))
    }
}

/// `GET /tags?assigned_only=1`
#[derive(Debug, Default, Deserialize)]
pub struct AttributeListParams {
    pub assigned_only: Option<String>,
}

impl AttributeListParams {
    pub fn into_query(self, kind: AttributeKind, owner: i64) -> Result<AttributeQuery, FieldErrors> {
        let assigned_only = match self.assigned_only.as_deref().map(str::trim) {
            None | Some("") => false,
            Some(raw) => raw
                .parse::<i64>()
                .map(|n| n != 0)
                .map_err(|_| FieldErrors::single("assigned_only", NOT_AN_INTEGER))?,
        };
        Ok(AttributeQuery::owned_by(kind, owner).assigned_only(assigned_only))
    }
}

/// Parse `1,2,3` into ids. A missing or empty parameter means no filter.
fn parse_id_list(field: &str, raw: Option<&str>, errors: &mut FieldErrors) -> Vec<i64> {
    let Some(raw) = raw.map(str::trim).filter(|r| !r.is_empty()) else {
        return Vec::new();
    };
    let mut ids = Vec::new();
    for part in raw.split(',') {
        match part.trim().parse::<i64>() {
            Ok(id) => ids.push(id),
            Err(_) => {
                errors.add(field, "Enter a comma-separated list of integer ids.");
                return Vec::new();
            }
        }
    }
    ids
}
