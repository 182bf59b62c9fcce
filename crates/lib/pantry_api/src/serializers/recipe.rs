//! Recipe payloads and representations.
//!
//! `tags` and `ingredients` are lists of `{"name": ...}` objects. On update an
//! absent list leaves the associations alone and an empty list clears them.

use pantry_core::models::{NewRecipe, Price, Recipe, RecipeChanges};
use serde::Serialize;

use super::{
    AttributeResponse, FieldErrors, FieldReader, JsonMap, MAX_TEXT_LENGTH, StringRule,
    ValidationRules, Validator, WriteMode,
};
use crate::media;

struct RecipeFields {
    title: Option<String>,
    time_minutes: Option<i32>,
    price: Option<Price>,
    link: Option<String>,
    description: Option<String>,
    tags: Option<Vec<String>>,
    ingredients: Option<Vec<String>>,
}

fn read_fields(input: &JsonMap, mode: WriteMode) -> (RecipeFields, FieldErrors) {
    let mut reader = FieldReader::new(input, mode);
    let fields = RecipeFields {
        title: reader.string("title", StringRule::required().max_length(MAX_TEXT_LENGTH)),
        time_minutes: reader.non_negative_integer("time_minutes", true),
        price: reader.price("price", true),
        link: reader.string("link", StringRule::optional().max_length(MAX_TEXT_LENGTH)),
        description: reader.string("description", StringRule::optional()),
        tags: reader.attribute_names("tags"),
        ingredients: reader.attribute_names("ingredients"),
    };
    (fields, reader.into_errors())
}

impl Validator for NewRecipe {
    fn validate(
        input: &JsonMap,
        _mode: WriteMode,
        _rules: &ValidationRules,
    ) -> Result<Self, FieldErrors> {
        let (fields, errors) = read_fields(input, WriteMode::Create);
        match (fields.title, fields.time_minutes, fields.price) {
            (Some(title), Some(time_minutes), Some(price)) if errors.is_empty() => Ok(NewRecipe {
                title,
                time_minutes,
                price,
                link: fields.link.unwrap_or_default(),
                description: fields.description.unwrap_or_default(),
                tags: fields.tags.unwrap_or_default(),
                ingredients: fields.ingredients.unwrap_or_default(),
            }),
            _ => Err(errors),
        }
    }
}

impl Validator for RecipeChanges {
    fn validate(
        input: &JsonMap,
        mode: WriteMode,
        _rules: &ValidationRules,
    ) -> Result<Self, FieldErrors> {
        let (fields, errors) = read_fields(input, mode);
        if !errors.is_empty() {
            return Err(errors);
        }
        Ok(RecipeChanges {
            title: fields.title,
            time_minutes: fields.time_minutes,
            price: fields.price,
            link: fields.link,
            description: fields.description,
            tags: fields.tags,
            ingredients: fields.ingredients,
        })
    }
}

/// List representation.
#[derive(Debug, Serialize)]
pub struct RecipeResponse {
    pub id: i64,
    pub title: String,
    pub time_minutes: i32,
    pub price: Price,
    pub link: String,
    pub tags: Vec<AttributeResponse>,
    pub ingredients: Vec<AttributeResponse>,
}

impl From<&Recipe> for RecipeResponse {
    fn from(recipe: &Recipe) -> Self {
        Self {
            id: recipe.id,
            title: recipe.title.clone(),
            time_minutes: recipe.time_minutes,
            price: recipe.price,
            link: recipe.link.clone(),
            tags: recipe.tags.iter().map(AttributeResponse::from).collect(),
            ingredients: recipe.ingredients.iter().map(AttributeResponse::from).collect(),
        }
    }
}

/// Detail representation: the list fields plus description and image URL.
#[derive(Debug, Serialize)]
pub struct RecipeDetailResponse {
    #[serde(flatten)]
    pub summary: RecipeResponse,
    pub description: String,
    pub image: Option<String>,
}

impl From<&Recipe> for RecipeDetailResponse {
    fn from(recipe: &Recipe) -> Self {
        Self {
            summary: RecipeResponse::from(recipe),
            description: recipe.description.clone(),
            image: recipe.image.as_deref().map(media::url),
        }
    }
}

/// Response of the image upload endpoint.
#[derive(Debug, Serialize)]
pub struct RecipeImageResponse {
    pub id: i64,
    pub image: Option<String>,
}

impl From<&Recipe> for RecipeImageResponse {
    fn from(recipe: &Recipe) -> Self {
        Self {
            id: recipe.id,
            image: recipe.image.as_deref().map(media::url),
        }
    }
}
