//! Recipe domain models.

use super::attribute::{Attribute, AttributeKind};
use super::price::Price;

/// A recipe with its tag and ingredient associations resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipe {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub time_minutes: i32,
    pub price: Price,
    pub link: String,
    pub description: String,
    /// Path of the attached image relative to the media root.
    pub image: Option<String>,
    pub tags: Vec<Attribute>,
    pub ingredients: Vec<Attribute>,
}

impl Recipe {
    pub fn attributes(&self, kind: AttributeKind) -> &[Attribute] {
        match kind {
            AttributeKind::Tag => &self.tags,
            AttributeKind::Ingredient => &self.ingredients,
        }
    }
}

/// A validated recipe to insert. Tag and ingredient names are resolved with
/// get-or-create semantics for the owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRecipe {
    pub title: String,
    pub time_minutes: i32,
    pub price: Price,
    pub link: String,
    pub description: String,
    pub tags: Vec<String>,
    pub ingredients: Vec<String>,
}

/// Changes to an existing recipe. `None` leaves the field untouched.
///
/// For `tags` and `ingredients`, `None` keeps the current associations while
/// `Some(vec![])` clears them.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RecipeChanges {
    pub title: Option<String>,
    pub time_minutes: Option<i32>,
    pub price: Option<Price>,
    pub link: Option<String>,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
    pub ingredients: Option<Vec<String>>,
}

impl RecipeChanges {
    pub fn attributes(&self, kind: AttributeKind) -> Option<&[String]> {
        match kind {
            AttributeKind::Tag => self.tags.as_deref(),
            AttributeKind::Ingredient => self.ingredients.as_deref(),
        }
    }
}

impl NewRecipe {
    pub fn attributes(&self, kind: AttributeKind) -> &[String] {
        match kind {
            AttributeKind::Tag => &self.tags,
            AttributeKind::Ingredient => &self.ingredients,
        }
    }
}
