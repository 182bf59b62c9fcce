//! Query specifications handed to the persistence port.
//!
//! Each specification names its owner scope, its filter predicates and its
//! ordering up front; adapters translate them into SQL or evaluate them in
//! memory with [`RecipeQuery::matches`] and [`SortOrder::apply`].

use crate::models::AttributeKind;

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    pub fn sql(self) -> &'static str {
        match self {
            SortOrder::Ascending => "ASC",
            SortOrder::Descending => "DESC",
        }
    }

    /// Apply the direction to an ascending comparison.
    pub fn apply(self, ordering: std::cmp::Ordering) -> std::cmp::Ordering {
        match self {
            SortOrder::Ascending => ordering,
            SortOrder::Descending => ordering.reverse(),
        }
    }
}

/// Recipes owned by `owner`, optionally restricted to those carrying at least
/// one of `tag_ids` and at least one of `ingredient_ids`. Ordered by id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipeQuery {
    pub owner: i64,
    pub tag_ids: Vec<i64>,
    pub ingredient_ids: Vec<i64>,
    pub order: SortOrder,
}

impl RecipeQuery {
    /// Newest recipes first, no attribute filters.
    pub fn owned_by(owner: i64) -> Self {
        Self {
            owner,
            tag_ids: Vec::new(),
            ingredient_ids: Vec::new(),
            order: SortOrder::Descending,
        }
    }

    pub fn with_tags(mut self, ids: Vec<i64>) -> Self {
        self.tag_ids = ids;
        self
    }

    pub fn with_ingredients(mut self, ids: Vec<i64>) -> Self {
        self.ingredient_ids = ids;
        self
    }

    pub fn filter_ids(&self, kind: AttributeKind) -> &[i64] {
        match kind {
            AttributeKind::Tag => &self.tag_ids,
            AttributeKind::Ingredient => &self.ingredient_ids,
        }
    }

    /// Evaluate the filter predicates against one recipe's owner and links.
    pub fn matches(&self, owner: i64, tag_ids: &[i64], ingredient_ids: &[i64]) -> bool {
        let any_of = |wanted: &[i64], present: &[i64]| {
            wanted.is_empty() || wanted.iter().any(|id| present.contains(id))
        };
        owner == self.owner
            && any_of(&self.tag_ids, tag_ids)
            && any_of(&self.ingredient_ids, ingredient_ids)
    }
}

/// Tags or ingredients owned by `owner`, ordered by name.
///
/// With `assigned_only`, only attributes linked to at least one of the
/// owner's recipes are returned, each once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeQuery {
    pub kind: AttributeKind,
    pub owner: i64,
    pub assigned_only: bool,
    pub order: SortOrder,
}

impl AttributeQuery {
    /// Names in reverse alphabetical order, assigned or not.
    pub fn owned_by(kind: AttributeKind, owner: i64) -> Self {
        Self {
            kind,
            owner,
            assigned_only: false,
            order: SortOrder::Descending,
        }
    }

    pub fn assigned_only(mut self, assigned_only: bool) -> Self {
        self.assigned_only = assigned_only;
        self
    }
}
