//! Persistence port.
//!
//! Each resource gets a repository capability scoped by owner; [`Store`]
//! composes them into the single object handlers hold. Two adapters exist:
//! [`postgres::PgStore`] for deployments and [`memory::MemoryStore`] for
//! local development and tests.
//!
//! Every operation that touches a row owned by someone else behaves exactly
//! as if the row did not exist and returns [`StoreError::NotFound`].
//!
//! [`StoreError::NotFound`]: crate::StoreError::NotFound

pub mod memory;
pub mod postgres;

use async_trait::async_trait;

use crate::StoreResult;
use crate::models::{
    Attribute, AttributeKind, NewRecipe, NewUser, Recipe, RecipeChanges, User, UserChanges,
    UserWithPassword,
};
use crate::query::{AttributeQuery, RecipeQuery};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// User account storage.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a user. A taken email yields a `Conflict` on `email`.
    async fn create_user(&self, new_user: NewUser) -> StoreResult<User>;

    /// Look up a user by (normalized) email, including the password hash.
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<UserWithPassword>>;

    async fn get_user(&self, user_id: i64) -> StoreResult<User>;

    async fn update_user(&self, user_id: i64, changes: UserChanges) -> StoreResult<User>;

    /// Delete a user together with their token, recipes, tags and ingredients.
    async fn delete_user(&self, user_id: i64) -> StoreResult<()>;
}

/// Opaque auth token storage. Only token digests are ever stored.
#[async_trait]
pub trait TokenRepository: Send + Sync {
    /// Store `digest` as the user's only token, replacing any previous one.
    async fn replace_token(&self, user_id: i64, digest: &str) -> StoreResult<()>;

    /// Resolve a token digest to its active owner.
    async fn find_user_by_token(&self, digest: &str) -> StoreResult<Option<User>>;
}

/// Tag and ingredient storage.
#[async_trait]
pub trait AttributeRepository: Send + Sync {
    async fn list_attributes(&self, query: &AttributeQuery) -> StoreResult<Vec<Attribute>>;

    async fn get_attribute(
        &self,
        kind: AttributeKind,
        owner: i64,
        attribute_id: i64,
    ) -> StoreResult<Attribute>;

    /// Rename an owned attribute. A name already used by the same owner yields
    /// a `Conflict` on `name`.
    async fn rename_attribute(
        &self,
        kind: AttributeKind,
        owner: i64,
        attribute_id: i64,
        name: &str,
    ) -> StoreResult<Attribute>;

    /// Delete an owned attribute. Recipes only lose the association.
    async fn delete_attribute(
        &self,
        kind: AttributeKind,
        owner: i64,
        attribute_id: i64,
    ) -> StoreResult<()>;
}

/// Recipe storage. Writes are atomic over the recipe row and its links.
#[async_trait]
pub trait RecipeRepository: Send + Sync {
    async fn list_recipes(&self, query: &RecipeQuery) -> StoreResult<Vec<Recipe>>;

    async fn get_recipe(&self, owner: i64, recipe_id: i64) -> StoreResult<Recipe>;

    async fn create_recipe(&self, owner: i64, new_recipe: NewRecipe) -> StoreResult<Recipe>;

    async fn update_recipe(
        &self,
        owner: i64,
        recipe_id: i64,
        changes: RecipeChanges,
    ) -> StoreResult<Recipe>;

    /// Delete an owned recipe, returning the image path it carried.
    async fn delete_recipe(&self, owner: i64, recipe_id: i64) -> StoreResult<Option<String>>;

    /// Point the recipe at a new image, returning the updated recipe and the
    /// path it replaced.
    async fn set_recipe_image(
        &self,
        owner: i64,
        recipe_id: i64,
        image: &str,
    ) -> StoreResult<(Recipe, Option<String>)>;
}

/// The full persistence port.
#[async_trait]
pub trait Store: UserRepository + TokenRepository + AttributeRepository + RecipeRepository {
    /// Cheap connectivity check.
    async fn ping(&self) -> StoreResult<()>;
}

/// Deduplicate attribute names while keeping first-seen order.
pub(crate) fn unique_names(names: &[String]) -> Vec<&str> {
    let mut seen = std::collections::HashSet::new();
    names
        .iter()
        .map(String::as_str)
        .filter(|name| seen.insert(*name))
        .collect()
}
