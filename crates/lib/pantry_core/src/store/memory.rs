//! In-memory store.
//!
//! Holds every table behind one `RwLock`; each write operation takes the
//! write lock once, which makes it atomic with respect to other requests.
//! Data is lost when the process exits.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use super::{
    AttributeRepository, RecipeRepository, Store, TokenRepository, UserRepository, unique_names,
};
use crate::models::{
    Attribute, AttributeKind, NewRecipe, NewUser, Price, Recipe, RecipeChanges, User, UserChanges,
    UserWithPassword,
};
use crate::query::{AttributeQuery, RecipeQuery};
use crate::{StoreError, StoreResult};

#[derive(Debug, Clone)]
struct RecipeRecord {
    id: i64,
    user_id: i64,
    title: String,
    time_minutes: i32,
    price: Price,
    link: String,
    description: String,
    image: Option<String>,
    tag_ids: BTreeSet<i64>,
    ingredient_ids: BTreeSet<i64>,
}

impl RecipeRecord {
    fn links(&self, kind: AttributeKind) -> &BTreeSet<i64> {
        match kind {
            AttributeKind::Tag => &self.tag_ids,
            AttributeKind::Ingredient => &self.ingredient_ids,
        }
    }

    fn links_mut(&mut self, kind: AttributeKind) -> &mut BTreeSet<i64> {
        match kind {
            AttributeKind::Tag => &mut self.tag_ids,
            AttributeKind::Ingredient => &mut self.ingredient_ids,
        }
    }
}

#[derive(Debug, Default)]
struct AttributeTable {
    last_id: i64,
    rows: BTreeMap<i64, Attribute>,
}

impl AttributeTable {
    /// Get-or-create keyed by (owner, name).
    fn get_or_create(&mut self, owner: i64, name: &str) -> i64 {
        if let Some(existing) = self
            .rows
            .values()
            .find(|a| a.user_id == owner && a.name == name)
        {
            return existing.id;
        }
        self.last_id += 1;
        let id = self.last_id;
        self.rows.insert(
            id,
            Attribute {
                id,
                user_id: owner,
                name: name.to_string(),
            },
        );
        id
    }
}

#[derive(Debug, Default)]
struct Tables {
    last_user_id: i64,
    last_recipe_id: i64,
    users: BTreeMap<i64, UserWithPassword>,
    /// token digest → user id
    tokens: HashMap<String, i64>,
    tags: AttributeTable,
    ingredients: AttributeTable,
    recipes: BTreeMap<i64, RecipeRecord>,
}

impl Tables {
    fn attributes(&self, kind: AttributeKind) -> &AttributeTable {
        match kind {
            AttributeKind::Tag => &self.tags,
            AttributeKind::Ingredient => &self.ingredients,
        }
    }

    fn attributes_mut(&mut self, kind: AttributeKind) -> &mut AttributeTable {
        match kind {
            AttributeKind::Tag => &mut self.tags,
            AttributeKind::Ingredient => &mut self.ingredients,
        }
    }

    fn email_taken(&self, email: &str, except: Option<i64>) -> bool {
        self.users
            .values()
            .any(|u| u.user.email == email && Some(u.user.id) != except)
    }

    fn owned_recipe_mut(&mut self, owner: i64, recipe_id: i64) -> StoreResult<&mut RecipeRecord> {
        self.recipes
            .get_mut(&recipe_id)
            .filter(|r| r.user_id == owner)
            .ok_or(StoreError::NotFound)
    }

    fn resolve_names(&mut self, kind: AttributeKind, owner: i64, names: &[String]) -> BTreeSet<i64> {
        let table = self.attributes_mut(kind);
        unique_names(names)
            .into_iter()
            .map(|name| table.get_or_create(owner, name))
            .collect()
    }

    fn hydrate(&self, record: &RecipeRecord) -> Recipe {
        let resolve = |kind: AttributeKind| -> Vec<Attribute> {
            let table = self.attributes(kind);
            record
                .links(kind)
                .iter()
                .filter_map(|id| table.rows.get(id).cloned())
                .collect()
        };
        Recipe {
            id: record.id,
            user_id: record.user_id,
            title: record.title.clone(),
            time_minutes: record.time_minutes,
            price: record.price,
            link: record.link.clone(),
            description: record.description.clone(),
            image: record.image.clone(),
            tags: resolve(AttributeKind::Tag),
            ingredients: resolve(AttributeKind::Ingredient),
        }
    }
}

/// Process-local store for development and tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn create_user(&self, new_user: NewUser) -> StoreResult<User> {
        let mut tables = self.tables.write().await;
        if tables.email_taken(&new_user.email, None) {
            return Err(StoreError::conflict(
                "email",
                "user with this email already exists.",
            ));
        }
        tables.last_user_id += 1;
        let user = User {
            id: tables.last_user_id,
            email: new_user.email,
            name: new_user.name,
            is_active: true,
            is_staff: false,
        };
        tables.users.insert(
            user.id,
            UserWithPassword {
                user: user.clone(),
                password_hash: new_user.password_hash,
            },
        );
        debug!(user_id = user.id, "user created");
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<UserWithPassword>> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.user.email == email).cloned())
    }

    async fn get_user(&self, user_id: i64) -> StoreResult<User> {
        let tables = self.tables.read().await;
        tables
            .users
            .get(&user_id)
            .map(|u| u.user.clone())
            .ok_or(StoreError::NotFound)
    }

    async fn update_user(&self, user_id: i64, changes: UserChanges) -> StoreResult<User> {
        let mut tables = self.tables.write().await;
        if let Some(email) = &changes.email
            && tables.email_taken(email, Some(user_id))
        {
            return Err(StoreError::conflict(
                "email",
                "user with this email already exists.",
            ));
        }
        let record = tables.users.get_mut(&user_id).ok_or(StoreError::NotFound)?;
        if let Some(email) = changes.email {
            record.user.email = email;
        }
        if let Some(name) = changes.name {
            record.user.name = name;
        }
        if let Some(hash) = changes.password_hash {
            record.password_hash = hash;
        }
        Ok(record.user.clone())
    }

    async fn delete_user(&self, user_id: i64) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if tables.users.remove(&user_id).is_none() {
            return Err(StoreError::NotFound);
        }
        tables.tokens.retain(|_, owner| *owner != user_id);
        tables.recipes.retain(|_, r| r.user_id != user_id);
        for kind in AttributeKind::ALL {
            tables
                .attributes_mut(kind)
                .rows
                .retain(|_, a| a.user_id != user_id);
        }
        debug!(user_id, "user and owned rows deleted");
        Ok(())
    }
}

#[async_trait]
impl TokenRepository for MemoryStore {
    async fn replace_token(&self, user_id: i64, digest: &str) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&user_id) {
            return Err(StoreError::NotFound);
        }
        tables.tokens.retain(|_, owner| *owner != user_id);
        tables.tokens.insert(digest.to_string(), user_id);
        Ok(())
    }

    async fn find_user_by_token(&self, digest: &str) -> StoreResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables
            .tokens
            .get(digest)
            .and_then(|user_id| tables.users.get(user_id))
            .map(|u| u.user.clone()))
    }
}

#[async_trait]
impl AttributeRepository for MemoryStore {
    async fn list_attributes(&self, query: &AttributeQuery) -> StoreResult<Vec<Attribute>> {
        let tables = self.tables.read().await;
        let assigned: BTreeSet<i64> = if query.assigned_only {
            tables
                .recipes
                .values()
                .filter(|r| r.user_id == query.owner)
                .flat_map(|r| r.links(query.kind).iter().copied())
                .collect()
        } else {
            BTreeSet::new()
        };

        let mut rows: Vec<Attribute> = tables
            .attributes(query.kind)
            .rows
            .values()
            .filter(|a| a.user_id == query.owner)
            .filter(|a| !query.assigned_only || assigned.contains(&a.id))
            .cloned()
            .collect();
        rows.sort_by(|a, b| query.order.apply(a.name.cmp(&b.name).then(a.id.cmp(&b.id))));
        Ok(rows)
    }

    async fn get_attribute(
        &self,
        kind: AttributeKind,
        owner: i64,
        attribute_id: i64,
    ) -> StoreResult<Attribute> {
        let tables = self.tables.read().await;
        tables
            .attributes(kind)
            .rows
            .get(&attribute_id)
            .filter(|a| a.user_id == owner)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn rename_attribute(
        &self,
        kind: AttributeKind,
        owner: i64,
        attribute_id: i64,
        name: &str,
    ) -> StoreResult<Attribute> {
        let mut tables = self.tables.write().await;
        let table = tables.attributes_mut(kind);
        match table.rows.get(&attribute_id) {
            Some(row) if row.user_id == owner => {}
            _ => return Err(StoreError::NotFound),
        }
        if table
            .rows
            .values()
            .any(|a| a.user_id == owner && a.name == name && a.id != attribute_id)
        {
            return Err(StoreError::conflict(
                "name",
                format!("{} with this name already exists.", kind.label()),
            ));
        }
        let row = table
            .rows
            .get_mut(&attribute_id)
            .ok_or(StoreError::NotFound)?;
        row.name = name.to_string();
        Ok(row.clone())
    }

    async fn delete_attribute(
        &self,
        kind: AttributeKind,
        owner: i64,
        attribute_id: i64,
    ) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let table = tables.attributes_mut(kind);
        match table.rows.get(&attribute_id) {
            Some(row) if row.user_id == owner => {
                table.rows.remove(&attribute_id);
            }
            _ => return Err(StoreError::NotFound),
        }
        for recipe in tables.recipes.values_mut() {
            recipe.links_mut(kind).remove(&attribute_id);
        }
        Ok(())
    }
}

#[async_trait]
impl RecipeRepository for MemoryStore {
    async fn list_recipes(&self, query: &RecipeQuery) -> StoreResult<Vec<Recipe>> {
        let tables = self.tables.read().await;
        let mut records: Vec<&RecipeRecord> = tables
            .recipes
            .values()
            .filter(|r| {
                let tag_ids: Vec<i64> = r.tag_ids.iter().copied().collect();
                let ingredient_ids: Vec<i64> = r.ingredient_ids.iter().copied().collect();
                query.matches(r.user_id, &tag_ids, &ingredient_ids)
            })
            .collect();
        records.sort_by(|a, b| query.order.apply(a.id.cmp(&b.id)));
        Ok(records.into_iter().map(|r| tables.hydrate(r)).collect())
    }

    async fn get_recipe(&self, owner: i64, recipe_id: i64) -> StoreResult<Recipe> {
        let tables = self.tables.read().await;
        tables
            .recipes
            .get(&recipe_id)
            .filter(|r| r.user_id == owner)
            .map(|r| tables.hydrate(r))
            .ok_or(StoreError::NotFound)
    }

    async fn create_recipe(&self, owner: i64, new_recipe: NewRecipe) -> StoreResult<Recipe> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&owner) {
            return Err(StoreError::NotFound);
        }
        let tag_ids = tables.resolve_names(AttributeKind::Tag, owner, &new_recipe.tags);
        let ingredient_ids =
            tables.resolve_names(AttributeKind::Ingredient, owner, &new_recipe.ingredients);
        tables.last_recipe_id += 1;
        let record = RecipeRecord {
            id: tables.last_recipe_id,
            user_id: owner,
            title: new_recipe.title,
            time_minutes: new_recipe.time_minutes,
            price: new_recipe.price,
            link: new_recipe.link,
            description: new_recipe.description,
            image: None,
            tag_ids,
            ingredient_ids,
        };
        let recipe = tables.hydrate(&record);
        tables.recipes.insert(record.id, record);
        Ok(recipe)
    }

    async fn update_recipe(
        &self,
        owner: i64,
        recipe_id: i64,
        changes: RecipeChanges,
    ) -> StoreResult<Recipe> {
        let mut tables = self.tables.write().await;
        tables.owned_recipe_mut(owner, recipe_id)?;

        let mut links = Vec::new();
        for kind in AttributeKind::ALL {
            if let Some(names) = changes.attributes(kind) {
                links.push((kind, tables.resolve_names(kind, owner, names)));
            }
        }

        let record = tables.owned_recipe_mut(owner, recipe_id)?;
        if let Some(title) = changes.title {
            record.title = title;
        }
        if let Some(time_minutes) = changes.time_minutes {
            record.time_minutes = time_minutes;
        }
        if let Some(price) = changes.price {
            record.price = price;
        }
        if let Some(link) = changes.link {
            record.link = link;
        }
        if let Some(description) = changes.description {
            record.description = description;
        }
        for (kind, ids) in links {
            *record.links_mut(kind) = ids;
        }
        let record = record.clone();
        Ok(tables.hydrate(&record))
    }

    async fn delete_recipe(&self, owner: i64, recipe_id: i64) -> StoreResult<Option<String>> {
        let mut tables = self.tables.write().await;
        tables.owned_recipe_mut(owner, recipe_id)?;
        Ok(tables
            .recipes
            .remove(&recipe_id)
            .and_then(|record| record.image))
    }

    async fn set_recipe_image(
        &self,
        owner: i64,
        recipe_id: i64,
        image: &str,
    ) -> StoreResult<(Recipe, Option<String>)> {
        let mut tables = self.tables.write().await;
        let record = tables.owned_recipe_mut(owner, recipe_id)?;
        let previous = record.image.replace(image.to_string());
        let record = record.clone();
        Ok((tables.hydrate(&record), previous))
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}
