//! PostgreSQL store.
//!
//! Prices are stored as `NUMERIC(5,2)` and cross the wire as integer cents.
//! Multi-row writes run inside a transaction.

use async_trait::async_trait;
use sqlx::{PgConnection, PgPool};
use tracing::{debug, warn};

use super::{
    AttributeRepository, RecipeRepository, Store, TokenRepository, UserRepository, unique_names,
};
use crate::error::is_unique_violation;
use crate::models::{
    Attribute, AttributeKind, NewRecipe, NewUser, Price, Recipe, RecipeChanges, User, UserChanges,
    UserWithPassword,
};
use crate::query::{AttributeQuery, RecipeQuery, SortOrder};
use crate::{StoreError, StoreResult};

const USER_COLUMNS: &str = "id, email, name, is_active, is_staff";

const RECIPE_COLUMNS: &str = "r.id, r.user_id, r.title, r.time_minutes, \
     (r.price * 100)::int4 AS price_cents, r.link, r.description, r.image";

const EMAIL_TAKEN: &str = "user with this email already exists.";

/// SQLSTATEs after which rerunning the whole transaction can succeed:
/// deadlock victim and serialization failure.
const RETRYABLE_STATES: [&str; 2] = ["40P01", "40001"];

#[derive(sqlx::FromRow)]
struct UserRow {
    #[sqlx(flatten)]
    user: User,
    password_hash: String,
}

#[derive(sqlx::FromRow)]
struct RecipeRow {
    id: i64,
    user_id: i64,
    title: String,
    time_minutes: i32,
    price_cents: i32,
    link: String,
    description: String,
    image: Option<String>,
}

/// Store backed by a PostgreSQL pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn insert_recipe(&self, owner: i64, new_recipe: &NewRecipe) -> StoreResult<Recipe> {
        let mut tx = self.pool.begin().await?;
        let recipe_id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO recipes (user_id, title, time_minutes, price, link, description) \
             VALUES ($1, $2, $3, $4::int4::numeric / 100, $5, $6) RETURNING id",
        )
        .bind(owner)
        .bind(&new_recipe.title)
        .bind(new_recipe.time_minutes)
        .bind(new_recipe.price.cents())
        .bind(&new_recipe.link)
        .bind(&new_recipe.description)
        .fetch_one(&mut *tx)
        .await?;

        for kind in AttributeKind::ALL {
            replace_links(&mut tx, kind, owner, recipe_id, new_recipe.attributes(kind)).await?;
        }
        let recipe = load_recipe(&mut tx, owner, recipe_id).await?;
        tx.commit().await?;
        Ok(recipe)
    }

    async fn apply_recipe_changes(
        &self,
        owner: i64,
        recipe_id: i64,
        changes: &RecipeChanges,
    ) -> StoreResult<Recipe> {
        let mut tx = self.pool.begin().await?;
        lock_recipe(&mut tx, owner, recipe_id).await?;

        sqlx::query(
            "UPDATE recipes SET \
                title = COALESCE($2, title), \
                time_minutes = COALESCE($3, time_minutes), \
                price = COALESCE($4::int4::numeric / 100, price), \
                link = COALESCE($5, link), \
                description = COALESCE($6, description) \
             WHERE id = $1",
        )
        .bind(recipe_id)
        .bind(changes.title.as_deref())
        .bind(changes.time_minutes)
        .bind(changes.price.map(Price::cents))
        .bind(changes.link.as_deref())
        .bind(changes.description.as_deref())
        .execute(&mut *tx)
        .await?;

        for kind in AttributeKind::ALL {
            if let Some(names) = changes.attributes(kind) {
                replace_links(&mut tx, kind, owner, recipe_id, names).await?;
            }
        }
        let recipe = load_recipe(&mut tx, owner, recipe_id).await?;
        tx.commit().await?;
        Ok(recipe)
    }
}

fn unique_or(e: sqlx::Error, field: &'static str, message: impl Into<String>) -> StoreError {
    if is_unique_violation(&e) {
        StoreError::conflict(field, message)
    } else {
        StoreError::Database(e)
    }
}

fn is_retryable(e: &StoreError) -> bool {
    let StoreError::Database(e) = e else {
        return false;
    };
    e.as_database_error()
        .and_then(|db| db.code())
        .is_some_and(|code| RETRYABLE_STATES.contains(&&*code))
}

/// Run a transaction, running it once more if PostgreSQL aborted it with a
/// retryable state.
async fn retry_once<T, F, Fut>(operation: &'static str, mut run: F) -> StoreResult<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = StoreResult<T>>,
{
    match run().await {
        Err(e) if is_retryable(&e) => {
            warn!(operation, error = %e, "transaction aborted, retrying once");
            run().await
        }
        result => result,
    }
}

fn list_recipes_sql(order: SortOrder) -> String {
    format!(
        "SELECT {RECIPE_COLUMNS} FROM recipes r \
         WHERE r.user_id = $1 \
           AND (cardinality($2::int8[]) = 0 OR EXISTS ( \
                SELECT 1 FROM recipe_tags rt \
                WHERE rt.recipe_id = r.id AND rt.tag_id = ANY($2))) \
           AND (cardinality($3::int8[]) = 0 OR EXISTS ( \
                SELECT 1 FROM recipe_ingredients ri \
                WHERE ri.recipe_id = r.id AND ri.ingredient_id = ANY($3))) \
         ORDER BY r.id {}",
        order.sql()
    )
}

fn list_attributes_sql(kind: AttributeKind, order: SortOrder) -> String {
    format!(
        "SELECT a.id, a.user_id, a.name FROM {table} a \
         WHERE a.user_id = $1 \
           AND ($2 = FALSE OR EXISTS ( \
                SELECT 1 FROM {link} l JOIN recipes r ON r.id = l.recipe_id \
                WHERE l.{column} = a.id AND r.user_id = $1)) \
         ORDER BY a.name {ord}, a.id {ord}",
        table = kind.table(),
        link = kind.link_table(),
        column = kind.link_column(),
        ord = order.sql(),
    )
}

/// Resolve a name to the owner's attribute id, inserting it when missing.
///
/// `ON CONFLICT DO NOTHING` returns no row when a concurrent request created
/// the same name first; the follow-up select then finds it. One retry covers
/// a row deleted between the two statements.
async fn get_or_create_attribute(
    conn: &mut PgConnection,
    kind: AttributeKind,
    owner: i64,
    name: &str,
) -> StoreResult<i64> {
    let insert = format!(
        "INSERT INTO {} (user_id, name) VALUES ($1, $2) \
         ON CONFLICT (user_id, name) DO NOTHING RETURNING id",
        kind.table()
    );
    let select = format!(
        "SELECT id FROM {} WHERE user_id = $1 AND name = $2",
        kind.table()
    );
    for _ in 0..2 {
        let inserted = sqlx::query_scalar::<_, i64>(&insert)
            .bind(owner)
            .bind(name)
            .fetch_optional(&mut *conn)
            .await?;
        if let Some(id) = inserted {
            return Ok(id);
        }
        let existing = sqlx::query_scalar::<_, i64>(&select)
            .bind(owner)
            .bind(name)
            .fetch_optional(&mut *conn)
            .await?;
        if let Some(id) = existing {
            return Ok(id);
        }
    }
    Err(StoreError::Internal(format!(
        "could not resolve {} {name:?}",
        kind.label()
    )))
}

/// Replace a recipe's links of one kind with the given names.
///
/// Names are resolved in sorted order so concurrent writers take the
/// attribute row locks in the same sequence.
async fn replace_links(
    conn: &mut PgConnection,
    kind: AttributeKind,
    owner: i64,
    recipe_id: i64,
    names: &[String],
) -> StoreResult<()> {
    let mut names = unique_names(names);
    names.sort_unstable();
    let mut ids = Vec::with_capacity(names.len());
    for name in names {
        ids.push(get_or_create_attribute(conn, kind, owner, name).await?);
    }

    sqlx::query(&format!(
        "DELETE FROM {} WHERE recipe_id = $1",
        kind.link_table()
    ))
    .bind(recipe_id)
    .execute(&mut *conn)
    .await?;

    if !ids.is_empty() {
        sqlx::query(&format!(
            "INSERT INTO {} (recipe_id, {}) SELECT $1, UNNEST($2::int8[]) ON CONFLICT DO NOTHING",
            kind.link_table(),
            kind.link_column()
        ))
        .bind(recipe_id)
        .bind(&ids)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

/// Attach tags and ingredients to recipe rows, preserving row order.
async fn hydrate(conn: &mut PgConnection, rows: Vec<RecipeRow>) -> StoreResult<Vec<Recipe>> {
    let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
    let mut recipes = Vec::with_capacity(rows.len());
    for row in rows {
        let price = Price::from_cents(row.price_cents)
            .map_err(|e| StoreError::Internal(format!("stored price out of range: {e}")))?;
        recipes.push(Recipe {
            id: row.id,
            user_id: row.user_id,
            title: row.title,
            time_minutes: row.time_minutes,
            price,
            link: row.link,
            description: row.description,
            image: row.image,
            tags: Vec::new(),
            ingredients: Vec::new(),
        });
    }
    if ids.is_empty() {
        return Ok(recipes);
    }

    for kind in AttributeKind::ALL {
        let links = sqlx::query_as::<_, (i64, i64, i64, String)>(&format!(
            "SELECT l.recipe_id, a.id, a.user_id, a.name \
             FROM {link} l JOIN {table} a ON a.id = l.{column} \
             WHERE l.recipe_id = ANY($1) ORDER BY a.id",
            link = kind.link_table(),
            table = kind.table(),
            column = kind.link_column(),
        ))
        .bind(&ids)
        .fetch_all(&mut *conn)
        .await?;

        for (recipe_id, id, user_id, name) in links {
            if let Some(recipe) = recipes.iter_mut().find(|r| r.id == recipe_id) {
                let attribute = Attribute { id, user_id, name };
                match kind {
                    AttributeKind::Tag => recipe.tags.push(attribute),
                    AttributeKind::Ingredient => recipe.ingredients.push(attribute),
                }
            }
        }
    }
    Ok(recipes)
}

async fn load_recipe(conn: &mut PgConnection, owner: i64, recipe_id: i64) -> StoreResult<Recipe> {
    let row = sqlx::query_as::<_, RecipeRow>(&format!(
        "SELECT {RECIPE_COLUMNS} FROM recipes r WHERE r.id = $1 AND r.user_id = $2"
    ))
    .bind(recipe_id)
    .bind(owner)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(StoreError::NotFound)?;
    hydrate(conn, vec![row])
        .await?
        .pop()
        .ok_or(StoreError::NotFound)
}

/// Lock an owned recipe row for the rest of the transaction, returning its
/// current image.
async fn lock_recipe(
    conn: &mut PgConnection,
    owner: i64,
    recipe_id: i64,
) -> StoreResult<Option<String>> {
    sqlx::query_scalar::<_, Option<String>>(
        "SELECT image FROM recipes WHERE id = $1 AND user_id = $2 FOR UPDATE",
    )
    .bind(recipe_id)
    .bind(owner)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(StoreError::NotFound)
}

#[async_trait]
impl UserRepository for PgStore {
    async fn create_user(&self, new_user: NewUser) -> StoreResult<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (email, name, password_hash) VALUES ($1, $2, $3) \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(&new_user.email)
        .bind(&new_user.name)
        .bind(&new_user.password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| unique_or(e, "email", EMAIL_TAKEN))?;
        debug!(user_id = user.id, "user created");
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<UserWithPassword>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS}, password_hash FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| UserWithPassword {
            user: r.user,
            password_hash: r.password_hash,
        }))
    }

    async fn get_user(&self, user_id: i64) -> StoreResult<User> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound)
    }

    async fn update_user(&self, user_id: i64, changes: UserChanges) -> StoreResult<User> {
        sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET \
                email = COALESCE($2, email), \
                name = COALESCE($3, name), \
                password_hash = COALESCE($4, password_hash) \
             WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(user_id)
        .bind(changes.email)
        .bind(changes.name)
        .bind(changes.password_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| unique_or(e, "email", EMAIL_TAKEN))?
        .ok_or(StoreError::NotFound)
    }

    async fn delete_user(&self, user_id: i64) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        debug!(user_id, "user and owned rows deleted");
        Ok(())
    }
}

#[async_trait]
impl TokenRepository for PgStore {
    async fn replace_token(&self, user_id: i64, digest: &str) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO auth_tokens (user_id, token_hash) VALUES ($1, $2) \
             ON CONFLICT (user_id) DO UPDATE \
             SET token_hash = EXCLUDED.token_hash, created_at = now()",
        )
        .bind(user_id)
        .bind(digest)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if e.as_database_error()
                .is_some_and(|db| db.is_foreign_key_violation())
            {
                StoreError::NotFound
            } else {
                StoreError::Database(e)
            }
        })?;
        Ok(())
    }

    async fn find_user_by_token(&self, digest: &str) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT u.id, u.email, u.name, u.is_active, u.is_staff \
             FROM auth_tokens t JOIN users u ON u.id = t.user_id \
             WHERE t.token_hash = $1",
        )
        .bind(digest)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }
}

#[async_trait]
impl AttributeRepository for PgStore {
    async fn list_attributes(&self, query: &AttributeQuery) -> StoreResult<Vec<Attribute>> {
        let rows = sqlx::query_as::<_, Attribute>(&list_attributes_sql(query.kind, query.order))
            .bind(query.owner)
            .bind(query.assigned_only)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn get_attribute(
        &self,
        kind: AttributeKind,
        owner: i64,
        attribute_id: i64,
    ) -> StoreResult<Attribute> {
        sqlx::query_as::<_, Attribute>(&format!(
            "SELECT id, user_id, name FROM {} WHERE id = $1 AND user_id = $2",
            kind.table()
        ))
        .bind(attribute_id)
        .bind(owner)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound)
    }

    async fn rename_attribute(
        &self,
        kind: AttributeKind,
        owner: i64,
        attribute_id: i64,
        name: &str,
    ) -> StoreResult<Attribute> {
        sqlx::query_as::<_, Attribute>(&format!(
            "UPDATE {} SET name = $3 WHERE id = $1 AND user_id = $2 \
             RETURNING id, user_id, name",
            kind.table()
        ))
        .bind(attribute_id)
        .bind(owner)
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            unique_or(
                e,
                "name",
                format!("{} with this name already exists.", kind.label()),
            )
        })?
        .ok_or(StoreError::NotFound)
    }

    async fn delete_attribute(
        &self,
        kind: AttributeKind,
        owner: i64,
        attribute_id: i64,
    ) -> StoreResult<()> {
        let result = sqlx::query(&format!(
            "DELETE FROM {} WHERE id = $1 AND user_id = $2",
            kind.table()
        ))
        .bind(attribute_id)
        .bind(owner)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl RecipeRepository for PgStore {
    async fn list_recipes(&self, query: &RecipeQuery) -> StoreResult<Vec<Recipe>> {
        let mut conn = self.pool.acquire().await?;
        let rows = sqlx::query_as::<_, RecipeRow>(&list_recipes_sql(query.order))
            .bind(query.owner)
            .bind(&query.tag_ids)
            .bind(&query.ingredient_ids)
            .fetch_all(&mut *conn)
            .await?;
        hydrate(&mut conn, rows).await
    }

    async fn get_recipe(&self, owner: i64, recipe_id: i64) -> StoreResult<Recipe> {
        let mut conn = self.pool.acquire().await?;
        load_recipe(&mut conn, owner, recipe_id).await
    }

    async fn create_recipe(&self, owner: i64, new_recipe: NewRecipe) -> StoreResult<Recipe> {
        let new_recipe = &new_recipe;
        let recipe = retry_once("create_recipe", move || {
            self.insert_recipe(owner, new_recipe)
        })
        .await?;
        debug!(recipe_id = recipe.id, owner, "recipe created");
        Ok(recipe)
    }

    async fn update_recipe(
        &self,
        owner: i64,
        recipe_id: i64,
        changes: RecipeChanges,
    ) -> StoreResult<Recipe> {
        let changes = &changes;
        retry_once("update_recipe", move || {
            self.apply_recipe_changes(owner, recipe_id, changes)
        })
        .await
    }

    async fn delete_recipe(&self, owner: i64, recipe_id: i64) -> StoreResult<Option<String>> {
        sqlx::query_scalar::<_, Option<String>>(
            "DELETE FROM recipes WHERE id = $1 AND user_id = $2 RETURNING image",
        )
        .bind(recipe_id)
        .bind(owner)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound)
    }

    async fn set_recipe_image(
        &self,
        owner: i64,
        recipe_id: i64,
        image: &str,
    ) -> StoreResult<(Recipe, Option<String>)> {
        let mut tx = self.pool.begin().await?;
        let previous = lock_recipe(&mut tx, owner, recipe_id).await?;
        sqlx::query("UPDATE recipes SET image = $2 WHERE id = $1")
            .bind(recipe_id)
            .bind(image)
            .execute(&mut *tx)
            .await?;
        let recipe = load_recipe(&mut tx, owner, recipe_id).await?;
        tx.commit().await?;
        Ok((recipe, previous))
    }
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
