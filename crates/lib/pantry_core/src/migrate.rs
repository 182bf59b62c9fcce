//! Database migration support.
//!
//! Embeds and runs SQL migrations from `pantry_core/migrations/`.

use sqlx::PgPool;

use crate::StoreResult;

/// Run all embedded database migrations against the given pool.
pub async fn migrate(pool: &PgPool) -> StoreResult<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}
