//! Pantry API server binary.
//!
//! Connects the configured store, runs migrations when backed by PostgreSQL,
//! and serves the API until interrupted.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use pantry_api::config::ApiConfig;
use pantry_core::store::{MemoryStore, PgStore, Store};
use sqlx::postgres::PgPoolOptions;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Persistence backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Storage {
    /// PostgreSQL via `--database-url`.
    Postgres,
    /// Process-local and ephemeral; for local development.
    Memory,
}

/// CLI arguments for the API server.
#[derive(Parser, Debug)]
#[command(name = "pantry_server", about = "Pantry recipe API server")]
struct Args {
    /// Address to listen on.
    #[arg(long, env = "BIND_ADDR", default_value = "127.0.0.1:8000")]
    bind_addr: String,

    /// Storage backend.
    #[arg(long, env = "PANTRY_STORAGE", value_enum, default_value_t = Storage::Postgres)]
    storage: Storage,

    /// PostgreSQL connection URL.
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "postgres://localhost:5432/pantry"
    )]
    database_url: String,

    /// Maximum number of database connections in the pool.
    #[arg(long, default_value_t = 5)]
    max_connections: u32,

    /// Directory uploaded images are written to.
    #[arg(long, env = "PANTRY_MEDIA_ROOT", default_value = "media")]
    media_root: PathBuf,

    /// Path prefix for API routes.
    #[arg(long, default_value = "/api")]
    api_prefix: String,

    /// Largest accepted image upload in bytes.
    #[arg(long, default_value_t = 10 * 1024 * 1024)]
    max_upload_bytes: usize,

    /// Minimum password length for accounts.
    #[arg(long, default_value_t = 5)]
    min_password_length: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new("info,pantry_api=debug,pantry_core=debug")
            }),
        )
        .init();

    let args = Args::parse();

    info!(storage = ?args.storage, bind_addr = %args.bind_addr, "starting pantry_server");

    let store: Arc<dyn Store> = match args.storage {
        Storage::Postgres => {
            info!(
                max_connections = args.max_connections,
                "configuring connection pool"
            );
            let pool = PgPoolOptions::new()
                .max_connections(args.max_connections)
                .acquire_timeout(Duration::from_secs(30))
                .connect(&args.database_url)
                .await?;

            info!("running database migrations");
            pantry_core::migrate::migrate(&pool).await?;
            Arc::new(PgStore::new(pool))
        }
        Storage::Memory => {
            warn!("using in-memory storage; data is lost on exit");
            Arc::new(MemoryStore::new())
        }
    };

    tokio::fs::create_dir_all(&args.media_root).await?;

    let config = ApiConfig {
        bind_addr: args.bind_addr,
        api_prefix: args.api_prefix,
        media_root: args.media_root,
        max_upload_bytes: args.max_upload_bytes,
        min_password_length: args.min_password_length,
    };

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    let local_addr = listener.local_addr()?;

    let app = pantry_api::router(pantry_api::AppState::new(store, config))
        .layer(TraceLayer::new_for_http());

    info!(addr = %local_addr, "REST API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for ctrl-c: {e}");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
