//! # pantry_core
//!
//! Core domain logic for Pantry: entities, credential handling, query
//! specifications and the persistence port with its adapters.

pub mod auth;
pub mod error;
pub mod migrate;
pub mod models;
pub mod query;
pub mod store;

pub use error::{StoreError, StoreResult};

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
