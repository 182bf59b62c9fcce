//! Request handlers.

pub mod attributes;
pub mod health;
pub mod recipes;
pub mod user;
