//! # pantry_api
//!
//! HTTP API library for Pantry.

pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod media;
pub mod middleware;
pub mod serializers;

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post, put};
use pantry_core::store::Store;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;

use crate::config::ApiConfig;
use crate::handlers::attributes::{self, Ingredients, Tags};
use crate::handlers::{health, recipes, user};

/// Multipart framing allowance on top of the image size limit.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Persistence port.
    pub store: Arc<dyn Store>,
    /// API configuration.
    pub config: ApiConfig,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, config: ApiConfig) -> Self {
        Self { store, config }
    }
}

/// Builds the Axum router with all routes and shared state.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Public routes (no auth required)
    let public = Router::new()
        .route("/health", get(health::health_handler))
        .route("/user/create", post(user::create_user_handler))
        .route("/user/token", post(user::create_token_handler));

    // Protected routes (require auth)
    let upload_limit = DefaultBodyLimit::max(state.config.max_upload_bytes + MULTIPART_OVERHEAD);
    let protected = Router::new()
        .route(
            "/user/me",
            get(user::get_me_handler)
                .put(user::replace_me_handler)
                .patch(user::update_me_handler)
                .delete(user::delete_me_handler),
        )
        .route(
            "/recipes",
            get(recipes::list_recipes_handler).post(recipes::create_recipe_handler),
        )
        .route(
            "/recipes/{id}",
            get(recipes::get_recipe_handler)
                .put(recipes::replace_recipe_handler)
                .patch(recipes::update_recipe_handler)
                .delete(recipes::delete_recipe_handler),
        )
        .route(
            "/recipes/{id}/upload-image",
            post(recipes::upload_recipe_image_handler).layer(upload_limit),
        )
        .route("/tags", get(attributes::list_attributes_handler::<Tags>))
        .route(
            "/tags/{id}",
            put(attributes::replace_attribute_handler::<Tags>)
                .patch(attributes::update_attribute_handler::<Tags>)
                .delete(attributes::delete_attribute_handler::<Tags>),
        )
        .route(
            "/ingredients",
            get(attributes::list_attributes_handler::<Ingredients>),
        )
        .route(
            "/ingredients/{id}",
            put(attributes::replace_attribute_handler::<Ingredients>)
                .patch(attributes::update_attribute_handler::<Ingredients>)
                .delete(attributes::delete_attribute_handler::<Ingredients>),
        )
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_auth,
        ));

    let api = public.merge(protected);
    let prefix = state.config.normalized_prefix();
    let app = if prefix.is_empty() {
        api
    } else {
        Router::new().nest(&prefix, api)
    };

    app.nest_service("/media", ServeDir::new(&state.config.media_root))
        .layer(cors)
        .with_state(state)
}
