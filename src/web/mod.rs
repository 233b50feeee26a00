use axum::{
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::get,
    Router,
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tera::Tera;
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::server::config::ServerConfig;
use crate::services::image_service::ImageManager;
use crate::web::{middleware::auth, routes::*};

pub use crate::web::error::AppError;

pub mod error;
pub mod flash;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod templates;

#[derive(Clone)]
pub struct AppState {
    pub db_pool: DatabaseConnection,
    pub images: ImageManager,
    pub templates: Arc<Tera>,
    pub config: Arc<ServerConfig>,
}

async fn health_check_handler() -> &'static str {
    "OK"
}

pub fn create_axum_router(app_state: Arc<AppState>) -> Router {
    let upload_dir = app_state.images.dir().to_path_buf();
    let max_upload_bytes = app_state.config.max_upload_bytes;

    Router::new()
        .route("/health", get(health_check_handler))
        .merge(
            idea_routes::create_protected_router()
                .route_layer(axum_middleware::from_fn_with_state(app_state.clone(), auth::auth)),
        )
        .merge(
            idea_routes::create_public_router()
                .merge(auth_routes::create_auth_router())
                .route_layer(axum_middleware::from_fn_with_state(app_state.clone(), auth::optional_auth)),
        )
        .nest_service("/uploads", ServeDir::new(upload_dir))
        .with_state(app_state)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
}
