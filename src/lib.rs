pub mod db;
pub mod server;
pub mod services;
pub mod web;

use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::server::config::ServerConfig;
use crate::services::image_service::ImageManager;
use crate::web::AppState;

/// Prepares everything the router needs: creates the upload directory and
/// the database tables and loads the templates.
pub async fn build_state(
    db_pool: DatabaseConnection,
    config: Arc<ServerConfig>,
) -> Result<Arc<AppState>, Box<dyn std::error::Error + Send + Sync>> {
    let images = ImageManager::new(&config.upload_dir);
    images.ensure_dir().await?;

    db::create_schema(&db_pool).await?;

    let templates = Arc::new(web::templates::load_templates()?);

    Ok(Arc::new(AppState {
        db_pool,
        images,
        templates,
        config,
    }))
}
