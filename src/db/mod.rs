pub mod entities;
pub mod enums;
pub mod services;

use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, Schema};
use tracing::info;

use crate::db::entities::{idea, user};

/// Opens the connection pool for `database_url`.
pub async fn connect(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    let mut opt = ConnectOptions::new(database_url.to_owned());
    opt.max_connections(10).sqlx_logging(false);
    if database_url.starts_with("sqlite") && database_url.contains(":memory:") {
        // every pooled connection would otherwise see its own empty database
        opt.max_connections(1).min_connections(1);
    }
    Database::connect(opt).await
}

/// Creates the `users` and `ideas` tables if they do not exist yet.
pub async fn create_schema(db: &DatabaseConnection) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    let mut users = schema.create_table_from_entity(user::Entity);
    users.if_not_exists();
    db.execute(backend.build(&users)).await?;

    let mut ideas = schema.create_table_from_entity(idea::Entity);
    ideas.if_not_exists();
    db.execute(backend.build(&ideas)).await?;

    info!("Database schema is ready.");
    Ok(())
}
