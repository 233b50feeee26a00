use clap::{Parser, Subcommand};
use idea_board::db::{self, services::UserService};
use idea_board::server::{config::ServerConfig, logging::init_logging};
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the web server (default)
    Serve,
    /// Give an existing user the admin flag
    GrantAdmin {
        username: String,
    },
    /// Remove the admin flag from a user
    RevokeAdmin {
        username: String,
    },
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal.");
    }
    info!("Shutdown signal received.");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = Args::parse();

    let server_config = match ServerConfig::load(args.config.as_deref()) {
        Ok(config) => Arc::new(config),
        Err(e) => {
            eprintln!("Failed to load server configuration: {e}");
            return Err(e.into());
        }
    };

    let _log_guard = init_logging(&server_config.log_dir);
    info!(version = env!("CARGO_PKG_VERSION"), "Starting idea board.");

    let db_pool = db::connect(&server_config.database_url).await?;

    match args.command.unwrap_or(Command::Serve) {
        Command::GrantAdmin { username } => {
            db::create_schema(&db_pool).await?;
            let user = UserService::set_admin(&db_pool, &username, true).await?;
            info!(user_id = user.id, %username, "Admin flag granted.");
            Ok(())
        }
        Command::RevokeAdmin { username } => {
            db::create_schema(&db_pool).await?;
            let user = UserService::set_admin(&db_pool, &username, false).await?;
            info!(user_id = user.id, %username, "Admin flag revoked.");
            Ok(())
        }
        Command::Serve => serve(db_pool, server_config).await,
    }
}

async fn serve(
    db_pool: sea_orm::DatabaseConnection,
    server_config: Arc<ServerConfig>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    if server_config.uses_default_secret() {
        warn!("SECRET_KEY is not set; using the built-in development key.");
    }

    let app_state = idea_board::build_state(db_pool, server_config.clone()).await?;
    let app = idea_board::web::create_axum_router(app_state);

    let listener = tokio::net::TcpListener::bind(&server_config.listen_addr).await?;
    info!(address = %server_config.listen_addr, "HTTP server listening.");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
