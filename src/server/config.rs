use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Fallback used when `SECRET_KEY` is not configured. Fine for local use only.
pub const DEFAULT_SECRET_KEY: &str = "idea-board-development-secret";

#[derive(Deserialize, Debug, Clone)]
pub struct ServerConfig {
    pub secret_key: String,
    pub database_url: String,
    pub upload_dir: String,
    pub listen_addr: String,
    pub log_dir: String,
    pub max_upload_bytes: usize,
    pub bcrypt_cost: u32,
}

// Partial config for layering
#[derive(Deserialize, Default, Debug)]
struct PartialServerConfig {
    secret_key: Option<String>,
    database_url: Option<String>,
    upload_dir: Option<String>,
    listen_addr: Option<String>,
    log_dir: Option<String>,
    max_upload_bytes: Option<usize>,
    bcrypt_cost: Option<u32>,
}

fn default_database_url() -> String {
    "sqlite://ideas.db?mode=rwc".to_string()
}

fn default_upload_dir() -> String {
    "static/uploads".to_string()
}

fn default_listen_addr() -> String {
    "127.0.0.1:5000".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

fn default_max_upload_bytes() -> usize {
    16 * 1024 * 1024
}

impl ServerConfig {
    /// Loads the optional TOML file at `config_path`, then lets environment
    /// variables (including a `.env` file) override it.
    pub fn load(config_path: Option<&str>) -> Result<Self, String> {
        dotenv::dotenv().ok();

        let file_config = match config_path {
            Some(path_str) => {
                let path = Path::new(path_str);
                if path.exists() {
                    let contents = fs::read_to_string(path)
                        .map_err(|e| format!("Failed to read config file at {path:?}: {e}"))?;
                    toml::from_str(&contents)
                        .map_err(|e| format!("Failed to parse TOML from config file at {path:?}: {e}"))?
                } else {
                    PartialServerConfig::default()
                }
            }
            None => PartialServerConfig::default(),
        };

        let env_config: PartialServerConfig = envy::from_env::<PartialServerConfig>()
            .map_err(|e| format!("Failed to load config from environment: {e}"))?;

        Self::merge(env_config, file_config)
    }

    fn merge(env_config: PartialServerConfig, file_config: PartialServerConfig) -> Result<Self, String> {
        let bcrypt_cost = env_config
            .bcrypt_cost
            .or(file_config.bcrypt_cost)
            .unwrap_or(bcrypt::DEFAULT_COST);
        if !(4..=31).contains(&bcrypt_cost) {
            return Err(format!("BCRYPT_COST must be between 4 and 31, got {bcrypt_cost}"));
        }

        Ok(ServerConfig {
            secret_key: env_config.secret_key.or(file_config.secret_key)
                .unwrap_or_else(|| DEFAULT_SECRET_KEY.to_string()),
            database_url: env_config.database_url.or(file_config.database_url)
                .unwrap_or_else(default_database_url),
            upload_dir: env_config.upload_dir.or(file_config.upload_dir)
                .unwrap_or_else(default_upload_dir),
            listen_addr: env_config.listen_addr.or(file_config.listen_addr)
                .unwrap_or_else(default_listen_addr),
            log_dir: env_config.log_dir.or(file_config.log_dir)
                .unwrap_or_else(default_log_dir),
            max_upload_bytes: env_config.max_upload_bytes.or(file_config.max_upload_bytes)
                .unwrap_or_else(default_max_upload_bytes),
            bcrypt_cost,
        })
    }

    pub fn uses_default_secret(&self) -> bool {
        self.secret_key == DEFAULT_SECRET_KEY
    }
}
