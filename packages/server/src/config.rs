use std::path::PathBuf;
use std::time::Duration;

use common::retry::RetryPolicy;
use common::storage::s3::S3Settings;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::coordinator::MediaPolicy;

#[derive(Debug, Deserialize, Clone)]
pub struct CorsConfig {
    #[serde(default)]
    pub allow_origins: Vec<String>,
    #[serde(default = "default_cors_max_age")]
    pub max_age: u64,
}

fn default_cors_max_age() -> u64 {
    3600
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allow_origins: Vec::new(),
            max_age: default_cors_max_age(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub cors: CorsConfig,
    /// Upper bound for a whole multipart request body.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_max_body_bytes() -> usize {
    64 * 1024 * 1024
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    #[serde(default = "default_db_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_db_timeout_secs")]
    pub acquire_timeout_secs: u64,
    #[serde(default)]
    pub idle_timeout_secs: Option<u64>,
    #[serde(default)]
    pub max_lifetime_secs: Option<u64>,
    #[serde(default)]
    pub sqlx_logging: bool,
}

fn default_max_connections() -> u32 {
    20
}
fn default_min_connections() -> u32 {
    1
}
fn default_db_timeout_secs() -> u64 {
    8
}

impl DatabaseConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            connect_timeout_secs: default_db_timeout_secs(),
            acquire_timeout_secs: default_db_timeout_secs(),
            idle_timeout_secs: None,
            max_lifetime_secs: None,
            sqlx_logging: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    S3,
    Filesystem,
    Memory,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Required when `backend = "s3"`.
    #[serde(default)]
    pub s3: Option<S3Settings>,
    /// Root directory when `backend = "filesystem"`.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Public URL prefix for the filesystem and memory backends.
    #[serde(default = "default_public_url")]
    pub public_url: String,
    /// Bound on every single blob call, independent of database timeouts.
    #[serde(default = "default_operation_timeout_secs")]
    pub operation_timeout_secs: u64,
    /// Retry schedule for compensating deletes.
    #[serde(default)]
    pub compensation_retry: RetryPolicy,
}

fn default_public_url() -> String {
    "http://127.0.0.1:3000/media".into()
}
fn default_operation_timeout_secs() -> u64 {
    30
}

impl StorageConfig {
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LikeConfig {
    /// Attempts before a contended toggle is reported as a conflict.
    #[serde(default = "default_toggle_attempts")]
    pub max_attempts: u32,
}

fn default_toggle_attempts() -> u32 {
    5
}

impl Default for LikeConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_toggle_attempts(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub media: MediaPolicy,
    #[serde(default)]
    pub likes: LikeConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let config_path =
            std::env::var("CATALOG_CONFIG").unwrap_or_else(|_| "config/config".to_string());

        let s = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 3000)?
            .set_default("storage.backend", "filesystem")?
            .set_default("storage.path", "./media")?
            // Load from config/config.toml
            .add_source(File::with_name(&config_path).required(false))
            // Override from environment (e.g., CATALOG__AUTH__JWT_SECRET)
            .add_source(Environment::with_prefix("CATALOG").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
