//! Configuration management

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::db::DbConfig;
use crate::error::LoaderResult;
use crate::loader::parse_group_list;

// ============================================================================
// Database Configuration Constants
// ============================================================================

/// Default database URL for local development.
pub const DEFAULT_DATABASE_URL: &str = "postgresql://localhost/seedload";

/// Default maximum database connections in the pool.
pub const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 5;

/// Default minimum database connections in the pool.
pub const DEFAULT_DATABASE_MIN_CONNECTIONS: u32 = 1;

/// Default database connection timeout in seconds.
pub const DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default database idle timeout in seconds (10 minutes).
pub const DEFAULT_DATABASE_IDLE_TIMEOUT_SECS: u64 = 600;

// ============================================================================
// Dataloader Configuration Constants
// ============================================================================

/// Default sources file.
pub const DEFAULT_SOURCES_FILE: &str = "resources/db/dataloader-sources.yml";

/// Default directory `classpath:` locations resolve against.
pub const DEFAULT_RESOURCE_ROOT: &str = "resources";

/// Default timeout for remote fetches in seconds.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub database: DbConfig,
    pub dataloader: DataloaderSettings,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataloaderSettings {
    pub sources_file: PathBuf,
    pub resource_root: PathBuf,
    /// Groups loaded by `autoload`
    pub autoload: BTreeSet<String>,
    pub http_timeout_secs: u64,
}

impl DataloaderSettings {
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

impl Config {
    /// Load configuration from `.env`, the environment and defaults
    pub fn load() -> LoaderResult<Self> {
        dotenvy::dotenv().ok();

        let config = Config {
            database: DbConfig {
                url: std::env::var("DATABASE_URL")
                    .unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string()),
                max_connections: env_or("DATABASE_MAX_CONNECTIONS", DEFAULT_DATABASE_MAX_CONNECTIONS),
                min_connections: env_or("DATABASE_MIN_CONNECTIONS", DEFAULT_DATABASE_MIN_CONNECTIONS),
                connect_timeout_secs: env_or(
                    "DATABASE_CONNECT_TIMEOUT",
                    DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS,
                ),
                idle_timeout_secs: Some(env_or(
                    "DATABASE_IDLE_TIMEOUT",
                    DEFAULT_DATABASE_IDLE_TIMEOUT_SECS,
                )),
            },
            dataloader: DataloaderSettings {
                sources_file: std::env::var("DATALOADER_SOURCES")
                    .unwrap_or_else(|_| DEFAULT_SOURCES_FILE.to_string())
                    .into(),
                resource_root: std::env::var("DATALOADER_RESOURCE_ROOT")
                    .unwrap_or_else(|_| DEFAULT_RESOURCE_ROOT.to_string())
                    .into(),
                autoload: std::env::var("DATALOADER_AUTOLOAD")
                    .map(|raw| parse_group_list(&raw))
                    .unwrap_or_default(),
                http_timeout_secs: env_or("DATALOADER_HTTP_TIMEOUT", DEFAULT_HTTP_TIMEOUT_SECS),
            },
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> LoaderResult<()> {
        self.database.validate()?;

        if self.dataloader.http_timeout_secs == 0 {
            return Err(crate::error::LoaderError::config(
                "DATALOADER_HTTP_TIMEOUT must be greater than 0",
            ));
        }

        if !self.dataloader.resource_root.is_dir() {
            tracing::warn!(
                resource_root = %self.dataloader.resource_root.display(),
                "Resource root is not a directory - classpath: sources will not resolve"
            );
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DbConfig {
                url: DEFAULT_DATABASE_URL.to_string(),
                max_connections: DEFAULT_DATABASE_MAX_CONNECTIONS,
                min_connections: DEFAULT_DATABASE_MIN_CONNECTIONS,
                connect_timeout_secs: DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS,
                idle_timeout_secs: Some(DEFAULT_DATABASE_IDLE_TIMEOUT_SECS),
            },
            dataloader: DataloaderSettings {
                sources_file: DEFAULT_SOURCES_FILE.into(),
                resource_root: DEFAULT_RESOURCE_ROOT.into(),
                autoload: BTreeSet::new(),
                http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            },
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}
