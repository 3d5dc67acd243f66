use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

use crate::error::{LoaderError, LoaderResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
    pub idle_timeout_secs: Option<u64>,
}

impl DbConfig {
    pub fn validate(&self) -> LoaderResult<()> {
        if self.url.is_empty() {
            return Err(LoaderError::config("Database URL cannot be empty"));
        }
        if self.max_connections == 0 {
            return Err(LoaderError::config("Database max_connections must be greater than 0"));
        }
        if self.min_connections > self.max_connections {
            return Err(LoaderError::config(format!(
                "Database min_connections ({}) cannot be greater than max_connections ({})",
                self.min_connections, self.max_connections
            )));
        }
        Ok(())
    }
}

pub async fn create_pool(config: &DbConfig) -> LoaderResult<PgPool> {
    let mut options = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout_secs));

    if let Some(idle_timeout) = config.idle_timeout_secs {
        options = options.idle_timeout(Duration::from_secs(idle_timeout));
    }

    let pool = options.connect(&config.url).await?;

    tracing::info!(
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        "Database connection pool created"
    );

    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> DbConfig {
        DbConfig {
            url: "postgresql://localhost/seedload".to_string(),
            max_connections: 5,
            min_connections: 1,
            connect_timeout_secs: 10,
            idle_timeout_secs: None,
        }
    }

    #[test]
    fn test_validate() {
        assert!(config().validate().is_ok());

        let mut empty_url = config();
        empty_url.url.clear();
        assert!(empty_url.validate().is_err());

        let mut inverted = config();
        inverted.min_connections = 10;
        assert!(inverted.validate().is_err());
    }
}
