//! Migration-script sources
//!
//! The loader only checks that the source points at bundled scripts and hands
//! them to a [`MigrationEngine`] along with the source's history table.

mod engine;

use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{info, instrument};

use crate::error::{LoaderError, LoaderResult};
use crate::loader::{SourceDescriptor, SourceOutcome, TypedLoader};
use crate::location::{Fetcher, Location, CLASSPATH_PREFIX};

pub use engine::{MigrationEngine, MigrationRequest, MigrationSummary, SqlxMigrationEngine};

pub const DEFAULT_HISTORY_TABLE: &str = "seedload_schema_history";

/// Existing schemas are baselined at this version
pub const BASELINE_VERSION: i64 = 0;

/// Loader for `migration` sources
pub struct MigrationLoader {
    pool: PgPool,
    fetcher: Arc<Fetcher>,
    engine: Arc<dyn MigrationEngine>,
}

impl MigrationLoader {
    pub fn new(pool: PgPool, fetcher: Arc<Fetcher>) -> Self {
        Self::with_engine(pool, fetcher, Arc::new(SqlxMigrationEngine))
    }

    pub fn with_engine(pool: PgPool, fetcher: Arc<Fetcher>, engine: Arc<dyn MigrationEngine>) -> Self {
        Self {
            pool,
            fetcher,
            engine,
        }
    }
}

#[async_trait]
impl TypedLoader for MigrationLoader {
    #[instrument(skip_all, fields(source = %source.path))]
    async fn load_data(&self, source: &SourceDescriptor) -> LoaderResult<SourceOutcome> {
        let scripts = match self.fetcher.locate(&source.path)? {
            Location::Resource(dir) => dir,
            _ => {
                return Err(LoaderError::config(format!(
                    "Migration source must use a {} location: {}",
                    CLASSPATH_PREFIX, source.path
                )))
            }
        };

        let history_table = source
            .history_table
            .as_deref()
            .unwrap_or(DEFAULT_HISTORY_TABLE);
        let summary = self
            .engine
            .migrate(
                &self.pool,
                MigrationRequest {
                    history_table,
                    baseline_version: BASELINE_VERSION,
                    scripts: &scripts,
                },
            )
            .await?;

        info!(
            "{}/{} migrations applied from {} source {}",
            summary.applied.len(),
            summary.available,
            source.kind,
            source.path
        );
        Ok(SourceOutcome {
            populated: summary.applied.len(),
            considered: summary.available,
            failures: Vec::new(),
        })
    }
}
