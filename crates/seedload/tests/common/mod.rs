//! Shared fixtures for database tests
#![allow(dead_code)]

use seedload::loader::{Dataloader, DataloaderConfig};
use seedload::location::Fetcher;
use seedload::{LoaderError, LoaderResult};
use sqlx::PgPool;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// A throwaway resource root that `classpath:` locations resolve against
pub struct Fixture {
    dir: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("create temp dir"),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Write a file below the root, creating parent directories
    pub fn write(&self, relative: &str, contents: &str) {
        let path = self.dir.path().join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create fixture dir");
        }
        std::fs::write(path, contents).expect("write fixture file");
    }

    pub fn dataloader(&self, pool: &PgPool, sources_yaml: &str) -> Dataloader {
        let config = DataloaderConfig::from_yaml_str(sources_yaml, "test").expect("valid sources");
        let fetcher = Arc::new(Fetcher::new(self.root(), Duration::from_secs(5)).expect("fetcher"));
        Dataloader::builder(config)
            .with_default_loaders(pool.clone(), fetcher)
            .build()
    }
}

pub async fn execute(pool: &PgPool, sql: &str) {
    sqlx::raw_sql(sql).execute(pool).await.expect("fixture sql");
}

pub async fn count(pool: &PgPool, table: &str) -> i64 {
    sqlx::query_scalar(&format!("SELECT count(*) FROM {}", table))
        .fetch_one(pool)
        .await
        .expect("count rows")
}

pub fn groups(raw: &str) -> std::collections::BTreeSet<String> {
    seedload::loader::parse_group_list(raw)
}

/// Unwrap the collected failures of an incomplete load
pub fn failures<T: std::fmt::Debug>(result: LoaderResult<T>) -> Vec<seedload::EntryFailure> {
    match result {
        Err(LoaderError::Incomplete { failures }) => failures,
        other => panic!("expected an incomplete load, got {:?}", other),
    }
}
