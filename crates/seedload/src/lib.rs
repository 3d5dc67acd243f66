//! Seedload
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Declarative dataset loader for PostgreSQL.
//!
//! # Overview
//!
//! Sources are declared in a YAML file and tagged with groups. A request for a
//! set of groups loads every source in the dependency closure of those groups,
//! in declaration order:
//!
//! - **CSV sources**: a `csvloader.yml` manifest mapping files onto tables.
//!   Each file is loaded in its own transaction and its SHA3-256 checksum is
//!   recorded in `csvloader_history`, so unchanged files are skipped and
//!   changed files are reloaded with upserts (or rejected, per source policy).
//! - **Migration sources**: versioned SQL scripts applied through a
//!   [`migration::MigrationEngine`], tracked in a per-source history table.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use seedload::{config::Config, db, loader::{parse_group_list, Dataloader, DataloaderConfig}, location::Fetcher};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     let pool = db::create_pool(&config.database).await?;
//!     let sources = DataloaderConfig::from_file(&config.dataloader.sources_file).await?;
//!     let fetcher = Arc::new(Fetcher::new(
//!         &config.dataloader.resource_root,
//!         config.dataloader.http_timeout(),
//!     )?);
//!
//!     let loader = Dataloader::builder(sources)
//!         .with_default_loaders(pool, fetcher)
//!         .build();
//!     loader.load_data(&parse_group_list("ref,sample")).await?;
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod csv;
pub mod db;
pub mod error;
pub mod loader;
pub mod location;
pub mod migration;

pub use error::{EntryFailure, LoaderError, LoaderResult};
