//! Top-level load entry point

use sqlx::PgPool;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

use crate::csv::{ChecksumTracker, CsvLoader};
use crate::error::{EntryFailure, LoaderError, LoaderResult};
use crate::loader::resolver::{find_cycle, resolve};
use crate::loader::source::{DataloaderConfig, SourceKind};
use crate::loader::TypedLoader;
use crate::location::Fetcher;
use crate::migration::MigrationLoader;

/// What a successful `load_data` call did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub requested: BTreeSet<String>,
    pub resolved: BTreeSet<String>,
    /// Paths of sources handed to a loader, in declaration order
    pub dispatched: Vec<String>,
    /// Paths of sources outside the resolved groups
    pub skipped: Vec<String>,
}

/// Loads sources by group
pub struct Dataloader {
    config: DataloaderConfig,
    autoload: BTreeSet<String>,
    loaders: HashMap<SourceKind, Arc<dyn TypedLoader>>,
}

pub struct DataloaderBuilder {
    config: DataloaderConfig,
    autoload: BTreeSet<String>,
    loaders: HashMap<SourceKind, Arc<dyn TypedLoader>>,
}

impl DataloaderBuilder {
    pub fn autoload(mut self, groups: BTreeSet<String>) -> Self {
        self.autoload = groups;
        self
    }

    /// Register the loader for a kind, replacing any previous one
    pub fn register(mut self, kind: SourceKind, loader: Arc<dyn TypedLoader>) -> Self {
        self.loaders.insert(kind, loader);
        self
    }

    /// Register the CSV and migration loaders
    pub fn with_default_loaders(self, pool: PgPool, fetcher: Arc<Fetcher>) -> Self {
        let tracker = Arc::new(ChecksumTracker::new(pool.clone()));
        let csv = CsvLoader::new(pool.clone(), fetcher.clone(), tracker);
        let migration = MigrationLoader::new(pool, fetcher);

        self.register(SourceKind::Csv, Arc::new(csv))
            .register(SourceKind::Migration, Arc::new(migration))
    }

    pub fn build(self) -> Dataloader {
        Dataloader {
            config: self.config,
            autoload: self.autoload,
            loaders: self.loaders,
        }
    }
}

impl Dataloader {
    pub fn builder(config: DataloaderConfig) -> DataloaderBuilder {
        DataloaderBuilder {
            config,
            autoload: BTreeSet::new(),
            loaders: HashMap::new(),
        }
    }

    pub fn config(&self) -> &DataloaderConfig {
        &self.config
    }

    /// Effective groups for a request
    pub fn resolve(&self, requested: &BTreeSet<String>) -> BTreeSet<String> {
        resolve(requested, &self.config.sources)
    }

    /// Load the groups configured for startup
    pub async fn autoload(&self) -> LoaderResult<LoadReport> {
        if self.autoload.is_empty() {
            debug!("No autoload groups configured");
        }
        self.load_data(&self.autoload).await
    }

    /// Load every source in the closure of the requested groups.
    ///
    /// Sources run in declaration order. A configuration error stops the run;
    /// other failures are collected and reported once all sources ran.
    #[instrument(skip(self))]
    pub async fn load_data(&self, requested: &BTreeSet<String>) -> LoaderResult<LoadReport> {
        if let Some(cycle) = find_cycle(&self.config.sources) {
            warn!(cycle = %cycle.join(" -> "), "Group dependency cycle");
        }

        let resolved = self.resolve(requested);
        info!(groups = ?resolved, "Resolved groups");

        let mut report = LoadReport {
            requested: requested.clone(),
            resolved,
            ..LoadReport::default()
        };
        let mut failures: Vec<EntryFailure> = Vec::new();

        for raw in &self.config.sources {
            if !raw.in_any_group(&report.resolved) {
                debug!(source = %raw.path, groups = ?raw.groups, "Not in requested groups");
                report.skipped.push(raw.path.clone());
                continue;
            }

            let source = raw.with_defaults(&self.config.defaults);
            let loader = self
                .loaders
                .get(&source.kind)
                .ok_or_else(|| LoaderError::NoLoaderRegistered {
                    kind: source.kind,
                    path: source.path.clone(),
                })?;

            debug!(source = %source.path, kind = %source.kind, "Dispatching");
            report.dispatched.push(source.path.clone());

            match loader.load_data(&source).await {
                Ok(outcome) => failures.extend(outcome.failures),
                Err(e) if e.is_configuration() => return Err(e),
                Err(e) => {
                    error!(source = %source.path, error = %e, "Failed to load source");
                    failures.push(EntryFailure::source(&source.path, e));
                }
            }
        }

        if failures.is_empty() {
            Ok(report)
        } else {
            Err(LoaderError::Incomplete { failures })
        }
    }
}
