//! Source dispatch and group resolution

pub mod orchestrator;
pub mod resolver;
pub mod source;

use async_trait::async_trait;
use std::collections::BTreeSet;

use crate::error::{EntryFailure, LoaderResult};

pub use orchestrator::{Dataloader, DataloaderBuilder, LoadReport};
pub use resolver::{find_cycle, resolve};
pub use source::{
    ChecksumPolicy, DataloaderConfig, LoaderDefaults, RawSourceDescriptor, Selection,
    SourceDescriptor, SourceKind,
};

/// Result of loading one source
#[derive(Debug, Default)]
pub struct SourceOutcome {
    /// Tables or migrations actually written
    pub populated: usize,
    /// Tables or migrations the source declares
    pub considered: usize,
    /// Entries that failed while siblings continued
    pub failures: Vec<EntryFailure>,
}

/// Loads one kind of source
#[async_trait]
pub trait TypedLoader: Send + Sync {
    /// Load a source. Configuration errors are returned as `Err`; failures
    /// confined to single entries are collected in the outcome.
    async fn load_data(&self, source: &SourceDescriptor) -> LoaderResult<SourceOutcome>;
}

/// Split a comma-separated group list, trimming and dropping empty names
pub fn parse_group_list(raw: &str) -> BTreeSet<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|g| !g.is_empty())
        .map(String::from)
        .collect()
}
