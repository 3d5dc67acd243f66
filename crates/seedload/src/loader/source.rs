//! Source descriptors and the sources configuration file

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;

use crate::error::{LoaderError, LoaderResult};

/// Kind of source, selecting the loader that handles it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Csv,
    #[serde(alias = "flyway")]
    Migration,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Csv => f.write_str("csv"),
            Self::Migration => f.write_str("migration"),
        }
    }
}

/// What to do when a previously loaded file has changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChecksumPolicy {
    /// Reload with upserts and record the new checksum
    #[default]
    Refresh,
    /// Abort the entry
    Fail,
}

/// Defaults applied to every CSV source that does not override them
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CsvDefaults {
    #[serde(default)]
    pub on_checksum_error: ChecksumPolicy,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LoaderDefaults {
    #[serde(default)]
    pub csv: CsvDefaults,
}

/// A source as written in the sources file
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSourceDescriptor {
    pub path: String,
    #[serde(rename = "type")]
    pub kind: SourceKind,
    #[serde(default)]
    pub groups: BTreeSet<String>,
    #[serde(default)]
    pub depends_on: BTreeSet<String>,
    pub on_checksum_error: Option<ChecksumPolicy>,
    pub includes: Option<BTreeSet<String>>,
    pub excludes: Option<BTreeSet<String>>,
    pub history_table: Option<String>,
}

/// A source with defaults applied, as handed to a loader
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDescriptor {
    pub path: String,
    pub kind: SourceKind,
    pub groups: BTreeSet<String>,
    pub depends_on: BTreeSet<String>,
    pub on_checksum_error: ChecksumPolicy,
    pub includes: BTreeSet<String>,
    pub excludes: BTreeSet<String>,
    pub history_table: Option<String>,
}

impl RawSourceDescriptor {
    pub fn new(path: impl Into<String>, kind: SourceKind) -> Self {
        Self {
            path: path.into(),
            kind,
            groups: BTreeSet::new(),
            depends_on: BTreeSet::new(),
            on_checksum_error: None,
            includes: None,
            excludes: None,
            history_table: None,
        }
    }

    pub fn with_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups = groups.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_depends_on<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on = groups.into_iter().map(Into::into).collect();
        self
    }

    /// Merge in the global defaults
    pub fn with_defaults(&self, defaults: &LoaderDefaults) -> SourceDescriptor {
        SourceDescriptor {
            path: self.path.clone(),
            kind: self.kind,
            groups: self.groups.clone(),
            depends_on: self.depends_on.clone(),
            on_checksum_error: self
                .on_checksum_error
                .unwrap_or(defaults.csv.on_checksum_error),
            includes: self.includes.clone().unwrap_or_default(),
            excludes: self.excludes.clone().unwrap_or_default(),
            history_table: self.history_table.clone(),
        }
    }

    pub fn in_any_group(&self, groups: &BTreeSet<String>) -> bool {
        !self.groups.is_disjoint(groups)
    }
}

/// Outcome of include/exclude filtering for a dataset entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    Selected,
    Excluded,
    NotIncluded,
}

impl SourceDescriptor {
    /// Filter an entry by its table or file name.
    ///
    /// Excludes win over includes. An empty include list selects everything.
    pub fn select(&self, table: &str, file: &str) -> Selection {
        if self.excludes.contains(table) || self.excludes.contains(file) {
            Selection::Excluded
        } else if !self.includes.is_empty()
            && !self.includes.contains(table)
            && !self.includes.contains(file)
        {
            Selection::NotIncluded
        } else {
            Selection::Selected
        }
    }
}

/// The sources file: global defaults plus sources in declaration order
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DataloaderConfig {
    #[serde(default)]
    pub defaults: LoaderDefaults,
    #[serde(default)]
    pub sources: Vec<RawSourceDescriptor>,
}

impl DataloaderConfig {
    pub fn from_yaml_str(yaml: &str, origin: &str) -> LoaderResult<Self> {
        serde_yaml::from_str(yaml).map_err(|cause| LoaderError::SourcesFile {
            path: origin.to_string(),
            cause,
        })
    }

    pub async fn from_file(path: &Path) -> LoaderResult<Self> {
        let yaml = tokio::fs::read_to_string(path)
            .await
            .map_err(|cause| LoaderError::Read {
                location: path.display().to_string(),
                cause,
            })?;
        Self::from_yaml_str(&yaml, &path.display().to_string())
    }
}
