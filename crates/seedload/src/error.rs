//! Loader error types

use std::fmt;
use thiserror::Error;

use crate::loader::SourceKind;

/// Result type alias for loader operations
pub type LoaderResult<T> = std::result::Result<T, LoaderError>;

/// Errors raised while resolving, fetching and loading sources
#[derive(Error, Debug)]
pub enum LoaderError {
    /// Static configuration is invalid
    #[error("Configuration error: {0}")]
    Config(String),

    /// A column declaration carries a type suffix outside the known set
    #[error("Unknown column type: {type_tag} ({declaration})")]
    UnknownColumnType {
        type_tag: String,
        declaration: String,
    },

    /// The registry has no loader for the source's kind
    #[error("No dataloader registered for '{kind}': {path}")]
    NoLoaderRegistered { kind: SourceKind, path: String },

    /// Sources file could not be parsed
    #[error("Invalid sources configuration {path}: {cause}")]
    SourcesFile {
        path: String,
        #[source]
        cause: serde_yaml::Error,
    },

    /// Table manifest could not be parsed. Fails only its source.
    #[error("Invalid manifest {location}: {cause}")]
    Manifest {
        location: String,
        #[source]
        cause: serde_yaml::Error,
    },

    /// Content changed under the FAIL policy
    #[error("Checksum validation failed for {url}")]
    ChecksumValidation { url: String },

    /// A data row could not be converted or inserted
    #[error("Error in {file}:{line} - {message}")]
    Row {
        file: String,
        line: usize,
        message: String,
    },

    /// Local content could not be read
    #[error("Failed to read {location}: {cause}")]
    Read {
        location: String,
        #[source]
        cause: std::io::Error,
    },

    /// Remote content could not be fetched
    #[error("Failed to fetch {url}: {cause}")]
    Http {
        url: String,
        #[source]
        cause: reqwest::Error,
    },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// An applied migration script was edited afterwards
    #[error("Migration {version} in {history_table} was modified after it was applied")]
    MigrationChecksumMismatch { version: i64, history_table: String },

    /// One or more entries or sources failed while the rest were loaded
    #[error("{} load failure(s): {}", .failures.len(), summarize(.failures))]
    Incomplete { failures: Vec<EntryFailure> },
}

impl LoaderError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a row error for a 1-based line of a file
    pub fn row(file: impl Into<String>, line: usize, message: impl fmt::Display) -> Self {
        Self::Row {
            file: file.into(),
            line,
            message: message.to_string(),
        }
    }

    /// Configuration errors abort the whole load instead of a single entry
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Config(_)
                | Self::UnknownColumnType { .. }
                | Self::NoLoaderRegistered { .. }
                | Self::SourcesFile { .. }
        )
    }
}

/// A failure isolated to one source or one of its entries
#[derive(Debug)]
pub struct EntryFailure {
    pub source_path: String,
    /// `None` when the whole source failed
    pub table: Option<String>,
    pub error: LoaderError,
}

impl EntryFailure {
    pub fn source(source_path: impl Into<String>, error: LoaderError) -> Self {
        Self {
            source_path: source_path.into(),
            table: None,
            error,
        }
    }

    pub fn entry(source_path: impl Into<String>, table: impl Into<String>, error: LoaderError) -> Self {
        Self {
            source_path: source_path.into(),
            table: Some(table.into()),
            error,
        }
    }
}

impl fmt::Display for EntryFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.table {
            Some(table) => write!(f, "{} ({}): {}", table, self.source_path, self.error),
            None => write!(f, "{}: {}", self.source_path, self.error),
        }
    }
}

fn summarize(failures: &[EntryFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_error_names_file_and_line() {
        let err = LoaderError::row("people.csv", 3, "cannot parse 'abc' as int");
        assert_eq!(err.to_string(), "Error in people.csv:3 - cannot parse 'abc' as int");
        assert!(!err.is_configuration());
    }

    #[test]
    fn test_configuration_classification() {
        assert!(LoaderError::config("bad").is_configuration());
        assert!(LoaderError::UnknownColumnType {
            type_tag: "uuid".into(),
            declaration: "id:uuid".into(),
        }
        .is_configuration());
        assert!(!LoaderError::ChecksumValidation { url: "x".into() }.is_configuration());
    }

    #[test]
    fn test_incomplete_lists_failures() {
        let err = LoaderError::Incomplete {
            failures: vec![
                EntryFailure::entry(
                    "classpath:db/ref",
                    "carriers",
                    LoaderError::ChecksumValidation {
                        url: "classpath:db/ref/carriers.csv".into(),
                    },
                ),
                EntryFailure::source("classpath:db/other", LoaderError::config("boom")),
            ],
        };
        let message = err.to_string();
        assert!(message.starts_with("2 load failure(s): carriers (classpath:db/ref)"));
        assert!(message.contains("classpath:db/other: Configuration error: boom"));
    }
}
