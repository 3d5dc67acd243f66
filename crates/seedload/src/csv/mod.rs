//! CSV-backed sources
//!
//! A CSV source is a directory holding a `csvloader.yml` manifest and the files
//! it lists. Each manifest entry loads one file into one table inside a single
//! transaction, and records the file's checksum so unchanged files are skipped
//! on the next run.

pub mod columns;
pub mod history;
pub mod manifest;
pub mod statement;

use async_trait::async_trait;
use ::csv::{Position, ReaderBuilder, StringRecord};
use seedload_common::checksum::sha3_hex;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, trace, warn};

use crate::error::{EntryFailure, LoaderError, LoaderResult};
use crate::loader::{Selection, SourceDescriptor, SourceOutcome, TypedLoader};
use crate::location::{self, Fetcher};

pub use columns::{normalize_name, parse_column, parse_columns, ColumnDef, ScalarType, ScalarValue};
pub use history::{decide_against, ChecksumTracker, Decision, HistoryRecord, HISTORY_TABLE};
pub use manifest::{CsvManifest, DatasetDefaults, DatasetEntry, RawDatasetEntry, MANIFEST_FILE};
pub use statement::{PostgresStatements, StatementBuilder};

/// Loader for `csv` sources
pub struct CsvLoader {
    pool: PgPool,
    fetcher: Arc<Fetcher>,
    tracker: Arc<ChecksumTracker>,
    statements: Arc<dyn StatementBuilder>,
}

impl CsvLoader {
    pub fn new(pool: PgPool, fetcher: Arc<Fetcher>, tracker: Arc<ChecksumTracker>) -> Self {
        Self {
            pool,
            fetcher,
            tracker,
            statements: Arc::new(PostgresStatements),
        }
    }

    /// Load one entry. Returns whether the table was written.
    #[instrument(skip_all, fields(table = %entry.table, file = %entry.file))]
    async fn load_entry(&self, source: &SourceDescriptor, entry: &DatasetEntry) -> LoaderResult<bool> {
        let url = location::join(&source.path, &entry.file);
        let content = self.fetcher.fetch(&url).await?;
        let checksum = sha3_hex(&content);

        let decision = self
            .tracker
            .decide(&entry.table, &url, &checksum, source.on_checksum_error)
            .await?;
        if decision == Decision::Skip {
            trace!("Unchanged since last load");
            return Ok(false);
        }

        let rows = self
            .populate(entry, &url, &content, &checksum, decision.is_refresh())
            .await?;
        debug!(rows, refresh = decision.is_refresh(), "Table populated");
        Ok(true)
    }

    /// Insert every row of the file and record the load, all in one transaction
    async fn populate(
        &self,
        entry: &DatasetEntry,
        url: &str,
        content: &[u8],
        checksum: &str,
        refresh: bool,
    ) -> LoaderResult<i32> {
        let mut records = numbered_records(content).into_iter();

        let Some((first_line, first)) = records.next() else {
            warn!(file = %entry.file, "Empty file, nothing to load");
            let mut tx = self.pool.begin().await?;
            self.tracker
                .record(&mut tx, &entry.table, url, checksum, 0)
                .await?;
            tx.commit().await?;
            return Ok(0);
        };

        let (header, pending) = if entry.has_header {
            let header = first.map_err(|e| LoaderError::row(&entry.file, first_line, e))?;
            (Some(header), None)
        } else {
            (None, Some((first_line, first)))
        };

        let columns = resolve_columns(entry, header.as_ref())?;
        let sql = self.statements.build(
            &entry.table,
            &columns,
            entry.primary_key.as_deref(),
            refresh,
        );
        trace!(%sql, "Row statement");

        let mut tx = self.pool.begin().await?;
        let mut rows: i32 = 0;

        for (line, record) in pending.into_iter().chain(records) {
            let record = record.map_err(|e| LoaderError::row(&entry.file, line, e))?;
            let values = row_values(entry, &columns, &record)
                .map_err(|message| LoaderError::row(&entry.file, line, message))?;

            let query = values
                .into_iter()
                .fold(sqlx::query(&sql), |query, value| value.bind_to(query));
            query
                .execute(&mut *tx)
                .await
                .map_err(|e| LoaderError::row(&entry.file, line, e))?;
            rows += 1;
        }

        self.tracker
            .record(&mut tx, &entry.table, url, checksum, rows)
            .await?;
        tx.commit().await?;
        Ok(rows)
    }
}

#[async_trait]
impl TypedLoader for CsvLoader {
    #[instrument(skip_all, fields(source = %source.path))]
    async fn load_data(&self, source: &SourceDescriptor) -> LoaderResult<SourceOutcome> {
        let manifest_url = location::join(&source.path, MANIFEST_FILE);
        let bytes = self.fetcher.fetch(&manifest_url).await?;
        let manifest = CsvManifest::from_slice(&bytes, &manifest_url)?;

        let mut outcome = SourceOutcome {
            considered: manifest.tables.len(),
            ..SourceOutcome::default()
        };

        for entry in &manifest.tables {
            match source.select(&entry.table, &entry.file) {
                Selection::Selected => {}
                Selection::Excluded => {
                    trace!(table = %entry.table, "Excluded");
                    continue;
                }
                Selection::NotIncluded => {
                    trace!(table = %entry.table, "Not in include list");
                    continue;
                }
            }

            match self.load_entry(source, entry).await {
                Ok(true) => outcome.populated += 1,
                Ok(false) => {}
                Err(e) if e.is_configuration() => return Err(e),
                Err(e) => {
                    error!(table = %entry.table, error = %e, "Failed to load table");
                    // Changed content under FAIL stops the rest of the source for review
                    let stop = matches!(e, LoaderError::ChecksumValidation { .. });
                    outcome
                        .failures
                        .push(EntryFailure::entry(&source.path, &entry.table, e));
                    if stop {
                        warn!(source = %source.path, "Skipping remaining tables after checksum violation");
                        break;
                    }
                }
            }
        }

        info!(
            "{}/{} tables populated from {} source {}",
            outcome.populated,
            outcome.considered,
            source.kind,
            source.path
        );
        Ok(outcome)
    }
}

/// Parse every record, paired with the 1-based line it starts on
fn numbered_records(content: &[u8]) -> Vec<(usize, Result<StringRecord, ::csv::Error>)> {
    let mut lines = LineIndex::new(content);
    ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(content)
        .into_records()
        .map(|record| {
            let position = match &record {
                Ok(record) => record.position(),
                Err(e) => e.position(),
            };
            let line = match position {
                Some(position) => lines.line_at(position),
                None => lines.current(),
            };
            (line, record)
        })
        .collect()
}

/// Maps record byte offsets onto physical line numbers.
///
/// A record's position is taken before the reader skips blank lines, so those
/// are stepped over here. Offsets only move forward.
struct LineIndex<'a> {
    content: &'a [u8],
    offset: usize,
    line: usize,
}

impl<'a> LineIndex<'a> {
    fn new(content: &'a [u8]) -> Self {
        Self {
            content,
            offset: 0,
            line: 1,
        }
    }

    fn current(&self) -> usize {
        self.line
    }

    fn line_at(&mut self, position: &Position) -> usize {
        let mut start = usize::try_from(position.byte())
            .unwrap_or(usize::MAX)
            .min(self.content.len());
        while matches!(self.content.get(start), Some(b'\n' | b'\r')) {
            start += 1;
        }
        if start > self.offset {
            self.line += self.content[self.offset..start]
                .iter()
                .filter(|b| **b == b'\n')
                .count();
            self.offset = start;
        }
        self.line
    }
}

/// Explicit columns win; otherwise the header row declares them
fn resolve_columns(entry: &DatasetEntry, header: Option<&StringRecord>) -> LoaderResult<Vec<ColumnDef>> {
    let columns = match (&entry.columns, header) {
        (Some(explicit), _) => explicit.clone(),
        (None, Some(header)) => parse_columns(header.iter())?,
        (None, None) => Vec::new(),
    };

    if columns.is_empty() {
        return Err(LoaderError::config(format!(
            "Unable to determine column names for {} ({})",
            entry.table, entry.file
        )));
    }
    Ok(columns)
}

fn row_values(
    entry: &DatasetEntry,
    columns: &[ColumnDef],
    record: &StringRecord,
) -> Result<Vec<ScalarValue>, String> {
    if record.len() != columns.len() {
        return Err(format!(
            "expected {} columns but found {}",
            columns.len(),
            record.len()
        ));
    }

    columns
        .iter()
        .zip(record.iter())
        .map(|(column, raw)| {
            if entry.is_null_token(raw) {
                Ok(ScalarValue::Null(column.scalar))
            } else {
                column.scalar.parse(raw).map_err(|e| e.to_string())
            }
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn entry(columns: &[&str]) -> DatasetEntry {
        DatasetEntry {
            table: "people".to_string(),
            file: "people.csv".to_string(),
            has_header: true,
            empty_is_null: true,
            other_null_values: BTreeSet::from(["NULL".to_string()]),
            columns: (!columns.is_empty()).then(|| parse_columns(columns).unwrap()),
            primary_key: None,
        }
    }

    #[test]
    fn test_explicit_columns_win_over_header() {
        let header = StringRecord::from(vec!["Name", "Age"]);
        let columns = resolve_columns(&entry(&["id:int"]), Some(&header)).unwrap();
        assert_eq!(columns.len(), 1);
        assert_eq!(columns[0].name, "id");
    }

    #[test]
    fn test_header_declares_typed_columns() {
        let header = StringRecord::from(vec!["fullName", "age:int"]);
        let columns = resolve_columns(&entry(&[]), Some(&header)).unwrap();
        assert_eq!(columns[0].name, "full_name");
        assert_eq!(columns[1].scalar, ScalarType::Int);
    }

    #[test]
    fn test_undeterminable_columns_is_configuration_error() {
        let err = resolve_columns(&entry(&[]), None).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_row_values_converts_and_nulls() {
        let entry = entry(&["name", "age:int", "note"]);
        let columns = entry.columns.clone().unwrap();

        let values = row_values(&entry, &columns, &StringRecord::from(vec!["Ada", "42", ""])).unwrap();
        assert_eq!(
            values,
            vec![
                ScalarValue::Text("Ada".into()),
                ScalarValue::Int(42),
                ScalarValue::Null(ScalarType::Str),
            ]
        );

        let values = row_values(&entry, &columns, &StringRecord::from(vec!["Bob", "NULL", "x"])).unwrap();
        assert_eq!(values[1], ScalarValue::Null(ScalarType::Int));
    }

    fn lines(content: &str) -> Vec<usize> {
        numbered_records(content.as_bytes())
            .into_iter()
            .map(|(line, _)| line)
            .collect()
    }

    #[test]
    fn test_record_lines_count_physical_lines() {
        assert_eq!(lines("a,b\nc,d\n"), vec![1, 2]);
        assert_eq!(lines("A,Alpha\n\nB\n"), vec![1, 3]);
        assert_eq!(lines("A,\"Al\npha\"\nB\n"), vec![1, 3]);
        assert_eq!(lines("\n\nh1,h2\r\n\r\nx,y"), vec![3, 5]);
        assert!(lines("").is_empty());
    }

    #[test]
    fn test_row_values_rejects_bad_rows() {
        let entry = entry(&["name", "age:int"]);
        let columns = entry.columns.clone().unwrap();

        let err = row_values(&entry, &columns, &StringRecord::from(vec!["Ada", "abc"])).unwrap_err();
        assert_eq!(err, "cannot parse 'abc' as int");

        let err = row_values(&entry, &columns, &StringRecord::from(vec!["Ada"])).unwrap_err();
        assert_eq!(err, "expected 2 columns but found 1");
    }
}
