//! Load history and checksum decisions
//!
//! Every successful load of a CSV entry appends a row to `csvloader_history`.
//! The latest row for a table holds the checksum of the content currently in
//! the database. The table is created on first use: the first lookup probes
//! it and creates it when PostgreSQL reports it as undefined.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

use crate::error::{LoaderError, LoaderResult};
use crate::loader::ChecksumPolicy;

pub const HISTORY_TABLE: &str = "csvloader_history";

/// SQLSTATE for `undefined_table`
const UNDEFINED_TABLE: &str = "42P01";

const CREATE_HISTORY_TABLE: &[&str] = &[
    "CREATE TABLE csvloader_history (
        table_name varchar(100) NOT NULL,
        source text NOT NULL,
        checksum varchar(64) NOT NULL,
        rows_affected integer NOT NULL,
        created timestamptz NOT NULL
    )",
    "CREATE INDEX csvloader_history_table_name_idx ON csvloader_history (table_name)",
    "CREATE INDEX csvloader_history_created_idx ON csvloader_history (created)",
];

const SELECT_LATEST: &str = "SELECT table_name, source, checksum, rows_affected, created \
     FROM csvloader_history WHERE table_name = $1 ORDER BY created DESC LIMIT 1";

const SELECT_ALL: &str = "SELECT table_name, source, checksum, rows_affected, created \
     FROM csvloader_history WHERE table_name = $1 ORDER BY created DESC";

const INSERT_RECORD: &str = "INSERT INTO csvloader_history \
     (table_name, source, checksum, rows_affected, created) VALUES ($1, $2, $3, $4, $5)";

/// One completed load of a table
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct HistoryRecord {
    pub table_name: String,
    pub source: String,
    pub checksum: String,
    pub rows_affected: i32,
    pub created: DateTime<Utc>,
}

/// What to do with an entry given its history
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Content unchanged since the last load
    Skip,
    /// Never loaded
    LoadFresh,
    /// Changed content, reload with upserts
    ReloadUpsert,
}

impl Decision {
    pub fn is_refresh(self) -> bool {
        matches!(self, Self::ReloadUpsert)
    }
}

/// Decide against the latest record for a table
pub fn decide_against(
    prior: Option<&HistoryRecord>,
    checksum: &str,
    policy: ChecksumPolicy,
    source_url: &str,
) -> LoaderResult<Decision> {
    match prior {
        None => Ok(Decision::LoadFresh),
        Some(record) if record.checksum == checksum => Ok(Decision::Skip),
        Some(_) => match policy {
            ChecksumPolicy::Refresh => Ok(Decision::ReloadUpsert),
            ChecksumPolicy::Fail => Err(LoaderError::ChecksumValidation {
                url: source_url.to_string(),
            }),
        },
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HistoryState {
    Uninitialized,
    Initialized,
}

/// Reads and appends load history
pub struct ChecksumTracker {
    pool: PgPool,
    state: RwLock<HistoryState>,
}

impl ChecksumTracker {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            state: RwLock::new(HistoryState::Uninitialized),
        }
    }

    /// Latest record for a table, creating the history table if missing
    pub async fn latest(&self, table: &str) -> LoaderResult<Option<HistoryRecord>> {
        if *self.state.read().await == HistoryState::Initialized {
            return Ok(self.select_latest(table).await?);
        }

        let mut state = self.state.write().await;
        if *state == HistoryState::Initialized {
            return Ok(self.select_latest(table).await?);
        }

        match self.select_latest(table).await {
            Ok(found) => {
                *state = HistoryState::Initialized;
                Ok(found)
            }
            Err(e) if is_undefined_table(&e) => {
                self.create_table().await?;
                *state = HistoryState::Initialized;
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Decide whether content with this checksum must be loaded
    #[instrument(skip(self, checksum))]
    pub async fn decide(
        &self,
        table: &str,
        source_url: &str,
        checksum: &str,
        policy: ChecksumPolicy,
    ) -> LoaderResult<Decision> {
        let prior = self.latest(table).await?;
        let decision = decide_against(prior.as_ref(), checksum, policy, source_url)?;
        debug!(?decision, "Checksum decision");
        Ok(decision)
    }

    /// Append a record on the entry's open transaction
    pub async fn record(
        &self,
        conn: &mut PgConnection,
        table: &str,
        source_url: &str,
        checksum: &str,
        rows_affected: i32,
    ) -> LoaderResult<()> {
        sqlx::query(INSERT_RECORD)
            .bind(table)
            .bind(source_url)
            .bind(checksum)
            .bind(rows_affected)
            .bind(Utc::now())
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    /// All records for a table, newest first
    pub async fn history(&self, table: &str) -> LoaderResult<Vec<HistoryRecord>> {
        match sqlx::query_as::<_, HistoryRecord>(SELECT_ALL)
            .bind(table)
            .fetch_all(&self.pool)
            .await
        {
            Ok(records) => Ok(records),
            Err(e) if is_undefined_table(&e) => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn select_latest(&self, table: &str) -> Result<Option<HistoryRecord>, sqlx::Error> {
        sqlx::query_as::<_, HistoryRecord>(SELECT_LATEST)
            .bind(table)
            .fetch_optional(&self.pool)
            .await
    }

    async fn create_table(&self) -> LoaderResult<()> {
        info!(table = HISTORY_TABLE, "Creating load history table");
        let mut tx = self.pool.begin().await?;
        for statement in CREATE_HISTORY_TABLE {
            sqlx::query(statement).execute(&mut *tx).await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

fn is_undefined_table(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db.code().as_deref() == Some(UNDEFINED_TABLE),
        _ => false,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn record(checksum: &str) -> HistoryRecord {
        HistoryRecord {
            table_name: "carriers".to_string(),
            source: "classpath:db/ref/carriers.csv".to_string(),
            checksum: checksum.to_string(),
            rows_affected: 2,
            created: Utc::now(),
        }
    }

    #[test]
    fn test_no_history_loads_fresh() {
        let decision = decide_against(None, "abc", ChecksumPolicy::Fail, "u").unwrap();
        assert_eq!(decision, Decision::LoadFresh);
        assert!(!decision.is_refresh());
    }

    #[test]
    fn test_matching_checksum_skips() {
        let prior = record("abc");
        for policy in [ChecksumPolicy::Refresh, ChecksumPolicy::Fail] {
            assert_eq!(
                decide_against(Some(&prior), "abc", policy, "u").unwrap(),
                Decision::Skip
            );
        }
    }

    #[test]
    fn test_changed_checksum_with_refresh_reloads() {
        let prior = record("abc");
        let decision = decide_against(Some(&prior), "def", ChecksumPolicy::Refresh, "u").unwrap();
        assert!(decision.is_refresh());
    }

    #[test]
    fn test_changed_checksum_with_fail_errors() {
        let prior = record("abc");
        let err = decide_against(
            Some(&prior),
            "def",
            ChecksumPolicy::Fail,
            "classpath:db/ref/carriers.csv",
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Checksum validation failed for classpath:db/ref/carriers.csv"
        );
        assert!(!err.is_configuration());
    }
}
