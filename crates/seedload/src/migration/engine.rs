use async_trait::async_trait;
use sqlx::migrate::{Migration, Migrator};
use sqlx::postgres::{PgArguments, Postgres};
use sqlx::query::Query;
use sqlx::{Executor, PgPool, Row};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::error::{LoaderError, LoaderResult};

/// Parameters for one migration run
#[derive(Debug, Clone, Copy)]
pub struct MigrationRequest<'a> {
    /// Table recording applied versions
    pub history_table: &'a str,
    /// Version recorded for a schema that predates the history table
    pub baseline_version: i64,
    /// Directory of `<version>_<description>.sql` scripts
    pub scripts: &'a Path,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationSummary {
    /// Up-migrations found in the script directory
    pub available: usize,
    pub applied: Vec<i64>,
}

/// Applies versioned scripts and tracks them in a history table
#[async_trait]
pub trait MigrationEngine: Send + Sync {
    async fn migrate(&self, pool: &PgPool, request: MigrationRequest<'_>) -> LoaderResult<MigrationSummary>;
}

/// Engine reading scripts with sqlx's migration source
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlxMigrationEngine;

const BASELINE_DESCRIPTION: &str = "<< baseline >>";

#[async_trait]
impl MigrationEngine for SqlxMigrationEngine {
    async fn migrate(&self, pool: &PgPool, request: MigrationRequest<'_>) -> LoaderResult<MigrationSummary> {
        // Owned copies so nothing borrowed from the caller is held across an await
        let pool = pool.clone();
        let table = validate_table_name(request.history_table)?.to_string();
        let baseline_version = request.baseline_version;

        let migrator = Migrator::new(request.scripts.to_path_buf()).await?;
        let migrations: Vec<Migration> = migrator
            .iter()
            .filter(|m| !m.migration_type.is_down_migration())
            .cloned()
            .collect();

        ensure_history_table(&pool, &table, baseline_version).await?;
        let applied = applied_versions(&pool, &table).await?;
        let current = applied
            .iter()
            .map(|(v, _)| *v)
            .max()
            .unwrap_or(baseline_version);

        for migration in &migrations {
            let Some((_, checksum)) = applied.iter().find(|(v, _)| *v == migration.version) else {
                continue;
            };
            if checksum.as_slice() != &*migration.checksum {
                return Err(LoaderError::MigrationChecksumMismatch {
                    version: migration.version,
                    history_table: table,
                });
            }
        }

        let mut summary = MigrationSummary {
            available: migrations.len(),
            applied: Vec::new(),
        };

        for migration in migrations {
            if applied.iter().any(|(v, _)| *v == migration.version) {
                continue;
            }
            if migration.version <= current {
                warn!(
                    version = migration.version,
                    current, "Skipping migration older than the current schema version"
                );
                continue;
            }

            let version = migration.version;
            apply(&pool, &table, migration).await?;
            summary.applied.push(version);
        }

        info!(
            history_table = %table,
            applied = summary.applied.len(),
            available = summary.available,
            "Migrations complete"
        );
        Ok(summary)
    }
}

async fn ensure_history_table(pool: &PgPool, table: &str, baseline_version: i64) -> LoaderResult<()> {
    let create = format!(
        "CREATE TABLE IF NOT EXISTS {} (
            version bigint PRIMARY KEY,
            description text NOT NULL,
            checksum bytea NOT NULL,
            installed_on timestamptz NOT NULL DEFAULT now(),
            execution_ms bigint NOT NULL DEFAULT 0
        )",
        table
    );
    let baseline = format!(
        "INSERT INTO {0} (version, description, checksum) \
         SELECT $1, $2, $3 WHERE NOT EXISTS (SELECT 1 FROM {0})",
        table
    );

    let mut tx = pool.begin().await?;
    (&mut *tx).execute(sqlx::query(&create)).await?;
    let inserted = (&mut *tx)
        .execute(
            sqlx::query(&baseline)
                .bind(baseline_version)
                .bind(BASELINE_DESCRIPTION)
                .bind(Vec::<u8>::new()),
        )
        .await?
        .rows_affected();
    tx.commit().await?;

    if inserted > 0 {
        debug!(history_table = table, version = baseline_version, "Baselined schema");
    }
    Ok(())
}

async fn applied_versions(pool: &PgPool, table: &str) -> LoaderResult<Vec<(i64, Vec<u8>)>> {
    let select = format!("SELECT version, checksum FROM {} ORDER BY version", table);
    let rows = pool.fetch_all(sqlx::query(&select)).await?;
    rows.iter()
        .map(|row| -> LoaderResult<(i64, Vec<u8>)> {
            Ok((row.try_get("version")?, row.try_get("checksum")?))
        })
        .collect()
}

async fn apply(pool: &PgPool, table: &str, migration: Migration) -> LoaderResult<()> {
    info!(version = migration.version, description = %migration.description, "Applying migration");
    let started = Instant::now();
    let record = format!(
        "INSERT INTO {} (version, description, checksum, execution_ms) VALUES ($1, $2, $3, $4)",
        table
    );

    if migration.no_tx {
        let mut conn = pool.acquire().await?;
        (&mut *conn).execute(sqlx::raw_sql(&migration.sql)).await?;
        (&mut *conn)
            .execute(record_query(&record, &migration, started))
            .await?;
        return Ok(());
    }

    let mut tx = pool.begin().await?;
    (&mut *tx).execute(sqlx::raw_sql(&migration.sql)).await?;
    (&mut *tx)
        .execute(record_query(&record, &migration, started))
        .await?;
    tx.commit().await?;
    Ok(())
}

fn record_query<'q>(
    sql: &'q str,
    migration: &'q Migration,
    started: Instant,
) -> Query<'q, Postgres, PgArguments> {
    let elapsed = i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX);
    sqlx::query(sql)
        .bind(migration.version)
        .bind(&*migration.description)
        .bind(&*migration.checksum)
        .bind(elapsed)
}

/// The table name is interpolated into SQL, so it must be a plain identifier
fn validate_table_name(name: &str) -> LoaderResult<&str> {
    let valid = !name.is_empty()
        && name.split('.').count() <= 2
        && name.split('.').all(|part| {
            part.chars().next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
                && part.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        });

    if valid {
        Ok(name)
    } else {
        Err(LoaderError::config(format!("Invalid migration history table name '{}'", name)))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use sqlx::migrate::MigrationType;
    use sqlx::postgres::PgPoolOptions;

    fn assert_send<T: Send>(_: T) {}

    #[test]
    fn test_validate_table_name() {
        assert!(validate_table_name("seedload_schema_history").is_ok());
        assert!(validate_table_name("reference.schema_history").is_ok());
        assert!(validate_table_name("").is_err());
        assert!(validate_table_name("1history").is_err());
        assert!(validate_table_name("history; drop table x").is_err());
        assert!(validate_table_name("a.b.c").is_err());
        assert!(validate_table_name("a.").is_err());
    }

    #[tokio::test]
    async fn test_engine_futures_are_send() {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/unused")
            .unwrap();
        let migration = Migration::new(
            1,
            "create carriers".into(),
            MigrationType::Simple,
            "CREATE TABLE carriers (code text)".into(),
            false,
        );

        assert_send(ensure_history_table(&pool, "schema_history", 0));
        assert_send(applied_versions(&pool, "schema_history"));
        assert_send(apply(&pool, "schema_history", migration));
        assert_send(SqlxMigrationEngine.migrate(
            &pool,
            MigrationRequest {
                history_table: "schema_history",
                baseline_version: 0,
                scripts: Path::new("resources/db/migration"),
            },
        ));
    }
}
