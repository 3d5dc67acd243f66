//! Insert and upsert statement generation

use crate::csv::columns::ColumnDef;

/// Builds the parameterized statement used for every row of an entry
pub trait StatementBuilder: Send + Sync {
    /// Plain insert with one positional parameter per column
    fn insert(&self, table: &str, columns: &[ColumnDef]) -> String;

    /// Insert that updates or ignores rows already present.
    ///
    /// `primary_key` defaults to the first column when not given.
    fn upsert(&self, table: &str, columns: &[ColumnDef], primary_key: Option<&str>) -> String;

    fn build(
        &self,
        table: &str,
        columns: &[ColumnDef],
        primary_key: Option<&str>,
        refresh: bool,
    ) -> String {
        if refresh {
            self.upsert(table, columns, primary_key)
        } else {
            self.insert(table, columns)
        }
    }
}

/// PostgreSQL dialect: `$n` placeholders and `ON CONFLICT` upserts
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresStatements;

impl StatementBuilder for PostgresStatements {
    fn insert(&self, table: &str, columns: &[ColumnDef]) -> String {
        let names = columns
            .iter()
            .map(|c| c.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = (1..=columns.len())
            .map(|i| format!("${}", i))
            .collect::<Vec<_>>()
            .join(", ");

        format!("INSERT INTO {} ({}) VALUES ({})", table, names, placeholders)
    }

    fn upsert(&self, table: &str, columns: &[ColumnDef], primary_key: Option<&str>) -> String {
        let insert = self.insert(table, columns);

        if columns.len() <= 1 {
            return format!("{} ON CONFLICT DO NOTHING", insert);
        }

        let key = primary_key.unwrap_or(columns[0].name.as_str());
        let updates = columns
            .iter()
            .filter(|c| c.name != key)
            .map(|c| format!("{0}=EXCLUDED.{0}", c.name))
            .collect::<Vec<_>>()
            .join(", ");

        format!("{} ON CONFLICT ({}) DO UPDATE SET {}", insert, key, updates)
    }
}
