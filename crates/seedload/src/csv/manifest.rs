//! `csvloader.yml` manifests

use serde::Deserialize;
use std::collections::BTreeSet;

use crate::csv::columns::{parse_columns, ColumnDef};
use crate::error::{LoaderError, LoaderResult};

/// Manifest file name inside every CSV source
pub const MANIFEST_FILE: &str = "csvloader.yml";

/// Settings shared by all entries of a manifest
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetDefaults {
    #[serde(default, alias = "csvheader")]
    pub has_header: bool,
    #[serde(default)]
    pub empty_is_null: bool,
    #[serde(default)]
    pub other_null_values: BTreeSet<String>,
}

/// A table entry as written in the manifest
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDatasetEntry {
    pub table: String,
    pub file: String,
    #[serde(alias = "csvheader")]
    pub has_header: Option<bool>,
    pub empty_is_null: Option<bool>,
    pub other_null_values: Option<BTreeSet<String>>,
    /// `name[:type]` declarations
    pub columns: Option<Vec<String>>,
    pub primary_key: Option<String>,
}

/// A table entry with manifest defaults applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetEntry {
    pub table: String,
    pub file: String,
    pub has_header: bool,
    pub empty_is_null: bool,
    pub other_null_values: BTreeSet<String>,
    pub columns: Option<Vec<ColumnDef>>,
    pub primary_key: Option<String>,
}

impl RawDatasetEntry {
    /// Apply manifest defaults and parse the column declarations
    pub fn with_defaults(&self, defaults: &DatasetDefaults) -> LoaderResult<DatasetEntry> {
        let columns = self.columns.as_ref().map(parse_columns).transpose()?;

        Ok(DatasetEntry {
            table: self.table.clone(),
            file: self.file.clone(),
            has_header: self.has_header.unwrap_or(defaults.has_header),
            empty_is_null: self.empty_is_null.unwrap_or(defaults.empty_is_null),
            other_null_values: self
                .other_null_values
                .clone()
                .unwrap_or_else(|| defaults.other_null_values.clone()),
            columns,
            primary_key: self.primary_key.clone(),
        })
    }
}

impl DatasetEntry {
    /// Whether a raw field stands for NULL
    pub fn is_null_token(&self, raw: &str) -> bool {
        (self.empty_is_null && raw.is_empty()) || self.other_null_values.contains(raw)
    }
}

#[derive(Debug, Deserialize)]
struct ManifestFile {
    #[serde(default)]
    defaults: DatasetDefaults,
    #[serde(default)]
    tables: Vec<RawDatasetEntry>,
}

/// A parsed manifest with every entry resolved against its defaults
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CsvManifest {
    pub defaults: DatasetDefaults,
    pub tables: Vec<DatasetEntry>,
}

impl CsvManifest {
    /// Parse a manifest.
    ///
    /// Malformed YAML is a [`LoaderError::Manifest`]. A column declaration with
    /// an unknown type is a [`LoaderError::UnknownColumnType`], raised before any
    /// entry is loaded.
    pub fn from_slice(bytes: &[u8], location: &str) -> LoaderResult<Self> {
        let file: ManifestFile =
            serde_yaml::from_slice(bytes).map_err(|cause| LoaderError::Manifest {
                location: location.to_string(),
                cause,
            })?;

        let tables = file
            .tables
            .iter()
            .map(|raw| raw.with_defaults(&file.defaults))
            .collect::<LoaderResult<Vec<_>>>()?;

        Ok(Self {
            defaults: file.defaults,
            tables,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::csv::columns::ScalarType;

    const MANIFEST: &str = r#"
defaults:
  csvheader: true
  emptyIsNull: true
  otherNullValues: ["N/A"]
tables:
  - table: carriers
    file: carriers.csv
    csvheader: false
    columns: ["code:str", "name:str"]
  - table: facilities
    file: facilities.csv
    primaryKey: facility_code
  - table: ports
    file: ports.csv
    emptyIsNull: false
    otherNullValues: ["-"]
"#;

    #[test]
    fn test_entries_inherit_defaults() {
        let manifest = CsvManifest::from_slice(MANIFEST.as_bytes(), "inline").unwrap();
        let [carriers, facilities, ports] = &manifest.tables[..] else {
            panic!("expected three entries");
        };

        assert!(!carriers.has_header);
        assert_eq!(carriers.columns.as_ref().unwrap().len(), 2);
        assert_eq!(carriers.columns.as_ref().unwrap()[0].scalar, ScalarType::Str);

        assert!(facilities.has_header);
        assert!(facilities.empty_is_null);
        assert_eq!(facilities.primary_key.as_deref(), Some("facility_code"));
        assert!(facilities.is_null_token("N/A"));
        assert!(facilities.is_null_token(""));

        assert!(!ports.is_null_token(""));
        assert!(!ports.is_null_token("N/A"));
        assert!(ports.is_null_token("-"));
    }

    #[test]
    fn test_has_header_spelling() {
        let yaml = "defaults:\n  hasHeader: true\ntables: []\n";
        let manifest = CsvManifest::from_slice(yaml.as_bytes(), "inline").unwrap();
        assert!(manifest.defaults.has_header);
    }

    #[test]
    fn test_missing_defaults_are_off() {
        let yaml = "tables:\n  - table: t\n    file: t.csv\n";
        let manifest = CsvManifest::from_slice(yaml.as_bytes(), "inline").unwrap();
        let entry = &manifest.tables[0];
        assert!(!entry.has_header);
        assert!(!entry.is_null_token(""));
        assert!(entry.columns.is_none());
    }

    #[test]
    fn test_unknown_column_type_rejected_at_load() {
        let yaml = "tables:\n  - table: t\n    file: t.csv\n    columns: ['id:uuid']\n";
        let err = CsvManifest::from_slice(yaml.as_bytes(), "db/x/csvloader.yml").unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("uuid"));
    }

    #[test]
    fn test_malformed_manifest_is_not_configuration_error() {
        let yaml = "tables:
  - table: t
    file: [unclosed
";
        let err = CsvManifest::from_slice(yaml.as_bytes(), "db/x/csvloader.yml").unwrap_err();
        assert!(matches!(err, LoaderError::Manifest { .. }));
        assert!(!err.is_configuration());
        assert!(err.to_string().contains("db/x/csvloader.yml"));
    }

    #[test]
    fn test_raw_entry_columns_are_parsed_on_merge() {
        let raw = RawDatasetEntry {
            table: "people".to_string(),
            file: "people.csv".to_string(),
            has_header: None,
            empty_is_null: None,
            other_null_values: None,
            columns: Some(vec!["fullName".to_string(), "age:int".to_string()]),
            primary_key: None,
        };
        let entry = raw.with_defaults(&DatasetDefaults::default()).unwrap();
        let columns = entry.columns.unwrap();
        assert_eq!(columns[0].name, "full_name");
        assert_eq!(columns[1].scalar, ScalarType::Int);
    }
}
