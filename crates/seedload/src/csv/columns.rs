//! Column declarations and typed scalar values
//!
//! A declaration is `name` or `name:type`. The type tag picks a [`ScalarType`]
//! from a fixed registry; an unknown tag is a configuration error. Names are
//! normalized to snake_case so header rows like `carrierName` or `Carrier Name`
//! map onto `carrier_name`.

use sqlx::postgres::{PgArguments, Postgres};
use sqlx::query::Query;
use std::fmt;
use thiserror::Error;

use crate::error::{LoaderError, LoaderResult};

/// Scalar types a column may be declared with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarType {
    Int,
    Long,
    Bool,
    Real,
    Double,
    Str,
}

/// Type tag registry. Tags are matched exactly.
const TYPE_TAGS: &[(&str, ScalarType)] = &[
    ("int", ScalarType::Int),
    ("integer", ScalarType::Int),
    ("long", ScalarType::Long),
    ("bool", ScalarType::Bool),
    ("boolean", ScalarType::Bool),
    ("real", ScalarType::Real),
    ("float", ScalarType::Real),
    ("double", ScalarType::Double),
    ("str", ScalarType::Str),
    ("string", ScalarType::Str),
];

/// A raw field that does not parse as its column's type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("cannot parse '{value}' as {expected}")]
pub struct ScalarParseError {
    pub value: String,
    pub expected: ScalarType,
}

impl ScalarType {
    /// Look up a type tag in the registry
    pub fn from_tag(tag: &str) -> Option<Self> {
        TYPE_TAGS
            .iter()
            .find(|(known, _)| *known == tag)
            .map(|(_, scalar)| *scalar)
    }

    /// Parse a raw CSV field.
    ///
    /// Numbers are parsed strictly. Booleans are lenient: `true` in any case is
    /// true and every other value is false.
    pub fn parse(self, raw: &str) -> Result<ScalarValue, ScalarParseError> {
        let invalid = || ScalarParseError {
            value: raw.to_string(),
            expected: self,
        };
        Ok(match self {
            Self::Int => ScalarValue::Int(raw.parse().map_err(|_| invalid())?),
            Self::Long => ScalarValue::Long(raw.parse().map_err(|_| invalid())?),
            Self::Bool => ScalarValue::Bool(raw.eq_ignore_ascii_case("true")),
            Self::Real => ScalarValue::Real(raw.trim().parse().map_err(|_| invalid())?),
            Self::Double => ScalarValue::Double(raw.trim().parse().map_err(|_| invalid())?),
            Self::Str => ScalarValue::Text(raw.to_string()),
        })
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Int => "int",
            Self::Long => "long",
            Self::Bool => "bool",
            Self::Real => "real",
            Self::Double => "double",
            Self::Str => "str",
        };
        f.write_str(name)
    }
}

/// A parsed field ready to be bound to a statement
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarValue {
    Int(i32),
    Long(i64),
    Bool(bool),
    Real(f32),
    Double(f64),
    Text(String),
    /// Null keeps its column type so the placeholder is typed correctly
    Null(ScalarType),
}

impl ScalarValue {
    /// Bind this value as the next positional parameter
    pub fn bind_to<'q>(
        self,
        query: Query<'q, Postgres, PgArguments>,
    ) -> Query<'q, Postgres, PgArguments> {
        match self {
            Self::Int(v) => query.bind(v),
            Self::Long(v) => query.bind(v),
            Self::Bool(v) => query.bind(v),
            Self::Real(v) => query.bind(v),
            Self::Double(v) => query.bind(v),
            Self::Text(v) => query.bind(v),
            Self::Null(ScalarType::Int) => query.bind(None::<i32>),
            Self::Null(ScalarType::Long) => query.bind(None::<i64>),
            Self::Null(ScalarType::Bool) => query.bind(None::<bool>),
            Self::Null(ScalarType::Real) => query.bind(None::<f32>),
            Self::Null(ScalarType::Double) => query.bind(None::<f64>),
            Self::Null(ScalarType::Str) => query.bind(None::<String>),
        }
    }
}

/// A column name paired with its scalar type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    pub scalar: ScalarType,
}

/// Parse one `name[:type]` declaration. Columns without a type are strings.
pub fn parse_column(declaration: &str) -> LoaderResult<ColumnDef> {
    let (name, scalar) = match declaration.split_once(':') {
        Some((name, tag)) => {
            let scalar = ScalarType::from_tag(tag.trim()).ok_or_else(|| {
                LoaderError::UnknownColumnType {
                    type_tag: tag.trim().to_string(),
                    declaration: declaration.to_string(),
                }
            })?;
            (name, scalar)
        }
        None => (declaration, ScalarType::Str),
    };

    Ok(ColumnDef {
        name: normalize_name(name),
        scalar,
    })
}

/// Parse declarations in order, e.g. the fields of a header row
pub fn parse_columns<I, S>(declarations: I) -> LoaderResult<Vec<ColumnDef>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    declarations
        .into_iter()
        .map(|declaration| parse_column(declaration.as_ref()))
        .collect()
}

/// Normalize a column name: trim, split camelCase boundaries, turn spaces and
/// hyphens into underscores, lowercase.
pub fn normalize_name(raw: &str) -> String {
    let trimmed = raw.trim();
    let mut out = String::with_capacity(trimmed.len() + 4);
    let mut prev: Option<char> = None;

    for c in trimmed.chars() {
        if c.is_ascii_uppercase()
            && prev.is_some_and(|p| p.is_ascii_lowercase() || p.is_ascii_digit())
        {
            out.push('_');
        }
        match c {
            ' ' | '-' => out.push('_'),
            _ => out.extend(c.to_lowercase()),
        }
        prev = Some(c);
    }

    out
}
