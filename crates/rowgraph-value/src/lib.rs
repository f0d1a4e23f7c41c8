//! Rowgraph value layer
//!
//! Everything the mapper core needs to know about a single result cell:
//!
//! - `SqlValue`: a raw, driver-native cell as handed over by a row source
//! - `ColumnMeta` / `ColumnType`: the column name and its database type descriptor
//! - `ScalarKind` / `Cell`: the strongly typed target kinds and coerced values
//! - `Coerce`: the seam the core calls to turn a raw value into a `Cell`
//!
//! The core never converts values itself. `StandardCoercion` is the default
//! implementation; callers with driver-specific rules plug in their own.

pub mod coerce;
pub mod kind;

pub use coerce::{Coerce, CoerceError, StandardCoercion};
pub use kind::{Cell, ScalarKind};

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Raw values
// ============================================================================

/// A raw cell value as produced by a database driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
    /// Some drivers (MySQL) hand text columns over as raw bytes.
    Bytes(Vec<u8>),
    Timestamp(DateTime<Utc>),
    DateTime(NaiveDateTime),
    Date(NaiveDate),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// Short label used in diagnostics.
    pub fn type_label(&self) -> &'static str {
        match self {
            SqlValue::Null => "null",
            SqlValue::Bool(_) => "bool",
            SqlValue::Int(_) => "int",
            SqlValue::UInt(_) => "uint",
            SqlValue::Float(_) => "float",
            SqlValue::Text(_) => "text",
            SqlValue::Bytes(_) => "bytes",
            SqlValue::Timestamp(_) => "timestamp",
            SqlValue::DateTime(_) => "datetime",
            SqlValue::Date(_) => "date",
        }
    }
}

macro_rules! sql_value_from {
    ($($ty:ty => $variant:ident as $target:ty),* $(,)?) => {$(
        impl From<$ty> for SqlValue {
            fn from(value: $ty) -> Self {
                SqlValue::$variant(<$target>::from(value))
            }
        }
    )*};
}

sql_value_from! {
    bool => Bool as bool,
    i8 => Int as i64,
    i16 => Int as i64,
    i32 => Int as i64,
    i64 => Int as i64,
    u8 => UInt as u64,
    u16 => UInt as u64,
    u32 => UInt as u64,
    u64 => UInt as u64,
    f32 => Float as f64,
    f64 => Float as f64,
    String => Text as String,
    &str => Text as String,
    Vec<u8> => Bytes as Vec<u8>,
    DateTime<Utc> => Timestamp as DateTime<Utc>,
    NaiveDateTime => DateTime as NaiveDateTime,
    NaiveDate => Date as NaiveDate,
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(SqlValue::Null)
    }
}

// ============================================================================
// Column metadata
// ============================================================================

/// Database-side type descriptor of a result column.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ColumnType {
    /// Driver type name, e.g. `INT4`, `VARCHAR`, `TIMESTAMPTZ`. Empty when unknown.
    pub database_type: String,
    /// Whether the driver reports the column as nullable, when it knows.
    pub nullable: Option<bool>,
}

impl ColumnType {
    pub fn new(database_type: impl Into<String>) -> Self {
        Self {
            database_type: database_type.into(),
            nullable: None,
        }
    }

    pub fn unknown() -> Self {
        Self::default()
    }

    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = Some(nullable);
        self
    }

    /// True for exact and approximate numeric database types.
    pub fn is_numeric(&self) -> bool {
        let upper = self.database_type.to_ascii_uppercase();
        ["INT", "DECIMAL", "NUMERIC", "FLOAT", "DOUBLE", "REAL", "SERIAL"]
            .iter()
            .any(|needle| upper.contains(needle))
    }
}

/// One column of a query result: its name and type descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMeta {
    pub name: String,
    pub column_type: ColumnType,
}

impl ColumnMeta {
    pub fn new(name: impl Into<String>, database_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            column_type: ColumnType::new(database_type),
        }
    }

    pub fn untyped(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            column_type: ColumnType::unknown(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn option_converts_to_null() {
        assert_eq!(SqlValue::from(None::<i64>), SqlValue::Null);
        assert_eq!(SqlValue::from(Some(3_i32)), SqlValue::Int(3));
        assert_eq!(SqlValue::from("x"), SqlValue::Text("x".to_string()));
    }

    #[test]
    fn numeric_column_types() {
        assert!(ColumnType::new("int4").is_numeric());
        assert!(ColumnType::new("DECIMAL").is_numeric());
        assert!(!ColumnType::new("VARCHAR").is_numeric());
        assert!(!ColumnType::unknown().is_numeric());
    }

    #[test]
    fn column_meta_roundtrips_through_json() {
        let meta = ColumnMeta {
            name: "blog_id".to_string(),
            column_type: ColumnType::new("INT4").with_nullable(false),
        };
        let json = serde_json::to_string(&meta).unwrap();
        let back: ColumnMeta = serde_json::from_str(&json).unwrap();
        assert_eq!(back, meta);
    }
}
