//! Target kinds and coerced cell values.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The strongly typed kind a destination field expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarKind {
    Bool,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    Text,
    /// `chrono::DateTime<Utc>`
    Timestamp,
    /// `chrono::NaiveDateTime`
    DateTime,
    /// `chrono::NaiveDate`
    Date,
}

impl ScalarKind {
    pub fn is_integer(self) -> bool {
        matches!(
            self,
            ScalarKind::I8
                | ScalarKind::I16
                | ScalarKind::I32
                | ScalarKind::I64
                | ScalarKind::U8
                | ScalarKind::U16
                | ScalarKind::U32
                | ScalarKind::U64
        )
    }

    pub fn is_float(self) -> bool {
        matches!(self, ScalarKind::F32 | ScalarKind::F64)
    }

    pub fn is_temporal(self) -> bool {
        matches!(
            self,
            ScalarKind::Timestamp | ScalarKind::DateTime | ScalarKind::Date
        )
    }

    /// Rust type name of the kind.
    pub fn name(self) -> &'static str {
        match self {
            ScalarKind::Bool => "bool",
            ScalarKind::I8 => "i8",
            ScalarKind::I16 => "i16",
            ScalarKind::I32 => "i32",
            ScalarKind::I64 => "i64",
            ScalarKind::U8 => "u8",
            ScalarKind::U16 => "u16",
            ScalarKind::U32 => "u32",
            ScalarKind::U64 => "u64",
            ScalarKind::F32 => "f32",
            ScalarKind::F64 => "f64",
            ScalarKind::Text => "String",
            ScalarKind::Timestamp => "DateTime<Utc>",
            ScalarKind::DateTime => "NaiveDateTime",
            ScalarKind::Date => "NaiveDate",
        }
    }
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A coerced value, already of the exact kind the destination asked for.
///
/// `Null` is the coercion layer's authoritative null signal.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    Text(String),
    Timestamp(DateTime<Utc>),
    DateTime(NaiveDateTime),
    Date(NaiveDate),
}

impl Cell {
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    /// Kind of the value, `None` for null.
    pub fn kind(&self) -> Option<ScalarKind> {
        Some(match self {
            Cell::Null => return None,
            Cell::Bool(_) => ScalarKind::Bool,
            Cell::I8(_) => ScalarKind::I8,
            Cell::I16(_) => ScalarKind::I16,
            Cell::I32(_) => ScalarKind::I32,
            Cell::I64(_) => ScalarKind::I64,
            Cell::U8(_) => ScalarKind::U8,
            Cell::U16(_) => ScalarKind::U16,
            Cell::U32(_) => ScalarKind::U32,
            Cell::U64(_) => ScalarKind::U64,
            Cell::F32(_) => ScalarKind::F32,
            Cell::F64(_) => ScalarKind::F64,
            Cell::Text(_) => ScalarKind::Text,
            Cell::Timestamp(_) => ScalarKind::Timestamp,
            Cell::DateTime(_) => ScalarKind::DateTime,
            Cell::Date(_) => ScalarKind::Date,
        })
    }
}
