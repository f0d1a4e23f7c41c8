//! Value coercion: raw driver value + column descriptor + target kind -> `Cell`.

use crate::kind::{Cell, ScalarKind};
use crate::{ColumnMeta, SqlValue};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoerceError {
    #[error("cannot convert {found} value of column `{column}` ({database_type}) to {target}")]
    TypeMismatch {
        column: String,
        database_type: String,
        found: &'static str,
        target: ScalarKind,
    },

    #[error("value {value} of column `{column}` overflows {target}")]
    Overflow {
        column: String,
        value: String,
        target: ScalarKind,
    },

    #[error("cannot parse `{text}` of column `{column}` as {target}: {message}")]
    Parse {
        column: String,
        text: String,
        target: ScalarKind,
        message: String,
    },
}

/// Converts a raw cell into the kind a destination field expects.
///
/// Implementations must return `Cell::Null` for SQL nulls; the mapper treats
/// that signal as authoritative. Any error aborts the mapping call.
pub trait Coerce: Send + Sync {
    fn coerce(
        &self,
        raw: &SqlValue,
        column: &ColumnMeta,
        target: ScalarKind,
    ) -> Result<Cell, CoerceError>;
}

impl<F> Coerce for F
where
    F: Fn(&SqlValue, &ColumnMeta, ScalarKind) -> Result<Cell, CoerceError> + Send + Sync,
{
    fn coerce(
        &self,
        raw: &SqlValue,
        column: &ColumnMeta,
        target: ScalarKind,
    ) -> Result<Cell, CoerceError> {
        self(raw, column, target)
    }
}

/// Default coercion rules.
///
/// - integers convert between widths with overflow checks
/// - integral floats convert to integers; fractional ones are a mismatch
/// - text parses into numbers, booleans and timestamps
/// - bytes are read as UTF-8 text
/// - any value renders into `Text`
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardCoercion;

impl Coerce for StandardCoercion {
    fn coerce(
        &self,
        raw: &SqlValue,
        column: &ColumnMeta,
        target: ScalarKind,
    ) -> Result<Cell, CoerceError> {
        if raw.is_null() {
            return Ok(Cell::Null);
        }
        let ctx = Ctx {
            raw,
            column,
            target,
        };
        match target {
            ScalarKind::Bool => ctx.to_bool(),
            kind if kind.is_integer() => ctx.to_integer(),
            kind if kind.is_float() => ctx.to_float(),
            ScalarKind::Text => ctx.to_text(),
            _ => ctx.to_temporal(),
        }
    }
}

struct Ctx<'a> {
    raw: &'a SqlValue,
    column: &'a ColumnMeta,
    target: ScalarKind,
}

impl Ctx<'_> {
    fn mismatch(&self) -> CoerceError {
        CoerceError::TypeMismatch {
            column: self.column.name.clone(),
            database_type: self.column.column_type.database_type.clone(),
            found: self.raw.type_label(),
            target: self.target,
        }
    }

    fn overflow(&self, value: impl ToString) -> CoerceError {
        CoerceError::Overflow {
            column: self.column.name.clone(),
            value: value.to_string(),
            target: self.target,
        }
    }

    fn parse_error(&self, text: &str, message: impl ToString) -> CoerceError {
        CoerceError::Parse {
            column: self.column.name.clone(),
            text: text.to_string(),
            target: self.target,
            message: message.to_string(),
        }
    }

    fn text(&self) -> Result<Option<&str>, CoerceError> {
        match self.raw {
            SqlValue::Text(s) => Ok(Some(s.as_str())),
            SqlValue::Bytes(bytes) => std::str::from_utf8(bytes)
                .map(Some)
                .map_err(|err| self.parse_error(&String::from_utf8_lossy(bytes), err)),
            _ => Ok(None),
        }
    }

    fn to_bool(&self) -> Result<Cell, CoerceError> {
        let value = match self.raw {
            SqlValue::Bool(b) => *b,
            SqlValue::Int(i) => *i != 0,
            SqlValue::UInt(u) => *u != 0,
            _ => match self.text()? {
                Some(text) => match text.trim().to_ascii_lowercase().as_str() {
                    "true" | "t" | "1" | "yes" | "y" => true,
                    "false" | "f" | "0" | "no" | "n" => false,
                    _ => return Err(self.parse_error(text, "not a boolean literal")),
                },
                None => return Err(self.mismatch()),
            },
        };
        Ok(Cell::Bool(value))
    }

    fn to_integer(&self) -> Result<Cell, CoerceError> {
        let wide: i128 = match self.raw {
            SqlValue::Int(i) => i128::from(*i),
            SqlValue::UInt(u) => i128::from(*u),
            SqlValue::Bool(b) => i128::from(*b),
            SqlValue::Float(f) => {
                if !f.is_finite() || f.fract() != 0.0 {
                    return Err(self.mismatch());
                }
                if f.abs() > u64::MAX as f64 {
                    return Err(self.overflow(f));
                }
                *f as i128
            }
            _ => match self.text()? {
                Some(text) => text
                    .trim()
                    .parse::<i128>()
                    .map_err(|err| self.parse_error(text, err))?,
                None => return Err(self.mismatch()),
            },
        };
        self.narrow(wide)
    }

    fn narrow(&self, wide: i128) -> Result<Cell, CoerceError> {
        let overflow = || self.overflow(wide);
        Ok(match self.target {
            ScalarKind::I8 => Cell::I8(i8::try_from(wide).map_err(|_| overflow())?),
            ScalarKind::I16 => Cell::I16(i16::try_from(wide).map_err(|_| overflow())?),
            ScalarKind::I32 => Cell::I32(i32::try_from(wide).map_err(|_| overflow())?),
            ScalarKind::I64 => Cell::I64(i64::try_from(wide).map_err(|_| overflow())?),
            ScalarKind::U8 => Cell::U8(u8::try_from(wide).map_err(|_| overflow())?),
            ScalarKind::U16 => Cell::U16(u16::try_from(wide).map_err(|_| overflow())?),
            ScalarKind::U32 => Cell::U32(u32::try_from(wide).map_err(|_| overflow())?),
            ScalarKind::U64 => Cell::U64(u64::try_from(wide).map_err(|_| overflow())?),
            _ => return Err(self.mismatch()),
        })
    }

    fn to_float(&self) -> Result<Cell, CoerceError> {
        let value: f64 = match self.raw {
            SqlValue::Float(f) => *f,
            SqlValue::Int(i) => *i as f64,
            SqlValue::UInt(u) => *u as f64,
            _ => match self.text()? {
                Some(text) => text
                    .trim()
                    .parse::<f64>()
                    .map_err(|err| self.parse_error(text, err))?,
                None => return Err(self.mismatch()),
            },
        };
        match self.target {
            ScalarKind::F32 => {
                if value.is_finite() && value.abs() > f64::from(f32::MAX) {
                    return Err(self.overflow(value));
                }
                Ok(Cell::F32(value as f32))
            }
            _ => Ok(Cell::F64(value)),
        }
    }

    fn to_text(&self) -> Result<Cell, CoerceError> {
        let text = match self.raw {
            SqlValue::Bool(b) => b.to_string(),
            SqlValue::Int(i) => i.to_string(),
            SqlValue::UInt(u) => u.to_string(),
            SqlValue::Float(f) => f.to_string(),
            SqlValue::Timestamp(t) => t.to_rfc3339(),
            SqlValue::DateTime(t) => t.to_string(),
            SqlValue::Date(d) => d.to_string(),
            _ => match self.text()? {
                Some(text) => text.to_string(),
                None => return Err(self.mismatch()),
            },
        };
        Ok(Cell::Text(text))
    }

    fn to_temporal(&self) -> Result<Cell, CoerceError> {
        let timestamp: DateTime<Utc> = match self.raw {
            SqlValue::Timestamp(t) => *t,
            SqlValue::DateTime(t) => t.and_utc(),
            SqlValue::Date(d) => d.and_time(NaiveTime::MIN).and_utc(),
            SqlValue::Int(secs) => {
                DateTime::from_timestamp(*secs, 0).ok_or_else(|| self.overflow(secs))?
            }
            _ => match self.text()? {
                Some(text) => self.parse_temporal(text.trim())?,
                None => return Err(self.mismatch()),
            },
        };
        Ok(match self.target {
            ScalarKind::Timestamp => Cell::Timestamp(timestamp),
            ScalarKind::DateTime => Cell::DateTime(timestamp.naive_utc()),
            ScalarKind::Date => Cell::Date(timestamp.date_naive()),
            _ => return Err(self.mismatch()),
        })
    }

    fn parse_temporal(&self, text: &str) -> Result<DateTime<Utc>, CoerceError> {
        if let Ok(t) = DateTime::parse_from_rfc3339(text) {
            return Ok(t.with_timezone(&Utc));
        }
        for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
            if let Ok(t) = NaiveDateTime::parse_from_str(text, format) {
                return Ok(t.and_utc());
            }
        }
        NaiveDate::parse_from_str(text, "%Y-%m-%d")
            .map(|d| d.and_time(NaiveTime::MIN).and_utc())
            .map_err(|err| self.parse_error(text, err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn coerce(raw: SqlValue, target: ScalarKind) -> Result<Cell, CoerceError> {
        StandardCoercion.coerce(&raw, &ColumnMeta::new("c", "TEST"), target)
    }

    #[test]
    fn null_is_authoritative_for_every_kind() {
        for kind in [ScalarKind::Bool, ScalarKind::I32, ScalarKind::Text, ScalarKind::Date] {
            assert_eq!(coerce(SqlValue::Null, kind).unwrap(), Cell::Null);
        }
    }

    #[test]
    fn integers_narrow_with_overflow_checks() {
        assert_eq!(coerce(SqlValue::Int(7), ScalarKind::U8).unwrap(), Cell::U8(7));
        assert_eq!(
            coerce(SqlValue::UInt(70_000), ScalarKind::I32).unwrap(),
            Cell::I32(70_000)
        );
        assert!(matches!(
            coerce(SqlValue::Int(300), ScalarKind::U8),
            Err(CoerceError::Overflow { .. })
        ));
        assert!(matches!(
            coerce(SqlValue::Int(-1), ScalarKind::U32),
            Err(CoerceError::Overflow { .. })
        ));
    }

    #[test]
    fn fractional_float_is_not_an_integer() {
        assert_eq!(coerce(SqlValue::Float(4.0), ScalarKind::I64).unwrap(), Cell::I64(4));
        assert!(matches!(
            coerce(SqlValue::Float(4.5), ScalarKind::I64),
            Err(CoerceError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn f32_overflow() {
        assert!(matches!(
            coerce(SqlValue::Float(1e300), ScalarKind::F32),
            Err(CoerceError::Overflow { .. })
        ));
        assert_eq!(coerce(SqlValue::Int(2), ScalarKind::F32).unwrap(), Cell::F32(2.0));
    }

    #[test]
    fn text_and_bytes() {
        assert_eq!(
            coerce(SqlValue::Bytes(b"hello".to_vec()), ScalarKind::Text).unwrap(),
            Cell::Text("hello".to_string())
        );
        assert_eq!(
            coerce(SqlValue::Text(" 42 ".to_string()), ScalarKind::I16).unwrap(),
            Cell::I16(42)
        );
        assert_eq!(
            coerce(SqlValue::Int(42), ScalarKind::Text).unwrap(),
            Cell::Text("42".to_string())
        );
        assert!(matches!(
            coerce(SqlValue::Text("abc".to_string()), ScalarKind::I16),
            Err(CoerceError::Parse { .. })
        ));
    }

    #[test]
    fn booleans_from_postgres_literals() {
        assert_eq!(coerce(SqlValue::Text("t".into()), ScalarKind::Bool).unwrap(), Cell::Bool(true));
        assert_eq!(coerce(SqlValue::Int(0), ScalarKind::Bool).unwrap(), Cell::Bool(false));
        assert!(matches!(
            coerce(SqlValue::Float(1.0), ScalarKind::Bool),
            Err(CoerceError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn temporal_values() {
        let ts = Utc.with_ymd_and_hms(2020, 5, 17, 10, 30, 0).unwrap();
        assert_eq!(
            coerce(SqlValue::Text("2020-05-17T10:30:00Z".into()), ScalarKind::Timestamp).unwrap(),
            Cell::Timestamp(ts)
        );
        assert_eq!(
            coerce(SqlValue::Text("2020-05-17 10:30:00".into()), ScalarKind::DateTime).unwrap(),
            Cell::DateTime(ts.naive_utc())
        );
        assert_eq!(
            coerce(SqlValue::Timestamp(ts), ScalarKind::Date).unwrap(),
            Cell::Date(ts.date_naive())
        );
        assert!(matches!(
            coerce(SqlValue::Bool(true), ScalarKind::Timestamp),
            Err(CoerceError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn closures_are_coercions() {
        let always_zero =
            |_: &SqlValue, _: &ColumnMeta, _: ScalarKind| -> Result<Cell, CoerceError> {
                Ok(Cell::I64(0))
            };
        let cell = always_zero
            .coerce(&SqlValue::Text("x".into()), &ColumnMeta::untyped("c"), ScalarKind::I64)
            .unwrap();
        assert_eq!(cell, Cell::I64(0));
    }

    mod narrowing {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn i32_accepts_exactly_the_values_that_fit(value in any::<i64>()) {
                match (coerce(SqlValue::Int(value), ScalarKind::I32), i32::try_from(value)) {
                    (Ok(cell), Ok(expected)) => prop_assert_eq!(cell, Cell::I32(expected)),
                    (Err(CoerceError::Overflow { .. }), Err(_)) => {}
                    (got, want) => prop_assert!(false, "{value}: got {got:?}, want {want:?}"),
                }
            }

            #[test]
            fn u16_from_unsigned_matches_try_from(value in any::<u64>()) {
                let got = coerce(SqlValue::UInt(value), ScalarKind::U16).ok();
                prop_assert_eq!(got, u16::try_from(value).ok().map(Cell::U16));
            }

            #[test]
            fn text_and_integer_forms_agree(value in any::<i64>()) {
                prop_assert_eq!(
                    coerce(SqlValue::Text(value.to_string()), ScalarKind::I64).unwrap(),
                    coerce(SqlValue::Int(value), ScalarKind::I64).unwrap()
                );
            }
        }
    }
}
