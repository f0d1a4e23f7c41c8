use crate::rows::RowSourceError;
use rowgraph_value::CoerceError;
use thiserror::Error;

/// Everything that can abort a mapping call.
///
/// Tree-building errors (`UnsupportedShape`, `Recursion`, `DepthExceeded`) are
/// raised before the first row is read and are never cached.
#[derive(Debug, Error)]
pub enum MapError {
    #[error("cannot map rows onto {type_name}: {reason}")]
    UnsupportedShape { type_name: String, reason: String },

    #[error("{type_name} nests itself ({path}); recursive destinations cannot be mapped")]
    Recursion { type_name: String, path: String },

    #[error("destination nesting exceeds {limit} levels at {path}")]
    DepthExceeded { limit: usize, path: String },

    #[error("column `{column}` is NULL but {field} cannot hold NULL; use an Option field")]
    NullIntoNonNullable { column: String, field: String },

    #[error(transparent)]
    Coerce(#[from] CoerceError),

    #[error(
        "{path} holds a single entity but the rows describe {distinct} distinct ones; \
         check the query's joins or change the field to a Vec"
    )]
    AmbiguousAssociation { path: String, distinct: usize },

    #[error(transparent)]
    RowSource(#[from] RowSourceError),

    #[error("row has {actual} values but the result declares {expected} columns")]
    RowWidth { expected: usize, actual: usize },

    #[error("{entity} has no field in slot {slot}")]
    UnknownSlot { entity: &'static str, slot: usize },

    #[error("expected {expected}, found {found}")]
    ShapeMismatch { expected: String, found: String },
}

pub type Result<T> = std::result::Result<T, MapError>;
