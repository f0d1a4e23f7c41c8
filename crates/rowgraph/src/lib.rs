//! Rowgraph: flat SQL rows in, nested entity graphs out.
//!
//! A join query returns parent values repeated on every row. Rowgraph reads
//! such a result once and rebuilds the object graph the caller declared:
//! one entity per distinct set of claimed values, children grouped under the
//! parent they were read with, first-seen order everywhere.
//!
//! ## Pipeline
//!
//! 1. **Analyze** (`plan`): walk the destination [`Shape`] into a mapper tree,
//!    one node per entity position. Self-nesting types are rejected.
//! 2. **Allocate** (`columns`): hand each result column to at most one field,
//!    parents first, by name and prefixed name.
//! 3. **Resolve** (`resolve`): per row, find or create the entity of every node
//!    from the values of its claimed columns.
//! 4. **Assemble** (`assemble`): move children into parents and the roots into
//!    the destination.
//!
//! Steps 1 and 2 depend only on column names and the destination type; their
//! result is cached per [`RowMapper`].
//!
//! ## Declaring destinations
//!
//! There is no runtime reflection, so structs opt in through [`entity!`]. Field
//! types are scalars, other entities, and `Option` / `Box` / `Vec` around them.

mod macros;

mod assemble;
pub mod cache;
pub mod columns;
pub mod config;
pub mod error;
pub mod mapper;
pub mod naming;
pub mod plan;
pub mod resolve;
pub mod rows;
pub mod shape;

pub use rowgraph_value as value;

// Re-export key types
pub use cache::{MapperCache, MapperTree};
pub use config::{AmbiguityPolicy, MapperConfig};
pub use error::{MapError, Result};
pub use mapper::RowMapper;
pub use plan::{Cardinality, MapperNode};
pub use rows::{MemoryRows, RowSource, RowSourceError};
pub use shape::{Element, Entity, EntityRef, EntityType, FieldDef, Resolved, Shape};
pub use value::{
    Cell, Coerce, CoerceError, ColumnMeta, ColumnType, ScalarKind, SqlValue, StandardCoercion,
};
