//! Row resolution: decides, row by row, whether each node sees a new entity
//! or one it has already materialized.
//!
//! Every node keeps a [`ResolutionTable`] keyed by [`IdentityKey`]. Child tables
//! hang off their parent entity, so two parents never share children even when
//! the children's keys collide. Claimed columns are coerced before the lookup,
//! so the key compares the values the entity would receive. Fields of an entity
//! are set once, from the first row carrying its key.

use crate::error::{MapError, Result};
use crate::plan::{FieldTarget, MapperNode, NodeElement};
use crate::shape::{Entity, Resolved};
use ahash::AHashMap;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rowgraph_value::{Cell, Coerce, ColumnMeta, ScalarKind, SqlValue};
use std::collections::BTreeMap;

// ============================================================================
// Identity keys
// ============================================================================

/// Hashable image of one coerced cell.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyAtom {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    /// IEEE-754 bits, with `-0.0` folded into `0.0` and all NaNs into one.
    Float(u64),
    Text(String),
    Timestamp(DateTime<Utc>),
    DateTime(NaiveDateTime),
    Date(NaiveDate),
}

fn float_bits(f: f64) -> u64 {
    if f.is_nan() {
        f64::NAN.to_bits()
    } else if f == 0.0 {
        0.0_f64.to_bits()
    } else {
        f.to_bits()
    }
}

impl From<&Cell> for KeyAtom {
    fn from(cell: &Cell) -> Self {
        match cell {
            Cell::Null => KeyAtom::Null,
            Cell::Bool(b) => KeyAtom::Bool(*b),
            Cell::I8(i) => KeyAtom::Int(i64::from(*i)),
            Cell::I16(i) => KeyAtom::Int(i64::from(*i)),
            Cell::I32(i) => KeyAtom::Int(i64::from(*i)),
            Cell::I64(i) => KeyAtom::Int(*i),
            Cell::U8(u) => KeyAtom::UInt(u64::from(*u)),
            Cell::U16(u) => KeyAtom::UInt(u64::from(*u)),
            Cell::U32(u) => KeyAtom::UInt(u64::from(*u)),
            Cell::U64(u) => KeyAtom::UInt(*u),
            Cell::F32(f) => KeyAtom::Float(float_bits(f64::from(*f))),
            Cell::F64(f) => KeyAtom::Float(float_bits(*f)),
            Cell::Text(s) => KeyAtom::Text(s.clone()),
            Cell::Timestamp(t) => KeyAtom::Timestamp(*t),
            Cell::DateTime(t) => KeyAtom::DateTime(*t),
            Cell::Date(d) => KeyAtom::Date(*d),
        }
    }
}

/// Structured composite of a node's coerced values for one row, in
/// ascending column order. Equal keys mean equal values in every claimed
/// column.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct IdentityKey(Vec<KeyAtom>);

impl IdentityKey {
    pub fn from_cells<'c>(cells: impl IntoIterator<Item = &'c Cell>) -> Self {
        Self(cells.into_iter().map(KeyAtom::from).collect())
    }

    /// True when every atom is NULL, including the empty key.
    pub fn is_all_null(&self) -> bool {
        self.0.iter().all(|atom| *atom == KeyAtom::Null)
    }

    pub fn atoms(&self) -> &[KeyAtom] {
        &self.0
    }
}

// ============================================================================
// Resolution tables
// ============================================================================

pub(crate) enum EntityValue {
    Record(Box<dyn Entity>),
    Scalar(Cell),
}

pub(crate) struct ResolvedEntity {
    pub value: EntityValue,
    /// One table per child node, keyed by the child's field slot.
    pub children: BTreeMap<usize, ResolutionTable>,
}

/// Append-only, insertion-ordered entity table of one node under one parent.
#[derive(Default)]
pub(crate) struct ResolutionTable {
    index: AHashMap<IdentityKey, usize>,
    entities: Vec<ResolvedEntity>,
}

impl ResolutionTable {
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Entities in first-seen order.
    pub fn into_entities(self) -> Vec<ResolvedEntity> {
        self.entities
    }

    fn insert(&mut self, key: IdentityKey, entity: ResolvedEntity) -> usize {
        let position = self.entities.len();
        self.entities.push(entity);
        self.index.insert(key, position);
        position
    }
}

// ============================================================================
// Resolver
// ============================================================================

/// One claimed column of a node, coerced for the current row.
struct CoercedColumn<'n> {
    name: &'n str,
    slot: usize,
    nullable: bool,
    /// Receiving field; `None` for the element of a basic node.
    field: Option<&'n str>,
    cell: Cell,
}

pub(crate) struct Resolver<'a> {
    columns: &'a [ColumnMeta],
    coercion: &'a dyn Coerce,
}

impl<'a> Resolver<'a> {
    pub fn new(columns: &'a [ColumnMeta], coercion: &'a dyn Coerce) -> Self {
        Self { columns, coercion }
    }

    /// Feeds one row through `node` and its descendants.
    pub fn resolve_row(
        &self,
        node: &MapperNode,
        row: &[SqlValue],
        table: &mut ResolutionTable,
    ) -> Result<()> {
        let coerced = self.coerce_claimed(node, row)?;
        let key = IdentityKey::from_cells(coerced.iter().map(|column| &column.cell));
        // A basic node without columns has no element to record.
        if key.is_all_null() && (node.is_optional || (node.is_basic && coerced.is_empty())) {
            return Ok(());
        }

        let position = match table.index.get(&key) {
            Some(&position) => position,
            None => {
                let entity = self.materialize(node, coerced)?;
                tracing::trace!(path = %node.path(), element = %node.element_name(), "new entity");
                table.insert(key, entity)
            }
        };

        let entity = &mut table.entities[position];
        for (slot, child) in &node.children {
            let child_table = entity.children.entry(*slot).or_default();
            self.resolve_row(child, row, child_table)?;
        }
        Ok(())
    }

    /// Coerces every claimed column of `node`, in column order.
    fn coerce_claimed<'n>(
        &self,
        node: &'n MapperNode,
        row: &[SqlValue],
    ) -> Result<Vec<CoercedColumn<'n>>> {
        node.claimed_in_column_order()
            .into_iter()
            .map(|(name, claimed)| {
                let (kind, nullable, field) = match &node.element {
                    NodeElement::Scalar { kind, nullable } => (*kind, *nullable, None),
                    NodeElement::Entity(entity) => {
                        let Some(field) = node.fields.get(&claimed.slot) else {
                            return Err(MapError::UnknownSlot {
                                entity: entity.type_name(),
                                slot: claimed.slot,
                            });
                        };
                        let FieldTarget::Scalar { kind, nullable } = field.target else {
                            return Err(MapError::ShapeMismatch {
                                expected: format!("a scalar field for column `{name}`"),
                                found: format!("nested field {}", field.name),
                            });
                        };
                        (kind, nullable, Some(field.name.as_str()))
                    }
                };
                Ok(CoercedColumn {
                    name,
                    slot: claimed.slot,
                    nullable,
                    field,
                    cell: self.coerce(claimed.column_index, row, kind)?,
                })
            })
            .collect()
    }

    fn materialize(&self, node: &MapperNode, coerced: Vec<CoercedColumn<'_>>) -> Result<ResolvedEntity> {
        for column in &coerced {
            if column.cell.is_null() && !column.nullable {
                let field = match (&node.element, column.field) {
                    (NodeElement::Entity(entity), Some(field)) => {
                        format!("{}.{}", entity.short_name(), field)
                    }
                    _ => format!("element of {}", node.path()),
                };
                return Err(MapError::NullIntoNonNullable {
                    column: column.name.to_string(),
                    field,
                });
            }
        }

        let value = match &node.element {
            NodeElement::Scalar { .. } => {
                EntityValue::Scalar(coerced.into_iter().last().map_or(Cell::Null, |c| c.cell))
            }
            NodeElement::Entity(entity) => {
                let mut record = entity.instantiate();
                for column in coerced {
                    record.set_field(column.slot, Resolved::Cell(column.cell))?;
                }
                EntityValue::Record(record)
            }
        };

        let children = node
            .children
            .keys()
            .map(|slot| (*slot, ResolutionTable::default()))
            .collect();
        Ok(ResolvedEntity { value, children })
    }

    fn coerce(&self, column_index: usize, row: &[SqlValue], kind: ScalarKind) -> Result<Cell> {
        Ok(self
            .coercion
            .coerce(&row[column_index], &self.columns[column_index], kind)?)
    }
}
