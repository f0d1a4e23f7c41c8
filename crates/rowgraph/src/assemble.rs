//! Graph assembly: turns resolution tables into destination values.
//!
//! Post-order: every entity receives its children's assembled values before it
//! is handed up to its parent, so ownership moves bottom-up and no entity is
//! shared.

use crate::config::AmbiguityPolicy;
use crate::error::{MapError, Result};
use crate::plan::{Cardinality, MapperNode};
use crate::resolve::{EntityValue, ResolutionTable, ResolvedEntity};
use crate::shape::Resolved;

/// Assembles the entities resolved for `node` under one parent.
///
/// Collections yield `Resolved::Many` in first-seen order; a collection behind
/// `Option` with nothing in it yields `Resolved::Absent`. Associations yield
/// `Resolved::Absent` when nothing was resolved, and go through `policy` when
/// more than one entity was.
pub(crate) fn assemble(
    node: &MapperNode,
    table: ResolutionTable,
    policy: AmbiguityPolicy,
) -> Result<Resolved> {
    match node.cardinality {
        Cardinality::Collection => {
            if table.is_empty() && node.is_pointer_container {
                return Ok(Resolved::Absent);
            }
            let items = table
                .into_entities()
                .into_iter()
                .map(|entity| assemble_entity(node, entity, policy))
                .collect::<Result<Vec<_>>>()?;
            Ok(Resolved::Many(items))
        }
        Cardinality::Association => {
            let distinct = table.len();
            let mut entities = table.into_entities().into_iter();
            let Some(first) = entities.next() else {
                return Ok(Resolved::Absent);
            };
            if distinct > 1 {
                match policy {
                    AmbiguityPolicy::Error => {
                        return Err(MapError::AmbiguousAssociation {
                            path: node.path(),
                            distinct,
                        });
                    }
                    AmbiguityPolicy::KeepFirst => {
                        tracing::warn!(
                            path = %node.path(),
                            distinct,
                            dropped = distinct - 1,
                            "single-entity field resolved to several entities; keeping the first"
                        );
                    }
                }
            }
            assemble_entity(node, first, policy)
        }
    }
}

fn assemble_entity(
    node: &MapperNode,
    entity: ResolvedEntity,
    policy: AmbiguityPolicy,
) -> Result<Resolved> {
    let ResolvedEntity {
        value,
        mut children,
    } = entity;
    match value {
        EntityValue::Scalar(cell) => Ok(Resolved::Cell(cell)),
        EntityValue::Record(mut record) => {
            for (slot, child) in &node.children {
                let table = children.remove(slot).unwrap_or_default();
                let assembled = assemble(child, table, policy)?;
                record.set_field(*slot, assembled)?;
            }
            Ok(Resolved::Entity(record.into_any()))
        }
    }
}
