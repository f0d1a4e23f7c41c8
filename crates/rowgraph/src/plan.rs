//! Mapper tree: one node per entity position in the destination graph.
//!
//! The analyzer walks a destination [`Shape`] and produces an unallocated
//! tree; [`crate::columns`] then assigns result columns to it.

use crate::error::{MapError, Result};
use crate::shape::{EntityRef, Shape};
use rowgraph_value::ScalarKind;
use std::any::TypeId;
use std::collections::BTreeMap;

/// Has-one or has-many.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    Association,
    Collection,
}

/// What a node materializes per identity key.
#[derive(Debug, Clone)]
pub enum NodeElement {
    Entity(EntityRef),
    /// Basic node: a collection of plain values.
    Scalar { kind: ScalarKind, nullable: bool },
}

/// How a field receives its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldTarget {
    /// Set directly from one column.
    Scalar { kind: ScalarKind, nullable: bool },
    /// Filled from the child node in the same slot.
    Child,
}

#[derive(Debug, Clone)]
pub struct FieldMeta {
    pub name: String,
    pub shape: Shape,
    /// Declared behind `Option` or `Box`.
    pub is_pointer: bool,
    pub target: FieldTarget,
}

/// A result column claimed by a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClaimedColumn {
    /// Position of the column in the result.
    pub column_index: usize,
    /// Field slot receiving the value; always 0 for basic nodes.
    pub slot: usize,
}

#[derive(Debug, Clone)]
pub struct MapperNode {
    pub cardinality: Cardinality,
    /// The collection itself sits behind a pointer (`Option<Vec<_>>`).
    pub is_pointer_container: bool,
    /// Elements sit behind a pointer (`Vec<Box<_>>`, `Option<Author>`).
    pub element_is_pointer: bool,
    /// A row whose claimed columns are all NULL yields no entity here.
    pub is_optional: bool,
    pub is_basic: bool,
    pub element: NodeElement,
    pub fields: BTreeMap<usize, FieldMeta>,
    pub claimed_columns: BTreeMap<String, ClaimedColumn>,
    pub sorted_column_indexes: Vec<usize>,
    /// Columns claimed by every ancestor node.
    pub ancestor_columns: BTreeMap<String, ClaimedColumn>,
    /// Field names leading to this node, outermost first.
    pub ancestor_path: Vec<String>,
    pub children: BTreeMap<usize, MapperNode>,
}

impl MapperNode {
    /// Dotted field path, `<root>` for the root.
    pub fn path(&self) -> String {
        if self.ancestor_path.is_empty() {
            "<root>".to_string()
        } else {
            self.ancestor_path.join(".")
        }
    }

    pub fn element_name(&self) -> String {
        match &self.element {
            NodeElement::Entity(entity) => entity.short_name().to_string(),
            NodeElement::Scalar { kind, .. } => kind.name().to_string(),
        }
    }

    /// Claimed columns ordered by result position.
    pub fn claimed_in_column_order(&self) -> Vec<(&str, ClaimedColumn)> {
        let mut claimed: Vec<(&str, ClaimedColumn)> = self
            .claimed_columns
            .iter()
            .map(|(name, column)| (name.as_str(), *column))
            .collect();
        claimed.sort_by_key(|(_, column)| column.column_index);
        claimed
    }

    /// This node and all descendants, depth first.
    pub fn walk(&self) -> Vec<&MapperNode> {
        let mut out = vec![self];
        for child in self.children.values() {
            out.extend(child.walk());
        }
        out
    }
}

// ============================================================================
// Classification
// ============================================================================

struct Peeled<'a> {
    core: &'a Shape,
    optional: bool,
    pointer: bool,
}

fn peel(shape: &Shape) -> Peeled<'_> {
    let mut peeled = Peeled {
        core: shape,
        optional: false,
        pointer: false,
    };
    loop {
        match peeled.core {
            Shape::Optional(inner) => {
                peeled.optional = true;
                peeled.pointer = true;
                peeled.core = inner;
            }
            Shape::Boxed(inner) => {
                peeled.pointer = true;
                peeled.core = inner;
            }
            _ => return peeled,
        }
    }
}

enum Classified<'a> {
    Scalar {
        kind: ScalarKind,
        nullable: bool,
        pointer: bool,
    },
    Association {
        entity: &'a EntityRef,
        optional: bool,
        pointer: bool,
    },
    Collection {
        element: NodeElement,
        container_pointer: bool,
        element_pointer: bool,
    },
    Unsupported(&'static str),
}

fn classify(shape: &Shape) -> Classified<'_> {
    let outer = peel(shape);
    match outer.core {
        Shape::Scalar(kind) => Classified::Scalar {
            kind: *kind,
            nullable: outer.optional,
            pointer: outer.pointer,
        },
        Shape::Entity(entity) => Classified::Association {
            entity,
            optional: outer.optional,
            pointer: outer.pointer,
        },
        Shape::Sequence(inner) => {
            let element = peel(inner);
            let node_element = match element.core {
                Shape::Entity(entity) => NodeElement::Entity(*entity),
                Shape::Scalar(kind) => NodeElement::Scalar {
                    kind: *kind,
                    nullable: element.optional,
                },
                _ => return Classified::Unsupported("sequences of sequences are not supported"),
            };
            Classified::Collection {
                element: node_element,
                container_pointer: outer.pointer,
                element_pointer: element.pointer,
            }
        }
        Shape::Optional(_) | Shape::Boxed(_) => {
            Classified::Unsupported("pointer wrappers could not be resolved")
        }
    }
}

// ============================================================================
// Analyzer
// ============================================================================

/// Builds the unallocated mapper tree for a destination shape.
///
/// The destination must be an entity or a sequence of entities, optionally
/// behind `Option`/`Box`.
pub fn analyze(destination: &Shape, max_depth: usize) -> Result<MapperNode> {
    let unsupported = |reason: &str| MapError::UnsupportedShape {
        type_name: destination.describe(),
        reason: reason.to_string(),
    };
    let mut analyzer = Analyzer {
        max_depth,
        stack: Vec::new(),
    };
    match classify(destination) {
        Classified::Association {
            entity, pointer, ..
        } => analyzer.entity_node(
            *entity,
            Cardinality::Association,
            false,
            pointer,
            false,
            Vec::new(),
        ),
        Classified::Collection {
            element: NodeElement::Entity(entity),
            container_pointer,
            element_pointer,
        } => analyzer.entity_node(
            entity,
            Cardinality::Collection,
            container_pointer,
            element_pointer,
            false,
            Vec::new(),
        ),
        Classified::Collection { .. } => Err(unsupported(
            "destination must be an entity or a sequence of entities, not a sequence of scalars",
        )),
        Classified::Scalar { .. } => Err(unsupported(
            "destination must be an entity or a sequence of entities",
        )),
        Classified::Unsupported(reason) => Err(unsupported(reason)),
    }
}

struct Analyzer {
    max_depth: usize,
    /// Entity types on the current descent path.
    stack: Vec<(TypeId, &'static str)>,
}

impl Analyzer {
    fn entity_node(
        &mut self,
        entity: EntityRef,
        cardinality: Cardinality,
        is_pointer_container: bool,
        element_is_pointer: bool,
        is_optional: bool,
        ancestor_path: Vec<String>,
    ) -> Result<MapperNode> {
        let type_id = entity.type_id();
        if self.stack.iter().any(|(seen, _)| *seen == type_id) {
            let mut path: Vec<&str> = self.stack.iter().map(|(_, name)| *name).collect();
            path.push(entity.short_name());
            return Err(MapError::Recursion {
                type_name: entity.short_name().to_string(),
                path: path.join(" -> "),
            });
        }
        if self.stack.len() >= self.max_depth {
            return Err(MapError::DepthExceeded {
                limit: self.max_depth,
                path: ancestor_path.join("."),
            });
        }

        self.stack.push((type_id, entity.short_name()));
        let mut fields = BTreeMap::new();
        let mut children = BTreeMap::new();

        for (slot, def) in entity.fields().into_iter().enumerate() {
            let field_path = || {
                let mut path = ancestor_path.clone();
                path.push(def.name.to_string());
                path
            };
            let (is_pointer, target) = match classify(&def.shape) {
                Classified::Scalar {
                    kind,
                    nullable,
                    pointer,
                } => (pointer, FieldTarget::Scalar { kind, nullable }),
                Classified::Association {
                    entity: child,
                    optional,
                    pointer,
                } => {
                    let node = self.entity_node(
                        *child,
                        Cardinality::Association,
                        false,
                        pointer,
                        optional,
                        field_path(),
                    )?;
                    children.insert(slot, node);
                    (pointer, FieldTarget::Child)
                }
                Classified::Collection {
                    element,
                    container_pointer,
                    element_pointer,
                } => {
                    let node = match element {
                        NodeElement::Entity(child) => self.entity_node(
                            child,
                            Cardinality::Collection,
                            container_pointer,
                            element_pointer,
                            true,
                            field_path(),
                        )?,
                        NodeElement::Scalar { nullable, .. } => MapperNode {
                            cardinality: Cardinality::Collection,
                            is_pointer_container: container_pointer,
                            element_is_pointer: element_pointer,
                            // NULL is a value for `Vec<Option<_>>`.
                            is_optional: !nullable,
                            is_basic: true,
                            element,
                            fields: BTreeMap::new(),
                            claimed_columns: BTreeMap::new(),
                            sorted_column_indexes: Vec::new(),
                            ancestor_columns: BTreeMap::new(),
                            ancestor_path: field_path(),
                            children: BTreeMap::new(),
                        },
                    };
                    children.insert(slot, node);
                    (container_pointer, FieldTarget::Child)
                }
                Classified::Unsupported(reason) => {
                    return Err(MapError::UnsupportedShape {
                        type_name: format!("{}.{}", entity.short_name(), def.name),
                        reason: reason.to_string(),
                    });
                }
            };
            fields.insert(
                slot,
                FieldMeta {
                    name: def.name.to_string(),
                    shape: def.shape,
                    is_pointer,
                    target,
                },
            );
        }
        self.stack.pop();

        Ok(MapperNode {
            cardinality,
            is_pointer_container,
            element_is_pointer,
            is_optional,
            is_basic: false,
            element: NodeElement::Entity(entity),
            fields,
            claimed_columns: BTreeMap::new(),
            sorted_column_indexes: Vec::new(),
            ancestor_columns: BTreeMap::new(),
            ancestor_path,
            children,
        })
    }
}
