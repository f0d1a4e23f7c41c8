//! Destination shapes and the capability interface for caller-defined types.
//!
//! Rust has no runtime reflection, so every type that can appear in a
//! destination implements [`Element`]:
//!
//! - it reports its [`Shape`] (scalar, entity, `Option`, `Box`, `Vec`)
//! - it knows how to rebuild itself from an assembled [`Resolved`] value
//!
//! Scalars, `Option<T>`, `Box<T>` and `Vec<T>` are covered here. Structs become
//! entities through the [`entity!`](crate::entity) macro, which implements
//! [`Entity`] (slot-indexed field assignment) and [`EntityType`] (field list).

use crate::error::{MapError, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rowgraph_value::{Cell, ScalarKind};
use std::any::{Any, TypeId};
use std::fmt;

// ============================================================================
// Shapes
// ============================================================================

/// Runtime description of a destination type.
#[derive(Debug, Clone)]
pub enum Shape {
    Scalar(ScalarKind),
    Entity(EntityRef),
    /// `Option<T>`: a pointer that may be absent / a nullable wrapper.
    Optional(Box<Shape>),
    /// `Box<T>`: a pointer that is never absent.
    Boxed(Box<Shape>),
    /// `Vec<T>`
    Sequence(Box<Shape>),
}

impl Shape {
    /// Rust-like rendering, e.g. `Option<Vec<Box<Post>>>`.
    pub fn describe(&self) -> String {
        match self {
            Shape::Scalar(kind) => kind.name().to_string(),
            Shape::Entity(entity) => entity.short_name().to_string(),
            Shape::Optional(inner) => format!("Option<{}>", inner.describe()),
            Shape::Boxed(inner) => format!("Box<{}>", inner.describe()),
            Shape::Sequence(inner) => format!("Vec<{}>", inner.describe()),
        }
    }
}

/// Lazily evaluated handle to an entity type.
///
/// Holds function pointers only, so a type that mentions itself in a field can
/// still produce its shape; self-nesting is rejected later by the analyzer.
#[derive(Clone, Copy)]
pub struct EntityRef {
    type_id: fn() -> TypeId,
    type_name: fn() -> &'static str,
    fields: fn() -> Vec<FieldDef>,
    instantiate: fn() -> Box<dyn Entity>,
}

fn instantiate<T: EntityType>() -> Box<dyn Entity> {
    Box::new(T::default())
}

impl EntityRef {
    pub fn of<T: EntityType>() -> Self {
        Self {
            type_id: TypeId::of::<T>,
            type_name: std::any::type_name::<T>,
            fields: T::fields,
            instantiate: instantiate::<T>,
        }
    }

    pub fn type_id(&self) -> TypeId {
        (self.type_id)()
    }

    pub fn type_name(&self) -> &'static str {
        (self.type_name)()
    }

    /// Type name without its module path.
    pub fn short_name(&self) -> &'static str {
        let full = self.type_name();
        full.rsplit("::").next().unwrap_or(full)
    }

    /// Fields in declaration order; the position is the field's slot.
    pub fn fields(&self) -> Vec<FieldDef> {
        (self.fields)()
    }

    /// A fresh, default-valued instance.
    pub fn instantiate(&self) -> Box<dyn Entity> {
        (self.instantiate)()
    }
}

impl fmt::Debug for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EntityRef").field(&self.type_name()).finish()
    }
}

/// One mappable field of an entity.
#[derive(Debug, Clone)]
pub struct FieldDef {
    /// Effective name: the field identifier or its name tag.
    pub name: &'static str,
    pub shape: Shape,
}

impl FieldDef {
    pub fn new(name: &'static str, shape: Shape) -> Self {
        Self { name, shape }
    }
}

// ============================================================================
// Assembled values
// ============================================================================

/// A value produced by graph assembly, on its way into a destination field.
pub enum Resolved {
    /// No entity was resolved for a has-one field.
    Absent,
    Cell(Cell),
    /// A finished entity; the box holds the concrete entity type.
    Entity(Box<dyn Any + Send>),
    Many(Vec<Resolved>),
}

impl Resolved {
    pub fn describe(&self) -> String {
        match self {
            Resolved::Absent => "no value".to_string(),
            Resolved::Cell(Cell::Null) => "NULL".to_string(),
            Resolved::Cell(cell) => match cell.kind() {
                Some(kind) => format!("{kind} value"),
                None => "NULL".to_string(),
            },
            Resolved::Entity(_) => "entity".to_string(),
            Resolved::Many(items) => format!("sequence of {}", items.len()),
        }
    }
}

impl fmt::Debug for Resolved {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolved::Absent => f.write_str("Absent"),
            Resolved::Cell(cell) => f.debug_tuple("Cell").field(cell).finish(),
            Resolved::Entity(_) => f.write_str("Entity(..)"),
            Resolved::Many(items) => f.debug_tuple("Many").field(items).finish(),
        }
    }
}

// ============================================================================
// Capability traits
// ============================================================================

/// A type that can be a field of an entity or a mapping destination.
pub trait Element: Sized + Send + 'static {
    fn shape() -> Shape;

    fn from_resolved(value: Resolved) -> Result<Self>;

    /// Merge an assembled value into an existing destination.
    ///
    /// Replaces by default; sequences append.
    fn absorb(&mut self, value: Resolved) -> Result<()> {
        *self = Self::from_resolved(value)?;
        Ok(())
    }
}

/// Slot-indexed write access to a struct, the object-safe half of an entity.
pub trait Entity: Send + 'static {
    fn set_field(&mut self, slot: usize, value: Resolved) -> Result<()>;

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send>;
}

/// Static description of an entity type.
pub trait EntityType: Entity + Element + Default {
    fn fields() -> Vec<FieldDef>;
}

// ============================================================================
// Helpers used by `entity!`
// ============================================================================

#[doc(hidden)]
pub fn shape_of<E, F: Element>(_accessor: impl Fn(&E) -> &F) -> Shape {
    F::shape()
}

#[doc(hidden)]
pub fn assign_field<F: Element>(field: &mut F, value: Resolved) -> Result<()> {
    *field = F::from_resolved(value)?;
    Ok(())
}

#[doc(hidden)]
pub fn downcast_entity<T: EntityType>(value: Resolved) -> Result<T> {
    match value {
        Resolved::Entity(any) => any
            .downcast::<T>()
            .map(|entity| *entity)
            .map_err(|_| MapError::ShapeMismatch {
                expected: std::any::type_name::<T>().to_string(),
                found: "an entity of another type".to_string(),
            }),
        Resolved::Absent => Ok(T::default()),
        other => Err(MapError::ShapeMismatch {
            expected: std::any::type_name::<T>().to_string(),
            found: other.describe(),
        }),
    }
}

// ============================================================================
// Element impls
// ============================================================================

macro_rules! scalar_element {
    ($($ty:ty => $kind:ident),* $(,)?) => {$(
        impl Element for $ty {
            fn shape() -> Shape {
                Shape::Scalar(ScalarKind::$kind)
            }

            fn from_resolved(value: Resolved) -> Result<Self> {
                match value {
                    Resolved::Cell(Cell::$kind(v)) => Ok(v),
                    other => Err(MapError::ShapeMismatch {
                        expected: ScalarKind::$kind.name().to_string(),
                        found: other.describe(),
                    }),
                }
            }
        }
    )*};
}

scalar_element! {
    bool => Bool,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    f32 => F32,
    f64 => F64,
    String => Text,
    DateTime<Utc> => Timestamp,
    NaiveDateTime => DateTime,
    NaiveDate => Date,
}

impl<T: Element> Element for Option<T> {
    fn shape() -> Shape {
        Shape::Optional(Box::new(T::shape()))
    }

    fn from_resolved(value: Resolved) -> Result<Self> {
        match value {
            Resolved::Absent | Resolved::Cell(Cell::Null) => Ok(None),
            other => T::from_resolved(other).map(Some),
        }
    }

    fn absorb(&mut self, value: Resolved) -> Result<()> {
        match self {
            Some(inner) => inner.absorb(value),
            None => {
                *self = Self::from_resolved(value)?;
                Ok(())
            }
        }
    }
}

impl<T: Element> Element for Box<T> {
    fn shape() -> Shape {
        Shape::Boxed(Box::new(T::shape()))
    }

    fn from_resolved(value: Resolved) -> Result<Self> {
        T::from_resolved(value).map(Box::new)
    }

    fn absorb(&mut self, value: Resolved) -> Result<()> {
        (**self).absorb(value)
    }
}

impl<T: Element> Element for Vec<T> {
    fn shape() -> Shape {
        Shape::Sequence(Box::new(T::shape()))
    }

    fn from_resolved(value: Resolved) -> Result<Self> {
        match value {
            Resolved::Many(items) => items.into_iter().map(T::from_resolved).collect(),
            Resolved::Absent => Ok(Vec::new()),
            other => Err(MapError::ShapeMismatch {
                expected: "a sequence".to_string(),
                found: other.describe(),
            }),
        }
    }

    fn absorb(&mut self, value: Resolved) -> Result<()> {
        let items = Self::from_resolved(value)?;
        self.extend(items);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_shapes_describe_like_rust_types() {
        assert_eq!(
            <Option<Vec<Box<i64>>>>::shape().describe(),
            "Option<Vec<Box<i64>>>"
        );
        assert_eq!(<Vec<NaiveDate>>::shape().describe(), "Vec<NaiveDate>");
    }

    #[test]
    fn null_cells_become_none() {
        let value = <Option<String>>::from_resolved(Resolved::Cell(Cell::Null)).unwrap();
        assert_eq!(value, None);
        let value =
            <Option<String>>::from_resolved(Resolved::Cell(Cell::Text("a".into()))).unwrap();
        assert_eq!(value.as_deref(), Some("a"));
    }

    #[test]
    fn scalar_kind_mismatch_is_reported() {
        let err = u32::from_resolved(Resolved::Cell(Cell::I64(1))).unwrap_err();
        assert!(matches!(err, MapError::ShapeMismatch { .. }));
        let err = u32::from_resolved(Resolved::Cell(Cell::Null)).unwrap_err();
        assert!(err.to_string().contains("NULL"));
    }

    #[test]
    fn sequences_append_on_absorb() {
        let mut values = vec![1_i32];
        values
            .absorb(Resolved::Many(vec![
                Resolved::Cell(Cell::I32(2)),
                Resolved::Cell(Cell::I32(3)),
            ]))
            .unwrap();
        assert_eq!(values, vec![1, 2, 3]);

        let mut maybe: Option<Vec<i32>> = None;
        maybe
            .absorb(Resolved::Many(vec![Resolved::Cell(Cell::I32(4))]))
            .unwrap();
        assert_eq!(maybe, Some(vec![4]));
    }
}
