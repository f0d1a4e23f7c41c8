/// Makes a struct mappable.
///
/// Lists the fields that take part in mapping, in declaration order. Fields
/// that are not listed are never touched. `field as "name"` overrides the name
/// used for column matching.
///
/// The struct must implement `Default` and `Send`, and every listed field
/// type must implement [`Element`](crate::Element).
///
/// ```
/// #[derive(Debug, Default)]
/// struct Author {
///     author_id: u32,
///     name: Option<String>,
/// }
///
/// #[derive(Debug, Default)]
/// struct Blog {
///     blog_id: u32,
///     title: String,
///     author: Option<Author>,
///     scratch: Vec<u8>, // not mapped
/// }
///
/// rowgraph::entity!(Author { author_id, name });
/// rowgraph::entity!(Blog { blog_id, title as "blog_title", author });
/// ```
#[macro_export]
macro_rules! entity {
    (@name $field:ident) => {
        ::std::stringify!($field)
    };
    (@name $field:ident as $tag:literal) => {
        $tag
    };
    ($name:ident { $($field:ident $(as $tag:literal)?),* $(,)? }) => {
        impl $crate::Entity for $name {
            #[allow(unused_assignments, unused_mut, unused_variables)]
            fn set_field(
                &mut self,
                slot: usize,
                value: $crate::Resolved,
            ) -> ::std::result::Result<(), $crate::MapError> {
                let mut index = 0usize;
                $(
                    if slot == index {
                        return $crate::shape::assign_field(&mut self.$field, value);
                    }
                    index += 1;
                )*
                ::std::result::Result::Err($crate::MapError::UnknownSlot {
                    entity: ::std::any::type_name::<Self>(),
                    slot,
                })
            }

            fn into_any(
                self: ::std::boxed::Box<Self>,
            ) -> ::std::boxed::Box<dyn ::std::any::Any + ::std::marker::Send> {
                self
            }
        }

        impl $crate::Element for $name {
            fn shape() -> $crate::Shape {
                $crate::Shape::Entity($crate::EntityRef::of::<$name>())
            }

            fn from_resolved(
                value: $crate::Resolved,
            ) -> ::std::result::Result<Self, $crate::MapError> {
                $crate::shape::downcast_entity::<$name>(value)
            }
        }

        impl $crate::EntityType for $name {
            fn fields() -> ::std::vec::Vec<$crate::FieldDef> {
                ::std::vec![
                    $(
                        $crate::FieldDef::new(
                            $crate::entity!(@name $field $(as $tag)?),
                            $crate::shape::shape_of::<$name, _>(|entity| &entity.$field),
                        ),
                    )*
                ]
            }
        }
    };
}
