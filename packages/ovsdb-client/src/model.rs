//! User record types and their column bindings.
//!
//! A record type maps its fields onto the columns of one table through the
//! `ovs` annotation: each bound field carries `#[ovs("column")]` inside an
//! [`ovsdb_model!`](crate::ovsdb_model) invocation, and unmarked fields are
//! ignored by the binder. `_uuid` is a legal column binding.
//!
//! ```
//! use std::collections::BTreeMap;
//! use ovsdb_client::ovsdb_model;
//!
//! ovsdb_model! {
//!     #[derive(Debug, Default, Clone, PartialEq)]
//!     pub struct Bridge {
//!         #[ovs("_uuid")]
//!         pub uuid: String,
//!         #[ovs("name")]
//!         pub name: String,
//!         #[ovs("external_ids")]
//!         pub external_ids: BTreeMap<String, String>,
//!         pub scratch: i64,
//!     }
//! }
//! ```

use ovsdb_core::native::{NativeShape, NativeValue};

/// One field-to-column binding declared by a record type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Binding {
    /// Column name from the `ovs` annotation.
    pub column: &'static str,
    /// Name of the Rust field, for diagnostics.
    pub field: &'static str,
    /// Native shape the field's Rust type declares. The binder checks this
    /// against the schema before moving any data.
    pub shape: NativeShape,
}

/// A record type bound to table columns.
///
/// Implemented by [`ovsdb_model!`](crate::ovsdb_model); the binder reads and
/// writes fields only through this surface. The `'static` bound lets the
/// binder cache its per-(type, table) validation.
pub trait Model: 'static {
    /// The declared bindings, in field order.
    fn bindings() -> &'static [Binding]
    where
        Self: Sized;

    /// Reads the field bound to `column`. `None` when no field binds it.
    fn native_value(&self, column: &str) -> Option<NativeValue>;

    /// Writes the field bound to `column`. Values of the wrong shape and
    /// unbound columns are ignored; the binder validates shapes before it
    /// ever calls this.
    fn set_native_value(&mut self, column: &str, value: NativeValue);
}

/// Declares a record struct with `#[ovs("column")]` field annotations and
/// derives its [`Model`] implementation.
///
/// Fields without the annotation become plain struct fields the binder never
/// touches. Bound fields must be one of the native field types: `i64`,
/// `f64`, `bool`, `String`, `Vec<_>` of those, or `BTreeMap<_, _>` over
/// them.
#[macro_export]
macro_rules! ovsdb_model {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[ovs($column:literal)])?
                $fvis:vis $field:ident : $fty:ty
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis struct $name {
            $( $fvis $field: $fty, )*
        }

        impl $crate::model::Model for $name {
            fn bindings() -> &'static [$crate::model::Binding] {
                const BINDINGS: &[$crate::model::Binding] = &[
                    $( $(
                        $crate::model::Binding {
                            column: $column,
                            field: stringify!($field),
                            shape: <$fty as $crate::__private::NativeField>::SHAPE,
                        },
                    )? )*
                ];
                BINDINGS
            }

            fn native_value(&self, column: &str) -> Option<$crate::__private::NativeValue> {
                match column {
                    $( $(
                        $column => Some($crate::__private::NativeField::to_native(&self.$field)),
                    )? )*
                    _ => None,
                }
            }

            fn set_native_value(&mut self, column: &str, value: $crate::__private::NativeValue) {
                match column {
                    $( $(
                        $column => {
                            if let Some(value) =
                                <$fty as $crate::__private::NativeField>::from_native(value)
                            {
                                self.$field = value;
                            }
                        }
                    )? )*
                    _ => {}
                }
            }
        }
    };
}
