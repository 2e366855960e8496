//! Core OVSDB (RFC 7047) client types: the schema model, the discriminated
//! wire representation, and bidirectional value marshalling.
//!
//! Everything here is pure and immutable after construction: decode a
//! [`DatabaseSchema`] once, share it behind an `Arc`, and call the
//! [`marshal`] functions from as many tasks as needed without locking.

pub mod marshal;
pub mod native;
pub mod schema;
pub mod wire;

pub use marshal::{is_default_value, native_shape_of, native_to_ovs, ovs_to_native, MarshalError};
pub use native::{
    AtomicShape, NativeAtom, NativeField, NativeScalar, NativeShape, NativeValue,
};
pub use schema::{
    BaseType, ColumnSchema, ColumnType, DatabaseSchema, ExtendedType, RefType, SchemaError,
    TableSchema, UNLIMITED,
};
pub use wire::{
    Condition, ConditionFunction, Mutation, Mutator, Operation, OvsValue, Row, RowUpdate,
    TableUpdate, TableUpdates,
};
