//! Bidirectional value marshalling between wire and native forms.
//!
//! All conversion is driven by the column's extended type, never by sniffing
//! the wire value: the same JSON `42` becomes `Integer(42)` under an integer
//! column and `Real(42.0)` under a real column. The functions here are pure
//! and reentrant; they read the schema and nothing else.

use std::collections::BTreeMap;

use crate::native::{AtomicShape, NativeScalar, NativeShape, NativeValue};
use crate::schema::{BaseType, ColumnSchema, ColumnType, ExtendedType};
use crate::wire::OvsValue;

/// Errors from value marshalling. Every variant names the column and the
/// offending value.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MarshalError {
    #[error("column {column}: cannot marshal {value} as {expected}")]
    TypeMismatch { column: String, expected: String, value: String },
    #[error("column {column}: value {value} is not in the enum domain {domain:?}")]
    EnumDomain { column: String, value: String, domain: Vec<NativeScalar> },
    #[error("column {column}: value {value} is outside the declared range [{min}, {max}]")]
    OutOfRange { column: String, value: String, min: String, max: String },
}

/// The native shape of a column, total over every decodable column.
#[must_use]
pub fn native_shape_of(column: &ColumnSchema) -> NativeShape {
    match column.kind {
        ExtendedType::Integer => NativeShape::Atomic(AtomicShape::Integer),
        ExtendedType::Real => NativeShape::Atomic(AtomicShape::Real),
        ExtendedType::Boolean => NativeShape::Atomic(AtomicShape::Boolean),
        ExtendedType::String | ExtendedType::Uuid => NativeShape::Atomic(AtomicShape::String),
        ExtendedType::Enum => NativeShape::Atomic(key_shape(column)),
        ExtendedType::Set => NativeShape::Set(key_shape(column)),
        ExtendedType::Map => NativeShape::Map(key_shape(column), value_shape(column)),
    }
}

/// True iff `value` is the zero of the column's native shape: empty string,
/// numeric zero, false, empty sequence, or empty mapping. A value of the
/// wrong shape is never the column's default.
#[must_use]
pub fn is_default_value(column: &ColumnSchema, value: &NativeValue) -> bool {
    match (native_shape_of(column), value) {
        (NativeShape::Atomic(_), NativeValue::Atomic(scalar)) => scalar.is_default(),
        (NativeShape::Set(_), NativeValue::Set(elems)) => elems.is_empty(),
        (NativeShape::Map(..), NativeValue::Map(entries)) => entries.is_empty(),
        _ => false,
    }
}

/// Converts a wire value into the column's native form.
///
/// Single-valued sets (`max == 1`) accept the bare element; empty wire sets
/// become empty sequences. Integer wire scalars coerce to reals under a
/// real-typed column. The wire→native direction trusts declared numeric
/// bounds (server data is presumed valid); enum domains are enforced.
///
/// # Errors
///
/// [`MarshalError::TypeMismatch`] when the wire value does not fit the
/// column's extended type, [`MarshalError::EnumDomain`] when an enum value
/// falls outside the declared domain.
pub fn ovs_to_native(column: &ColumnSchema, value: &OvsValue) -> Result<NativeValue, MarshalError> {
    let native = match column.kind {
        ExtendedType::Integer
        | ExtendedType::Real
        | ExtendedType::Boolean
        | ExtendedType::String
        | ExtendedType::Uuid
        | ExtendedType::Enum => NativeValue::Atomic(wire_atom(column, key_kind(column), value)?),
        ExtendedType::Set => match value {
            OvsValue::Set(elems) => NativeValue::Set(
                elems
                    .iter()
                    .map(|elem| wire_atom(column, key_kind(column), elem))
                    .collect::<Result<_, _>>()?,
            ),
            bare if max_is_one(column) => {
                NativeValue::Set(vec![wire_atom(column, key_kind(column), bare)?])
            }
            other => return Err(wire_mismatch(column, "set", other)),
        },
        ExtendedType::Map => match value {
            OvsValue::Map(entries) => {
                let mut map = BTreeMap::new();
                for (key, val) in entries {
                    map.insert(
                        wire_atom(column, key_kind(column), key)?,
                        wire_atom(column, value_kind(column), val)?,
                    );
                }
                NativeValue::Map(map)
            }
            other => return Err(wire_mismatch(column, "map", other)),
        },
    };
    check_enum_domain(column, &native)?;
    Ok(native)
}

/// Converts a native value into the column's wire form.
///
/// Sequences always emit the `["set", […]]` form, including lengths zero and
/// one. Uuid-typed values emit `["uuid", …]` when the string is a canonical
/// UUID and `["named-uuid", …]` otherwise. Declared numeric bounds and enum
/// domains are enforced on this path.
///
/// # Errors
///
/// [`MarshalError::TypeMismatch`], [`MarshalError::EnumDomain`], or
/// [`MarshalError::OutOfRange`].
pub fn native_to_ovs(column: &ColumnSchema, value: &NativeValue) -> Result<OvsValue, MarshalError> {
    check_enum_domain(column, value)?;
    match column.kind {
        ExtendedType::Integer
        | ExtendedType::Real
        | ExtendedType::Boolean
        | ExtendedType::String
        | ExtendedType::Uuid
        | ExtendedType::Enum => match value {
            NativeValue::Atomic(scalar) => {
                native_atom(column, key_kind(column), key_base(column), scalar)
            }
            other => Err(native_mismatch(column, &column.kind.to_string(), other)),
        },
        ExtendedType::Set => match value {
            NativeValue::Set(elems) => Ok(OvsValue::Set(
                elems
                    .iter()
                    .map(|elem| native_atom(column, key_kind(column), key_base(column), elem))
                    .collect::<Result<_, _>>()?,
            )),
            other => Err(native_mismatch(column, "set", other)),
        },
        ExtendedType::Map => match value {
            NativeValue::Map(entries) => {
                let mut pairs = Vec::with_capacity(entries.len());
                for (key, val) in entries {
                    pairs.push((
                        native_atom(column, key_kind(column), key_base(column), key)?,
                        native_atom(column, value_kind(column), value_base(column), val)?,
                    ));
                }
                Ok(OvsValue::Map(pairs))
            }
            other => Err(native_mismatch(column, "map", other)),
        },
    }
}

fn column_type(column: &ColumnSchema) -> Option<&ColumnType> {
    column.ty.as_ref()
}

/// The atomic kind of the column's key side: the element kind for sets and
/// maps, the column's own kind for bare atomics.
fn key_kind(column: &ColumnSchema) -> ExtendedType {
    column_type(column).map_or(column.kind, |ty| ty.key.kind)
}

fn value_kind(column: &ColumnSchema) -> ExtendedType {
    column_type(column)
        .and_then(|ty| ty.value.as_ref())
        .map_or(ExtendedType::String, |value| value.kind)
}

fn key_base(column: &ColumnSchema) -> Option<&BaseType> {
    column_type(column).map(|ty| &ty.key)
}

fn value_base(column: &ColumnSchema) -> Option<&BaseType> {
    column_type(column).and_then(|ty| ty.value.as_ref())
}

fn key_shape(column: &ColumnSchema) -> AtomicShape {
    key_kind(column).atomic_shape().unwrap_or(AtomicShape::String)
}

fn value_shape(column: &ColumnSchema) -> AtomicShape {
    value_kind(column).atomic_shape().unwrap_or(AtomicShape::String)
}

fn max_is_one(column: &ColumnSchema) -> bool {
    column_type(column).is_some_and(|ty| ty.max == 1)
}

fn wire_mismatch(column: &ColumnSchema, expected: &str, value: &OvsValue) -> MarshalError {
    MarshalError::TypeMismatch {
        column: column.name.clone(),
        expected: expected.to_string(),
        value: format!("{value:?}"),
    }
}

fn native_mismatch(column: &ColumnSchema, expected: &str, value: &NativeValue) -> MarshalError {
    MarshalError::TypeMismatch {
        column: column.name.clone(),
        expected: expected.to_string(),
        value: value.to_string(),
    }
}

/// Converts one wire scalar under an atomic kind.
fn wire_atom(
    column: &ColumnSchema,
    kind: ExtendedType,
    value: &OvsValue,
) -> Result<NativeScalar, MarshalError> {
    match (kind, value) {
        (ExtendedType::Integer, OvsValue::Integer(v)) => Ok(NativeScalar::Integer(*v)),
        (ExtendedType::Real, OvsValue::Real(v)) => Ok(NativeScalar::Real(*v)),
        #[allow(clippy::cast_precision_loss)]
        (ExtendedType::Real, OvsValue::Integer(v)) => Ok(NativeScalar::Real(*v as f64)),
        (ExtendedType::Boolean, OvsValue::Boolean(v)) => Ok(NativeScalar::Boolean(*v)),
        (ExtendedType::String, OvsValue::String(v)) => Ok(NativeScalar::String(v.clone())),
        (ExtendedType::Uuid, OvsValue::Uuid(v) | OvsValue::NamedUuid(v) | OvsValue::String(v)) => {
            Ok(NativeScalar::String(v.clone()))
        }
        (expected, other) => Err(wire_mismatch(column, &expected.to_string(), other)),
    }
}

/// Converts one native scalar under an atomic kind, enforcing declared
/// numeric bounds.
fn native_atom(
    column: &ColumnSchema,
    kind: ExtendedType,
    base: Option<&BaseType>,
    scalar: &NativeScalar,
) -> Result<OvsValue, MarshalError> {
    match (kind, scalar) {
        (ExtendedType::Integer, NativeScalar::Integer(v)) => {
            let min = base.and_then(|b| b.min_integer);
            let max = base.and_then(|b| b.max_integer);
            if min.is_some_and(|min| *v < min) || max.is_some_and(|max| *v > max) {
                return Err(out_of_range(column, scalar, bound(min, "-inf"), bound(max, "inf")));
            }
            Ok(OvsValue::Integer(*v))
        }
        (ExtendedType::Real, NativeScalar::Real(v)) => {
            let min = base.and_then(|b| b.min_real);
            let max = base.and_then(|b| b.max_real);
            if min.is_some_and(|min| *v < min) || max.is_some_and(|max| *v > max) {
                return Err(out_of_range(column, scalar, bound(min, "-inf"), bound(max, "inf")));
            }
            Ok(OvsValue::Real(*v))
        }
        (ExtendedType::Boolean, NativeScalar::Boolean(v)) => Ok(OvsValue::Boolean(*v)),
        (ExtendedType::String, NativeScalar::String(v)) => Ok(OvsValue::String(v.clone())),
        (ExtendedType::Uuid, NativeScalar::String(v)) => Ok(uuid_wire(v)),
        (expected, other) => Err(MarshalError::TypeMismatch {
            column: column.name.clone(),
            expected: expected.to_string(),
            value: other.to_string(),
        }),
    }
}

fn bound<T: ToString>(limit: Option<T>, unbounded: &str) -> String {
    limit.map_or_else(|| unbounded.to_string(), |v| v.to_string())
}

fn out_of_range(
    column: &ColumnSchema,
    scalar: &NativeScalar,
    min: String,
    max: String,
) -> MarshalError {
    MarshalError::OutOfRange {
        column: column.name.clone(),
        value: scalar.to_string(),
        min,
        max,
    }
}

/// Picks the uuid wire form: the canonical hex form gets the `uuid` tag,
/// anything else is a named-uuid forward reference.
fn uuid_wire(value: &str) -> OvsValue {
    if uuid::Uuid::parse_str(value).is_ok() {
        OvsValue::Uuid(value.to_string())
    } else {
        OvsValue::NamedUuid(value.to_string())
    }
}

fn check_enum_domain(column: &ColumnSchema, value: &NativeValue) -> Result<(), MarshalError> {
    if column.kind != ExtendedType::Enum {
        return Ok(());
    }
    let Some(domain) = column_type(column).and_then(|ty| ty.key.enum_domain.as_ref()) else {
        return Ok(());
    };
    let NativeValue::Atomic(scalar) = value else {
        return Ok(());
    };
    if domain.contains(scalar) {
        Ok(())
    } else {
        Err(MarshalError::EnumDomain {
            column: column.name.clone(),
            value: scalar.to_string(),
            domain: domain.clone(),
        })
    }
}
