//! Native value model for schema-typed columns.
//!
//! Every OVSDB column, once its extended type is known, has exactly one
//! *native shape*: the statically typed form a caller works with. Scalars map
//! to `i64`/`f64`/`bool`/`String` (uuid columns surface as their canonical
//! string form), sets map to ordered sequences, and maps to keyed mappings.
//!
//! [`NativeValue`] is the dynamic carrier used by the marshaller and the
//! record binder; [`NativeField`] is the static side, implemented for the
//! Rust types a record field may declare so the binder can check a field's
//! shape against the schema before any data moves.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

/// Shape of an atomic native value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AtomicShape {
    /// Signed 64-bit integer.
    Integer,
    /// 64-bit IEEE 754 floating point.
    Real,
    /// Boolean.
    Boolean,
    /// UTF-8 string. Uuid-typed columns also surface as this shape, holding
    /// the canonical hex form.
    String,
}

impl AtomicShape {
    /// The zero value of this shape.
    #[must_use]
    pub fn zero(self) -> NativeScalar {
        match self {
            Self::Integer => NativeScalar::Integer(0),
            Self::Real => NativeScalar::Real(0.0),
            Self::Boolean => NativeScalar::Boolean(false),
            Self::String => NativeScalar::String(String::new()),
        }
    }
}

impl fmt::Display for AtomicShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Integer => "integer",
            Self::Real => "real",
            Self::Boolean => "boolean",
            Self::String => "string",
        };
        f.write_str(name)
    }
}

/// Full native shape of a column: atomic, set, or map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeShape {
    /// A single atomic value.
    Atomic(AtomicShape),
    /// An ordered sequence of atomic values.
    Set(AtomicShape),
    /// A keyed mapping from atomic keys to atomic values.
    Map(AtomicShape, AtomicShape),
}

impl NativeShape {
    /// The zero value of this shape: scalar zero, empty sequence, or empty
    /// mapping.
    #[must_use]
    pub fn zero(self) -> NativeValue {
        match self {
            Self::Atomic(atom) => NativeValue::Atomic(atom.zero()),
            Self::Set(_) => NativeValue::Set(Vec::new()),
            Self::Map(..) => NativeValue::Map(BTreeMap::new()),
        }
    }
}

impl fmt::Display for NativeShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Atomic(atom) => write!(f, "{atom}"),
            Self::Set(atom) => write!(f, "set of {atom}"),
            Self::Map(key, value) => write!(f, "map of {key} to {value}"),
        }
    }
}

/// An atomic native value.
///
/// Carries a total order so it can key a [`BTreeMap`]; reals are ordered by
/// [`f64::total_cmp`], and values of different shapes order by shape. The
/// `PartialEq`/`Eq` impls agree with that order, so `Real(f64::NAN)` equals
/// itself.
#[derive(Debug, Clone)]
pub enum NativeScalar {
    Integer(i64),
    Real(f64),
    Boolean(bool),
    String(String),
}

impl NativeScalar {
    /// The shape of this scalar.
    #[must_use]
    pub fn shape(&self) -> AtomicShape {
        match self {
            Self::Integer(_) => AtomicShape::Integer,
            Self::Real(_) => AtomicShape::Real,
            Self::Boolean(_) => AtomicShape::Boolean,
            Self::String(_) => AtomicShape::String,
        }
    }

    /// True iff this scalar is the zero of its shape.
    #[must_use]
    pub fn is_default(&self) -> bool {
        match self {
            Self::Integer(v) => *v == 0,
            Self::Real(v) => *v == 0.0,
            Self::Boolean(v) => !*v,
            Self::String(v) => v.is_empty(),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Integer(_) => 0,
            Self::Real(_) => 1,
            Self::Boolean(_) => 2,
            Self::String(_) => 3,
        }
    }
}

impl Ord for NativeScalar {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Integer(a), Self::Integer(b)) => a.cmp(b),
            (Self::Real(a), Self::Real(b)) => a.total_cmp(b),
            (Self::Boolean(a), Self::Boolean(b)) => a.cmp(b),
            (Self::String(a), Self::String(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for NativeScalar {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for NativeScalar {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for NativeScalar {}

impl fmt::Display for NativeScalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(v) => write!(f, "{v}"),
            Self::Real(v) => write!(f, "{v}"),
            Self::Boolean(v) => write!(f, "{v}"),
            Self::String(v) => write!(f, "{v:?}"),
        }
    }
}

/// A native value of any shape: the dynamic form moved between wire rows and
/// record fields by the marshaller and the binder.
#[derive(Debug, Clone, PartialEq)]
pub enum NativeValue {
    /// A single atomic value.
    Atomic(NativeScalar),
    /// An ordered sequence. Preserves on-wire order.
    Set(Vec<NativeScalar>),
    /// A keyed mapping. Entry order is not observable on the wire.
    Map(BTreeMap<NativeScalar, NativeScalar>),
}

impl NativeValue {
    /// True iff this value is the zero of its shape: zero scalar, empty
    /// sequence, or empty mapping.
    #[must_use]
    pub fn is_default(&self) -> bool {
        match self {
            Self::Atomic(scalar) => scalar.is_default(),
            Self::Set(elems) => elems.is_empty(),
            Self::Map(entries) => entries.is_empty(),
        }
    }
}

impl fmt::Display for NativeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Atomic(scalar) => write!(f, "{scalar}"),
            Self::Set(elems) => {
                f.write_str("[")?;
                for (i, elem) in elems.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{elem}")?;
                }
                f.write_str("]")
            }
            Self::Map(entries) => {
                f.write_str("{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                f.write_str("}")
            }
        }
    }
}

/// A Rust type usable as an atomic column value.
///
/// Implemented for `i64`, `f64`, `bool`, and `String`; these are the only
/// atomic forms the binder accepts, with no implicit widening.
pub trait NativeAtom: Sized + Clone {
    /// The atomic shape this type declares.
    const ATOM: AtomicShape;

    /// Converts into the dynamic scalar form.
    fn into_scalar(self) -> NativeScalar;

    /// Converts back from the dynamic scalar form. Returns `None` on a shape
    /// mismatch.
    fn from_scalar(scalar: NativeScalar) -> Option<Self>;
}

impl NativeAtom for i64 {
    const ATOM: AtomicShape = AtomicShape::Integer;

    fn into_scalar(self) -> NativeScalar {
        NativeScalar::Integer(self)
    }

    fn from_scalar(scalar: NativeScalar) -> Option<Self> {
        match scalar {
            NativeScalar::Integer(v) => Some(v),
            _ => None,
        }
    }
}

impl NativeAtom for f64 {
    const ATOM: AtomicShape = AtomicShape::Real;

    fn into_scalar(self) -> NativeScalar {
        NativeScalar::Real(self)
    }

    fn from_scalar(scalar: NativeScalar) -> Option<Self> {
        match scalar {
            NativeScalar::Real(v) => Some(v),
            _ => None,
        }
    }
}

impl NativeAtom for bool {
    const ATOM: AtomicShape = AtomicShape::Boolean;

    fn into_scalar(self) -> NativeScalar {
        NativeScalar::Boolean(self)
    }

    fn from_scalar(scalar: NativeScalar) -> Option<Self> {
        match scalar {
            NativeScalar::Boolean(v) => Some(v),
            _ => None,
        }
    }
}

impl NativeAtom for String {
    const ATOM: AtomicShape = AtomicShape::String;

    fn into_scalar(self) -> NativeScalar {
        NativeScalar::String(self)
    }

    fn from_scalar(scalar: NativeScalar) -> Option<Self> {
        match scalar {
            NativeScalar::String(v) => Some(v),
            _ => None,
        }
    }
}

/// A Rust type usable as a record field bound to a column.
///
/// The binder checks `SHAPE` against the column's schema-derived shape before
/// moving any data, so `to_native`/`from_native` only ever see matching
/// shapes in practice.
pub trait NativeField: Sized {
    /// The native shape this field type declares.
    const SHAPE: NativeShape;

    /// Reads the field into the dynamic form.
    fn to_native(&self) -> NativeValue;

    /// Builds the field from the dynamic form. Returns `None` on a shape
    /// mismatch.
    fn from_native(value: NativeValue) -> Option<Self>;
}

impl NativeField for i64 {
    const SHAPE: NativeShape = NativeShape::Atomic(AtomicShape::Integer);

    fn to_native(&self) -> NativeValue {
        NativeValue::Atomic(NativeScalar::Integer(*self))
    }

    fn from_native(value: NativeValue) -> Option<Self> {
        match value {
            NativeValue::Atomic(scalar) => NativeAtom::from_scalar(scalar),
            _ => None,
        }
    }
}

impl NativeField for f64 {
    const SHAPE: NativeShape = NativeShape::Atomic(AtomicShape::Real);

    fn to_native(&self) -> NativeValue {
        NativeValue::Atomic(NativeScalar::Real(*self))
    }

    fn from_native(value: NativeValue) -> Option<Self> {
        match value {
            NativeValue::Atomic(scalar) => NativeAtom::from_scalar(scalar),
            _ => None,
        }
    }
}

impl NativeField for bool {
    const SHAPE: NativeShape = NativeShape::Atomic(AtomicShape::Boolean);

    fn to_native(&self) -> NativeValue {
        NativeValue::Atomic(NativeScalar::Boolean(*self))
    }

    fn from_native(value: NativeValue) -> Option<Self> {
        match value {
            NativeValue::Atomic(scalar) => NativeAtom::from_scalar(scalar),
            _ => None,
        }
    }
}

impl NativeField for String {
    const SHAPE: NativeShape = NativeShape::Atomic(AtomicShape::String);

    fn to_native(&self) -> NativeValue {
        NativeValue::Atomic(NativeScalar::String(self.clone()))
    }

    fn from_native(value: NativeValue) -> Option<Self> {
        match value {
            NativeValue::Atomic(scalar) => NativeAtom::from_scalar(scalar),
            _ => None,
        }
    }
}

impl<T: NativeAtom> NativeField for Vec<T> {
    const SHAPE: NativeShape = NativeShape::Set(T::ATOM);

    fn to_native(&self) -> NativeValue {
        NativeValue::Set(self.iter().map(|elem| elem.clone().into_scalar()).collect())
    }

    fn from_native(value: NativeValue) -> Option<Self> {
        match value {
            NativeValue::Set(elems) => elems.into_iter().map(T::from_scalar).collect(),
            _ => None,
        }
    }
}

impl<K: NativeAtom + Ord, V: NativeAtom> NativeField for BTreeMap<K, V> {
    const SHAPE: NativeShape = NativeShape::Map(K::ATOM, V::ATOM);

    fn to_native(&self) -> NativeValue {
        NativeValue::Map(
            self.iter()
                .map(|(key, value)| (key.clone().into_scalar(), value.clone().into_scalar()))
                .collect(),
        )
    }

    fn from_native(value: NativeValue) -> Option<Self> {
        match value {
            NativeValue::Map(entries) => entries
                .into_iter()
                .map(|(key, value)| Some((K::from_scalar(key)?, V::from_scalar(value)?)))
                .collect(),
            _ => None,
        }
    }
}
