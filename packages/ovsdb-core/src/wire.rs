//! Wire-level representation of OVSDB values, rows, and operations.
//!
//! RFC 7047 encodes non-scalar values as tagged two-element JSON arrays:
//! `["uuid", "<hex>"]`, `["named-uuid", "<name>"]`, `["set", [v1, v2, …]]`,
//! and `["map", [[k, v], …]]`. [`OvsValue`] is the discriminated form of
//! that encoding; marshalling is driven off the column's extended type
//! rather than by sniffing these tags.
//!
//! A set of cardinality one may legally appear on the wire as the bare
//! element. The wire layer keeps it as the bare scalar; the marshaller
//! re-interprets it against the column type.

use std::collections::BTreeMap;

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A single OVSDB wire value.
///
/// Scalars serialize as plain JSON; the remaining variants serialize to the
/// RFC 7047 tagged-array encodings. `Set` preserves on-wire element order,
/// `Map` preserves on-wire entry order.
#[derive(Debug, Clone, PartialEq)]
pub enum OvsValue {
    Integer(i64),
    Real(f64),
    Boolean(bool),
    String(String),
    /// A row reference in canonical hex form: `["uuid", "<hex>"]`.
    Uuid(String),
    /// A forward reference to a row created in the same transaction:
    /// `["named-uuid", "<name>"]`.
    NamedUuid(String),
    /// An ordered set: `["set", [v1, v2, …]]`.
    Set(Vec<OvsValue>),
    /// A keyed mapping: `["map", [[k, v], …]]`.
    Map(Vec<(OvsValue, OvsValue)>),
}

impl OvsValue {
    /// Decodes a wire value from its JSON form.
    ///
    /// # Errors
    ///
    /// Returns a description of the offending value when the JSON is not a
    /// legal RFC 7047 value encoding (unknown array tag, malformed pair
    /// list, `null`, or a bare object).
    pub fn from_json(value: &serde_json::Value) -> Result<Self, String> {
        match value {
            serde_json::Value::Bool(v) => Ok(Self::Boolean(*v)),
            serde_json::Value::Number(number) => {
                if let Some(v) = number.as_i64() {
                    Ok(Self::Integer(v))
                } else if let Some(v) = number.as_f64() {
                    Ok(Self::Real(v))
                } else {
                    Err(format!("number {number} does not fit a 64-bit value"))
                }
            }
            serde_json::Value::String(v) => Ok(Self::String(v.clone())),
            serde_json::Value::Array(elems) => Self::from_tagged_array(elems),
            serde_json::Value::Null => Err("null is not a valid OVSDB value".to_string()),
            serde_json::Value::Object(_) => {
                Err("bare JSON object is not a valid OVSDB value".to_string())
            }
        }
    }

    fn from_tagged_array(elems: &[serde_json::Value]) -> Result<Self, String> {
        let tag = elems
            .first()
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| "array value must start with a string tag".to_string())?;
        let body = elems
            .get(1)
            .ok_or_else(|| format!("{tag:?} array is missing its second element"))?;
        if elems.len() != 2 {
            return Err(format!("{tag:?} array must have exactly two elements"));
        }

        match tag {
            "uuid" => match body.as_str() {
                Some(inner) => Ok(Self::Uuid(inner.to_string())),
                None => Err("uuid payload must be a string".to_string()),
            },
            "named-uuid" => match body.as_str() {
                Some(inner) => Ok(Self::NamedUuid(inner.to_string())),
                None => Err("named-uuid payload must be a string".to_string()),
            },
            "set" => {
                let inner = body
                    .as_array()
                    .ok_or_else(|| "set payload must be an array".to_string())?;
                inner.iter().map(Self::from_json).collect::<Result<_, _>>().map(Self::Set)
            }
            "map" => {
                let inner = body
                    .as_array()
                    .ok_or_else(|| "map payload must be an array of pairs".to_string())?;
                let mut entries = Vec::with_capacity(inner.len());
                for pair in inner {
                    let pair = pair
                        .as_array()
                        .filter(|p| p.len() == 2)
                        .ok_or_else(|| "map entry must be a two-element array".to_string())?;
                    entries.push((Self::from_json(&pair[0])?, Self::from_json(&pair[1])?));
                }
                Ok(Self::Map(entries))
            }
            other => Err(format!("unknown value tag {other:?}")),
        }
    }
}

impl Serialize for OvsValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Integer(v) => serializer.serialize_i64(*v),
            Self::Real(v) => serializer.serialize_f64(*v),
            Self::Boolean(v) => serializer.serialize_bool(*v),
            Self::String(v) => serializer.serialize_str(v),
            Self::Uuid(v) => ("uuid", v).serialize(serializer),
            Self::NamedUuid(v) => ("named-uuid", v).serialize(serializer),
            Self::Set(elems) => ("set", elems).serialize(serializer),
            Self::Map(entries) => ("map", entries).serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for OvsValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        Self::from_json(&value).map_err(D::Error::custom)
    }
}

/// A wire row: a mapping from column name to wire value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row(pub BTreeMap<String, OvsValue>);

impl Row {
    /// Creates an empty row.
    #[must_use]
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Returns the wire value of a column, if present.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&OvsValue> {
        self.0.get(column)
    }

    /// Sets a column, returning the previous value if any.
    pub fn insert(&mut self, column: impl Into<String>, value: OvsValue) -> Option<OvsValue> {
        self.0.insert(column.into(), value)
    }

    /// Number of columns present.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True iff the row carries no columns. An empty `new` row in an update
    /// notification means deletion.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over `(column, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &OvsValue)> {
        self.0.iter()
    }

    /// Iterates over column names.
    pub fn columns(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }
}

impl FromIterator<(String, OvsValue)> for Row {
    fn from_iter<I: IntoIterator<Item = (String, OvsValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Comparison function of a condition cell, with RFC 7047 wire spellings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConditionFunction {
    #[serde(rename = "<")]
    LessThan,
    #[serde(rename = "<=")]
    LessThanOrEqual,
    #[serde(rename = "==")]
    Equal,
    #[serde(rename = "!=")]
    NotEqual,
    #[serde(rename = ">=")]
    GreaterThanOrEqual,
    #[serde(rename = ">")]
    GreaterThan,
    #[serde(rename = "includes")]
    Includes,
    #[serde(rename = "excludes")]
    Excludes,
}

/// A single condition cell, serialized as the wire triple
/// `[column, function, value]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub column: String,
    pub function: ConditionFunction,
    pub value: OvsValue,
}

impl Serialize for Condition {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        (&self.column, &self.function, &self.value).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Condition {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let (column, function, value) = Deserialize::deserialize(deserializer)?;
        Ok(Self { column, function, value })
    }
}

/// Mutator of a mutation cell, with RFC 7047 wire spellings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mutator {
    #[serde(rename = "insert")]
    Insert,
    #[serde(rename = "delete")]
    Delete,
    #[serde(rename = "+=")]
    Add,
    #[serde(rename = "-=")]
    Subtract,
    #[serde(rename = "*=")]
    Multiply,
    #[serde(rename = "/=")]
    Divide,
    #[serde(rename = "%=")]
    Modulo,
}

/// A single mutation cell, serialized as the wire triple
/// `[column, mutator, value]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Mutation {
    pub column: String,
    pub mutator: Mutator,
    pub value: OvsValue,
}

impl Serialize for Mutation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        (&self.column, &self.mutator, &self.value).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Mutation {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let (column, mutator, value) = Deserialize::deserialize(deserializer)?;
        Ok(Self { column, mutator, value })
    }
}

/// One operation of a transact request, as much of it as schema validation
/// and binder output assembly need.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    /// Operation name: `insert`, `select`, `update`, `mutate`, `delete`, …
    pub op: String,
    pub table: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub row: Option<Row>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub rows: Vec<Row>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub columns: Vec<String>,
    #[serde(rename = "where", skip_serializing_if = "Vec::is_empty", default)]
    pub where_clauses: Vec<Condition>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub mutations: Vec<Mutation>,
    #[serde(rename = "uuid-name", skip_serializing_if = "Option::is_none", default)]
    pub uuid_name: Option<String>,
}

/// A full monitor update batch: per-table row updates, delivered atomically
/// by the transport.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableUpdates {
    #[serde(default)]
    pub updates: BTreeMap<String, TableUpdate>,
}

/// Updates for a single table, keyed by row UUID.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableUpdate {
    #[serde(default)]
    pub rows: BTreeMap<String, RowUpdate>,
}

/// The old and new images of a single row. An empty `new` means the row was
/// deleted; an empty `old` means it was inserted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RowUpdate {
    #[serde(default, skip_serializing_if = "Row::is_empty")]
    pub old: Row,
    #[serde(default, skip_serializing_if = "Row::is_empty")]
    pub new: Row,
}
