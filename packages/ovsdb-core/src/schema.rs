//! RFC 7047 database schema model.
//!
//! The on-wire schema document is mildly irregular: a column's `type` is
//! either a bare atomic name or an object, `max` is either an integer or the
//! string `"unlimited"`, `key`/`value` are either atomic names or base-type
//! objects, and enum domains arrive wrapped in the OVSDB set encoding.
//! Decoding normalises all of that into one regular model whose
//! [`ColumnSchema::kind`] answers "what native shape does this column have"
//! without further case analysis.
//!
//! The schema is immutable once decoded; share it behind an `Arc` and read
//! it from as many tasks as needed.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

use serde::{Deserialize, Deserializer};

use crate::native::{AtomicShape, NativeScalar};
use crate::wire::Operation;

/// Sentinel for an unbounded `max` (the schema string `"unlimited"`).
pub const UNLIMITED: i64 = -1;

/// Normalised column type: the RFC's atomic types plus the summary types
/// computed from a column's `type` object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtendedType {
    Integer,
    Real,
    Boolean,
    String,
    Uuid,
    /// An enumeration over the key's atomic type.
    Enum,
    /// A keyed mapping; key and value types live in the column's
    /// [`ColumnType`].
    Map,
    /// An ordered set of the key's atomic type.
    Set,
}

impl ExtendedType {
    /// Parses one of the RFC's atomic type names.
    #[must_use]
    pub fn from_atomic_name(name: &str) -> Option<Self> {
        match name {
            "integer" => Some(Self::Integer),
            "real" => Some(Self::Real),
            "boolean" => Some(Self::Boolean),
            "string" => Some(Self::String),
            "uuid" => Some(Self::Uuid),
            _ => None,
        }
    }

    /// The native shape of this type when used atomically. Uuids surface as
    /// strings in canonical form. `None` for the summary types.
    #[must_use]
    pub fn atomic_shape(self) -> Option<AtomicShape> {
        match self {
            Self::Integer => Some(AtomicShape::Integer),
            Self::Real => Some(AtomicShape::Real),
            Self::Boolean => Some(AtomicShape::Boolean),
            Self::String | Self::Uuid => Some(AtomicShape::String),
            Self::Enum | Self::Map | Self::Set => None,
        }
    }
}

impl fmt::Display for ExtendedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Integer => "integer",
            Self::Real => "real",
            Self::Boolean => "boolean",
            Self::String => "string",
            Self::Uuid => "uuid",
            Self::Enum => "enum",
            Self::Map => "map",
            Self::Set => "set",
        };
        f.write_str(name)
    }
}

/// Strength of a uuid reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefType {
    Strong,
    Weak,
}

/// A base-type: an atomic type plus its optional constraints.
#[derive(Debug, Clone, PartialEq)]
pub struct BaseType {
    /// The atomic type (`Integer`/`Real`/`Boolean`/`String`/`Uuid`).
    pub kind: ExtendedType,
    /// Allowed values, normalised out of the `["set", […]]` encoding. Only
    /// present when the schema declares an enum.
    pub enum_domain: Option<Vec<NativeScalar>>,
    pub min_integer: Option<i64>,
    pub max_integer: Option<i64>,
    pub min_real: Option<f64>,
    pub max_real: Option<f64>,
    pub min_length: Option<i64>,
    pub max_length: Option<i64>,
    /// Table a uuid-typed base refers to.
    pub ref_table: Option<String>,
    pub ref_type: Option<RefType>,
}

impl BaseType {
    /// A bare atomic base with no constraints.
    #[must_use]
    pub fn atomic(kind: ExtendedType) -> Self {
        Self {
            kind,
            enum_domain: None,
            min_integer: None,
            max_integer: None,
            min_real: None,
            max_real: None,
            min_length: None,
            max_length: None,
            ref_table: None,
            ref_type: None,
        }
    }
}

/// A column's `type` object, present when the column is non-atomic or
/// carries constraints.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnType {
    pub key: BaseType,
    /// Present iff the column is a map.
    pub value: Option<BaseType>,
    pub min: i64,
    /// [`UNLIMITED`] when the schema says `"unlimited"`.
    pub max: i64,
}

/// A single column of a table.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSchema {
    pub name: String,
    /// The normalised extended type.
    pub kind: ExtendedType,
    /// The decoded `type` object; `None` when `type` was a bare atomic name.
    pub ty: Option<ColumnType>,
    pub ephemeral: bool,
    pub mutable: bool,
}

/// A table: its columns plus the declared jointly-unique indexes, in
/// declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableSchema {
    pub columns: BTreeMap<String, ColumnSchema>,
    pub indexes: Vec<Vec<String>>,
}

/// A decoded database schema.
#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseSchema {
    pub name: String,
    pub version: String,
    pub tables: BTreeMap<String, TableSchema>,
}

/// Errors from schema decoding and lookup.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    /// The schema document violates RFC 7047's grammar. `path` names the
    /// offending field, e.g. `tables.Bridge.columns.ports.type.max`.
    #[error("schema parse error at {path}: {detail}")]
    Parse { path: String, detail: String },
    #[error("table {table} not found in schema")]
    NoSuchTable { table: String },
    #[error("column {column} not found in table {table}")]
    NoSuchColumn { table: String, column: String },
}

fn parse_err(path: impl Into<String>, detail: impl Into<String>) -> SchemaError {
    SchemaError::Parse { path: path.into(), detail: detail.into() }
}

/// The implicit `_uuid` column every table carries.
fn uuid_column() -> &'static ColumnSchema {
    static UUID_COLUMN: OnceLock<ColumnSchema> = OnceLock::new();
    UUID_COLUMN.get_or_init(|| ColumnSchema {
        name: "_uuid".to_string(),
        kind: ExtendedType::Uuid,
        ty: None,
        ephemeral: false,
        mutable: false,
    })
}

impl DatabaseSchema {
    /// Decodes a schema from its JSON document.
    ///
    /// # Errors
    ///
    /// [`SchemaError::Parse`] with the offending field path on any grammar
    /// violation.
    pub fn from_value(document: &serde_json::Value) -> Result<Self, SchemaError> {
        let root = document
            .as_object()
            .ok_or_else(|| parse_err("<document>", "schema must be a JSON object"))?;
        let name = root
            .get("name")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| parse_err("name", "missing or not a string"))?
            .to_string();
        let version = root
            .get("version")
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default()
            .to_string();

        let mut tables = BTreeMap::new();
        if let Some(tables_value) = root.get("tables") {
            let tables_object = tables_value
                .as_object()
                .ok_or_else(|| parse_err("tables", "must be a JSON object"))?;
            for (table_name, table_value) in tables_object {
                let table = decode_table(&format!("tables.{table_name}"), table_value)?;
                tables.insert(table_name.clone(), table);
            }
        }

        Ok(Self { name, version, tables })
    }

    /// Looks up a table.
    ///
    /// # Errors
    ///
    /// [`SchemaError::NoSuchTable`] when the table is not in the schema.
    pub fn table(&self, name: &str) -> Result<&TableSchema, SchemaError> {
        self.tables
            .get(name)
            .ok_or_else(|| SchemaError::NoSuchTable { table: name.to_string() })
    }

    /// Looks up a column. `_uuid` resolves in every table whether or not the
    /// schema lists it.
    ///
    /// # Errors
    ///
    /// [`SchemaError::NoSuchTable`] or [`SchemaError::NoSuchColumn`].
    pub fn column(&self, table: &str, column: &str) -> Result<&ColumnSchema, SchemaError> {
        let table_schema = self.table(table)?;
        if let Some(column_schema) = table_schema.columns.get(column) {
            return Ok(column_schema);
        }
        if column == "_uuid" {
            return Ok(uuid_column());
        }
        Err(SchemaError::NoSuchColumn {
            table: table.to_string(),
            column: column.to_string(),
        })
    }

    /// Advisory check that every table and column a list of operations
    /// touches exists in this schema. The reserved columns `_uuid` and
    /// `_version` are always accepted. This is not a gate on transactions;
    /// the server revalidates.
    #[must_use]
    pub fn validate_operations(&self, operations: &[Operation]) -> bool {
        operations.iter().all(|operation| {
            let Some(table) = self.tables.get(&operation.table) else {
                return false;
            };
            let known = |column: &String| {
                table.columns.contains_key(column) || column == "_uuid" || column == "_version"
            };
            operation
                .row
                .iter()
                .flat_map(|row| row.columns())
                .all(known)
                && operation
                    .rows
                    .iter()
                    .flat_map(|row| row.columns())
                    .all(known)
                && operation.columns.iter().all(known)
        })
    }
}

impl std::str::FromStr for DatabaseSchema {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let document: serde_json::Value = serde_json::from_str(s)
            .map_err(|e| parse_err("<document>", e.to_string()))?;
        Self::from_value(&document)
    }
}

impl<'de> Deserialize<'de> for DatabaseSchema {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let document = serde_json::Value::deserialize(deserializer)?;
        Self::from_value(&document).map_err(serde::de::Error::custom)
    }
}

fn decode_table(path: &str, value: &serde_json::Value) -> Result<TableSchema, SchemaError> {
    let object = value
        .as_object()
        .ok_or_else(|| parse_err(path, "table must be a JSON object"))?;

    let mut columns = BTreeMap::new();
    if let Some(columns_value) = object.get("columns") {
        let columns_object = columns_value
            .as_object()
            .ok_or_else(|| parse_err(format!("{path}.columns"), "must be a JSON object"))?;
        for (column_name, column_value) in columns_object {
            let column_path = format!("{path}.columns.{column_name}");
            let column = decode_column(&column_path, column_name, column_value)?;
            columns.insert(column_name.clone(), column);
        }
    }

    let mut indexes = Vec::new();
    if let Some(indexes_value) = object.get("indexes") {
        let outer = indexes_value
            .as_array()
            .ok_or_else(|| parse_err(format!("{path}.indexes"), "must be an array"))?;
        for (i, index_value) in outer.iter().enumerate() {
            let index_path = format!("{path}.indexes[{i}]");
            let inner = index_value
                .as_array()
                .ok_or_else(|| parse_err(&index_path, "index must be an array of column names"))?;
            let mut index = Vec::with_capacity(inner.len());
            for column in inner {
                let column = column
                    .as_str()
                    .ok_or_else(|| parse_err(&index_path, "index column must be a string"))?;
                index.push(column.to_string());
            }
            indexes.push(index);
        }
    }

    Ok(TableSchema { columns, indexes })
}

fn decode_column(
    path: &str,
    name: &str,
    value: &serde_json::Value,
) -> Result<ColumnSchema, SchemaError> {
    let object = value
        .as_object()
        .ok_or_else(|| parse_err(path, "column must be a JSON object"))?;
    let ephemeral = object
        .get("ephemeral")
        .and_then(serde_json::Value::as_bool)
        .unwrap_or(false);
    let mutable = object
        .get("mutable")
        .and_then(serde_json::Value::as_bool)
        .unwrap_or(false);

    let type_value = object
        .get("type")
        .ok_or_else(|| parse_err(format!("{path}.type"), "missing required field"))?;

    // Bare atomic name: the whole story.
    if let Some(atomic) = type_value.as_str() {
        let kind = ExtendedType::from_atomic_name(atomic).ok_or_else(|| {
            parse_err(format!("{path}.type"), format!("unknown atomic type {atomic:?}"))
        })?;
        return Ok(ColumnSchema {
            name: name.to_string(),
            kind,
            ty: None,
            ephemeral,
            mutable,
        });
    }

    let type_path = format!("{path}.type");
    let type_object = type_value
        .as_object()
        .ok_or_else(|| parse_err(&type_path, "must be an atomic type name or an object"))?;

    let min = match type_object.get("min") {
        None => 1,
        Some(v) => v
            .as_i64()
            .ok_or_else(|| parse_err(format!("{type_path}.min"), "must be an integer"))?,
    };
    let max = match type_object.get("max") {
        None => 1,
        Some(v) => {
            if let Some(s) = v.as_str() {
                if s == "unlimited" {
                    UNLIMITED
                } else {
                    return Err(parse_err(
                        format!("{type_path}.max"),
                        format!("unknown max value {s:?}"),
                    ));
                }
            } else {
                v.as_i64().ok_or_else(|| {
                    parse_err(format!("{type_path}.max"), "must be an integer or \"unlimited\"")
                })?
            }
        }
    };

    let key_value = type_object
        .get("key")
        .ok_or_else(|| parse_err(format!("{type_path}.key"), "missing required field"))?;
    let (key, key_was_object) = decode_base_type(&format!("{type_path}.key"), key_value)?;

    let value_base = match type_object.get("value") {
        None => None,
        Some(v) => Some(decode_base_type(&format!("{type_path}.value"), v)?.0),
    };

    // Extended-type derivation, in the RFC's order of discrimination: a
    // value makes it a map, an enum domain makes it an enum, cardinality
    // one makes it the key's atomic type, anything else is a set.
    let kind = if value_base.is_some() {
        ExtendedType::Map
    } else if key_was_object && key.enum_domain.is_some() {
        ExtendedType::Enum
    } else if min == 1 && max == 1 {
        key.kind
    } else {
        ExtendedType::Set
    };

    Ok(ColumnSchema {
        name: name.to_string(),
        kind,
        ty: Some(ColumnType { key, value: value_base, min, max }),
        ephemeral,
        mutable,
    })
}

/// Decodes a `key`/`value` base-type, which is either a bare atomic name or
/// an object. Returns the base plus whether it was the object form (enum
/// domains only count in the object form).
fn decode_base_type(
    path: &str,
    value: &serde_json::Value,
) -> Result<(BaseType, bool), SchemaError> {
    if let Some(atomic) = value.as_str() {
        let kind = ExtendedType::from_atomic_name(atomic)
            .ok_or_else(|| parse_err(path, format!("unknown atomic type {atomic:?}")))?;
        return Ok((BaseType::atomic(kind), false));
    }

    let object = value
        .as_object()
        .ok_or_else(|| parse_err(path, "must be an atomic type name or an object"))?;
    let kind_name = object
        .get("type")
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| parse_err(format!("{path}.type"), "missing atomic type name"))?;
    let kind = ExtendedType::from_atomic_name(kind_name)
        .ok_or_else(|| parse_err(format!("{path}.type"), format!("unknown atomic type {kind_name:?}")))?;

    let mut base = BaseType::atomic(kind);
    if let Some(enum_value) = object.get("enum") {
        base.enum_domain = Some(decode_enum_domain(&format!("{path}.enum"), kind, enum_value)?);
    }
    base.min_integer = decode_opt_i64(object, "minInteger", path)?;
    base.max_integer = decode_opt_i64(object, "maxInteger", path)?;
    base.min_real = decode_opt_f64(object, "minReal", path)?;
    base.max_real = decode_opt_f64(object, "maxReal", path)?;
    base.min_length = decode_opt_i64(object, "minLength", path)?;
    base.max_length = decode_opt_i64(object, "maxLength", path)?;
    base.ref_table = object
        .get("refTable")
        .and_then(serde_json::Value::as_str)
        .map(str::to_string);
    base.ref_type = match object.get("refType").and_then(serde_json::Value::as_str) {
        None => None,
        Some("strong") => Some(RefType::Strong),
        Some("weak") => Some(RefType::Weak),
        Some(other) => {
            return Err(parse_err(
                format!("{path}.refType"),
                format!("unknown refType {other:?}"),
            ))
        }
    };

    Ok((base, true))
}

/// Unwraps an enum domain from the OVSDB set encoding `["set", [v1, …]]`,
/// accepting a bare scalar as a one-element domain.
fn decode_enum_domain(
    path: &str,
    kind: ExtendedType,
    value: &serde_json::Value,
) -> Result<Vec<NativeScalar>, SchemaError> {
    let shape = kind
        .atomic_shape()
        .ok_or_else(|| parse_err(path, format!("enum over non-atomic type {kind}")))?;

    let elements: Vec<&serde_json::Value> = match value {
        serde_json::Value::Array(parts) => {
            let tagged = parts.first().and_then(serde_json::Value::as_str) == Some("set");
            let inner = parts.get(1).and_then(serde_json::Value::as_array);
            match (tagged, inner, parts.len()) {
                (true, Some(inner), 2) => inner.iter().collect(),
                _ => return Err(parse_err(path, "enum must be [\"set\", [...]] or a scalar")),
            }
        }
        scalar => vec![scalar],
    };

    elements
        .into_iter()
        .map(|element| {
            scalar_from_json(shape, element)
                .ok_or_else(|| parse_err(path, format!("enum value {element} does not match type {kind}")))
        })
        .collect()
}

fn scalar_from_json(shape: AtomicShape, value: &serde_json::Value) -> Option<NativeScalar> {
    match shape {
        AtomicShape::Integer => value.as_i64().map(NativeScalar::Integer),
        AtomicShape::Real => value.as_f64().map(NativeScalar::Real),
        AtomicShape::Boolean => value.as_bool().map(NativeScalar::Boolean),
        AtomicShape::String => value.as_str().map(|s| NativeScalar::String(s.to_string())),
    }
}

fn decode_opt_i64(
    object: &serde_json::Map<String, serde_json::Value>,
    field: &str,
    path: &str,
) -> Result<Option<i64>, SchemaError> {
    match object.get(field) {
        None => Ok(None),
        Some(v) => v
            .as_i64()
            .map(Some)
            .ok_or_else(|| parse_err(format!("{path}.{field}"), "must be an integer")),
    }
}

fn decode_opt_f64(
    object: &serde_json::Map<String, serde_json::Value>,
    field: &str,
    path: &str,
) -> Result<Option<f64>, SchemaError> {
    match object.get(field) {
        None => Ok(None),
        Some(v) => v
            .as_f64()
            .map(Some)
            .ok_or_else(|| parse_err(format!("{path}.{field}"), "must be a number")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::Row;

    fn test_schema() -> DatabaseSchema {
        r#"{
            "name": "TestSchema",
            "version": "1.0.0",
            "tables": {
                "TestTable": {
                    "indexes": [["name"], ["composed_1", "composed_2"]],
                    "columns": {
                        "name": {"type": "string"},
                        "composed_1": {"type": {"key": "string"}},
                        "composed_2": {"type": {"key": "string"}},
                        "aSet": {"type": {"key": "string", "min": 0, "max": "unlimited"}},
                        "aSingleSet": {"type": {"key": "string", "min": 0, "max": 1}},
                        "aUUIDSet": {
                            "type": {
                                "key": {"type": "uuid", "refTable": "Other", "refType": "weak"},
                                "min": 0
                            }
                        },
                        "aUUID": {
                            "type": {
                                "key": {"type": "uuid", "refTable": "Other", "refType": "strong"},
                                "min": 1,
                                "max": 1
                            }
                        },
                        "aFloat": {"type": {"key": {"type": "real"}}},
                        "aBounded": {
                            "type": {"key": {"type": "integer", "minInteger": 0, "maxInteger": 100}}
                        },
                        "aEnum": {
                            "type": {
                                "key": {
                                    "type": "string",
                                    "enum": ["set", ["enum1", "enum2", "enum3"]]
                                }
                            }
                        },
                        "aMap": {
                            "type": {"key": "string", "value": "string", "min": 0, "max": "unlimited"}
                        }
                    }
                }
            }
        }"#
        .parse()
        .expect("decode test schema")
    }

    // ---- Extended type derivation ----

    #[test]
    fn bare_atomic_type() {
        let schema = test_schema();
        let column = schema.column("TestTable", "name").unwrap();
        assert_eq!(column.kind, ExtendedType::String);
        assert!(column.ty.is_none());
    }

    #[test]
    fn object_type_with_cardinality_one_is_atomic() {
        let schema = test_schema();
        assert_eq!(schema.column("TestTable", "composed_1").unwrap().kind, ExtendedType::String);
        assert_eq!(schema.column("TestTable", "aFloat").unwrap().kind, ExtendedType::Real);
        assert_eq!(schema.column("TestTable", "aUUID").unwrap().kind, ExtendedType::Uuid);
    }

    #[test]
    fn unbounded_max_becomes_sentinel() {
        let schema = test_schema();
        let column = schema.column("TestTable", "aSet").unwrap();
        assert_eq!(column.kind, ExtendedType::Set);
        let ty = column.ty.as_ref().unwrap();
        assert_eq!(ty.min, 0);
        assert_eq!(ty.max, UNLIMITED);
    }

    #[test]
    fn optional_scalar_is_a_set() {
        let schema = test_schema();
        let column = schema.column("TestTable", "aSingleSet").unwrap();
        assert_eq!(column.kind, ExtendedType::Set);
        let ty = column.ty.as_ref().unwrap();
        assert_eq!((ty.min, ty.max), (0, 1));
    }

    #[test]
    fn value_makes_a_map() {
        let schema = test_schema();
        let column = schema.column("TestTable", "aMap").unwrap();
        assert_eq!(column.kind, ExtendedType::Map);
        let ty = column.ty.as_ref().unwrap();
        assert_eq!(ty.key.kind, ExtendedType::String);
        assert_eq!(ty.value.as_ref().unwrap().kind, ExtendedType::String);
    }

    #[test]
    fn enum_domain_is_unwrapped_in_order() {
        let schema = test_schema();
        let column = schema.column("TestTable", "aEnum").unwrap();
        assert_eq!(column.kind, ExtendedType::Enum);
        let domain = column.ty.as_ref().unwrap().key.enum_domain.as_ref().unwrap();
        assert_eq!(
            domain,
            &vec![
                NativeScalar::String("enum1".to_string()),
                NativeScalar::String("enum2".to_string()),
                NativeScalar::String("enum3".to_string()),
            ]
        );
    }

    #[test]
    fn bare_enum_value_is_a_single_element_domain() {
        let schema: DatabaseSchema = r#"{
            "name": "S",
            "tables": {
                "T": {"columns": {"c": {"type": {"key": {"type": "string", "enum": "only"}}}}}
            }
        }"#
        .parse()
        .unwrap();
        let column = schema.column("T", "c").unwrap();
        assert_eq!(column.kind, ExtendedType::Enum);
        assert_eq!(
            column.ty.as_ref().unwrap().key.enum_domain,
            Some(vec![NativeScalar::String("only".to_string())])
        );
    }

    #[test]
    fn uuid_reference_fields_are_decoded() {
        let schema = test_schema();
        let key = &schema.column("TestTable", "aUUIDSet").unwrap().ty.as_ref().unwrap().key;
        assert_eq!(key.kind, ExtendedType::Uuid);
        assert_eq!(key.ref_table.as_deref(), Some("Other"));
        assert_eq!(key.ref_type, Some(RefType::Weak));

        let key = &schema.column("TestTable", "aUUID").unwrap().ty.as_ref().unwrap().key;
        assert_eq!(key.ref_type, Some(RefType::Strong));
    }

    #[test]
    fn integer_bounds_are_decoded() {
        let schema = test_schema();
        let key = &schema.column("TestTable", "aBounded").unwrap().ty.as_ref().unwrap().key;
        assert_eq!(key.min_integer, Some(0));
        assert_eq!(key.max_integer, Some(100));
    }

    #[test]
    fn indexes_keep_declaration_order() {
        let schema = test_schema();
        let table = schema.table("TestTable").unwrap();
        assert_eq!(
            table.indexes,
            vec![
                vec!["name".to_string()],
                vec!["composed_1".to_string(), "composed_2".to_string()],
            ]
        );
    }

    // ---- _uuid synthesis ----

    #[test]
    fn uuid_column_is_always_resolvable() {
        let schema = test_schema();
        let column = schema.column("TestTable", "_uuid").unwrap();
        assert_eq!(column.name, "_uuid");
        assert_eq!(column.kind, ExtendedType::Uuid);
    }

    // ---- Lookup errors ----

    #[test]
    fn missing_table_and_column_errors() {
        let schema = test_schema();
        assert_eq!(
            schema.column("NoSuch", "name"),
            Err(SchemaError::NoSuchTable { table: "NoSuch".to_string() })
        );
        assert_eq!(
            schema.column("TestTable", "missing"),
            Err(SchemaError::NoSuchColumn {
                table: "TestTable".to_string(),
                column: "missing".to_string(),
            })
        );
    }

    // ---- Parse errors carry paths ----

    #[test]
    fn unknown_max_string_is_rejected_with_path() {
        let result: Result<DatabaseSchema, _> = r#"{
            "name": "S",
            "tables": {"T": {"columns": {"c": {"type": {"key": "string", "max": "bogus"}}}}}
        }"#
        .parse();
        match result {
            Err(SchemaError::Parse { path, detail }) => {
                assert_eq!(path, "tables.T.columns.c.type.max");
                assert!(detail.contains("bogus"));
            }
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn missing_key_is_rejected_with_path() {
        let result: Result<DatabaseSchema, _> = r#"{
            "name": "S",
            "tables": {"T": {"columns": {"c": {"type": {"min": 0}}}}}
        }"#
        .parse();
        match result {
            Err(SchemaError::Parse { path, .. }) => {
                assert_eq!(path, "tables.T.columns.c.type.key");
            }
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn unknown_atomic_type_is_rejected() {
        let result: Result<DatabaseSchema, _> = r#"{
            "name": "S",
            "tables": {"T": {"columns": {"c": {"type": "quaternion"}}}}
        }"#
        .parse();
        assert!(matches!(result, Err(SchemaError::Parse { .. })));
    }

    #[test]
    fn unknown_ref_type_is_rejected() {
        let result: Result<DatabaseSchema, _> = r#"{
            "name": "S",
            "tables": {"T": {"columns": {"c": {
                "type": {"key": {"type": "uuid", "refTable": "X", "refType": "firm"}}
            }}}}
        }"#
        .parse();
        assert!(matches!(result, Err(SchemaError::Parse { .. })));
    }

    // ---- Operation validation ----

    #[test]
    fn validate_operations_accepts_known_and_reserved_columns() {
        let schema = test_schema();
        let mut row = Row::new();
        row.insert("name", crate::wire::OvsValue::String("x".to_string()));
        row.insert("_uuid", crate::wire::OvsValue::Uuid("u".to_string()));
        let operation = Operation {
            op: "insert".to_string(),
            table: "TestTable".to_string(),
            row: Some(row),
            columns: vec!["name".to_string(), "_version".to_string()],
            ..Operation::default()
        };
        assert!(schema.validate_operations(&[operation]));
    }

    #[test]
    fn validate_operations_rejects_unknown_table_and_column() {
        let schema = test_schema();
        let bad_table = Operation {
            op: "select".to_string(),
            table: "NoSuch".to_string(),
            ..Operation::default()
        };
        assert!(!schema.validate_operations(&[bad_table]));

        let mut row = Row::new();
        row.insert("bogus", crate::wire::OvsValue::Integer(1));
        let bad_column = Operation {
            op: "insert".to_string(),
            table: "TestTable".to_string(),
            rows: vec![row],
            ..Operation::default()
        };
        assert!(!schema.validate_operations(&[bad_column]));
    }
}
