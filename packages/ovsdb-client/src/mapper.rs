//! Schema-directed mapping between record types and wire rows.
//!
//! The [`Mapper`] validates a record type's bindings against the schema once
//! per (type, table) pair and then moves data in both directions: wire row
//! into record ([`Mapper::get_data`]), record into wire row
//! ([`Mapper::new_row`]), plus index-based condition construction and
//! index-based entity equality.
//!
//! The mapper is stateless apart from the shared read-only schema and its
//! validation cache; it is safe for unbounded concurrent use.

use std::any::{type_name, TypeId};
use std::sync::Arc;

use dashmap::DashMap;
use ovsdb_core::marshal::{is_default_value, native_shape_of, native_to_ovs, ovs_to_native};
use ovsdb_core::native::{NativeShape, NativeValue};
use ovsdb_core::schema::{DatabaseSchema, SchemaError};
use ovsdb_core::wire::{Condition, ConditionFunction, Mutation, Mutator, Row};
use ovsdb_core::MarshalError;

use crate::model::{Binding, Model};

/// Errors from the record binder.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MapperError {
    /// The referenced table or column is not in the schema.
    #[error(transparent)]
    Schema(#[from] SchemaError),
    /// A record type's bindings are incompatible with the schema. The binder
    /// refuses to run any operation for the offending (type, table) pair.
    #[error("model {model}: field {field} ({shape}) tagged {column:?}: {reason}")]
    FieldBinding {
        model: &'static str,
        field: &'static str,
        shape: NativeShape,
        column: &'static str,
        reason: String,
    },
    /// A concrete value failed to marshal, tagged with its table and column.
    #[error("table {table}, column {column}: {source}")]
    Marshal {
        table: String,
        column: String,
        #[source]
        source: MarshalError,
    },
    /// No candidate index of the table is fully populated in the record.
    #[error("no index of table {table} is fully populated in the record")]
    NoValidIndex { table: String },
}

/// Binds annotated record types to the tables of one schema.
///
/// Holds the schema as a shared read-only handle; cloning the `Arc` is the
/// intended way to share one schema between the mapper, the cache, and the
/// transport.
pub struct Mapper {
    schema: Arc<DatabaseSchema>,
    /// (record type, table) pairs that already passed binding validation.
    validated: DashMap<(TypeId, String), ()>,
}

impl Mapper {
    /// Creates a mapper over a decoded schema.
    #[must_use]
    pub fn new(schema: Arc<DatabaseSchema>) -> Self {
        Self { schema, validated: DashMap::new() }
    }

    /// The schema this mapper reads.
    #[must_use]
    pub fn schema(&self) -> &DatabaseSchema {
        &self.schema
    }

    /// Checks a record type's bindings against a table: every bound column
    /// must exist and the field's declared shape must match the column's
    /// native shape exactly. The result is cached per (type, table).
    fn validate<M: Model>(&self, table: &str) -> Result<&'static [Binding], MapperError> {
        self.schema.table(table)?;
        let key = (TypeId::of::<M>(), table.to_string());
        if !self.validated.contains_key(&key) {
            for binding in M::bindings() {
                let column = self.schema.column(table, binding.column).map_err(|_| {
                    MapperError::FieldBinding {
                        model: type_name::<M>(),
                        field: binding.field,
                        shape: binding.shape,
                        column: binding.column,
                        reason: "column does not exist in the table".to_string(),
                    }
                })?;
                let expected = native_shape_of(column);
                if expected != binding.shape {
                    return Err(MapperError::FieldBinding {
                        model: type_name::<M>(),
                        field: binding.field,
                        shape: binding.shape,
                        column: binding.column,
                        reason: format!("wrong type, column expects {expected}"),
                    });
                }
            }
            self.validated.insert(key, ());
        }
        Ok(M::bindings())
    }

    /// Populates a record from a wire row.
    ///
    /// Columns the row does not carry leave the corresponding fields at
    /// their current values; wire columns without a binding are ignored.
    ///
    /// # Errors
    ///
    /// [`MapperError::Schema`] for an unknown table, the binding errors from
    /// validation, or a marshalling error tagged with (table, column).
    pub fn get_data<M: Model>(&self, table: &str, row: &Row, record: &mut M) -> Result<(), MapperError> {
        let bindings = self.validate::<M>(table)?;
        for binding in bindings {
            let Some(wire) = row.get(binding.column) else {
                continue;
            };
            let column = self.schema.column(table, binding.column)?;
            let native = ovs_to_native(column, wire).map_err(|source| MapperError::Marshal {
                table: table.to_string(),
                column: binding.column.to_string(),
                source,
            })?;
            record.set_native_value(binding.column, native);
        }
        Ok(())
    }

    /// Synthesizes a wire row from a record.
    ///
    /// With no `columns`, every bound field whose value is not the default
    /// of its shape is included, mirroring OVSDB's omit-defaults convention
    /// for inserts. With explicit `columns`, exactly the listed bound
    /// columns are included (defaults too); names that are not bound are
    /// silently skipped and simply produce a shorter row.
    ///
    /// # Errors
    ///
    /// [`MapperError::Schema`], the binding errors from validation, or a
    /// marshalling error tagged with (table, column).
    pub fn new_row<M: Model>(&self, table: &str, record: &M, columns: &[&str]) -> Result<Row, MapperError> {
        let bindings = self.validate::<M>(table)?;
        let mut row = Row::new();
        for binding in bindings {
            if !columns.is_empty() && !columns.contains(&binding.column) {
                continue;
            }
            let Some(native) = record.native_value(binding.column) else {
                continue;
            };
            let column = self.schema.column(table, binding.column)?;
            if columns.is_empty() && is_default_value(column, &native) {
                continue;
            }
            let wire = native_to_ovs(column, &native).map_err(|source| MapperError::Marshal {
                table: table.to_string(),
                column: binding.column.to_string(),
                source,
            })?;
            row.insert(binding.column, wire);
        }
        Ok(row)
    }

    /// Builds an equality condition list keyed by one of the record's
    /// indexes.
    ///
    /// A non-empty `index` is used verbatim (every named column must be
    /// bound). Otherwise the first valid candidate wins, trying `[_uuid]`
    /// first and then the table's declared indexes in declaration order; a
    /// candidate is valid when every one of its columns is bound and holds a
    /// non-default value.
    ///
    /// # Errors
    ///
    /// [`MapperError::NoValidIndex`] when no candidate qualifies, plus the
    /// usual schema, binding, and marshalling errors.
    pub fn new_condition<M: Model>(
        &self,
        table: &str,
        record: &M,
        index: &[&str],
    ) -> Result<Vec<Condition>, MapperError> {
        let bindings = self.validate::<M>(table)?;
        let chosen: Vec<String> = if index.is_empty() {
            self.valid_indexes(table, bindings, record)?
                .into_iter()
                .next()
                .ok_or_else(|| MapperError::NoValidIndex { table: table.to_string() })?
        } else {
            if !index.iter().all(|name| bindings.iter().any(|b| b.column == *name)) {
                return Err(MapperError::NoValidIndex { table: table.to_string() });
            }
            index.iter().map(|name| (*name).to_string()).collect()
        };

        chosen
            .into_iter()
            .map(|column_name| {
                let native = record
                    .native_value(&column_name)
                    .ok_or_else(|| MapperError::NoValidIndex { table: table.to_string() })?;
                let column = self.schema.column(table, &column_name)?;
                let value = native_to_ovs(column, &native).map_err(|source| MapperError::Marshal {
                    table: table.to_string(),
                    column: column_name.clone(),
                    source,
                })?;
                Ok(Condition { column: column_name, function: ConditionFunction::Equal, value })
            })
            .collect()
    }

    /// Decides whether two records denote the same database entity.
    ///
    /// The valid candidate indexes of each side are computed as in
    /// [`new_condition`](Self::new_condition); `extra_indexes`, when
    /// non-empty, is appended to both sides as one additional composite
    /// index, letting callers assert equality on columns that are not
    /// otherwise an index. The records are equal iff some index valid on
    /// both sides compares deeply equal column for column.
    ///
    /// # Errors
    ///
    /// [`MapperError::Schema`] or the binding errors from validation.
    pub fn equal<M: Model>(
        &self,
        table: &str,
        lhs: &M,
        rhs: &M,
        extra_indexes: &[&str],
    ) -> Result<bool, MapperError> {
        let bindings = self.validate::<M>(table)?;
        let mut lhs_valid = self.valid_indexes(table, bindings, lhs)?;
        let mut rhs_valid = self.valid_indexes(table, bindings, rhs)?;
        if !extra_indexes.is_empty() {
            let extra: Vec<String> = extra_indexes.iter().map(|name| (*name).to_string()).collect();
            lhs_valid.push(extra.clone());
            rhs_valid.push(extra);
        }

        for index in &lhs_valid {
            if !rhs_valid.contains(index) {
                continue;
            }
            let all_equal = index.iter().all(|column| {
                match (lhs.native_value(column), rhs.native_value(column)) {
                    (Some(a), Some(b)) => a == b,
                    _ => false,
                }
            });
            if all_equal {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Builds a mutation cell from a native value.
    ///
    /// # Errors
    ///
    /// [`MapperError::Schema`] for an unknown table or column, or a
    /// marshalling error tagged with (table, column).
    pub fn new_mutation(
        &self,
        table: &str,
        column_name: &str,
        mutator: Mutator,
        value: &NativeValue,
    ) -> Result<Mutation, MapperError> {
        let column = self.schema.column(table, column_name)?;
        let wire = native_to_ovs(column, value).map_err(|source| MapperError::Marshal {
            table: table.to_string(),
            column: column_name.to_string(),
            source,
        })?;
        Ok(Mutation { column: column_name.to_string(), mutator, value: wire })
    }

    /// The record's valid candidate indexes, in tie-break order: `[_uuid]`
    /// first, then the table's indexes in declaration order. A candidate is
    /// valid when every column is bound and non-default.
    fn valid_indexes<M: Model>(
        &self,
        table_name: &str,
        bindings: &[Binding],
        record: &M,
    ) -> Result<Vec<Vec<String>>, MapperError> {
        let table = self.schema.table(table_name)?;
        let mut candidates = Vec::with_capacity(table.indexes.len() + 1);
        candidates.push(vec!["_uuid".to_string()]);
        candidates.extend(table.indexes.iter().cloned());

        let mut valid = Vec::new();
        for candidate in candidates {
            let populated = candidate.iter().all(|column_name| {
                if !bindings.iter().any(|b| b.column == column_name.as_str()) {
                    return false;
                }
                let Ok(column) = self.schema.column(table_name, column_name) else {
                    return false;
                };
                record
                    .native_value(column_name)
                    .is_some_and(|native| !is_default_value(column, &native))
            });
            if populated {
                valid.push(candidate);
            }
        }
        Ok(valid)
    }
}
