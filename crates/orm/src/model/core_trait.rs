//! Core Entity Trait - base definition for mapped records
//!
//! Defines table metadata, primary key handling and the row mapping
//! contract used by repositories and relationships.

use crate::backends::{DatabaseValue, Row};
use crate::error::{ModelError, ModelResult};

use super::schema::EntitySchema;

/// A record type backed by one table
pub trait Entity: Sized + Send + Sync + 'static {
    /// Static description of the table
    fn schema() -> &'static EntitySchema;

    /// Create an entity from a result row
    fn from_row(row: &Row) -> ModelResult<Self>;

    /// Current value of a column; unknown columns read as NULL
    fn column_value(&self, column: &str) -> DatabaseValue;

    /// Assign a column value
    fn set_column_value(&mut self, column: &str, value: DatabaseValue) -> ModelResult<()>;

    /// Table name for this entity
    fn table_name() -> &'static str {
        Self::schema().table
    }

    /// Single primary key column; composite keys are rejected
    fn primary_key_column() -> ModelResult<&'static str> {
        let schema = Self::schema();
        match schema.primary_key {
            [column] => Ok(*column),
            [] => Err(ModelError::Validation(format!(
                "Table '{}' declares no primary key",
                schema.table
            ))),
            _ => Err(ModelError::CompositePrimaryKey(schema.table.to_string())),
        }
    }

    /// Column other tables use to reference this entity
    fn foreign_key_name() -> String {
        format!("{}_id", Self::schema().entity_name)
    }

    /// Primary key value; NULL for composite or missing keys
    fn primary_key_value(&self) -> DatabaseValue {
        match Self::primary_key_column() {
            Ok(column) => self.column_value(column),
            Err(_) => DatabaseValue::Null,
        }
    }

    /// Column/value pairs persisted on insert and update
    fn to_fields(&self) -> Vec<(String, DatabaseValue)> {
        Self::schema()
            .fields
            .iter()
            .map(|field| (field.column.to_string(), self.column_value(field.column)))
            .collect()
    }
}
