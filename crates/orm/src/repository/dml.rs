//! Insert, update and delete for repository records
//!
//! Statements use the same named placeholders as SELECT compilation and go
//! through the repository's connection. Inserts on dialects with
//! `RETURNING` read the generated key back from the result row; others use
//! the cursor's last insert id.

use chrono::Utc;

use super::Repository;
use crate::backends::{DatabaseValue, Parameters};
use crate::error::{ModelError, ModelResult};
use crate::model::Entity;
use crate::query::{execute_statement, CompiledStatement};
use crate::relationships::Record;

/// Collects `name -> value` bindings for a hand-built statement
#[derive(Default)]
struct Bindings {
    parameters: Parameters,
}

impl Bindings {
    fn bind(&mut self, value: DatabaseValue) -> String {
        let name = format!("p{}", self.parameters.len());
        self.parameters.insert(name.clone(), value);
        format!(":{}", name)
    }

    fn finish(self, sql: String) -> CompiledStatement {
        CompiledStatement {
            sql,
            parameters: self.parameters,
        }
    }
}

impl<E: Entity> Repository<E> {
    /// Insert the record and assign its generated primary key.
    ///
    /// Assigning the key invalidates the record's relationship cache.
    pub async fn insert(&self, record: &mut Record<E>) -> ModelResult<u64> {
        let table = E::table_name();
        let primary_key = E::primary_key_column().ok();
        let key_is_unset = record.primary_key_value().is_unset();

        if let Some((column, value)) = &self.rules.discriminator {
            if record.column_value(column).is_null() {
                record.entity_mut().set_column_value(column, value.clone())?;
            }
        }

        let fields: Vec<(String, DatabaseValue)> = record
            .to_fields()
            .into_iter()
            .filter(|(column, _)| !(key_is_unset && Some(column.as_str()) == primary_key))
            .collect();

        let mut bindings = Bindings::default();
        let mut sql = if fields.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES", table)
        } else {
            let columns: Vec<&str> = fields.iter().map(|(column, _)| column.as_str()).collect();
            let placeholders: Vec<String> = fields
                .iter()
                .map(|(_, value)| bindings.bind(value.clone()))
                .collect();
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                table,
                columns.join(", "),
                placeholders.join(", ")
            )
        };

        let returning = match primary_key {
            Some(column) if key_is_unset && self.connection.dialect().supports_returning() => {
                sql.push_str(&format!(" RETURNING {}", column));
                Some(column)
            }
            _ => None,
        };

        let mut cursor = execute_statement(self.connection.as_ref(), &bindings.finish(sql)).await?;

        if key_is_unset && primary_key.is_some() {
            let generated = match returning {
                Some(column) => match cursor.fetch_one() {
                    Some(row) => Some(row.get_by_name(column)?),
                    None => None,
                },
                None => cursor.last_insert_id().map(DatabaseValue::Int64),
            };
            if let Some(id) = generated {
                record.set_primary_key(id)?;
            }
        }

        Ok(cursor.affected_row_count())
    }

    /// Write every field except the primary key back to the record's row
    pub async fn update(&self, record: &Record<E>) -> ModelResult<u64> {
        let (column, id) = self.identify(record)?;

        let mut bindings = Bindings::default();
        let assignments: Vec<String> = record
            .to_fields()
            .into_iter()
            .filter(|(field, _)| field != column)
            .map(|(field, value)| format!("{} = {}", field, bindings.bind(value)))
            .collect();
        if assignments.is_empty() {
            return Ok(0);
        }

        let key = bindings.bind(id);
        let sql = format!(
            "UPDATE {} SET {} WHERE {} = {}",
            E::table_name(),
            assignments.join(", "),
            column,
            key
        );
        let cursor = execute_statement(self.connection.as_ref(), &bindings.finish(sql)).await?;
        Ok(cursor.affected_row_count())
    }

    /// Delete the record; entities with a soft-delete column are only stamped
    pub async fn delete(&self, record: &mut Record<E>) -> ModelResult<u64> {
        let Some(deleted_at) = E::schema().soft_delete_column else {
            return self.force_delete(record).await;
        };
        let (column, id) = self.identify(record)?;

        let now = DatabaseValue::DateTime(Utc::now());
        let mut bindings = Bindings::default();
        let stamp = bindings.bind(now.clone());
        let key = bindings.bind(id);
        let sql = format!(
            "UPDATE {} SET {} = {} WHERE {} = {}",
            E::table_name(),
            deleted_at,
            stamp,
            column,
            key
        );

        let cursor = execute_statement(self.connection.as_ref(), &bindings.finish(sql)).await?;
        record.entity_mut().set_column_value(deleted_at, now)?;
        Ok(cursor.affected_row_count())
    }

    /// Remove the record's row regardless of soft deletion
    pub async fn force_delete(&self, record: &Record<E>) -> ModelResult<u64> {
        let (column, id) = self.identify(record)?;

        let mut bindings = Bindings::default();
        let key = bindings.bind(id);
        let sql = format!("DELETE FROM {} WHERE {} = {}", E::table_name(), column, key);

        let cursor = execute_statement(self.connection.as_ref(), &bindings.finish(sql)).await?;
        Ok(cursor.affected_row_count())
    }

    fn identify(&self, record: &Record<E>) -> ModelResult<(&'static str, DatabaseValue)> {
        let column = E::primary_key_column()?;
        let id = record.column_value(column);
        if id.is_unset() {
            return Err(ModelError::MissingKey {
                table: E::table_name().to_string(),
                column: column.to_string(),
            });
        }
        Ok((column, id))
    }
}
