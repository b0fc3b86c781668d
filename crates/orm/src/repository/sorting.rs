//! Sort request resolution against the repository's allow-list

use serde_json::Value;

use super::context::{is_truthy, Context};
use super::Repository;
use crate::error::{ModelError, ModelResult};
use crate::model::Entity;

/// One ordering column with its fixed direction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortColumn {
    pub column: String,
    pub descending: bool,
}

impl SortColumn {
    pub fn new(column: &str, descending: bool) -> Self {
        Self {
            column: column.to_string(),
            descending,
        }
    }
}

/// A public field name with the direction the caller asked for
#[derive(Debug, Clone, PartialEq, Eq)]
struct SortRequest {
    field: String,
    descending: bool,
}

impl<E: Entity> Repository<E> {
    /// Apply `order_by`, or the default sorting when the context has none.
    ///
    /// A truthy `desc` flag inverts every resolved direction. Requests are
    /// resolved in full before anything is applied.
    pub fn refine_sorting(&mut self, context: &Context) -> ModelResult<&mut Self> {
        let invert = context.get("desc").is_some_and(is_truthy);

        let resolved = match context.get("order_by") {
            Some(order_by) if !is_blank(order_by) => self.resolve_order_by(order_by)?,
            _ => self.rules.default_sorting.clone(),
        };

        for sort in resolved {
            let column = self.qualify(&sort.column);
            self.spec.order_by(&column, sort.descending != invert);
        }
        Ok(self)
    }

    fn resolve_order_by(&self, order_by: &Value) -> ModelResult<Vec<SortColumn>> {
        let mut resolved = Vec::new();

        for request in parse_requests(order_by) {
            let outcome = request.and_then(|request| {
                let columns = self.rules.sorting_field(&request.field).ok_or_else(|| {
                    ModelError::InvalidSorting(format!("'{}' is not sortable", request.field))
                })?;
                Ok(columns
                    .iter()
                    .map(|sort| SortColumn::new(&sort.column, sort.descending != request.descending))
                    .collect::<Vec<_>>())
            });

            match outcome {
                Ok(columns) => resolved.extend(columns),
                Err(e) if self.config.ignore_invalid_sorting => {
                    tracing::warn!("Skipping invalid sorting: {}", e);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(resolved)
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(entries) => entries.is_empty(),
        _ => false,
    }
}

fn parse_requests(order_by: &Value) -> Vec<ModelResult<SortRequest>> {
    match order_by {
        Value::String(text) => parse_list(text),
        Value::Array(items) => items
            .iter()
            .flat_map(|item| match item {
                Value::String(text) => parse_list(text),
                other => vec![Err(ModelError::InvalidSorting(format!(
                    "cannot sort by {}",
                    other
                )))],
            })
            .collect(),
        Value::Object(entries) => entries
            .iter()
            .map(|(field, direction)| {
                let descending = match direction {
                    Value::Null => false,
                    Value::Bool(descending) => *descending,
                    Value::String(direction) => parse_direction(direction)?,
                    other => {
                        return Err(ModelError::InvalidSorting(format!(
                            "invalid direction {} for '{}'",
                            other, field
                        )))
                    }
                };
                Ok(SortRequest {
                    field: field.trim().to_string(),
                    descending,
                })
            })
            .collect(),
        other => vec![Err(ModelError::InvalidSorting(format!(
            "cannot sort by {}",
            other
        )))],
    }
}

/// `"name:desc, created_at"` into requests
fn parse_list(text: &str) -> Vec<ModelResult<SortRequest>> {
    text.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (field, descending) = match entry.split_once(':') {
                Some((field, direction)) => (field.trim(), parse_direction(direction)?),
                None => (entry, false),
            };
            Ok(SortRequest {
                field: field.to_string(),
                descending,
            })
        })
        .collect()
}

fn parse_direction(direction: &str) -> ModelResult<bool> {
    match direction.trim().to_lowercase().as_str() {
        "" | "asc" => Ok(false),
        "desc" => Ok(true),
        other => Err(ModelError::InvalidSorting(format!(
            "unknown direction '{}'",
            other
        ))),
    }
}
