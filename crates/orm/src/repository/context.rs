//! Context-to-query translation
//!
//! A context is a loosely typed JSON map, typically built from request
//! parameters. [`Repository::prepare_context`] turns its well-known keys
//! into fragments on the repository's specification.

use std::sync::Arc;

use serde_json::{Map, Value};

use super::Repository;
use crate::backends::DatabaseValue;
use crate::error::{ModelError, ModelResult};
use crate::model::Entity;

/// Loosely typed request parameters
pub type Context = Map<String, Value>;

/// Context key restricting results to primary-key values
pub const WHERE_ID_KEY: &str = "__where_id__";

impl<E: Entity> Repository<E> {
    /// Apply every recognized key of `context`.
    ///
    /// Default criteria come first, then `criteria`, `__where_id__`,
    /// `deleted`, `search`, registered refinements and scopes, pagination
    /// and finally sorting. Calling it twice with the same context leaves
    /// the default filters in place only once.
    pub fn prepare_context(&mut self, context: &Context) -> ModelResult<&mut Self> {
        self.apply_default_criteria()?;

        if let Some(criteria) = context.get("criteria") {
            self.refine_criteria(criteria)?;
        }
        if let Some(ids) = context.get(WHERE_ID_KEY) {
            self.refine_where_id(ids)?;
        }
        if let Some(deleted) = context.get("deleted") {
            self.refine_deleted(deleted)?;
        }
        if let Some(search) = context.get("search") {
            self.refine_search(search)?;
        }

        let rules = Arc::clone(&self.rules);
        for (name, rule) in rules.refinements.iter().chain(rules.scopes.iter()) {
            if let Some(value) = context.get(name) {
                tracing::debug!("Applying context rule '{}'", name);
                rule(&mut self.spec, value)?;
            }
        }

        self.refine_pagination(context)?;
        self.refine_sorting(context)?;
        Ok(self)
    }

    fn apply_default_criteria(&mut self) -> ModelResult<()> {
        if let Some(column) = E::schema().soft_delete_column {
            let column = self.qualify(column);
            if !self.is_soft_delete_toggled(&column) {
                self.spec
                    .where_if_not_set(&column, Some("IS"), DatabaseValue::Null);
            }
        }

        if let Some((column, value)) = self.rules.discriminator.clone() {
            let column = self.qualify(&column);
            self.spec.where_if_not_set(&column, Some("="), value);
        }

        // Lists and scopes render fresh predicates on every run
        if self.defaults_applied && !self.spec.predicates().is_empty() {
            return Ok(());
        }
        let rules = Arc::clone(&self.rules);
        for criteria in &rules.default_criteria {
            self.apply_criteria(criteria, true)?;
        }
        self.defaults_applied = true;
        Ok(())
    }

    fn is_soft_delete_toggled(&self, column: &str) -> bool {
        self.spec
            .has_where(column, Some("IS NOT"), &DatabaseValue::Null)
    }

    /// Toggle the soft-delete default: `"only"` keeps trashed rows only,
    /// `"with"` or a truthy value includes them
    pub fn refine_deleted(&mut self, value: &Value) -> ModelResult<&mut Self> {
        let Some(column) = E::schema().soft_delete_column else {
            return Ok(self);
        };
        let column = self.qualify(column);

        match value {
            Value::String(mode) if mode.eq_ignore_ascii_case("only") => {
                self.spec
                    .remove_where(&column, Some("IS"), DatabaseValue::Null)
                    .where_if_not_set(&column, Some("IS NOT"), DatabaseValue::Null);
            }
            Value::String(mode) if mode.eq_ignore_ascii_case("without") => {}
            other if is_truthy(other) || other.as_str() == Some("with") => {
                self.spec
                    .remove_where(&column, Some("IS"), DatabaseValue::Null);
            }
            _ => {}
        }
        Ok(self)
    }

    /// Keyword search over the searchable columns
    pub fn refine_search(&mut self, value: &Value) -> ModelResult<&mut Self> {
        let Some(keyword) = value.as_str().map(str::trim).filter(|k| !k.is_empty()) else {
            return Ok(self);
        };
        if self.rules.searchable_columns.is_empty() {
            return Ok(self);
        }

        let columns: Vec<String> = self
            .rules
            .searchable_columns
            .iter()
            .map(|column| self.qualify(column))
            .collect();
        let words: Vec<&str> = keyword.split_whitespace().collect();

        if self.config.full_text_search {
            let name = self.spec.bind_parameter(words.join(" "));
            let expression = format!(
                "MATCH({}) AGAINST(:{} IN BOOLEAN MODE)",
                columns.join(", "),
                name
            );
            self.spec.where_raw(&expression);
        } else {
            let name = self.spec.bind_parameter(format!("%{}%", words.join("%")));
            let chain: Vec<String> = columns
                .iter()
                .map(|column| format!("{} LIKE :{}", column, name))
                .collect();
            self.spec.where_raw(&format!("({})", chain.join(" OR ")));
        }
        Ok(self)
    }

    /// Page size and position from `limit`, `limit_default`, `page` and
    /// `offset`; the first page when no position is given
    pub fn refine_pagination(&mut self, context: &Context) -> ModelResult<&mut Self> {
        let limit = match read_count(context, "limit")? {
            Some(limit) => Some(limit),
            None => read_count(context, "limit_default")?.or(self.config.limit_default),
        };
        let Some(limit) = limit else {
            return Ok(self);
        };

        let page = match read_count(context, "page")? {
            Some(page) => page,
            None => read_count(context, "offset")?
                .filter(|_| limit > 0)
                .map_or(1, |offset| offset / limit + 1),
        };

        self.spec.limit(limit, Some(page))?;
        Ok(self)
    }
}

fn read_count(context: &Context, key: &str) -> ModelResult<Option<u64>> {
    match context.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(number)) => number.as_u64().map(Some).ok_or_else(|| {
            ModelError::Validation(format!("'{}' must be a non-negative integer", key))
        }),
        Some(Value::String(text)) if text.trim().is_empty() => Ok(None),
        Some(Value::String(text)) => text.trim().parse().map(Some).map_err(|_| {
            ModelError::Validation(format!("'{}' must be a non-negative integer, got '{}'", key, text))
        }),
        Some(other) => Err(ModelError::Validation(format!(
            "'{}' must be a non-negative integer, got {}",
            key, other
        ))),
    }
}

/// Loose truthiness of request values
pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => matches!(
            text.trim().to_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        ),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn context(value: Value) -> Context {
        match value {
            Value::Object(map) => map,
            _ => Context::new(),
        }
    }

    #[test]
    fn test_read_count() {
        let ctx = context(json!({"limit": 20, "page": "3", "offset": "", "bad": -1, "worse": "x"}));

        assert_eq!(read_count(&ctx, "limit").unwrap(), Some(20));
        assert_eq!(read_count(&ctx, "page").unwrap(), Some(3));
        assert_eq!(read_count(&ctx, "offset").unwrap(), None);
        assert_eq!(read_count(&ctx, "missing").unwrap(), None);
        assert!(read_count(&ctx, "bad").unwrap_err().is_validation());
        assert!(read_count(&ctx, "worse").unwrap_err().is_validation());
    }

    #[test]
    fn test_is_truthy() {
        assert!(is_truthy(&json!(true)));
        assert!(is_truthy(&json!(1)));
        assert!(is_truthy(&json!("yes")));
        assert!(!is_truthy(&json!("0")));
        assert!(!is_truthy(&json!(null)));
        assert!(!is_truthy(&json!([1])));
    }
}
