//! Criteria normalization
//!
//! Criteria arrive as JSON and are folded into predicates:
//!
//! | criteria | effect |
//! |---|---|
//! | `null`, `true`, `"true"`, `""`, `[]`, `{}` | nothing |
//! | `false`, `"false"` | raw `false` predicate |
//! | integer | primary-key equality |
//! | string | registered scope |
//! | object | `column => value`, `"column op" => value` |
//! | list | items combined with OR |

use std::sync::Arc;

use serde_json::Value;

use super::{qualify_column, Repository, RepositoryRules};
use crate::backends::DatabaseValue;
use crate::error::{ModelError, ModelResult};
use crate::model::Entity;
use crate::query::{Connector, QuerySpecification};

/// What criteria resolution needs to know about the repository
struct CriteriaScope<'a> {
    rules: &'a RepositoryRules,
    alias: Option<&'a str>,
    primary_key: ModelResult<&'static str>,
}

impl<E: Entity> Repository<E> {
    /// Fold `criteria` into the specification.
    ///
    /// Malformed criteria fail with `InvalidCriteria`, or are skipped with
    /// a warning when `ignore_invalid_criteria` is set. Nothing is applied
    /// when any part fails.
    pub fn refine_criteria(&mut self, criteria: &Value) -> ModelResult<&mut Self> {
        self.apply_criteria(criteria, false)?;
        Ok(self)
    }

    pub(crate) fn apply_criteria(&mut self, criteria: &Value, idempotent: bool) -> ModelResult<()> {
        let rules = Arc::clone(&self.rules);
        let alias = self.spec.alias().map(str::to_string);
        let scope = CriteriaScope {
            rules: &rules,
            alias: alias.as_deref(),
            primary_key: E::primary_key_column(),
        };

        let mut trial = self.spec.clone();
        match apply(&mut trial, &scope, criteria, idempotent) {
            Ok(()) => {
                self.spec = trial;
                Ok(())
            }
            Err(e) if self.config.ignore_invalid_criteria && is_skippable(&e) => {
                tracing::warn!("Skipping invalid criteria {}: {}", criteria, e);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Restrict to one primary-key value or a list of them
    pub fn refine_where_id(&mut self, ids: &Value) -> ModelResult<&mut Self> {
        match self.where_id_predicate(ids) {
            Ok((column, ids)) => {
                if let [id] = ids.as_slice() {
                    self.spec.where_eq(&column, *id);
                } else {
                    self.spec.where_in(&column, ids);
                }
            }
            Err(e) if self.config.ignore_invalid_criteria && is_skippable(&e) => {
                tracing::warn!("Skipping invalid id restriction {}: {}", ids, e);
            }
            Err(e) => return Err(e),
        }
        Ok(self)
    }

    fn where_id_predicate(&self, ids: &Value) -> ModelResult<(String, Vec<i64>)> {
        let column = self.qualify(E::primary_key_column()?);

        let values: Vec<i64> = match ids {
            Value::Array(items) => items
                .iter()
                .map(|item| {
                    integer(item).ok_or_else(|| {
                        ModelError::InvalidCriteria(format!("'{}' is not an id", item))
                    })
                })
                .collect::<ModelResult<_>>()?,
            other => vec![integer(other).ok_or_else(|| {
                ModelError::InvalidCriteria(format!("'{}' is not an id", other))
            })?],
        };

        let mut unique = Vec::with_capacity(values.len());
        for value in values {
            if !unique.contains(&value) {
                unique.push(value);
            }
        }
        if unique.is_empty() {
            return Err(ModelError::InvalidCriteria(
                "id restriction needs at least one id".to_string(),
            ));
        }
        Ok((column, unique))
    }
}

fn is_skippable(error: &ModelError) -> bool {
    matches!(
        error,
        ModelError::InvalidCriteria(_) | ModelError::CompositePrimaryKey(_)
    )
}

fn integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

fn apply(
    spec: &mut QuerySpecification,
    scope: &CriteriaScope<'_>,
    criteria: &Value,
    idempotent: bool,
) -> ModelResult<()> {
    match criteria {
        Value::Null | Value::Bool(true) => Ok(()),
        Value::Bool(false) => {
            add(spec, "false", None, DatabaseValue::Null, idempotent);
            Ok(())
        }
        Value::String(text) => match text.trim() {
            "" | "true" => Ok(()),
            "false" => {
                add(spec, "false", None, DatabaseValue::Null, idempotent);
                Ok(())
            }
            name => match scope.rules.scope(name) {
                Some(rule) => rule(spec, &Value::Null),
                None => Err(ModelError::InvalidCriteria(format!(
                    "unknown scope '{}'",
                    name
                ))),
            },
        },
        Value::Number(number) => {
            let id = number.as_i64().ok_or_else(|| {
                ModelError::InvalidCriteria(format!("'{}' is not an id", number))
            })?;
            let column = match &scope.primary_key {
                Ok(column) => qualify_column(scope.alias, column),
                Err(e) => return Err(e.clone()),
            };
            add(spec, &column, Some("="), id.into(), idempotent);
            Ok(())
        }
        Value::Object(entries) => {
            for (key, value) in entries {
                apply_entry(spec, scope, key, value, idempotent)?;
            }
            Ok(())
        }
        Value::Array(items) => {
            let mut failure = None;
            spec.where_nested(Connector::And, |group| {
                for item in items {
                    group.where_nested(Connector::Or, |alternative| {
                        if let Err(e) = apply(alternative, scope, item, false) {
                            failure.get_or_insert(e);
                        }
                    });
                }
            });
            failure.map_or(Ok(()), Err)
        }
    }
}

fn apply_entry(
    spec: &mut QuerySpecification,
    scope: &CriteriaScope<'_>,
    key: &str,
    value: &Value,
    idempotent: bool,
) -> ModelResult<()> {
    let (column, operator) = match key.trim().split_once(char::is_whitespace) {
        Some((column, operator)) => (column, Some(operator.trim())),
        None => (key.trim(), None),
    };
    if column.is_empty() {
        return Err(ModelError::InvalidCriteria(format!(
            "criteria key '{}' names no column",
            key
        )));
    }
    let column = qualify_column(scope.alias, column);

    match value {
        // {"age": {">=": 18, "<": 65}}
        Value::Object(comparisons) if operator.is_none() => {
            for (operator, operand) in comparisons {
                let operand = DatabaseValue::from_json(operand.clone());
                add(spec, &column, Some(operator), operand, idempotent);
            }
        }
        Value::Null => {
            let operator = operator.unwrap_or("IS");
            add(spec, &column, Some(operator), DatabaseValue::Null, idempotent);
        }
        other => {
            add(spec, &column, operator, DatabaseValue::from_json(other.clone()), idempotent);
        }
    }
    Ok(())
}

fn add(
    spec: &mut QuerySpecification,
    expression: &str,
    operator: Option<&str>,
    value: DatabaseValue,
    idempotent: bool,
) {
    if idempotent {
        spec.where_if_not_set(expression, operator, value);
    } else {
        spec.and_where(expression, operator, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn scope(rules: &RepositoryRules) -> CriteriaScope<'_> {
        CriteriaScope {
            rules,
            alias: None,
            primary_key: Ok("id"),
        }
    }

    fn compiled(criteria: Value) -> ModelResult<String> {
        let rules = RepositoryRules::default();
        let mut spec = QuerySpecification::new("users");
        apply(&mut spec, &scope(&rules), &criteria, false)?;
        Ok(spec.compile().sql)
    }

    #[test]
    fn test_tri_state_criteria() {
        for noop in [json!(null), json!(true), json!("true"), json!(""), json!([]), json!({})] {
            assert_eq!(compiled(noop).unwrap(), "SELECT * FROM users");
        }
        for empty in [json!(false), json!("false")] {
            assert_eq!(compiled(empty).unwrap(), "SELECT * FROM users WHERE false");
        }
    }

    #[test]
    fn test_object_criteria() {
        let sql = compiled(json!({"status": "active", "team_id": [1, 2], "deleted_at": null, "age >=": 18}))
            .unwrap();

        assert!(sql.contains("(status = :p"));
        assert!(sql.contains("(team_id IN (:p"));
        assert!(sql.contains("deleted_at IS NULL"));
        assert!(sql.contains("(age >= :p"));
    }

    #[test]
    fn test_operator_map_criteria() {
        let sql = compiled(json!({"age": {">=": 18, "<": 65}})).unwrap();
        assert_eq!(sql, "SELECT * FROM users WHERE (age < :p0) AND (age >= :p1)");
    }

    #[test]
    fn test_list_criteria_are_alternatives() {
        let sql = compiled(json!([{"role": "admin"}, {"role": "owner", "active": true}])).unwrap();
        assert_eq!(
            sql,
            "SELECT * FROM users WHERE ((role = :p2) OR ((active = :p0) AND (role = :p1)))"
        );
    }

    #[test]
    fn test_integer_criteria_is_primary_key() {
        assert_eq!(compiled(json!(7)).unwrap(), "SELECT * FROM users WHERE (id = :p0)");
        assert!(matches!(compiled(json!(1.5)), Err(ModelError::InvalidCriteria(_))));
    }

    #[test]
    fn test_unknown_scope_is_invalid() {
        assert!(matches!(
            compiled(json!("popular")),
            Err(ModelError::InvalidCriteria(_))
        ));
        assert!(matches!(
            compiled(json!([{"a": 1}, "popular"])),
            Err(ModelError::InvalidCriteria(_))
        ));
    }

    #[test]
    fn test_alias_prefixes_bare_columns() {
        let rules = RepositoryRules::default();
        let scope = CriteriaScope {
            rules: &rules,
            alias: Some("u"),
            primary_key: Ok("id"),
        };
        let mut spec = QuerySpecification::aliased("users", "u");
        apply(&mut spec, &scope, &json!({"name": "Ada", "t.name": "Core"}), false).unwrap();

        assert_eq!(
            spec.compile().sql,
            "SELECT * FROM users AS u WHERE (u.name = :p0) AND (t.name = :p1)"
        );
    }
}
