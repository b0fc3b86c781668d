//! Query Builder SQL generation
//!
//! Renders a [`QuerySpecification`] into SQL with named `:pN` placeholders.
//! Clause order is fixed: SELECT, FROM, JOIN, WHERE, GROUP BY/HAVING,
//! ORDER BY, LIMIT/OFFSET.

use super::builder::{next_parameter_name, QuerySpecification};
use super::types::*;
use crate::backends::{DatabaseValue, Parameters};

/// Column alias used by count and aggregate statements
pub const AGGREGATE_ALIAS: &str = "aggregate";

impl QuerySpecification {
    /// Render the specification. Does not mutate `self`; parameter names
    /// continue from the specification's counter.
    pub fn compile(&self) -> CompiledStatement {
        let mut parameters = self.parameters.clone();
        let mut counter = self.parameter_counter;
        let mut sql = String::new();

        // SELECT clause
        if self.distinct {
            sql.push_str("SELECT DISTINCT ");
        } else {
            sql.push_str("SELECT ");
        }

        if self.select_columns.is_empty() {
            sql.push('*');
        } else {
            sql.push_str(&self.select_columns.join(", "));
        }

        // FROM clause
        if !self.source.table.is_empty() {
            sql.push_str(" FROM ");
            sql.push_str(&self.source.to_string());
        }

        // JOIN clauses
        for join in &self.joins {
            sql.push_str(&format!(
                " {} {} ON {} = {}",
                join.join_type, join.target, join.local_key, join.foreign_key
            ));
        }

        if !self.predicates.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&render_predicates(&self.predicates, &mut counter, &mut parameters));
        }

        if !self.grouping.is_empty() {
            sql.push_str(" GROUP BY ");
            sql.push_str(&self.grouping.join(", "));

            if !self.having_predicates.is_empty() {
                sql.push_str(" HAVING ");
                sql.push_str(&render_predicates(
                    &self.having_predicates,
                    &mut counter,
                    &mut parameters,
                ));
            }
        }

        self.build_order_limit_clause(&mut sql);

        CompiledStatement { sql, parameters }
    }

    /// Helper method to build ORDER BY and LIMIT clauses
    fn build_order_limit_clause(&self, sql: &mut String) {
        if !self.ordering.is_empty() {
            let entries: Vec<String> = self
                .ordering
                .iter()
                .map(|(column, descending)| {
                    format!("{} {}", column, if *descending { "DESC" } else { "ASC" })
                })
                .collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&entries.join(", "));
        }

        if let Some(limit) = self.limit_count {
            sql.push_str(&format!(" LIMIT {}", limit));

            if let Some(offset) = self.offset_value {
                sql.push_str(&format!(" OFFSET {}", offset));
            }
        }
    }

    /// Clone counting the rows this specification matches, ignoring paging
    pub fn count_specification(&self) -> QuerySpecification {
        let mut inner = self.clone();
        inner.ordering.clear();
        inner.limit_count = None;
        inner.offset_value = None;

        if inner.grouping.is_empty() && !inner.distinct {
            inner.select_columns = vec![format!("COUNT(*) AS {}", AGGREGATE_ALIAS)];
            return inner;
        }

        // Grouped or distinct rows are counted through a sub-select
        let compiled = inner.compile();
        let mut outer =
            QuerySpecification::aliased(&format!("({})", compiled.sql), "aggregate_source");
        outer.select_columns = vec![format!("COUNT(*) AS {}", AGGREGATE_ALIAS)];
        outer.parameter_counter = self.parameter_counter + compiled.parameters.len();
        outer.parameters = compiled.parameters;
        outer.limit_max = self.limit_max;
        outer
    }

    /// Clone probing for at least one matching row
    pub fn exists_specification(&self) -> QuerySpecification {
        let mut probe = self.clone();
        probe.select_columns = vec!["1".to_string()];
        probe.distinct = false;
        probe.ordering.clear();
        probe.limit_count = Some(1);
        probe.offset_value = None;
        probe
    }

    /// Clone computing one aggregate expression such as `MAX(age)`
    pub fn aggregate_specification(&self, expression: &str) -> QuerySpecification {
        let mut aggregate = self.clone();
        aggregate.select_columns = vec![format!("{} AS {}", expression, AGGREGATE_ALIAS)];
        aggregate.distinct = false;
        aggregate.ordering.clear();
        aggregate.limit_count = None;
        aggregate.offset_value = None;
        aggregate
    }

    pub fn compile_count(&self) -> CompiledStatement {
        self.count_specification().compile()
    }

    pub fn compile_exists(&self) -> CompiledStatement {
        self.exists_specification().compile()
    }

    pub fn compile_aggregate(&self, expression: &str) -> CompiledStatement {
        self.aggregate_specification(expression).compile()
    }
}

/// Render a connector chain.
///
/// The first predicate drops its connector word (a negated one keeps
/// `NOT`); bound values are registered in `parameters` under fresh names.
pub(crate) fn render_predicates(
    predicates: &[Predicate],
    counter: &mut usize,
    parameters: &mut Parameters,
) -> String {
    let mut parts = Vec::with_capacity(predicates.len());

    for (i, predicate) in predicates.iter().enumerate() {
        let body = render_predicate(predicate, counter, parameters);
        let part = if i == 0 {
            if predicate.connector.is_negated() {
                format!("NOT {}", body)
            } else {
                body
            }
        } else {
            format!("{} {}", predicate.connector.keyword(), body)
        };
        parts.push(part);
    }

    parts.join(" ")
}

fn render_predicate(
    predicate: &Predicate,
    counter: &mut usize,
    parameters: &mut Parameters,
) -> String {
    let operator = match &predicate.operator {
        None if predicate.value.is_null() => return predicate.expression.clone(),
        None => "=",
        Some(op) => op.as_str(),
    };

    let mut bind = |value: &DatabaseValue| -> String {
        let name = next_parameter_name(counter, parameters);
        parameters.insert(name.clone(), value.clone());
        format!(":{}", name)
    };

    match &predicate.value {
        DatabaseValue::Null => format!("{} {} NULL", predicate.expression, operator),
        DatabaseValue::Array(values)
            if operator.ends_with("BETWEEN") && values.len() == 2 =>
        {
            let low = bind(&values[0]);
            let high = bind(&values[1]);
            format!("({} {} {} AND {})", predicate.expression, operator, low, high)
        }
        DatabaseValue::Array(values) => {
            let placeholders = if values.is_empty() {
                "NULL".to_string()
            } else {
                values.iter().map(&mut bind).collect::<Vec<_>>().join(", ")
            };
            format!("({} {} ({}))", predicate.expression, operator, placeholders)
        }
        value => {
            let placeholder = bind(value);
            format!("({} {} {})", predicate.expression, operator, placeholder)
        }
    }
}
