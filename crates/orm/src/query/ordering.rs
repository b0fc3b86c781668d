//! Query Builder ORDER BY, GROUP BY, HAVING operations

use super::builder::QuerySpecification;
use super::types::*;
use crate::backends::DatabaseValue;

impl QuerySpecification {
    /// Order by `column`; re-ordering an existing column replaces its direction in place
    pub fn order_by(&mut self, column: &str, descending: bool) -> &mut Self {
        match self.ordering.iter_mut().find(|(existing, _)| existing == column) {
            Some(entry) => entry.1 = descending,
            None => self.ordering.push((column.to_string(), descending)),
        }
        self
    }

    /// Drop every ORDER BY entry
    pub fn clear_order_by(&mut self) -> &mut Self {
        self.ordering.clear();
        self
    }

    /// Add GROUP BY clause
    pub fn group_by(&mut self, column: &str) -> &mut Self {
        self.grouping.push(column.to_string());
        self
    }

    /// Add an AND HAVING predicate; only rendered with a GROUP BY
    pub fn having<V: Into<DatabaseValue>>(
        &mut self,
        expression: &str,
        operator: Option<&str>,
        value: V,
    ) -> &mut Self {
        self.having_predicates.push(Predicate::new(
            Connector::And,
            expression,
            operator,
            value.into(),
        ));
        self
    }

    /// Add an OR HAVING predicate
    pub fn or_having<V: Into<DatabaseValue>>(
        &mut self,
        expression: &str,
        operator: Option<&str>,
        value: V,
    ) -> &mut Self {
        self.having_predicates.push(Predicate::new(
            Connector::Or,
            expression,
            operator,
            value.into(),
        ));
        self
    }
}
