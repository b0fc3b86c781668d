//! Query Builder Types - Core types and enums for query building

use std::fmt;

use crate::backends::{DatabaseValue, Parameters};

/// How a predicate attaches to the ones before it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connector {
    And,
    Or,
    AndNot,
    OrNot,
}

impl Connector {
    /// Whether the predicate is negated
    pub fn is_negated(self) -> bool {
        matches!(self, Connector::AndNot | Connector::OrNot)
    }

    /// Keyword emitted before a predicate that is not the first of its chain
    pub fn keyword(self) -> &'static str {
        match self {
            Connector::And => "AND",
            Connector::Or => "OR",
            Connector::AndNot => "AND NOT",
            Connector::OrNot => "OR NOT",
        }
    }
}

impl fmt::Display for Connector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.keyword())
    }
}

/// One WHERE/HAVING fragment.
///
/// `operator = None` with a NULL value is a raw boolean expression; a value
/// without an operator is normalized to `IN` for sequences and `=` otherwise.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub connector: Connector,
    pub expression: String,
    pub operator: Option<String>,
    pub value: DatabaseValue,
}

impl Predicate {
    pub fn new(
        connector: Connector,
        expression: &str,
        operator: Option<&str>,
        value: DatabaseValue,
    ) -> Self {
        Self {
            connector,
            expression: expression.to_string(),
            operator: normalize_operator(operator, &value),
            value,
        }
    }

    /// Raw boolean expression, rendered verbatim
    pub fn is_raw(&self) -> bool {
        self.operator.is_none() && self.value.is_null()
    }

    /// Same expression, operator and value regardless of connector
    pub fn matches(&self, expression: &str, operator: Option<&str>, value: &DatabaseValue) -> bool {
        self.expression == expression
            && self.operator == normalize_operator(operator, value)
            && &self.value == value
    }
}

fn normalize_operator(operator: Option<&str>, value: &DatabaseValue) -> Option<String> {
    match operator {
        Some(op) => Some(op.trim().to_uppercase()),
        None if value.is_null() => None,
        None if value.is_sequence() => Some("IN".to_string()),
        None => Some("=".to_string()),
    }
}

/// Join types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Outer,
}

impl fmt::Display for JoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinType::Inner => write!(f, "INNER JOIN"),
            JoinType::Left => write!(f, "LEFT JOIN"),
            JoinType::Right => write!(f, "RIGHT JOIN"),
            JoinType::Outer => write!(f, "FULL OUTER JOIN"),
        }
    }
}

/// Join clause
#[derive(Debug, Clone, PartialEq)]
pub struct JoinClause {
    pub join_type: JoinType,
    pub target: String,
    pub local_key: String,
    pub foreign_key: String,
}

/// Primary table with optional alias
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Source {
    pub table: String,
    pub alias: Option<String>,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.alias {
            Some(alias) => write!(f, "{} AS {}", self.table, alias),
            None => write!(f, "{}", self.table),
        }
    }
}

/// SQL text plus the values bound to its named placeholders
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledStatement {
    pub sql: String,
    pub parameters: Parameters,
}

/// Page summary returned by `paginate`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub total: u64,
    pub limit: u64,
    pub offset: u64,
    pub page: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_defaults() {
        let eq = Predicate::new(Connector::And, "status", None, "active".into());
        assert_eq!(eq.operator.as_deref(), Some("="));

        let within = Predicate::new(Connector::And, "id", None, vec![1, 2].into());
        assert_eq!(within.operator.as_deref(), Some("IN"));

        let raw = Predicate::new(Connector::And, "false", None, DatabaseValue::Null);
        assert!(raw.is_raw());

        let null_cmp = Predicate::new(Connector::And, "deleted_at", Some("is"), DatabaseValue::Null);
        assert_eq!(null_cmp.operator.as_deref(), Some("IS"));
        assert!(!null_cmp.is_raw());
    }

    #[test]
    fn test_structural_matching() {
        let predicate = Predicate::new(Connector::Or, "age", Some(">="), 18.into());
        assert!(predicate.matches("age", Some(">="), &18.into()));
        assert!(!predicate.matches("age", Some(">"), &18.into()));
        assert!(!predicate.matches("age", Some(">="), &21.into()));
    }

    #[test]
    fn test_source_display() {
        let source = Source {
            table: "users".into(),
            alias: Some("u".into()),
        };
        assert_eq!(source.to_string(), "users AS u");
    }
}
