//! Query Builder - Core specification state

use super::types::*;
use crate::backends::{DatabaseValue, Parameters};

/// Accumulated fragments of one SELECT query.
///
/// Nothing is rendered until [`QuerySpecification::compile`] is called; every
/// fluent method only records a fragment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuerySpecification {
    pub(crate) source: Source,
    pub(crate) select_columns: Vec<String>,
    pub(crate) distinct: bool,
    pub(crate) joins: Vec<JoinClause>,
    pub(crate) predicates: Vec<Predicate>,
    pub(crate) grouping: Vec<String>,
    pub(crate) having_predicates: Vec<Predicate>,
    pub(crate) ordering: Vec<(String, bool)>,
    pub(crate) limit_count: Option<u64>,
    pub(crate) offset_value: Option<u64>,
    pub(crate) limit_max: Option<u64>,
    pub(crate) parameters: Parameters,
    pub(crate) parameter_counter: usize,
}

impl QuerySpecification {
    /// Create a specification selecting from `table`
    pub fn new(table: &str) -> Self {
        Self {
            source: Source {
                table: table.to_string(),
                alias: None,
            },
            ..Self::default()
        }
    }

    /// Create a specification selecting from `table AS alias`
    pub fn aliased(table: &str, alias: &str) -> Self {
        let mut spec = Self::new(table);
        spec.source.alias = Some(alias.to_string());
        spec
    }

    /// Cap accepted by [`QuerySpecification::limit`]
    pub fn with_limit_max(mut self, limit_max: Option<u64>) -> Self {
        self.limit_max = limit_max;
        self
    }

    pub fn set_limit_max(&mut self, limit_max: Option<u64>) -> &mut Self {
        self.limit_max = limit_max;
        self
    }

    /// Replace the primary table
    pub fn from(&mut self, table: &str, alias: Option<&str>) -> &mut Self {
        self.source = Source {
            table: table.to_string(),
            alias: alias.map(str::to_string),
        };
        self
    }

    /// Replace the selected columns
    pub fn select<I, S>(&mut self, columns: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Append one selected column
    pub fn add_select(&mut self, column: &str) -> &mut Self {
        self.select_columns.push(column.to_string());
        self
    }

    /// Toggle SELECT DISTINCT
    pub fn distinct(&mut self, distinct: bool) -> &mut Self {
        self.distinct = distinct;
        self
    }

    /// Bind a value under a generated name and return that name.
    ///
    /// Raw expressions reference the name as `:name`.
    pub fn bind_parameter<V: Into<DatabaseValue>>(&mut self, value: V) -> String {
        let name = next_parameter_name(&mut self.parameter_counter, &self.parameters);
        self.parameters.insert(name.clone(), value.into());
        name
    }

    /// Bind a value under an explicit name
    pub fn bind_named<V: Into<DatabaseValue>>(&mut self, name: &str, value: V) -> &mut Self {
        self.parameters.insert(name.to_string(), value.into());
        self
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    pub fn table(&self) -> &str {
        &self.source.table
    }

    pub fn alias(&self) -> Option<&str> {
        self.source.alias.as_deref()
    }

    /// Alias if set, table name otherwise
    pub fn qualifier(&self) -> &str {
        self.alias().unwrap_or(&self.source.table)
    }

    pub fn select_columns(&self) -> &[String] {
        &self.select_columns
    }

    pub fn joins(&self) -> &[JoinClause] {
        &self.joins
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub fn having_predicates(&self) -> &[Predicate] {
        &self.having_predicates
    }

    pub fn grouping(&self) -> &[String] {
        &self.grouping
    }

    /// Ordering as `(column, descending)` pairs
    pub fn ordering(&self) -> &[(String, bool)] {
        &self.ordering
    }

    pub fn limit_value(&self) -> Option<u64> {
        self.limit_count
    }

    pub fn offset_value(&self) -> Option<u64> {
        self.offset_value
    }

    pub fn limit_max(&self) -> Option<u64> {
        self.limit_max
    }

    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }
}

/// Next `pN` name not taken in `taken`, advancing `counter` past it
pub(crate) fn next_parameter_name(counter: &mut usize, taken: &Parameters) -> String {
    loop {
        let name = format!("p{}", *counter);
        *counter += 1;
        if !taken.contains_key(&name) {
            return name;
        }
    }
}
