//! Query Builder WHERE clause operations

use super::builder::QuerySpecification;
use super::sql_generation::render_predicates;
use super::types::*;
use crate::backends::DatabaseValue;

impl QuerySpecification {
    /// Append a predicate with an explicit connector
    pub fn push_predicate<V: Into<DatabaseValue>>(
        &mut self,
        connector: Connector,
        expression: &str,
        operator: Option<&str>,
        value: V,
    ) -> &mut Self {
        self.predicates
            .push(Predicate::new(connector, expression, operator, value.into()));
        self
    }

    /// Add an AND predicate
    pub fn and_where<V: Into<DatabaseValue>>(
        &mut self,
        expression: &str,
        operator: Option<&str>,
        value: V,
    ) -> &mut Self {
        self.push_predicate(Connector::And, expression, operator, value)
    }

    /// Add an OR predicate
    pub fn or_where<V: Into<DatabaseValue>>(
        &mut self,
        expression: &str,
        operator: Option<&str>,
        value: V,
    ) -> &mut Self {
        self.push_predicate(Connector::Or, expression, operator, value)
    }

    /// Add an AND NOT predicate
    pub fn and_where_not<V: Into<DatabaseValue>>(
        &mut self,
        expression: &str,
        operator: Option<&str>,
        value: V,
    ) -> &mut Self {
        self.push_predicate(Connector::AndNot, expression, operator, value)
    }

    /// Add an OR NOT predicate
    pub fn or_where_not<V: Into<DatabaseValue>>(
        &mut self,
        expression: &str,
        operator: Option<&str>,
        value: V,
    ) -> &mut Self {
        self.push_predicate(Connector::OrNot, expression, operator, value)
    }

    /// `and_where` with the operator inferred from the value
    pub fn and<V: Into<DatabaseValue>>(&mut self, expression: &str, value: V) -> &mut Self {
        self.and_where(expression, None, value)
    }

    /// `or_where` with the operator inferred from the value
    pub fn or<V: Into<DatabaseValue>>(&mut self, expression: &str, value: V) -> &mut Self {
        self.or_where(expression, None, value)
    }

    /// `and_where_not` with the operator inferred from the value
    pub fn not<V: Into<DatabaseValue>>(&mut self, expression: &str, value: V) -> &mut Self {
        self.and_where_not(expression, None, value)
    }

    /// Add WHERE condition with equality
    pub fn where_eq<V: Into<DatabaseValue>>(&mut self, column: &str, value: V) -> &mut Self {
        self.and_where(column, Some("="), value)
    }

    /// Add WHERE condition with IN
    pub fn where_in<V: Into<DatabaseValue>>(&mut self, column: &str, values: Vec<V>) -> &mut Self {
        self.and_where(column, Some("IN"), values)
    }

    /// Add WHERE condition with IS NULL
    pub fn where_null(&mut self, column: &str) -> &mut Self {
        self.and_where(column, Some("IS"), DatabaseValue::Null)
    }

    /// Add WHERE condition with IS NOT NULL
    pub fn where_not_null(&mut self, column: &str) -> &mut Self {
        self.and_where(column, Some("IS NOT"), DatabaseValue::Null)
    }

    /// Add a raw boolean expression (`"false"` forces an empty result)
    pub fn where_raw(&mut self, expression: &str) -> &mut Self {
        self.and_where(expression, None, DatabaseValue::Null)
    }

    /// Add a parenthesized group of predicates built by `build`.
    ///
    /// The group is rendered immediately into a raw predicate; its values are
    /// bound into this specification's parameters. Joins and ordering added
    /// inside the group are carried over to this specification. Selected
    /// columns, grouping and limits set inside it are dropped with a warning.
    pub fn where_nested<F>(&mut self, connector: Connector, build: F) -> &mut Self
    where
        F: FnOnce(&mut QuerySpecification),
    {
        let mut group = QuerySpecification {
            source: self.source.clone(),
            parameters: self.parameters.clone(),
            parameter_counter: self.parameter_counter,
            ..QuerySpecification::default()
        };
        build(&mut group);
        self.absorb_fragments(&mut group);

        if group.predicates.is_empty() {
            return self;
        }

        // A lone plain predicate needs no extra parentheses
        if group.predicates.len() == 1 && !group.predicates[0].connector.is_negated() {
            let mut predicate = group.predicates.remove(0);
            predicate.connector = connector;
            self.parameters = group.parameters;
            self.parameter_counter = group.parameter_counter;
            self.predicates.push(predicate);
            return self;
        }

        let mut parameters = group.parameters;
        let mut counter = group.parameter_counter;
        let rendered = render_predicates(&group.predicates, &mut counter, &mut parameters);

        self.parameters = parameters;
        self.parameter_counter = counter;
        self.predicates.push(Predicate::new(
            connector,
            &format!("({})", rendered),
            None,
            DatabaseValue::Null,
        ));
        self
    }

    fn absorb_fragments(&mut self, group: &mut QuerySpecification) {
        for join in group.joins.drain(..) {
            if !self.joins.contains(&join) {
                self.joins.push(join);
            }
        }
        for (column, descending) in group.ordering.drain(..) {
            self.order_by(&column, descending);
        }

        if !group.select_columns.is_empty()
            || !group.grouping.is_empty()
            || !group.having_predicates.is_empty()
            || group.limit_count.is_some()
            || group.offset_value.is_some()
        {
            tracing::warn!(
                "Nested condition group on '{}' set select, grouping or limit fragments; they are ignored",
                self.source.table
            );
        }
    }

    /// Remove every predicate structurally equal to the triple
    pub fn remove_where<V: Into<DatabaseValue>>(
        &mut self,
        expression: &str,
        operator: Option<&str>,
        value: V,
    ) -> &mut Self {
        let value = value.into();
        self.predicates
            .retain(|predicate| !predicate.matches(expression, operator, &value));
        self
    }

    /// Add an AND predicate unless a structurally equal one exists
    pub fn where_if_not_set<V: Into<DatabaseValue>>(
        &mut self,
        expression: &str,
        operator: Option<&str>,
        value: V,
    ) -> &mut Self {
        let value = value.into();
        if !self.has_where(expression, operator, &value) {
            self.predicates
                .push(Predicate::new(Connector::And, expression, operator, value));
        }
        self
    }

    /// Whether a structurally equal predicate is present
    pub fn has_where(
        &self,
        expression: &str,
        operator: Option<&str>,
        value: &DatabaseValue,
    ) -> bool {
        self.predicates
            .iter()
            .any(|predicate| predicate.matches(expression, operator, value))
    }

    /// Drop every WHERE predicate
    pub fn clear_where(&mut self) -> &mut Self {
        self.predicates.clear();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_where_if_not_set_is_idempotent() {
        let mut spec = QuerySpecification::new("users");
        spec.where_if_not_set("deleted_at", Some("IS"), DatabaseValue::Null);
        spec.where_if_not_set("deleted_at", Some("IS"), DatabaseValue::Null);

        assert_eq!(spec.predicates().len(), 1);
    }

    #[test]
    fn test_remove_where_restores_count() {
        let mut spec = QuerySpecification::new("users");
        spec.where_eq("status", "active");
        let before = spec.predicates().len();

        spec.and_where("age", Some(">"), 18);
        spec.remove_where("age", Some(">"), 18);

        assert_eq!(spec.predicates().len(), before);
    }

    #[test]
    fn test_remove_where_matches_structurally() {
        let mut spec = QuerySpecification::new("users");
        spec.and("status", "active");
        spec.or("status", "active");
        spec.and("status", "pending");

        spec.remove_where("status", None, "active");

        assert_eq!(spec.predicates().len(), 1);
        assert_eq!(spec.predicates()[0].value, DatabaseValue::from("pending"));
    }

    #[test]
    fn test_sugar_connectors() {
        let mut spec = QuerySpecification::new("users");
        spec.and("a", 1).or("b", 2).not("c", 3).or_where_not("d", Some("<"), 4);

        let connectors: Vec<Connector> = spec.predicates().iter().map(|p| p.connector).collect();
        assert_eq!(
            connectors,
            vec![Connector::And, Connector::Or, Connector::AndNot, Connector::OrNot]
        );
        assert_eq!(spec.predicates()[0].operator.as_deref(), Some("="));
    }

    #[test]
    fn test_nested_group_binds_into_parent() {
        let mut spec = QuerySpecification::new("users");
        spec.where_eq("active", true);
        spec.where_nested(Connector::And, |group| {
            group.where_eq("role", "admin").or("role", "owner");
        });

        assert_eq!(spec.predicates().len(), 2);
        let nested = &spec.predicates()[1];
        assert!(nested.is_raw());
        assert_eq!(nested.expression, "((role = :p0) OR (role = :p1))");
        assert_eq!(spec.parameters().len(), 2);

        let compiled = spec.compile();
        assert_eq!(
            compiled.sql,
            "SELECT * FROM users WHERE (active = :p2) AND ((role = :p0) OR (role = :p1))"
        );
        assert_eq!(compiled.parameters.len(), 3);
    }

    #[test]
    fn test_single_predicate_group_is_flattened() {
        let mut spec = QuerySpecification::new("users");
        spec.where_eq("active", true);
        spec.where_nested(Connector::Or, |group| {
            group.where_eq("role", "admin");
        });

        assert_eq!(
            spec.compile().sql,
            "SELECT * FROM users WHERE (active = :p0) OR (role = :p1)"
        );
    }

    #[test]
    fn test_empty_nested_group_is_skipped() {
        let mut spec = QuerySpecification::new("users");
        spec.where_nested(Connector::Or, |_| {});
        assert!(spec.predicates().is_empty());
    }

    #[test]
    fn test_nested_group_keeps_joins_and_ordering() {
        let mut spec = QuerySpecification::new("users");
        spec.inner_join("teams", "teams.id", "users.team_id");
        spec.where_nested(Connector::And, |group| {
            group
                .inner_join("teams", "teams.id", "users.team_id")
                .left_join("profiles", "profiles.user_id", "users.id")
                .order_by("teams.name", false)
                .where_eq("teams.name", "core")
                .or_where("profiles.bio", Some("IS NOT"), DatabaseValue::Null);
        });

        assert_eq!(spec.joins().len(), 2);
        assert_eq!(spec.ordering(), &[("teams.name".to_string(), false)]);
        assert_eq!(
            spec.compile().sql,
            "SELECT * FROM users INNER JOIN teams ON teams.id = users.team_id LEFT JOIN profiles ON profiles.user_id = users.id WHERE ((teams.name = :p0) OR profiles.bio IS NOT NULL) ORDER BY teams.name ASC"
        );
    }

    #[test]
    fn test_nested_group_ignores_limit() {
        let mut spec = QuerySpecification::new("users");
        spec.where_nested(Connector::And, |group| {
            group.where_eq("active", true).offset(10);
        });

        assert_eq!(spec.offset_value(), None);
        assert_eq!(spec.predicates().len(), 1);
    }
}
