//! Query Builder JOIN operations

use super::builder::QuerySpecification;
use super::types::*;

impl QuerySpecification {
    /// Add a join of any kind
    pub fn join(
        &mut self,
        join_type: JoinType,
        target: &str,
        local_key: &str,
        foreign_key: &str,
    ) -> &mut Self {
        self.joins.push(JoinClause {
            join_type,
            target: target.to_string(),
            local_key: local_key.to_string(),
            foreign_key: foreign_key.to_string(),
        });
        self
    }

    /// Add INNER JOIN clause
    pub fn inner_join(&mut self, target: &str, local_key: &str, foreign_key: &str) -> &mut Self {
        self.join(JoinType::Inner, target, local_key, foreign_key)
    }

    /// Add LEFT JOIN clause
    pub fn left_join(&mut self, target: &str, local_key: &str, foreign_key: &str) -> &mut Self {
        self.join(JoinType::Left, target, local_key, foreign_key)
    }

    /// Add RIGHT JOIN clause
    pub fn right_join(&mut self, target: &str, local_key: &str, foreign_key: &str) -> &mut Self {
        self.join(JoinType::Right, target, local_key, foreign_key)
    }

    /// Whether a join on `target` was already added
    pub fn has_join(&self, target: &str) -> bool {
        self.joins.iter().any(|join| join.target == target)
    }
}
