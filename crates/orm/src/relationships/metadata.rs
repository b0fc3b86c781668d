//! Relationship Metadata - descriptors for related-record lookups

use serde::{Deserialize, Serialize};

use super::cache::RelationshipSignature;
use crate::backends::DatabaseValue;
use crate::query::QuerySpecification;

/// Defines the type of relationship between entities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationshipKind {
    /// The related table holds a key pointing at this record
    HasOne,
    /// This record holds a key pointing at the related record
    BelongsTo,
    /// Like `HasOne`, many related records
    HasMany,
    /// Related records linked through a pivot table
    BelongsToMany,
}

impl RelationshipKind {
    /// Returns true if this relationship returns a collection
    pub fn is_collection(self) -> bool {
        matches!(self, Self::HasMany | Self::BelongsToMany)
    }

    /// Returns true if this relationship requires a pivot table
    pub fn requires_pivot(self) -> bool {
        matches!(self, Self::BelongsToMany)
    }
}

/// Junction table linking two entity tables
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PivotDescriptor {
    /// The pivot table name
    pub table: String,
    /// Pivot column referencing the owning side
    pub foreign_pivot_key: String,
    /// Pivot column referencing the related side
    pub related_pivot_key: String,
    /// Table of the owning side
    pub owner_table: String,
    /// Table of the related side
    pub related_table: String,
}

impl PivotDescriptor {
    pub fn new(
        table: &str,
        foreign_pivot_key: &str,
        related_pivot_key: &str,
        owner_table: &str,
        related_table: &str,
    ) -> Self {
        Self {
            table: table.to_string(),
            foreign_pivot_key: foreign_pivot_key.to_string(),
            related_pivot_key: related_pivot_key.to_string(),
            owner_table: owner_table.to_string(),
            related_table: related_table.to_string(),
        }
    }

    /// The descriptor as seen from a record stored in `table`.
    ///
    /// A record on the related side resolves toward the owner side, so the
    /// keys and tables swap. Self-referential pivots keep the declared
    /// orientation.
    pub fn oriented_for(&self, table: &str) -> PivotDescriptor {
        if table == self.related_table && table != self.owner_table {
            PivotDescriptor {
                table: self.table.clone(),
                foreign_pivot_key: self.related_pivot_key.clone(),
                related_pivot_key: self.foreign_pivot_key.clone(),
                owner_table: self.related_table.clone(),
                related_table: self.owner_table.clone(),
            }
        } else {
            self.clone()
        }
    }
}

/// Immutable description of one relationship, used to derive the
/// secondary query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipDescriptor {
    pub kind: RelationshipKind,
    pub related_table: String,
    /// Primary key of the related table
    pub related_primary_key: String,
    /// `HasOne`/`HasMany`: column on the related table.
    /// `BelongsTo`: column on this record.
    /// `BelongsToMany`: pivot column referencing this record.
    pub foreign_key: String,
    /// `HasOne`/`HasMany`/`BelongsToMany`: column on this record.
    /// `BelongsTo`: column on the related table.
    pub local_key: String,
    pub pivot: Option<PivotDescriptor>,
    /// Soft-delete column of the related table; trashed rows are skipped
    pub soft_delete_column: Option<String>,
}

impl RelationshipDescriptor {
    pub fn new(
        kind: RelationshipKind,
        related_table: &str,
        related_primary_key: &str,
        foreign_key: &str,
        local_key: &str,
    ) -> Self {
        Self {
            kind,
            related_table: related_table.to_string(),
            related_primary_key: related_primary_key.to_string(),
            foreign_key: foreign_key.to_string(),
            local_key: local_key.to_string(),
            pivot: None,
            soft_delete_column: None,
        }
    }

    /// Set pivot table configuration
    pub fn with_pivot(mut self, pivot: PivotDescriptor) -> Self {
        self.pivot = Some(pivot);
        self
    }

    /// Exclude related rows stamped in `column`
    pub fn with_soft_delete(mut self, column: Option<&str>) -> Self {
        self.soft_delete_column = column.map(str::to_string);
        self
    }

    /// Column on the owning record whose value drives the lookup
    pub fn owner_key(&self) -> &str {
        match self.kind {
            RelationshipKind::BelongsTo => &self.foreign_key,
            _ => &self.local_key,
        }
    }

    /// Cache signature for a lookup with `key_value`
    pub fn signature(&self, key_value: &DatabaseValue) -> RelationshipSignature {
        RelationshipSignature {
            kind: self.kind,
            related_table: self.related_table.clone(),
            foreign_key: self.foreign_key.clone(),
            local_key: self.local_key.clone(),
            pivot_table: self.pivot.as_ref().map(|pivot| pivot.table.clone()),
            key_value: key_value.signature(),
        }
    }

    /// Secondary query selecting the related rows for `key_value`.
    ///
    /// An unset key yields a query that matches nothing.
    pub fn query(&self, key_value: &DatabaseValue) -> QuerySpecification {
        let mut spec = QuerySpecification::new(&self.related_table);

        if let Some(pivot) = &self.pivot {
            spec.select([format!("{}.*", self.related_table)]).inner_join(
                &pivot.table,
                &format!("{}.{}", pivot.table, pivot.related_pivot_key),
                &format!("{}.{}", self.related_table, self.related_primary_key),
            );
        }

        if key_value.is_unset() {
            spec.where_raw("false");
            return spec;
        }

        if let Some(column) = &self.soft_delete_column {
            match &self.pivot {
                Some(_) => spec.where_null(&format!("{}.{}", self.related_table, column)),
                None => spec.where_null(column),
            };
        }

        match (self.kind, &self.pivot) {
            (RelationshipKind::BelongsToMany, Some(pivot)) => {
                spec.where_eq(
                    &format!("{}.{}", pivot.table, pivot.foreign_pivot_key),
                    key_value.clone(),
                );
            }
            (RelationshipKind::BelongsTo, _) => {
                spec.where_eq(&self.local_key, key_value.clone());
            }
            _ => {
                spec.where_eq(&self.foreign_key, key_value.clone());
            }
        }

        if !self.kind.is_collection() {
            spec.limit_count = Some(1);
        }
        spec
    }
}
