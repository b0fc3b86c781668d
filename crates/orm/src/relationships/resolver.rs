//! Relationship resolution on bound records
//!
//! [`Record`] pairs an entity with its [`RelationshipCache`]. Single
//! lookups (`has_one`, `belongs_to`) run a secondary query once per
//! signature; collection lookups (`has_many`, `belongs_to_many`) return an
//! unexecuted [`QuerySpecification`] the caller can refine further.
//! Related entities with a soft-delete column only yield live rows.

use std::ops::Deref;
use std::sync::Arc;

use super::cache::{QueryFactory, RelationshipCache};
use super::metadata::{PivotDescriptor, RelationshipDescriptor, RelationshipKind};
use crate::backends::{DatabaseConnection, DatabaseValue, Row};
use crate::error::{ModelError, ModelResult};
use crate::model::Entity;
use crate::query::{execute_statement, QuerySpecification};

/// An entity together with its relationship memo
#[derive(Debug, Clone)]
pub struct Record<E: Entity> {
    entity: E,
    relations: RelationshipCache,
}

impl<E: Entity> Deref for Record<E> {
    type Target = E;

    fn deref(&self) -> &Self::Target {
        &self.entity
    }
}

impl<E: Entity> From<E> for Record<E> {
    fn from(entity: E) -> Self {
        Self::new(entity)
    }
}

impl<E: Entity> Record<E> {
    pub fn new(entity: E) -> Self {
        let mut relations = RelationshipCache::new();
        relations.sync_identity(&entity.primary_key_value());
        Self { entity, relations }
    }

    /// Map a row and bind a fresh cache
    pub fn hydrate(row: &Row) -> ModelResult<Self> {
        E::from_row(row).map(Self::new)
    }

    pub fn entity(&self) -> &E {
        &self.entity
    }

    /// Mutable access to the entity.
    ///
    /// Changing the primary key through this reference invalidates the
    /// relationship cache on the next lookup.
    pub fn entity_mut(&mut self) -> &mut E {
        &mut self.entity
    }

    pub fn into_inner(self) -> E {
        self.entity
    }

    pub fn relations(&self) -> &RelationshipCache {
        &self.relations
    }

    /// Assign the primary key and drop relationships cached for the old one
    pub fn set_primary_key(&mut self, value: DatabaseValue) -> ModelResult<()> {
        let column = E::primary_key_column()?;
        self.entity.set_column_value(column, value)?;
        self.relations.sync_identity(&self.entity.primary_key_value());
        Ok(())
    }

    fn sync_identity(&mut self) {
        let identity = self.entity.primary_key_value();
        self.relations.sync_identity(&identity);
    }

    /// The related record whose `foreign_key` references this record's
    /// `local_key`.
    ///
    /// Defaults: `foreign_key` is this entity's foreign key name,
    /// `local_key` its primary key.
    pub async fn has_one<R: Entity + Clone>(
        &mut self,
        connection: &dyn DatabaseConnection,
        foreign_key: Option<&str>,
        local_key: Option<&str>,
    ) -> ModelResult<Option<R>> {
        let foreign_key = foreign_key
            .map(str::to_string)
            .unwrap_or_else(E::foreign_key_name);
        let local_key = match local_key {
            Some(column) => column,
            None => E::primary_key_column()?,
        };
        let descriptor = RelationshipDescriptor::new(
            RelationshipKind::HasOne,
            R::table_name(),
            R::primary_key_column()?,
            &foreign_key,
            local_key,
        )
        .with_soft_delete(R::schema().soft_delete_column);
        self.resolve_single(connection, &descriptor).await
    }

    /// The related record this record's `foreign_key` points at.
    ///
    /// Defaults: `foreign_key` is the related entity's foreign key name,
    /// `local_key` the related primary key.
    pub async fn belongs_to<R: Entity + Clone>(
        &mut self,
        connection: &dyn DatabaseConnection,
        foreign_key: Option<&str>,
        local_key: Option<&str>,
    ) -> ModelResult<Option<R>> {
        let foreign_key = foreign_key
            .map(str::to_string)
            .unwrap_or_else(R::foreign_key_name);
        let related_key = R::primary_key_column()?;
        let descriptor = RelationshipDescriptor::new(
            RelationshipKind::BelongsTo,
            R::table_name(),
            related_key,
            &foreign_key,
            local_key.unwrap_or(related_key),
        )
        .with_soft_delete(R::schema().soft_delete_column);
        self.resolve_single(connection, &descriptor).await
    }

    /// Query over the related records whose `foreign_key` references this
    /// record's `local_key`
    pub fn has_many<R: Entity>(
        &mut self,
        foreign_key: Option<&str>,
        local_key: Option<&str>,
    ) -> ModelResult<QuerySpecification> {
        let foreign_key = foreign_key
            .map(str::to_string)
            .unwrap_or_else(E::foreign_key_name);
        let local_key = match local_key {
            Some(column) => column,
            None => E::primary_key_column()?,
        };
        let descriptor = RelationshipDescriptor::new(
            RelationshipKind::HasMany,
            R::table_name(),
            R::primary_key_column()?,
            &foreign_key,
            local_key,
        )
        .with_soft_delete(R::schema().soft_delete_column);
        Ok(self.resolve_collection(descriptor))
    }

    /// Query over the records linked to this one through `pivot`.
    ///
    /// A record stored on either side of the pivot resolves toward the
    /// other side.
    pub fn belongs_to_many<R: Entity>(
        &mut self,
        pivot: &PivotDescriptor,
    ) -> ModelResult<QuerySpecification> {
        let pivot = pivot.oriented_for(E::table_name());
        if pivot.related_table != R::table_name() {
            return Err(ModelError::Validation(format!(
                "Pivot '{}' does not link '{}' to '{}'",
                pivot.table,
                E::table_name(),
                R::table_name()
            )));
        }

        let descriptor = RelationshipDescriptor::new(
            RelationshipKind::BelongsToMany,
            R::table_name(),
            R::primary_key_column()?,
            &pivot.foreign_pivot_key,
            E::primary_key_column()?,
        )
        .with_pivot(pivot)
        .with_soft_delete(R::schema().soft_delete_column);
        Ok(self.resolve_collection(descriptor))
    }

    async fn resolve_single<R: Entity + Clone>(
        &mut self,
        connection: &dyn DatabaseConnection,
        descriptor: &RelationshipDescriptor,
    ) -> ModelResult<Option<R>> {
        self.sync_identity();

        let key_value = self.entity.column_value(descriptor.owner_key());
        if key_value.is_unset() {
            return Err(ModelError::MissingKey {
                table: E::table_name().to_string(),
                column: descriptor.owner_key().to_string(),
            });
        }

        let signature = descriptor.signature(&key_value);
        if let Some(cached) = self.relations.resolved::<R>(&signature) {
            tracing::debug!(
                "Relationship cache hit: {} -> {}",
                E::table_name(),
                descriptor.related_table
            );
            return Ok(cached);
        }

        let statement = descriptor.query(&key_value).compile();
        let mut cursor = execute_statement(connection, &statement).await?;
        let related = cursor.fetch_one().map(|row| R::from_row(&row)).transpose()?;

        self.relations.store_resolved(signature, related.clone());
        Ok(related)
    }

    fn resolve_collection(&mut self, descriptor: RelationshipDescriptor) -> QuerySpecification {
        self.sync_identity();

        let key_value = self.entity.column_value(descriptor.owner_key());
        let signature = descriptor.signature(&DatabaseValue::Null);

        let factory = match self.relations.factory(&signature) {
            Some(factory) => factory,
            None => {
                let factory: QueryFactory =
                    Arc::new(move |key: &DatabaseValue| descriptor.query(key));
                self.relations.store_factory(signature, Arc::clone(&factory));
                factory
            }
        };
        factory(&key_value)
    }
}
