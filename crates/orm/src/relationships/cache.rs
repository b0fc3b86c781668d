//! Relationship Cache - per-record memoization of related lookups
//!
//! Single lookups store the resolved record; collection relationships
//! store only the factory that rebuilds their query. The cache tracks the
//! owning record's identity and empties itself when that identity changes.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use super::metadata::RelationshipKind;
use crate::backends::DatabaseValue;
use crate::query::QuerySpecification;

/// Builds the query for a collection relationship from the owner's key value
pub type QueryFactory = Arc<dyn Fn(&DatabaseValue) -> QuerySpecification + Send + Sync>;

/// Cache key for relationships
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct RelationshipSignature {
    pub kind: RelationshipKind,
    pub related_table: String,
    pub foreign_key: String,
    pub local_key: String,
    pub pivot_table: Option<String>,
    /// Textual form of the key value; empty for query factories
    pub key_value: String,
}

/// Cached relationship entry
#[derive(Clone)]
enum CacheEntry {
    Resolved(Arc<dyn Any + Send + Sync>),
    Deferred(QueryFactory),
}

/// Per-record relationship memo
#[derive(Clone, Default)]
pub struct RelationshipCache {
    identity: Option<DatabaseValue>,
    entries: HashMap<RelationshipSignature, CacheEntry>,
}

impl RelationshipCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the owner's identity; a different identity drops every entry.
    ///
    /// Returns true when entries were dropped.
    pub fn sync_identity(&mut self, identity: &DatabaseValue) -> bool {
        if self.identity.as_ref() == Some(identity) {
            return false;
        }

        let invalidated = !self.entries.is_empty();
        if invalidated {
            tracing::debug!(
                "Identity changed to {}, dropping {} cached relationships",
                identity.signature(),
                self.entries.len()
            );
            self.entries.clear();
        }
        self.identity = Some(identity.clone());
        invalidated
    }

    /// Identity the entries belong to
    pub fn identity(&self) -> Option<&DatabaseValue> {
        self.identity.as_ref()
    }

    /// Memoized single lookup; the inner `None` is a cached miss
    pub fn resolved<R>(&self, signature: &RelationshipSignature) -> Option<Option<R>>
    where
        R: Clone + Send + Sync + 'static,
    {
        match self.entries.get(signature) {
            Some(CacheEntry::Resolved(value)) => value.downcast_ref::<Option<R>>().cloned(),
            _ => None,
        }
    }

    pub fn store_resolved<R>(&mut self, signature: RelationshipSignature, value: Option<R>)
    where
        R: Send + Sync + 'static,
    {
        self.entries
            .insert(signature, CacheEntry::Resolved(Arc::new(value)));
    }

    /// Memoized query factory
    pub fn factory(&self, signature: &RelationshipSignature) -> Option<QueryFactory> {
        match self.entries.get(signature) {
            Some(CacheEntry::Deferred(factory)) => Some(Arc::clone(factory)),
            _ => None,
        }
    }

    pub fn store_factory(&mut self, signature: RelationshipSignature, factory: QueryFactory) {
        self.entries.insert(signature, CacheEntry::Deferred(factory));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl std::fmt::Debug for RelationshipCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelationshipCache")
            .field("identity", &self.identity)
            .field("entries", &self.entries.len())
            .finish()
    }
}
