//! # autumn-orm: Query Builder and Repository Engine
//!
//! A fluent, deferred-execution query builder with named parameter
//! binding, a repository layer that translates loosely typed request
//! contexts (criteria, search, pagination, sorting) into queries, and a
//! relationship resolver with per-record memoization.
//!
//! - `query`: the [`QuerySpecification`] accumulator and its SQL compiler
//! - `repository`: [`Repository`] binding a specification to an entity
//! - `relationships`: [`Record`] with has-one, belongs-to, has-many and
//!   pivot lookups
//! - `backends`: the connection abstraction and the PostgreSQL adapter

pub mod backends;
pub mod config;
pub mod error;
pub mod model;
pub mod query;
pub mod relationships;
pub mod repository;
pub mod testing;

// Re-export core traits and types
pub use backends::{
    Cursor, DatabaseConnection, DatabaseValue, Parameters, PostgresConnection, Row, SqlDialect,
};
pub use config::{PoolConfig, RepositoryConfig};
pub use error::{ErrorKind, ModelError, ModelResult, OrmError, OrmResult};
pub use model::{Entity, EntitySchema, FieldDescriptor, FieldType};
pub use query::{
    CompiledStatement, Connector, FetchMode, JoinType, Pagination, QuerySpecification,
    ResultAdapter, ResultOptions,
};
pub use relationships::{PivotDescriptor, Record, RelationshipCache, RelationshipKind};
pub use repository::{Context, Repository, RepositoryRules, SortColumn, WHERE_ID_KEY};
