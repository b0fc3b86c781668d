//! Query Builder Module - fluent, deferred-execution query specification

pub mod builder;
pub mod execution;
pub mod joins;
pub mod ordering;
pub mod pagination;
pub mod sql_generation;
pub mod types;
pub mod where_clause;

pub use builder::QuerySpecification;
pub use execution::{execute_statement, FetchMode, ResultAdapter, ResultOptions, RowMapper};
pub use sql_generation::AGGREGATE_ALIAS;
pub use types::{CompiledStatement, Connector, JoinClause, JoinType, Pagination, Predicate, Source};
