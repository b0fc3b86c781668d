//! Database Backend Abstractions
//!
//! The query engine talks to databases through [`DatabaseConnection`];
//! [`PostgresConnection`] is the sqlx-backed implementation.

pub mod core;
pub mod postgres;

// Re-export core traits and types
pub use core::*;
pub use postgres::PostgresConnection;
