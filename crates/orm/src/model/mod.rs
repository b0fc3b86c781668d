//! Model System - entity descriptors and the entity trait
//!
//! - `schema`: static column metadata for an entity's table
//! - `core_trait`: the `Entity` trait the repository and resolver work with

pub mod core_trait;
pub mod schema;

pub use core_trait::Entity;
pub use schema::{EntitySchema, FieldDescriptor, FieldType};
