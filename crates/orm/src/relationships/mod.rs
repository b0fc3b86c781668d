//! Relationships Module - related-record lookups with per-record caching

pub mod cache;
pub mod metadata;
pub mod resolver;

pub use cache::{QueryFactory, RelationshipCache, RelationshipSignature};
pub use metadata::{PivotDescriptor, RelationshipDescriptor, RelationshipKind};
pub use resolver::Record;
