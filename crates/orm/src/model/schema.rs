//! Entity schema descriptors
//!
//! An entity describes its table once, as a constant, instead of having its
//! columns discovered at runtime.

/// Storage type of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Integer,
    Float,
    Text,
    Boolean,
    DateTime,
    Uuid,
    Json,
}

/// One mapped field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// Name on the Rust side
    pub field: &'static str,
    /// Column in the table
    pub column: &'static str,
    pub field_type: FieldType,
    pub nullable: bool,
}

impl FieldDescriptor {
    pub const fn new(field: &'static str, column: &'static str, field_type: FieldType) -> Self {
        Self {
            field,
            column,
            field_type,
            nullable: false,
        }
    }

    pub const fn nullable(self) -> Self {
        Self {
            nullable: true,
            ..self
        }
    }
}

/// Static description of an entity's table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntitySchema {
    pub table: &'static str,
    /// Singular name used to derive foreign key names (`user` → `user_id`)
    pub entity_name: &'static str,
    pub primary_key: &'static [&'static str],
    pub fields: &'static [FieldDescriptor],
    /// Column whose non-NULL value marks a row as deleted
    pub soft_delete_column: Option<&'static str>,
}

impl EntitySchema {
    /// Whether the primary key spans several columns
    pub fn has_composite_key(&self) -> bool {
        self.primary_key.len() > 1
    }

    /// Look up a field by Rust name or column name
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields
            .iter()
            .find(|field| field.field == name || field.column == name)
    }

    /// Column names in declaration order
    pub fn columns(&self) -> Vec<&'static str> {
        self.fields.iter().map(|field| field.column).collect()
    }
}
