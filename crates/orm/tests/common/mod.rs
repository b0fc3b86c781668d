//! Entity fixtures shared by the integration tests
#![allow(dead_code)]

use std::sync::Arc;

use autumn_orm::{
    DatabaseValue, Entity, EntitySchema, FieldDescriptor, FieldType, ModelError, ModelResult,
    RepositoryConfig, Row,
};
use chrono::{DateTime, Utc};
use tracing_subscriber::EnvFilter;

/// Route crate logs to the test output; `RUST_LOG` picks the level
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn integer(column: &str, value: &DatabaseValue) -> ModelResult<i64> {
    value
        .as_i64()
        .ok_or_else(|| ModelError::Validation(format!("{} expects an integer", column)))
}

fn optional_integer(column: &str, value: &DatabaseValue) -> ModelResult<Option<i64>> {
    match value {
        DatabaseValue::Null => Ok(None),
        other => integer(column, other).map(Some),
    }
}

fn text(column: &str, value: DatabaseValue) -> ModelResult<String> {
    match value {
        DatabaseValue::String(s) => Ok(s),
        _ => Err(ModelError::Validation(format!("{} expects text", column))),
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub team_id: Option<i64>,
    pub kind: Option<String>,
    pub deleted_at: Option<DateTime<Utc>>,
}

static USER_SCHEMA: EntitySchema = EntitySchema {
    table: "users",
    entity_name: "user",
    primary_key: &["id"],
    fields: &[
        FieldDescriptor::new("id", "id", FieldType::Integer),
        FieldDescriptor::new("name", "name", FieldType::Text),
        FieldDescriptor::new("email", "email", FieldType::Text),
        FieldDescriptor::new("team_id", "team_id", FieldType::Integer).nullable(),
        FieldDescriptor::new("kind", "kind", FieldType::Text).nullable(),
        FieldDescriptor::new("deleted_at", "deleted_at", FieldType::DateTime).nullable(),
    ],
    soft_delete_column: Some("deleted_at"),
};

impl User {
    pub fn new(id: i64, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase()),
            ..Self::default()
        }
    }
}

impl Entity for User {
    fn schema() -> &'static EntitySchema {
        &USER_SCHEMA
    }

    fn from_row(row: &Row) -> ModelResult<Self> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            email: row.try_get("email")?.unwrap_or_default(),
            team_id: row.try_get("team_id")?,
            kind: row.try_get("kind")?,
            deleted_at: row.try_get("deleted_at")?,
        })
    }

    fn column_value(&self, column: &str) -> DatabaseValue {
        match column {
            "id" => self.id.into(),
            "name" => self.name.as_str().into(),
            "email" => self.email.as_str().into(),
            "team_id" => self.team_id.into(),
            "kind" => self.kind.clone().into(),
            "deleted_at" => self.deleted_at.into(),
            _ => DatabaseValue::Null,
        }
    }

    fn set_column_value(&mut self, column: &str, value: DatabaseValue) -> ModelResult<()> {
        match column {
            "id" => self.id = integer(column, &value)?,
            "name" => self.name = text(column, value)?,
            "email" => self.email = text(column, value)?,
            "team_id" => self.team_id = optional_integer(column, &value)?,
            "kind" => {
                self.kind = match value {
                    DatabaseValue::Null => None,
                    other => Some(text(column, other)?),
                }
            }
            "deleted_at" => {
                self.deleted_at = match value {
                    DatabaseValue::DateTime(at) => Some(at),
                    DatabaseValue::Null => None,
                    _ => return Err(ModelError::Validation("deleted_at expects a timestamp".into())),
                }
            }
            other => return Err(ModelError::ColumnNotFound(other.to_string())),
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Profile {
    pub id: i64,
    pub user_id: i64,
    pub bio: String,
}

static PROFILE_SCHEMA: EntitySchema = EntitySchema {
    table: "profiles",
    entity_name: "profile",
    primary_key: &["id"],
    fields: &[
        FieldDescriptor::new("id", "id", FieldType::Integer),
        FieldDescriptor::new("user_id", "user_id", FieldType::Integer),
        FieldDescriptor::new("bio", "bio", FieldType::Text),
    ],
    soft_delete_column: None,
};

impl Entity for Profile {
    fn schema() -> &'static EntitySchema {
        &PROFILE_SCHEMA
    }

    fn from_row(row: &Row) -> ModelResult<Self> {
        Ok(Self {
            id: row.get("id")?,
            user_id: row.get("user_id")?,
            bio: row.get("bio")?,
        })
    }

    fn column_value(&self, column: &str) -> DatabaseValue {
        match column {
            "id" => self.id.into(),
            "user_id" => self.user_id.into(),
            "bio" => self.bio.as_str().into(),
            _ => DatabaseValue::Null,
        }
    }

    fn set_column_value(&mut self, column: &str, value: DatabaseValue) -> ModelResult<()> {
        match column {
            "id" => self.id = integer(column, &value)?,
            "user_id" => self.user_id = integer(column, &value)?,
            "bio" => self.bio = text(column, value)?,
            other => return Err(ModelError::ColumnNotFound(other.to_string())),
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Team {
    pub id: i64,
    pub name: String,
}

static TEAM_SCHEMA: EntitySchema = EntitySchema {
    table: "teams",
    entity_name: "team",
    primary_key: &["id"],
    fields: &[
        FieldDescriptor::new("id", "id", FieldType::Integer),
        FieldDescriptor::new("name", "name", FieldType::Text),
    ],
    soft_delete_column: None,
};

impl Entity for Team {
    fn schema() -> &'static EntitySchema {
        &TEAM_SCHEMA
    }

    fn from_row(row: &Row) -> ModelResult<Self> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
        })
    }

    fn column_value(&self, column: &str) -> DatabaseValue {
        match column {
            "id" => self.id.into(),
            "name" => self.name.as_str().into(),
            _ => DatabaseValue::Null,
        }
    }

    fn set_column_value(&mut self, column: &str, value: DatabaseValue) -> ModelResult<()> {
        match column {
            "id" => self.id = integer(column, &value)?,
            "name" => self.name = text(column, value)?,
            other => return Err(ModelError::ColumnNotFound(other.to_string())),
        }
        Ok(())
    }
}

/// Tag with no soft delete, linked to users through `user_tag`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tag {
    pub id: i64,
    pub label: String,
}

static TAG_SCHEMA: EntitySchema = EntitySchema {
    table: "tags",
    entity_name: "tag",
    primary_key: &["id"],
    fields: &[
        FieldDescriptor::new("id", "id", FieldType::Integer),
        FieldDescriptor::new("label", "label", FieldType::Text),
    ],
    soft_delete_column: None,
};

impl Entity for Tag {
    fn schema() -> &'static EntitySchema {
        &TAG_SCHEMA
    }

    fn from_row(row: &Row) -> ModelResult<Self> {
        Ok(Self {
            id: row.get("id")?,
            label: row.get("label")?,
        })
    }

    fn column_value(&self, column: &str) -> DatabaseValue {
        match column {
            "id" => self.id.into(),
            "label" => self.label.as_str().into(),
            _ => DatabaseValue::Null,
        }
    }

    fn set_column_value(&mut self, column: &str, value: DatabaseValue) -> ModelResult<()> {
        match column {
            "id" => self.id = integer(column, &value)?,
            "label" => self.label = text(column, value)?,
            other => return Err(ModelError::ColumnNotFound(other.to_string())),
        }
        Ok(())
    }
}

/// Row with a two-column key
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Membership {
    pub user_id: i64,
    pub team_id: i64,
}

static MEMBERSHIP_SCHEMA: EntitySchema = EntitySchema {
    table: "memberships",
    entity_name: "membership",
    primary_key: &["user_id", "team_id"],
    fields: &[
        FieldDescriptor::new("user_id", "user_id", FieldType::Integer),
        FieldDescriptor::new("team_id", "team_id", FieldType::Integer),
    ],
    soft_delete_column: None,
};

impl Entity for Membership {
    fn schema() -> &'static EntitySchema {
        &MEMBERSHIP_SCHEMA
    }

    fn from_row(row: &Row) -> ModelResult<Self> {
        Ok(Self {
            user_id: row.get("user_id")?,
            team_id: row.get("team_id")?,
        })
    }

    fn column_value(&self, column: &str) -> DatabaseValue {
        match column {
            "user_id" => self.user_id.into(),
            "team_id" => self.team_id.into(),
            _ => DatabaseValue::Null,
        }
    }

    fn set_column_value(&mut self, column: &str, value: DatabaseValue) -> ModelResult<()> {
        match column {
            "user_id" => self.user_id = integer(column, &value)?,
            "team_id" => self.team_id = integer(column, &value)?,
            other => return Err(ModelError::ColumnNotFound(other.to_string())),
        }
        Ok(())
    }
}

pub fn config() -> Arc<RepositoryConfig> {
    Arc::new(RepositoryConfig::default())
}

pub fn lenient_config() -> Arc<RepositoryConfig> {
    init_tracing();
    Arc::new(RepositoryConfig {
        ignore_invalid_criteria: true,
        ignore_invalid_sorting: true,
        ..RepositoryConfig::default()
    })
}
