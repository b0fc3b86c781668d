//! Repository - a query specification bound to an entity, a connection and
//! a set of refinement rules.
//!
//! The repository derefs to its [`QuerySpecification`], so every fluent
//! builder method is available on it directly:
//!
//! ```ignore
//! let mut users = Repository::<User>::new(connection, config)
//!     .searchable(&["name", "email"])
//!     .allow_sorting("name", &[("name", false)]);
//! users.prepare_context(&context)?;
//! users.where_eq("team_id", 4);
//! let page = users.fetch_all().await?;
//! ```

pub mod context;
pub mod criteria;
pub mod dml;
pub mod sorting;

use std::fmt;
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use serde_json::Value;

use crate::backends::{DatabaseConnection, DatabaseValue};
use crate::config::RepositoryConfig;
use crate::error::{ModelError, ModelResult};
use crate::model::Entity;
use crate::query::{
    CompiledStatement, Pagination, QuerySpecification, ResultAdapter, ResultOptions, RowMapper,
};
use crate::relationships::Record;

pub use context::{Context, WHERE_ID_KEY};
pub use sorting::SortColumn;

/// Callback applying a named rule to a specification
pub type Scope = Arc<dyn Fn(&mut QuerySpecification, &Value) -> ModelResult<()> + Send + Sync>;

/// Per-repository declarations consulted by the context translator
#[derive(Clone, Default)]
pub struct RepositoryRules {
    pub(crate) searchable_columns: Vec<String>,
    pub(crate) allowed_sorting_fields: Vec<(String, Vec<SortColumn>)>,
    pub(crate) default_sorting: Vec<SortColumn>,
    pub(crate) scopes: Vec<(String, Scope)>,
    pub(crate) refinements: Vec<(String, Scope)>,
    pub(crate) default_criteria: Vec<Value>,
    pub(crate) discriminator: Option<(String, DatabaseValue)>,
}

impl RepositoryRules {
    pub(crate) fn scope(&self, name: &str) -> Option<&Scope> {
        self.scopes
            .iter()
            .find(|(scope, _)| scope == name)
            .map(|(_, rule)| rule)
    }

    pub(crate) fn sorting_field(&self, field: &str) -> Option<&[SortColumn]> {
        self.allowed_sorting_fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, columns)| columns.as_slice())
    }
}

/// Query engine for one entity type
pub struct Repository<E: Entity> {
    connection: Arc<dyn DatabaseConnection>,
    config: Arc<RepositoryConfig>,
    rules: Arc<RepositoryRules>,
    spec: QuerySpecification,
    result_options: ResultOptions,
    /// Registered default criteria are already part of `spec`
    defaults_applied: bool,
    _entity: PhantomData<E>,
}

impl<E: Entity> Clone for Repository<E> {
    fn clone(&self) -> Self {
        Self {
            connection: Arc::clone(&self.connection),
            config: Arc::clone(&self.config),
            rules: Arc::clone(&self.rules),
            spec: self.spec.clone(),
            result_options: self.result_options.clone(),
            defaults_applied: self.defaults_applied,
            _entity: PhantomData,
        }
    }
}

impl<E: Entity> fmt::Debug for Repository<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Repository")
            .field("entity", &E::table_name())
            .field("spec", &self.spec)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<E: Entity> Deref for Repository<E> {
    type Target = QuerySpecification;

    fn deref(&self) -> &Self::Target {
        &self.spec
    }
}

impl<E: Entity> DerefMut for Repository<E> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.spec
    }
}

impl<E: Entity> Repository<E> {
    /// Create a repository selecting from the entity's table
    pub fn new(connection: Arc<dyn DatabaseConnection>, config: Arc<RepositoryConfig>) -> Self {
        let spec = QuerySpecification::new(E::table_name()).with_limit_max(config.limit_max);
        Self {
            connection,
            config,
            rules: Arc::new(RepositoryRules::default()),
            spec,
            result_options: ResultOptions::default(),
            defaults_applied: false,
            _entity: PhantomData,
        }
    }

    /// Select from the entity's table under `alias`
    pub fn aliased(mut self, alias: &str) -> Self {
        let table = self.spec.table().to_string();
        self.spec.from(&table, Some(alias));
        self
    }

    /// Replace the specification, e.g. with one derived from a relationship
    pub fn with_specification(mut self, spec: QuerySpecification) -> Self {
        self.spec = spec.with_limit_max(self.config.limit_max);
        self.defaults_applied = false;
        self
    }

    /// Columns searched by the `search` context key
    pub fn searchable(mut self, columns: &[&str]) -> Self {
        Arc::make_mut(&mut self.rules).searchable_columns =
            columns.iter().map(|c| c.to_string()).collect();
        self
    }

    /// Allow sorting by the public `field`, mapped to real columns with fixed directions
    pub fn allow_sorting(mut self, field: &str, columns: &[(&str, bool)]) -> Self {
        let columns = columns
            .iter()
            .map(|(column, descending)| SortColumn::new(column, *descending))
            .collect();
        let rules = Arc::make_mut(&mut self.rules);
        rules.allowed_sorting_fields.retain(|(name, _)| name != field);
        rules.allowed_sorting_fields.push((field.to_string(), columns));
        self
    }

    /// Ordering applied when the context does not request one
    pub fn default_sorting(mut self, columns: &[(&str, bool)]) -> Self {
        Arc::make_mut(&mut self.rules).default_sorting = columns
            .iter()
            .map(|(column, descending)| SortColumn::new(column, *descending))
            .collect();
        self
    }

    /// Register a scope, reachable from a context key or a criteria string
    pub fn scope<F>(mut self, name: &str, scope: F) -> Self
    where
        F: Fn(&mut QuerySpecification, &Value) -> ModelResult<()> + Send + Sync + 'static,
    {
        Arc::make_mut(&mut self.rules)
            .scopes
            .push((name.to_string(), Arc::new(scope)));
        self
    }

    /// Register a refinement applied when the context carries `name`
    pub fn refinement<F>(mut self, name: &str, refinement: F) -> Self
    where
        F: Fn(&mut QuerySpecification, &Value) -> ModelResult<()> + Send + Sync + 'static,
    {
        Arc::make_mut(&mut self.rules)
            .refinements
            .push((name.to_string(), Arc::new(refinement)));
        self
    }

    /// Criteria applied before any context key, once per query
    pub fn default_criteria(mut self, criteria: Value) -> Self {
        Arc::make_mut(&mut self.rules).default_criteria.push(criteria);
        self
    }

    /// Restrict the repository to rows whose `column` equals `value`.
    ///
    /// Inserts fill the column with `value` when the record leaves it unset.
    pub fn with_discriminator<V: Into<DatabaseValue>>(mut self, column: &str, value: V) -> Self {
        Arc::make_mut(&mut self.rules).discriminator = Some((column.to_string(), value.into()));
        self
    }

    /// Options used when wrapping result cursors
    pub fn with_result_options(mut self, options: ResultOptions) -> Self {
        self.result_options = options;
        self
    }

    /// Same rules and connection, empty specification
    pub fn new_query(&self) -> Self {
        let mut fresh = self.clone();
        let table = self.spec.table().to_string();
        let alias = self.spec.alias().map(str::to_string);
        fresh.spec = QuerySpecification::new(&table).with_limit_max(self.config.limit_max);
        fresh.spec.from(&table, alias.as_deref());
        fresh.defaults_applied = false;
        fresh
    }

    pub fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    pub fn connection(&self) -> &dyn DatabaseConnection {
        self.connection.as_ref()
    }

    pub fn specification(&self) -> &QuerySpecification {
        &self.spec
    }

    pub fn into_specification(self) -> QuerySpecification {
        self.spec
    }

    /// Prefix a bare column with the primary alias
    pub fn qualify(&self, column: &str) -> String {
        qualify_column(self.spec.alias(), column)
    }

    /// Compile the current specification
    pub fn compile(&self) -> CompiledStatement {
        self.spec.compile()
    }

    fn mapper() -> RowMapper<E> {
        Arc::new(E::from_row)
    }

    fn effective_options(&self) -> ResultOptions {
        let mut options = self.result_options.clone();
        if options.alias.is_none() {
            options.alias = self.spec.alias().map(str::to_string);
        }
        options
    }

    /// Execute and wrap the cursor in a typed adapter
    pub async fn execute(&self) -> ModelResult<ResultAdapter<E>> {
        let cursor = self.spec.execute(self.connection.as_ref()).await?;
        ResultAdapter::open(cursor, Self::mapper(), self.effective_options())
    }

    /// Number of matching rows; the specification is left untouched
    pub async fn count(&self) -> ModelResult<u64> {
        self.spec.count(self.connection.as_ref()).await
    }

    /// Whether at least one row matches
    pub async fn exists(&self) -> ModelResult<bool> {
        self.spec.exists(self.connection.as_ref()).await
    }

    /// Value of an aggregate expression over the matching rows
    pub async fn aggregate(&self, expression: &str) -> ModelResult<DatabaseValue> {
        self.spec.aggregate(self.connection.as_ref(), expression).await
    }

    /// Page summary; `None` when no limit is set
    pub async fn paginate(&self) -> ModelResult<Option<Pagination>> {
        self.spec.paginate(self.connection.as_ref()).await
    }
}

impl<E: Entity + Clone> Repository<E> {
    /// Execute and map every row
    pub async fn fetch_all(&self) -> ModelResult<Vec<E>> {
        self.execute().await?.fetch_all()
    }

    /// Execute and wrap every row in a [`Record`] with its own relationship cache
    pub async fn records(&self) -> ModelResult<Vec<Record<E>>> {
        Ok(self.fetch_all().await?.into_iter().map(Record::new).collect())
    }

    /// First matching row
    pub async fn first(&self) -> ModelResult<Option<E>> {
        let mut single = self.spec.clone();
        single.limit_count = Some(1);
        let cursor = single.execute(self.connection.as_ref()).await?;
        ResultAdapter::open(cursor, Self::mapper(), self.effective_options())?.fetch_one()
    }

    /// Row with the given primary key, within the current specification
    pub async fn find<V: Into<DatabaseValue>>(&self, id: V) -> ModelResult<Option<E>> {
        let column = self.qualify(E::primary_key_column()?);
        let mut lookup = self.clone();
        lookup.spec.where_eq(&column, id);
        lookup.first().await
    }

    /// Like `find`, failing with `NotFound` when nothing matches
    pub async fn find_or_fail<V: Into<DatabaseValue>>(&self, id: V) -> ModelResult<E> {
        self.find(id)
            .await?
            .ok_or_else(|| ModelError::NotFound(E::table_name().to_string()))
    }
}

/// Prefix `column` with `alias` unless it is already qualified or an expression
pub(crate) fn qualify_column(alias: Option<&str>, column: &str) -> String {
    match alias {
        Some(alias)
            if !column.contains('.')
                && column.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') =>
        {
            format!("{}.{}", alias, column)
        }
        _ => column.to_string(),
    }
}
