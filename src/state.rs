//! Shared application state for all routes.

use crate::config::{AdminConfig, SchemaCacheMode};
use crate::deadline::Deadline;
use crate::error::AppError;
use crate::schema::{ColumnCatalog, PgCatalog, SchemaCache, SchemaResolver};
use crate::service::Db;
use sqlx::PgPool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    /// `None` without database credentials: lists degrade to partial, empty answers.
    pub pool: Option<PgPool>,
    pub config: Arc<AdminConfig>,
    /// Process-wide column sets; bypassed when the request-scoped cache mode is set.
    pub schema: Arc<SchemaCache>,
    catalog: Option<Arc<dyn ColumnCatalog>>,
}

impl AppState {
    pub fn new(pool: Option<PgPool>, config: AdminConfig) -> Self {
        let catalog = pool
            .clone()
            .map(|p| Arc::new(PgCatalog::new(p)) as Arc<dyn ColumnCatalog>);
        AppState {
            pool,
            config: Arc::new(config),
            schema: Arc::new(SchemaCache::new()),
            catalog,
        }
    }

    /// Substitute the column catalog (tests, or a catalog that reads another schema).
    pub fn with_catalog(mut self, catalog: Arc<dyn ColumnCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Database handle for one request, bounded by `deadline`.
    pub fn db(&self, deadline: Deadline) -> Result<Db, AppError> {
        let (Some(pool), Some(catalog)) = (&self.pool, &self.catalog) else {
            return Err(AppError::DbNotConfigured);
        };
        let cache = match self.config.schema_cache {
            SchemaCacheMode::Process => self.schema.clone(),
            SchemaCacheMode::Request => Arc::new(SchemaCache::new()),
        };
        Ok(Db {
            pool: pool.clone(),
            deadline,
            schema: SchemaResolver::new(catalog.clone(), cache, deadline),
            config: self.config.clone(),
        })
    }

    pub fn has_db(&self) -> bool {
        self.pool.is_some()
    }
}
