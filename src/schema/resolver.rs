//! Maps logical fields to the physical columns present in the live schema.

use super::catalog::{Column, ColumnCatalog};
use crate::config::Candidates;
use crate::deadline::Deadline;
use crate::error::AppError;
use crate::sql::Ident;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// The discovered column set of one table.
#[derive(Clone, Debug)]
pub struct TableColumns {
    table: Ident,
    columns: Vec<Column>,
}

impl TableColumns {
    pub fn new(table: Ident, columns: Vec<Column>) -> Self {
        let mut seen = Vec::with_capacity(columns.len());
        for c in columns {
            if !seen.iter().any(|s: &Column| s.name == c.name) {
                seen.push(c);
            }
        }
        TableColumns {
            table,
            columns: seen,
        }
    }

    pub fn table(&self) -> &Ident {
        &self.table
    }

    /// A table with no columns in the catalog does not exist.
    pub fn exists(&self) -> bool {
        !self.columns.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// First candidate that exists, in candidate order.
    pub fn first_of(&self, candidates: &Candidates) -> Option<Column> {
        candidates.iter().find_map(|c| self.get(c.name()).cloned())
    }

    /// Every candidate that exists. Writers keep all of them in sync.
    pub fn all_of(&self, candidates: &Candidates) -> Vec<Column> {
        candidates
            .iter()
            .filter_map(|c| self.get(c.name()).cloned())
            .collect()
    }

    /// Like [`first_of`](Self::first_of) but a missing column is a schema error that lists
    /// the table's actual columns.
    pub fn require(&self, candidates: &Candidates, field: &'static str) -> Result<Column, AppError> {
        self.ensure_exists()?;
        self.first_of(candidates).ok_or_else(|| self.missing(field))
    }

    /// An optional column that a particular write cannot do without.
    pub fn needed<'a>(&self, col: Option<&'a Column>, field: &'static str) -> Result<&'a Column, AppError> {
        col.ok_or_else(|| self.missing(field))
    }

    pub fn ensure_exists(&self) -> Result<(), AppError> {
        if self.exists() {
            Ok(())
        } else {
            Err(self.missing("table"))
        }
    }

    pub fn names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    fn missing(&self, field: &'static str) -> AppError {
        AppError::Schema {
            table: self.table.name().to_string(),
            field,
            columns: self.names(),
        }
    }
}

/// Column sets keyed by table. Lives for the process unless the request-scoped mode is
/// configured; schemas only change on deploy, and `invalidate`/`clear` cover the rest.
#[derive(Default)]
pub struct SchemaCache {
    tables: RwLock<HashMap<String, Arc<TableColumns>>>,
}

impl SchemaCache {
    pub fn new() -> Self {
        SchemaCache::default()
    }

    pub fn get(&self, table: &Ident) -> Option<Arc<TableColumns>> {
        self.tables
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(table.name())
            .cloned()
    }

    pub fn insert(&self, cols: TableColumns) -> Arc<TableColumns> {
        let cols = Arc::new(cols);
        self.tables
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(cols.table().name().to_string(), cols.clone());
        cols
    }

    pub fn invalidate(&self, table: &Ident) -> bool {
        self.tables
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(table.name())
            .is_some()
    }

    pub fn clear(&self) -> usize {
        let mut tables = self.tables.write().unwrap_or_else(|e| e.into_inner());
        let n = tables.len();
        tables.clear();
        n
    }

    pub fn len(&self) -> usize {
        self.tables.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Clone)]
pub struct SchemaResolver {
    catalog: Arc<dyn ColumnCatalog>,
    cache: Arc<SchemaCache>,
    deadline: Deadline,
}

impl SchemaResolver {
    pub fn new(catalog: Arc<dyn ColumnCatalog>, cache: Arc<SchemaCache>, deadline: Deadline) -> Self {
        SchemaResolver {
            catalog,
            cache,
            deadline,
        }
    }

    pub fn cache(&self) -> &SchemaCache {
        &self.cache
    }

    /// Column set of `table`, probing the catalog on a cache miss.
    pub async fn table(&self, table: &Ident) -> Result<Arc<TableColumns>, AppError> {
        if let Some(hit) = self.cache.get(table) {
            return Ok(hit);
        }
        let columns = self.catalog.columns(table, self.deadline).await?;
        if columns.is_empty() {
            tracing::warn!(table = %table, "table not found in catalog");
        }
        Ok(self.cache.insert(TableColumns::new(table.clone(), columns)))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// In-memory catalog that counts lookups.
    #[derive(Default)]
    pub(crate) struct MemoryCatalog {
        pub tables: HashMap<String, Vec<Column>>,
        pub lookups: AtomicUsize,
    }

    impl MemoryCatalog {
        pub fn with(mut self, table: &str, cols: &[(&str, &str)]) -> Self {
            self.tables.insert(
                table.to_string(),
                cols.iter().map(|(n, t)| Column::new(*n, *t)).collect(),
            );
            self
        }
    }

    #[async_trait]
    impl ColumnCatalog for MemoryCatalog {
        async fn columns(&self, table: &Ident, _deadline: Deadline) -> Result<Vec<Column>, AppError> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            Ok(self.tables.get(table.name()).cloned().unwrap_or_default())
        }
    }

    fn ident(s: &str) -> Ident {
        Ident::sanitize(s).unwrap()
    }

    fn candidates(names: &[&str]) -> Candidates {
        Candidates::new(names.iter().map(|n| ident(n)).collect())
    }

    fn events() -> TableColumns {
        TableColumns::new(
            ident("events"),
            vec![
                Column::new("id", "int4"),
                Column::new("titre", "varchar"),
                Column::new("type", "varchar"),
                Column::new("event_type", "varchar"),
            ],
        )
    }

    #[test]
    fn first_existing_candidate_wins() {
        let t = events();
        assert_eq!(t.first_of(&candidates(&["title", "titre"])).unwrap().name, "titre");
        assert!(t.first_of(&candidates(&["capacity", "max_attendees"])).is_none());
    }

    #[test]
    fn all_of_returns_every_present_synonym() {
        let t = events();
        let names: Vec<_> = t
            .all_of(&candidates(&["event_type", "type", "type_event"]))
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, ["event_type", "type"]);
    }

    #[test]
    fn required_field_missing_lists_actual_columns() {
        let err = events().require(&candidates(&["description"]), "description").unwrap_err();
        match err {
            AppError::Schema { table, field, columns } => {
                assert_eq!(table, "events");
                assert_eq!(field, "description");
                assert_eq!(columns, ["id", "titre", "type", "event_type"]);
            }
            other => panic!("unexpected {other:?}"),
        }
        let missing = TableColumns::new(ident("ghost"), vec![]);
        assert!(matches!(
            missing.require(&candidates(&["id"]), "id"),
            Err(AppError::Schema { field: "table", .. })
        ));
    }

    #[tokio::test]
    async fn resolver_caches_until_invalidated() {
        let catalog = Arc::new(MemoryCatalog::default().with("events", &[("id", "int4")]));
        let cache = Arc::new(SchemaCache::new());
        let resolver = SchemaResolver::new(
            catalog.clone(),
            cache.clone(),
            Deadline::after(Duration::from_secs(5)),
        );
        let events = ident("events");
        assert!(resolver.table(&events).await.unwrap().exists());
        assert!(resolver.table(&events).await.unwrap().exists());
        assert_eq!(catalog.lookups.load(Ordering::SeqCst), 1);

        assert!(cache.invalidate(&events));
        resolver.table(&events).await.unwrap();
        assert_eq!(catalog.lookups.load(Ordering::SeqCst), 2);

        assert!(!resolver.table(&ident("ghost")).await.unwrap().exists());
        assert_eq!(cache.clear(), 2);
        assert!(cache.is_empty());
    }
}
