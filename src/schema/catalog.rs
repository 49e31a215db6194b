//! Column catalog: which physical columns a table actually has.

use crate::deadline::Deadline;
use crate::error::AppError;
use crate::sql::Ident;
use async_trait::async_trait;
use sqlx::PgPool;

/// One physical column as reported by `information_schema.columns`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    /// `udt_name` (e.g. `int4`, `timestamptz`, `_text`, or a user-defined enum name).
    pub udt: String,
}

impl Column {
    pub fn new(name: impl Into<String>, udt: impl Into<String>) -> Self {
        Column {
            name: name.into(),
            udt: udt.into(),
        }
    }

    pub fn is_json(&self) -> bool {
        matches!(self.udt.as_str(), "json" | "jsonb")
    }

    pub fn is_array(&self) -> bool {
        self.udt.starts_with('_')
    }

    pub fn is_integer(&self) -> bool {
        matches!(self.udt.as_str(), "int2" | "int4" | "int8")
    }

    pub fn is_numeric(&self) -> bool {
        self.is_integer() || matches!(self.udt.as_str(), "numeric" | "float4" | "float8")
    }
}

/// Source of column metadata. Postgres in production; tests substitute an in-memory map.
#[async_trait]
pub trait ColumnCatalog: Send + Sync {
    /// Columns of `table` in ordinal order. Empty when the table does not exist.
    async fn columns(&self, table: &Ident, deadline: Deadline) -> Result<Vec<Column>, AppError>;
}

pub struct PgCatalog {
    pool: PgPool,
}

impl PgCatalog {
    pub fn new(pool: PgPool) -> Self {
        PgCatalog { pool }
    }
}

#[async_trait]
impl ColumnCatalog for PgCatalog {
    async fn columns(&self, table: &Ident, deadline: Deadline) -> Result<Vec<Column>, AppError> {
        tracing::debug!(table = %table, "probing column catalog");
        let rows: Vec<(String, String)> = deadline
            .run(
                sqlx::query_as(
                    "SELECT column_name::text, udt_name::text FROM information_schema.columns \
                     WHERE table_schema = ANY(current_schemas(false)) AND table_name = $1 \
                     ORDER BY ordinal_position",
                )
                .bind(table.name())
                .fetch_all(&self.pool),
            )
            .await?;
        Ok(rows.into_iter().map(|(name, udt)| Column { name, udt }).collect())
    }
}
