//! Statement execution: deadline, logging, row decoding, insert recovery.

use crate::deadline::Deadline;
use crate::error::{AppError, UNIQUE_VIOLATION};
use crate::schema::Column;
use crate::service::slug::{self, SlugLookup};
use crate::sql::{reset_sequence, Ident, PgBindValue, QueryBuf, Select};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{Connection, PgConnection, PgExecutor, Postgres};

fn bind(q: &QueryBuf) -> Query<'_, Postgres, PgArguments> {
    tracing::debug!(sql = %q.sql, params = q.params.len(), "query");
    let mut query = sqlx::query(&q.sql);
    for p in &q.params {
        query = query.bind(p.clone());
    }
    query
}

pub(crate) async fn fetch_all<'c, E>(ex: E, deadline: &Deadline, q: &QueryBuf) -> Result<Vec<Value>, AppError>
where
    E: PgExecutor<'c>,
{
    let rows = deadline.run(bind(q).fetch_all(ex)).await?;
    Ok(rows.iter().map(row_to_json).collect())
}

pub(crate) async fn fetch_optional<'c, E>(
    ex: E,
    deadline: &Deadline,
    q: &QueryBuf,
) -> Result<Option<Value>, AppError>
where
    E: PgExecutor<'c>,
{
    let row = deadline.run(bind(q).fetch_optional(ex)).await?;
    Ok(row.map(|r| row_to_json(&r)))
}

pub(crate) async fn execute<'c, E>(ex: E, deadline: &Deadline, q: &QueryBuf) -> Result<u64, AppError>
where
    E: PgExecutor<'c>,
{
    let done = deadline.run(bind(q).execute(ex)).await?;
    Ok(done.rows_affected())
}

/// `COUNT(*)` result aliased `total`.
pub(crate) async fn count<'c, E>(ex: E, deadline: &Deadline, q: &QueryBuf) -> Result<i64, AppError>
where
    E: PgExecutor<'c>,
{
    let row = fetch_optional(ex, deadline, q).await?;
    Ok(row
        .as_ref()
        .and_then(|r| r.get("total"))
        .and_then(Value::as_i64)
        .unwrap_or(0))
}

/// Slug lookup against one table column, on the caller's connection.
pub(crate) struct TableSlugLookup<'a> {
    pub conn: &'a mut PgConnection,
    pub deadline: &'a Deadline,
    pub table: &'a Ident,
    pub column: &'a Column,
}

#[async_trait]
impl SlugLookup for TableSlugLookup<'_> {
    async fn taken(&mut self, candidate: &str) -> Result<bool, AppError> {
        let q = Select::from(self.table)
            .field(self.column, "slug")
            .filter_eq(self.column, PgBindValue::text(candidate))
            .page(1, 0)
            .build();
        Ok(fetch_optional(&mut *self.conn, self.deadline, &q).await?.is_some())
    }
}

/// Unique slug for an insert: the column and the base derived from a display name.
pub(crate) struct SlugTarget<'a> {
    pub column: &'a Column,
    pub base: String,
}

/// Insert one row, returning it, with two recoveries on unique violation:
///
/// * slug taken between lookup and insert: look again and retry once with the new slug;
/// * id sequence behind existing rows: move the sequence past `MAX(id)` and retry once.
///
/// Each attempt runs in its own transaction (a savepoint when `conn` is already inside
/// one), so a failed attempt leaves nothing behind and does not poison an outer
/// transaction.
pub(crate) async fn insert_recovering<F>(
    conn: &mut PgConnection,
    deadline: &Deadline,
    table: &Ident,
    id: &Column,
    slug: Option<SlugTarget<'_>>,
    build: F,
) -> Result<Value, AppError>
where
    F: Fn(Option<&str>) -> QueryBuf,
{
    let mut current = match &slug {
        Some(t) => Some(allocate_slug(conn, deadline, table, t).await?),
        None => None,
    };
    let mut slug_retried = false;
    let mut sequence_reset = false;
    loop {
        let q = build(current.as_deref());
        let err = match attempt(conn, deadline, &q).await {
            Ok(row) => return Ok(row),
            Err(e) if e.sql_state().as_deref() == Some(UNIQUE_VIOLATION) => e,
            Err(e) => return Err(e),
        };
        if let (Some(t), false) = (&slug, slug_retried) {
            slug_retried = true;
            let fresh = allocate_slug(conn, deadline, table, t).await?;
            if current.as_deref() != Some(fresh.as_str()) {
                tracing::warn!(table = %table, slug = %fresh, "slug taken concurrently, retrying");
                current = Some(fresh);
                continue;
            }
        }
        if !sequence_reset && id.is_integer() {
            sequence_reset = true;
            tracing::warn!(table = %table, column = %id.name, "unique violation on insert, resetting id sequence");
            fetch_optional(&mut *conn, deadline, &reset_sequence(table, id)).await?;
            continue;
        }
        return Err(err);
    }
}

async fn allocate_slug(
    conn: &mut PgConnection,
    deadline: &Deadline,
    table: &Ident,
    target: &SlugTarget<'_>,
) -> Result<String, AppError> {
    let mut lookup = TableSlugLookup {
        conn,
        deadline,
        table,
        column: target.column,
    };
    slug::allocate(&mut lookup, &target.base).await
}

async fn attempt(conn: &mut PgConnection, deadline: &Deadline, q: &QueryBuf) -> Result<Value, AppError> {
    let mut tx = deadline.run(conn.begin()).await?;
    let row = fetch_optional(&mut *tx, deadline, q).await?;
    deadline.run(tx.commit()).await?;
    row.ok_or(AppError::Db(sqlx::Error::RowNotFound))
}

pub(crate) fn row_to_json(row: &PgRow) -> Value {
    use sqlx::Column;
    use sqlx::Row;
    let mut map = serde_json::Map::new();
    for col in row.columns() {
        let name = col.name();
        map.insert(name.to_string(), cell_to_value(row, name));
    }
    Value::Object(map)
}

fn cell_to_value(row: &PgRow, name: &str) -> Value {
    use sqlx::Row;
    if let Ok(Some(n)) = row.try_get::<Option<i16>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i32>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i64>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<f32>, _>(name) {
        if let Some(n) = serde_json::Number::from_f64(n as f64) {
            return Value::Number(n);
        }
    }
    if let Ok(Some(n)) = row.try_get::<Option<f64>, _>(name) {
        if let Some(n) = serde_json::Number::from_f64(n) {
            return Value::Number(n);
        }
    }
    if let Ok(Some(b)) = row.try_get::<Option<bool>, _>(name) {
        return Value::Bool(b);
    }
    if let Ok(Some(u)) = row.try_get::<Option<uuid::Uuid>, _>(name) {
        return Value::String(u.to_string());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(name) {
        return Value::String(d.to_rfc3339());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDateTime>, _>(name) {
        return Value::String(d.format("%Y-%m-%dT%H:%M:%S%.f").to_string());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDate>, _>(name) {
        return Value::String(d.format("%Y-%m-%d").to_string());
    }
    if let Ok(Some(s)) = row.try_get::<Option<String>, _>(name) {
        return Value::String(s);
    }
    if let Ok(Some(v)) = row.try_get::<Option<Vec<String>>, _>(name) {
        return Value::Array(v.into_iter().map(Value::String).collect());
    }
    if let Ok(Some(j)) = row.try_get::<Option<serde_json::Value>, _>(name) {
        return j;
    }
    Value::Null
}
