//! Builds parameterized SELECT, INSERT, UPDATE, DELETE from discovered column sets.
//!
//! Identifiers reach the SQL text only as [`Ident`]s or as catalog [`Column`]s; every value
//! is a bound parameter whose placeholder is cast to the target column's catalog type
//! (`$n::"timestamptz"`), so string payloads bind to typed columns.

use super::ident::{quote, Ident};
use super::page::SortDir;
use super::params::PgBindValue;
use crate::error::AppError;
use crate::schema::Column;
use serde_json::Value;
use std::fmt;

#[derive(Clone, Debug)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<PgBindValue>,
}

fn push_param(params: &mut Vec<PgBindValue>, v: PgBindValue) -> usize {
    params.push(v);
    params.len()
}

/// Catalog types that row decoding handles directly; everything else is read back as text.
fn decodes_natively(udt: &str) -> bool {
    matches!(
        udt,
        "int2"
            | "int4"
            | "int8"
            | "float4"
            | "float8"
            | "bool"
            | "uuid"
            | "timestamptz"
            | "timestamp"
            | "date"
            | "text"
            | "varchar"
            | "bpchar"
            | "name"
            | "json"
            | "jsonb"
            | "_text"
    )
}

fn read_expr(col: &Column) -> String {
    let q = quote(&col.name);
    if decodes_natively(&col.udt) {
        q
    } else if col.is_array() {
        format!("{}::text[]", q)
    } else {
        format!("{}::text", q)
    }
}

/// `$n` cast to the column's catalog type.
fn placeholder(n: usize, col: &Column) -> String {
    format!("${}::{}", n, quote(&col.udt))
}

/// Primary-key value from a request. Integers compare natively against integer id columns;
/// anything else (UUIDs, legacy text keys) compares against the id's text form.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecordId {
    Int(i64),
    Text(String),
}

impl RecordId {
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(AppError::InvalidId);
        }
        match raw.parse::<i64>() {
            Ok(n) if n.to_string() == raw => Ok(RecordId::Int(n)),
            _ => Ok(RecordId::Text(raw.to_string())),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            RecordId::Int(n) => Value::from(*n),
            RecordId::Text(s) => Value::from(s.as_str()),
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Int(n) => write!(f, "{}", n),
            RecordId::Text(s) => f.write_str(s),
        }
    }
}

fn id_predicate(params: &mut Vec<PgBindValue>, col: &Column, id: &RecordId) -> String {
    match id {
        RecordId::Int(n) if col.is_integer() => {
            let n = push_param(params, PgBindValue::I64(*n));
            format!("{} = {}", quote(&col.name), placeholder(n, col))
        }
        other => {
            let n = push_param(params, PgBindValue::text(other.to_string()));
            format!("{}::text = ${}", quote(&col.name), n)
        }
    }
}

fn where_clause(parts: &[String]) -> String {
    if parts.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", parts.join(" AND "))
    }
}

/// SELECT with aliased fields, equality filters, ordering and paging. Filters bind their
/// parameters as they are added, so [`build_count`](Select::build_count) shares them.
#[derive(Clone)]
pub struct Select {
    table: String,
    fields: Vec<String>,
    filters: Vec<String>,
    params: Vec<PgBindValue>,
    order: Vec<String>,
    page: Option<(u32, u64)>,
}

impl Select {
    pub fn from(table: &Ident) -> Self {
        Select {
            table: table.quoted(),
            fields: Vec::new(),
            filters: Vec::new(),
            params: Vec::new(),
            order: Vec::new(),
            page: None,
        }
    }

    pub fn field(mut self, col: &Column, alias: &str) -> Self {
        self.fields.push(format!("{} AS {}", read_expr(col), quote(alias)));
        self
    }

    /// Absent columns still produce their alias, as `NULL`.
    pub fn field_or_null(self, col: Option<&Column>, alias: &str) -> Self {
        match col {
            Some(col) => self.field(col, alias),
            None => self.null_field(alias),
        }
    }

    pub fn null_field(mut self, alias: &str) -> Self {
        self.fields.push(format!("NULL AS {}", quote(alias)));
        self
    }

    /// Every column in `cols`, aliased `{prefix}_0`, `{prefix}_1`, ... in order.
    pub fn fields_numbered(mut self, cols: &[Column], prefix: &str) -> Self {
        for (i, col) in cols.iter().enumerate() {
            self = self.field(col, &format!("{}_{}", prefix, i));
        }
        self
    }

    pub fn filter_eq(mut self, col: &Column, v: PgBindValue) -> Self {
        let n = push_param(&mut self.params, v);
        self.filters
            .push(format!("{} = {}", quote(&col.name), placeholder(n, col)));
        self
    }

    /// Case-insensitive equality on the column's text form.
    pub fn filter_ieq(mut self, col: &Column, v: &str) -> Self {
        let n = push_param(&mut self.params, PgBindValue::text(v));
        self.filters
            .push(format!("LOWER({}::text) = LOWER(${})", quote(&col.name), n));
        self
    }

    pub fn filter_id(mut self, col: &Column, id: &RecordId) -> Self {
        let pred = id_predicate(&mut self.params, col, id);
        self.filters.push(pred);
        self
    }

    pub fn order_by(mut self, col: &Column, dir: SortDir) -> Self {
        self.order
            .push(format!("{} {} NULLS LAST", quote(&col.name), dir.as_sql()));
        self
    }

    pub fn page(mut self, limit: u32, offset: u64) -> Self {
        self.page = Some((limit, offset));
        self
    }

    pub fn build(&self) -> QueryBuf {
        let fields = if self.fields.is_empty() {
            "1".to_string()
        } else {
            self.fields.join(", ")
        };
        let mut sql = format!(
            "SELECT {} FROM {}{}",
            fields,
            self.table,
            where_clause(&self.filters)
        );
        if !self.order.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&self.order.join(", "));
        }
        if let Some((limit, offset)) = self.page {
            sql.push_str(&format!(" LIMIT {} OFFSET {}", limit, offset));
        }
        QueryBuf {
            sql,
            params: self.params.clone(),
        }
    }

    /// `COUNT(*)` under the same WHERE clause, aliased `total`.
    pub fn build_count(&self) -> QueryBuf {
        QueryBuf {
            sql: format!(
                "SELECT COUNT(*) AS \"total\" FROM {}{}",
                self.table,
                where_clause(&self.filters)
            ),
            params: self.params.clone(),
        }
    }
}

/// INSERT assembled column by column; names and placeholders stay in lock-step.
pub struct Insert {
    table: String,
    names: Vec<String>,
    columns: Vec<String>,
    values: Vec<String>,
    params: Vec<PgBindValue>,
    returning: Vec<String>,
}

impl Insert {
    pub fn into(table: &Ident) -> Self {
        Insert {
            table: table.quoted(),
            names: Vec::new(),
            columns: Vec::new(),
            values: Vec::new(),
            params: Vec::new(),
            returning: Vec::new(),
        }
    }

    fn has(&self, col: &Column) -> bool {
        self.names.iter().any(|n| *n == col.name)
    }

    fn push(&mut self, col: &Column, expr: String) {
        self.names.push(col.name.clone());
        self.columns.push(quote(&col.name));
        self.values.push(expr);
    }

    /// The first value given for a column wins.
    pub fn value(mut self, col: &Column, v: impl Into<PgBindValue>) -> Self {
        if !self.has(col) {
            let n = push_param(&mut self.params, v.into());
            self.push(col, placeholder(n, col));
        }
        self
    }

    pub fn value_opt(self, col: Option<&Column>, v: impl Into<PgBindValue>) -> Self {
        match col {
            Some(col) => self.value(col, v),
            None => self,
        }
    }

    /// Same value into every column of a synonym set.
    pub fn value_all(mut self, cols: &[Column], v: PgBindValue) -> Self {
        for col in cols {
            self = self.value(col, v.clone());
        }
        self
    }

    pub fn now(mut self, col: Option<&Column>) -> Self {
        if let Some(col) = col {
            if !self.has(col) {
                self.push(col, "NOW()".to_string());
            }
        }
        self
    }

    pub fn returning(mut self, col: &Column, alias: &str) -> Self {
        self.returning
            .push(format!("{} AS {}", read_expr(col), quote(alias)));
        self
    }

    pub fn build(&self) -> QueryBuf {
        let mut sql = if self.columns.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES", self.table)
        } else {
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                self.table,
                self.columns.join(", "),
                self.values.join(", ")
            )
        };
        if !self.returning.is_empty() {
            sql.push_str(" RETURNING ");
            sql.push_str(&self.returning.join(", "));
        }
        QueryBuf {
            sql,
            params: self.params.clone(),
        }
    }
}

/// UPDATE by id. Only recognized request fields count towards "something to update";
/// bookkeeping columns set with [`touch`](Update::touch) do not.
pub struct Update {
    table: String,
    names: Vec<String>,
    sets: Vec<String>,
    params: Vec<PgBindValue>,
    recognized: usize,
    returning: Vec<String>,
}

impl Update {
    pub fn table(table: &Ident) -> Self {
        Update {
            table: table.quoted(),
            names: Vec::new(),
            sets: Vec::new(),
            params: Vec::new(),
            recognized: 0,
            returning: Vec::new(),
        }
    }

    fn has(&self, col: &Column) -> bool {
        self.names.iter().any(|n| *n == col.name)
    }

    pub fn set(mut self, col: &Column, v: impl Into<PgBindValue>) -> Self {
        if !self.has(col) {
            let n = push_param(&mut self.params, v.into());
            self.names.push(col.name.clone());
            self.sets
                .push(format!("{} = {}", quote(&col.name), placeholder(n, col)));
            self.recognized += 1;
        }
        self
    }

    pub fn set_opt(self, col: Option<&Column>, v: impl Into<PgBindValue>) -> Self {
        match col {
            Some(col) => self.set(col, v),
            None => self,
        }
    }

    pub fn set_all(mut self, cols: &[Column], v: PgBindValue) -> Self {
        for col in cols {
            self = self.set(col, v.clone());
        }
        self
    }

    /// `col = NOW()`, not counted as a requested change.
    pub fn touch(mut self, col: Option<&Column>) -> Self {
        if let Some(col) = col {
            if !self.has(col) {
                self.names.push(col.name.clone());
                self.sets.push(format!("{} = NOW()", quote(&col.name)));
            }
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.recognized == 0
    }

    pub fn returning(mut self, col: &Column, alias: &str) -> Self {
        self.returning
            .push(format!("{} AS {}", read_expr(col), quote(alias)));
        self
    }

    pub fn build(mut self, id_col: &Column, id: &RecordId) -> Result<QueryBuf, AppError> {
        if self.is_empty() {
            return Err(AppError::NothingToUpdate);
        }
        let pred = id_predicate(&mut self.params, id_col, id);
        let mut sql = format!(
            "UPDATE {} SET {} WHERE {}",
            self.table,
            self.sets.join(", "),
            pred
        );
        if !self.returning.is_empty() {
            sql.push_str(" RETURNING ");
            sql.push_str(&self.returning.join(", "));
        }
        Ok(QueryBuf {
            sql,
            params: self.params,
        })
    }
}

/// DELETE by id, returning the id so a miss is observable.
pub fn delete_by_id(table: &Ident, id_col: &Column, id: &RecordId) -> QueryBuf {
    let mut params = Vec::new();
    let pred = id_predicate(&mut params, id_col, id);
    QueryBuf {
        sql: format!(
            "DELETE FROM {} WHERE {} RETURNING {} AS \"id\"",
            table.quoted(),
            pred,
            read_expr(id_col)
        ),
        params,
    }
}

/// DELETE the rows of `dependents` whose `fk` points at the parent row `id`. The parent
/// key is selected rather than bound, so key types never have to match the request id.
pub fn delete_dependents(
    dependents: &Ident,
    fk: &Column,
    parent: &Ident,
    parent_id: &Column,
    id: &RecordId,
) -> QueryBuf {
    let mut params = Vec::new();
    let pred = id_predicate(&mut params, parent_id, id);
    QueryBuf {
        sql: format!(
            "DELETE FROM {} WHERE {} IN (SELECT {} FROM {} WHERE {})",
            dependents.quoted(),
            quote(&fk.name),
            quote(&parent_id.name),
            parent.quoted(),
            pred
        ),
        params,
    }
}

/// Atomic `counter = COALESCE(counter, 0) + 1`. With a capacity column the row is only
/// touched while below capacity (a NULL capacity means unlimited).
pub fn increment(
    table: &Ident,
    id_col: &Column,
    id: &RecordId,
    counter: &Column,
    capacity: Option<&Column>,
) -> QueryBuf {
    let mut params = Vec::new();
    let c = quote(&counter.name);
    let mut pred = id_predicate(&mut params, id_col, id);
    if let Some(cap) = capacity {
        let cap = quote(&cap.name);
        pred.push_str(&format!(" AND ({} IS NULL OR COALESCE({}, 0) < {})", cap, c, cap));
    }
    QueryBuf {
        sql: format!(
            "UPDATE {} SET {} = COALESCE({}, 0) + 1 WHERE {} RETURNING {} AS \"id\", {} AS \"count\"",
            table.quoted(),
            c,
            c,
            pred,
            read_expr(id_col),
            read_expr(counter)
        ),
        params,
    }
}

/// Move the id sequence past the largest existing id. Yields NULL when the column has no
/// owned sequence.
pub fn reset_sequence(table: &Ident, id_col: &Column) -> QueryBuf {
    QueryBuf {
        sql: format!(
            "SELECT setval(pg_get_serial_sequence($1::text, $2::text), \
             COALESCE((SELECT MAX({}) FROM {}), 0) + 1, false) AS \"value\"",
            quote(&id_col.name),
            table.quoted()
        ),
        params: vec![
            PgBindValue::text(table.quoted()),
            PgBindValue::text(id_col.name.clone()),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ident(s: &str) -> Ident {
        Ident::sanitize(s).unwrap()
    }

    fn col(name: &str, udt: &str) -> Column {
        Column::new(name, udt)
    }

    #[test]
    fn record_id_detects_integers() {
        assert_eq!(RecordId::parse("42").unwrap(), RecordId::Int(42));
        assert_eq!(
            RecordId::parse("007").unwrap(),
            RecordId::Text("007".into())
        );
        assert_eq!(
            RecordId::parse("6f1c0e8e-0000-4000-8000-000000000000").unwrap(),
            RecordId::Text("6f1c0e8e-0000-4000-8000-000000000000".into())
        );
        assert!(matches!(RecordId::parse("  "), Err(AppError::InvalidId)));
    }

    #[test]
    fn select_aliases_casts_and_filters() {
        let id = col("id", "int4");
        let q = Select::from(&ident("events"))
            .field(&id, "id")
            .field(&col("titre", "varchar"), "title")
            .field(&col("prix", "numeric"), "price")
            .field_or_null(None, "target_audience")
            .filter_id(&id, &RecordId::Int(7))
            .build();
        assert_eq!(
            q.sql,
            "SELECT \"id\" AS \"id\", \"titre\" AS \"title\", \"prix\"::text AS \"price\", \
             NULL AS \"target_audience\" FROM \"events\" WHERE \"id\" = $1::\"int4\""
        );
        assert_eq!(q.params, vec![PgBindValue::I64(7)]);
    }

    #[test]
    fn non_integer_ids_compare_as_text() {
        let q = Select::from(&ident("users"))
            .field(&col("id", "uuid"), "id")
            .filter_id(&col("id", "uuid"), &RecordId::Int(3))
            .build();
        assert!(q.sql.ends_with("WHERE \"id\"::text = $1"));
        assert_eq!(q.params, vec![PgBindValue::text("3")]);
    }

    #[test]
    fn list_and_count_share_where_clause() {
        let stage = col("stage", "varchar");
        let select = Select::from(&ident("startups"))
            .field(&col("name", "text"), "name")
            .filter_ieq(&stage, "Seed")
            .order_by(&col("join_date", "timestamptz"), SortDir::Desc)
            .page(50, 100);
        let q = select.build();
        assert_eq!(
            q.sql,
            "SELECT \"name\" AS \"name\" FROM \"startups\" WHERE LOWER(\"stage\"::text) = LOWER($1) \
             ORDER BY \"join_date\" DESC NULLS LAST LIMIT 50 OFFSET 100"
        );
        let c = select.build_count();
        assert_eq!(
            c.sql,
            "SELECT COUNT(*) AS \"total\" FROM \"startups\" WHERE LOWER(\"stage\"::text) = LOWER($1)"
        );
        assert_eq!(c.params, q.params);
    }

    #[test]
    fn insert_keeps_columns_and_placeholders_in_step() {
        let types = vec![col("event_type", "varchar"), col("type", "text")];
        let q = Insert::into(&ident("events"))
            .value(&col("title", "text"), "Demo day")
            .value_opt(None, "ignored")
            .value_all(&types, PgBindValue::text("Workshop"))
            .value(&col("title", "text"), "duplicate")
            .now(Some(&col("created_at", "timestamptz")))
            .returning(&col("id", "int8"), "id")
            .build();
        assert_eq!(
            q.sql,
            "INSERT INTO \"events\" (\"title\", \"event_type\", \"type\", \"created_at\") \
             VALUES ($1::\"text\", $2::\"varchar\", $3::\"text\", NOW()) RETURNING \"id\" AS \"id\""
        );
        assert_eq!(
            q.params,
            vec![
                PgBindValue::text("Demo day"),
                PgBindValue::text("Workshop"),
                PgBindValue::text("Workshop"),
            ]
        );
    }

    #[test]
    fn update_requires_a_recognized_field() {
        let id = col("id", "int4");
        let touched_only = Update::table(&ident("users")).touch(Some(&col("updated_at", "timestamptz")));
        assert!(matches!(
            touched_only.build(&id, &RecordId::Int(1)),
            Err(AppError::NothingToUpdate)
        ));

        let q = Update::table(&ident("users"))
            .set(&col("name", "text"), "Ada")
            .touch(Some(&col("updated_at", "timestamptz")))
            .returning(&id, "id")
            .build(&id, &RecordId::Int(1))
            .unwrap();
        assert_eq!(
            q.sql,
            "UPDATE \"users\" SET \"name\" = $1::\"text\", \"updated_at\" = NOW() \
             WHERE \"id\" = $2::\"int4\" RETURNING \"id\" AS \"id\""
        );
    }

    #[test]
    fn increment_guards_capacity() {
        let q = increment(
            &ident("events"),
            &col("id", "int4"),
            &RecordId::Int(9),
            &col("attendees", "int4"),
            Some(&col("max_attendees", "int4")),
        );
        assert_eq!(
            q.sql,
            "UPDATE \"events\" SET \"attendees\" = COALESCE(\"attendees\", 0) + 1 \
             WHERE \"id\" = $1::\"int4\" AND (\"max_attendees\" IS NULL OR COALESCE(\"attendees\", 0) < \"max_attendees\") \
             RETURNING \"id\" AS \"id\", \"attendees\" AS \"count\""
        );
    }

    #[test]
    fn sequence_reset_targets_quoted_table() {
        let q = reset_sequence(&ident("\"Startup\""), &col("id", "int4"));
        assert!(q.sql.contains("SELECT MAX(\"id\") FROM \"Startup\""));
        assert_eq!(q.params[0], PgBindValue::text("\"Startup\""));
    }

    #[test]
    fn delete_helpers() {
        let q = delete_by_id(&ident("news"), &col("id", "int4"), &RecordId::Text("abc".into()));
        assert_eq!(
            q.sql,
            "DELETE FROM \"news\" WHERE \"id\"::text = $1 RETURNING \"id\" AS \"id\""
        );
        let q = delete_dependents(
            &ident("founders"),
            &col("startup_id", "int8"),
            &ident("startups"),
            &col("id", "int8"),
            &RecordId::Int(7),
        );
        assert_eq!(
            q.sql,
            "DELETE FROM \"founders\" WHERE \"startup_id\" IN \
             (SELECT \"id\" FROM \"startups\" WHERE \"id\" = $1::\"int8\")"
        );
    }
}
