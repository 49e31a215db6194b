//! Entity services: resolve the layout, build SQL, execute, map rows.

mod events;
pub(crate) mod exec;
pub mod mapper;
mod news;
mod owner;
pub mod slug;
mod startups;
mod users;

pub use events::EventService;
pub use news::{NewsCreated, NewsService};
pub use owner::{Caller, OwnerService};
pub use startups::{StartupListQuery, StartupService, ViewCount};
pub use users::{hash_password, verify_password, Role, UserList, UserService};

use crate::config::AdminConfig;
use crate::deadline::Deadline;
use crate::schema::{Column, SchemaResolver};
use crate::sql::PgBindValue;
use serde::Serialize;
use serde_json::{Map, Value};
use sqlx::PgPool;
use std::sync::Arc;

/// Everything one request needs to reach the database.
#[derive(Clone)]
pub struct Db {
    pub pool: PgPool,
    pub deadline: Deadline,
    pub schema: SchemaResolver,
    pub config: Arc<AdminConfig>,
}

pub type Body = Map<String, Value>;

/// Identity of a freshly inserted row.
#[derive(Debug, Serialize)]
pub struct Created {
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
}

/// First present key among synonyms (explicit `null` counts as present).
pub(crate) fn pick<'a>(body: &'a Body, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| body.get(*k))
}

/// Trimmed, non-empty text for a key; numbers and booleans are stringified.
pub(crate) fn text(body: &Body, keys: &[&str]) -> Option<String> {
    match pick(body, keys)? {
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Whether any of `keys` is present in the body.
pub(crate) fn mentions(body: &Body, keys: &[&str]) -> bool {
    keys.iter().any(|k| body.contains_key(*k))
}

/// Request value converted for one column's storage type.
pub(crate) fn bind_for(col: &Column, v: &Value) -> PgBindValue {
    match v {
        Value::Null => PgBindValue::Null,
        _ if col.is_json() => PgBindValue::Json(v.clone()),
        _ if col.is_array() => PgBindValue::TextArray(mapper::normalize_list(v)),
        Value::Array(_) | Value::Object(_) => PgBindValue::Text(v.to_string()),
        other => PgBindValue::from_json(other),
    }
}

/// List value for a `needs`-style column: JSON array in json columns, array in array
/// columns, comma-separated text otherwise.
pub(crate) fn list_for(col: &Column, v: &Value) -> PgBindValue {
    if v.is_null() {
        return PgBindValue::Null;
    }
    let items = mapper::normalize_list(v);
    if col.is_json() {
        PgBindValue::Json(Value::from(items))
    } else if col.is_array() {
        PgBindValue::TextArray(items)
    } else {
        PgBindValue::Text(items.join(", "))
    }
}
