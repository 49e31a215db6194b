//! Self-service access to the startup an account manages (`/api/me/startup`).

use super::exec;
use super::mapper::{self, StartupDetail};
use super::{Body, Db, StartupService};
use crate::error::AppError;
use crate::schema::{StartupLayout, UserLayout};
use crate::sql::{PgBindValue, RecordId, Select, SortDir};
use serde_json::Value;

/// Fields an owner may edit on their own startup.
const OWNER_EDITABLE: &[&str] = &[
    "name",
    "sector",
    "stage",
    "location",
    "website_url",
    "phone",
    "description",
    "short_description",
    "needs",
];

/// Who is asking, as forwarded by the authentication front end.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Caller {
    pub email: Option<String>,
    pub token: Option<String>,
}

impl Caller {
    pub fn is_anonymous(&self) -> bool {
        self.email.is_none() && self.token.is_none()
    }
}

/// Non-null values of the editable fields; everything else in the body is ignored.
fn editable(body: &Body) -> Body {
    body.iter()
        .filter(|(k, v)| OWNER_EDITABLE.contains(&k.as_str()) && !v.is_null())
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

fn record_id(v: &Value) -> Option<RecordId> {
    match v {
        Value::Number(n) => RecordId::parse(&n.to_string()).ok(),
        Value::String(s) => RecordId::parse(s).ok(),
        _ => None,
    }
}

pub struct OwnerService;

impl OwnerService {
    pub async fn detail(db: &Db, caller: &Caller) -> Result<StartupDetail, AppError> {
        let id = Self::startup_of(db, caller).await?;
        StartupService::detail(db, &id).await
    }

    pub async fn update(db: &Db, caller: &Caller, body: &Body) -> Result<Value, AppError> {
        let changes = editable(body);
        if changes.is_empty() {
            return Err(AppError::NothingToUpdate);
        }
        let id = Self::startup_of(db, caller).await?;
        StartupService::update(db, &id, &changes).await
    }

    async fn startup_of(db: &Db, caller: &Caller) -> Result<RecordId, AppError> {
        if caller.is_anonymous() {
            return Err(AppError::NoCaller);
        }
        let users = match UserLayout::resolve(&db.schema, &db.config.users).await {
            Ok(u) => Some(u),
            Err(AppError::Schema { .. }) => None,
            Err(e) => return Err(e),
        };
        let email = Self::email_of(db, users.as_ref(), caller).await?;
        Self::owned_by(db, users.as_ref(), &email).await
    }

    /// Forwarded email first, then the account holding the token, then a token that is
    /// itself an email address.
    async fn email_of(db: &Db, users: Option<&UserLayout>, caller: &Caller) -> Result<String, AppError> {
        if let Some(email) = &caller.email {
            return Ok(email.clone());
        }
        let Some(token) = &caller.token else {
            return Err(AppError::NoCaller);
        };
        if let Some((u, token_col)) = users.and_then(|u| u.token.as_ref().map(|c| (u, c))) {
            let q = Select::from(u.table())
                .field(&u.email, "email")
                .filter_eq(token_col, PgBindValue::text(token.as_str()))
                .page(1, 0)
                .build();
            let row = exec::fetch_optional(&db.pool, &db.deadline, &q)
                .await
                .map_err(AppError::context("read_failed"))?;
            if let Some(email) = row.and_then(|r| mapper::as_text(mapper::field(&r, "email"))) {
                return Ok(email);
            }
        }
        if token.contains('@') {
            return Ok(token.clone());
        }
        Err(AppError::NoCaller)
    }

    /// The account's startup link when it points at an existing row, otherwise the
    /// startup whose contact email matches (case-insensitively).
    async fn owned_by(db: &Db, users: Option<&UserLayout>, email: &str) -> Result<RecordId, AppError> {
        let l = StartupLayout::resolve(&db.schema, &db.config.startups).await?;
        if let Some((u, link)) = users.and_then(|u| u.startup_fk.as_ref().map(|c| (u, c))) {
            let q = Select::from(u.table())
                .field(link, "startup_id")
                .filter_ieq(&u.email, email)
                .page(1, 0)
                .build();
            let linked = exec::fetch_optional(&db.pool, &db.deadline, &q)
                .await
                .map_err(AppError::context("read_failed"))?
                .and_then(|r| record_id(mapper::field(&r, "startup_id")));
            if let Some(id) = linked {
                let q = Select::from(l.table())
                    .field(&l.id, "id")
                    .filter_id(&l.id, &id)
                    .page(1, 0)
                    .build();
                let found = exec::fetch_optional(&db.pool, &db.deadline, &q)
                    .await
                    .map_err(AppError::context("read_failed"))?;
                if found.is_some() {
                    return Ok(id);
                }
                tracing::debug!(%id, "account links to a missing startup, matching by email");
            }
        }
        let Some(contact) = &l.contact_email else {
            return Err(AppError::NotFound);
        };
        let q = Select::from(l.table())
            .field(&l.id, "id")
            .filter_ieq(contact, email)
            .order_by(&l.id, SortDir::Asc)
            .page(1, 0)
            .build();
        let row = exec::fetch_optional(&db.pool, &db.deadline, &q)
            .await
            .map_err(AppError::context("read_failed"))?
            .ok_or(AppError::NotFound)?;
        record_id(mapper::field(&row, "id")).ok_or(AppError::NotFound)
    }
}
