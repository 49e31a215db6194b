use super::exec;
use super::mapper::{self, UserView};
use super::{text, Body, Db};
use crate::error::{AppError, UNIQUE_VIOLATION};
use crate::schema::{Column, UserLayout};
use crate::sql::{delete_by_id, Insert, Page, PageRequest, PgBindValue, RecordId, Select, SortDir, Update};
use argon2::{
    password_hash::{rand_core::OsRng, SaltString},
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
};
use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Startup,
    Investor,
    PrivilegedVisitors,
}

impl Role {
    /// `founder` is the legacy name of the startup role.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Some(Role::Admin),
            "startup" | "founder" => Some(Role::Startup),
            "investor" => Some(Role::Investor),
            "privileged_visitors" => Some(Role::PrivilegedVisitors),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Startup => "startup",
            Role::Investor => "investor",
            Role::PrivilegedVisitors => "privileged_visitors",
        }
    }

    /// Value written to the role column. Account rows keep the legacy `founder` name the
    /// sign-in flow maps back to `startup`.
    pub fn stored(self) -> &'static str {
        match self {
            Role::Startup => "founder",
            other => other.as_str(),
        }
    }
}

fn parse_role(raw: &str) -> Result<Role, AppError> {
    Role::parse(raw).ok_or_else(|| AppError::Invalid {
        code: "invalid_role",
        message: format!("unknown role {:?}", raw),
    })
}

fn valid_email(email: &str) -> bool {
    static EMAIL: OnceLock<Option<Regex>> = OnceLock::new();
    EMAIL
        .get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").ok())
        .as_ref()
        .map_or(email.contains('@'), |re| re.is_match(email))
}

/// Argon2 PHC string (algorithm, parameters, salt and hash together).
pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AppError::Internal(format!("password hashing: {}", e)))
}

pub fn verify_password(hash: &str, password: &str) -> bool {
    let hash = match PasswordHash::new(hash) {
        Ok(hash) => hash,
        Err(err) => {
            tracing::error!("failed to parse password hash: {}", err);
            return false;
        }
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &hash)
        .is_ok()
}

fn email_taken(e: AppError, code: &'static str) -> AppError {
    if e.sql_state().as_deref() == Some(UNIQUE_VIOLATION) {
        AppError::Conflict {
            code: "email_exists",
            message: "email already registered".to_string(),
        }
    } else {
        e.during(code)
    }
}

#[derive(Debug, Serialize)]
pub struct UserList {
    pub users: Vec<UserView>,
    pub total: i64,
    pub page: u32,
    pub limit: u32,
    pub partial: bool,
}

impl From<Page<UserView>> for UserList {
    fn from(p: Page<UserView>) -> Self {
        UserList {
            users: p.items,
            total: p.total,
            page: p.page,
            limit: p.limit,
            partial: p.partial,
        }
    }
}

pub struct UserService;

impl UserService {
    fn select(l: &UserLayout) -> Select {
        Select::from(l.table())
            .field(&l.id, "id")
            .field_or_null(l.name.as_ref(), "name")
            .field(&l.email, "email")
            .field_or_null(l.role.as_ref(), "role")
            .field_or_null(l.created_at.as_ref(), "created_at")
            .field_or_null(l.updated_at.as_ref(), "updated_at")
    }

    fn output_columns(l: &UserLayout) -> Vec<(&'static str, &Column)> {
        [
            ("id", Some(&l.id)),
            ("name", l.name.as_ref()),
            ("email", Some(&l.email)),
            ("role", l.role.as_ref()),
            ("created_at", l.created_at.as_ref()),
            ("updated_at", l.updated_at.as_ref()),
        ]
        .into_iter()
        .filter_map(|(alias, col)| col.map(|c| (alias, c)))
        .collect()
    }

    /// By name, then id.
    pub async fn list(db: &Db, page: PageRequest) -> Result<UserList, AppError> {
        let l = UserLayout::resolve(&db.schema, &db.config.users).await?;
        let mut select = Self::select(&l);
        if let Some(name) = &l.name {
            select = select.order_by(name, SortDir::Asc);
        }
        select = select.order_by(&l.id, SortDir::Asc);
        let total = exec::count(&db.pool, &db.deadline, &select.build_count())
            .await
            .map_err(AppError::context("query_failed"))?;
        let rows = exec::fetch_all(
            &db.pool,
            &db.deadline,
            &select.page(page.limit, page.offset()).build(),
        )
        .await
        .map_err(AppError::context("query_failed"))?;
        Ok(Page::new(rows.iter().map(UserView::from_row).collect(), total, page).into())
    }

    /// Name, email and role; blank values are ignored.
    pub async fn update(db: &Db, id: &RecordId, body: &Body) -> Result<UserView, AppError> {
        let name = text(body, &["name", "nom"]);
        let email = text(body, &["email"]);
        let role = text(body, &["role"]).map(|r| parse_role(&r)).transpose()?;
        if name.is_none() && email.is_none() && role.is_none() {
            return Err(AppError::NothingToUpdate);
        }
        if let Some(e) = &email {
            if !valid_email(e) {
                return Err(AppError::Invalid {
                    code: "invalid_email",
                    message: format!("not an email address: {:?}", e),
                });
            }
        }
        let l = UserLayout::resolve(&db.schema, &db.config.users).await?;
        let mut upd = Update::table(l.table()).touch(l.updated_at.as_ref());
        if let Some(n) = name {
            upd = upd.set_opt(l.name.as_ref(), n);
        }
        if let Some(e) = email {
            upd = upd.set(&l.email, e);
        }
        if let Some(r) = role {
            upd = upd.set(l.cols.needed(l.role.as_ref(), "role")?, r.stored());
        }
        for (alias, col) in Self::output_columns(&l) {
            upd = upd.returning(col, alias);
        }
        let q = upd.build(&l.id, id)?;
        let row = exec::fetch_optional(&db.pool, &db.deadline, &q)
            .await
            .map_err(|e| email_taken(e, "update_failed"))?
            .ok_or(AppError::NotFound)?;
        Ok(UserView::from_row(&row))
    }

    pub async fn delete(db: &Db, id: &RecordId) -> Result<(), AppError> {
        let l = UserLayout::resolve(&db.schema, &db.config.users).await?;
        exec::fetch_optional(&db.pool, &db.deadline, &delete_by_id(l.table(), &l.id, id))
            .await
            .map_err(AppError::context("delete_failed"))?
            .ok_or(AppError::NotFound)?;
        tracing::info!(table = %l.table(), %id, "user deleted");
        Ok(())
    }

    /// New account with an argon2 password hash. Email uniqueness is checked
    /// case-insensitively before the insert and enforced again by the constraint.
    pub async fn register(db: &Db, body: &Body) -> Result<UserView, AppError> {
        let email = text(body, &["email"]);
        let password = body
            .get("password")
            .and_then(|p| p.as_str())
            .filter(|p| !p.is_empty())
            .map(str::to_string);
        let (Some(email), Some(password)) = (email.clone(), password.clone()) else {
            let missing = [("email", email.is_none()), ("password", password.is_none())]
                .into_iter()
                .filter_map(|(f, absent)| absent.then_some(f))
                .collect();
            return Err(AppError::missing("missing_fields", missing));
        };
        if !valid_email(&email) {
            return Err(AppError::Invalid {
                code: "invalid_email",
                message: format!("not an email address: {:?}", email),
            });
        }
        let role = match text(body, &["role"]) {
            Some(r) => parse_role(&r)?,
            None => Role::Startup,
        };
        let name = text(body, &["nom", "name"]);

        let l = UserLayout::resolve(&db.schema, &db.config.users).await?;
        let password_col = l.cols.needed(l.password.as_ref(), "password")?;

        let existing = Select::from(l.table())
            .field(&l.id, "id")
            .filter_ieq(&l.email, &email)
            .page(1, 0)
            .build();
        if exec::fetch_optional(&db.pool, &db.deadline, &existing).await?.is_some() {
            return Err(AppError::Conflict {
                code: "email_exists",
                message: "email already registered".to_string(),
            });
        }

        let hashed = tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .map_err(|e| AppError::Internal(format!("password hashing task: {}", e)))??;

        let mut ins = Insert::into(l.table())
            .value(&l.email, email.as_str())
            .value(password_col, hashed)
            .value_opt(l.name.as_ref(), PgBindValue::opt_text(name))
            .value_opt(l.role.as_ref(), role.stored())
            .now(l.created_at.as_ref())
            .now(l.updated_at.as_ref());
        for (alias, col) in Self::output_columns(&l) {
            ins = ins.returning(col, alias);
        }
        let q = ins.build();

        let mut conn = db
            .deadline
            .run(db.pool.acquire())
            .await
            .map_err(AppError::context("create_failed"))?;
        let row = exec::insert_recovering(&mut conn, &db.deadline, l.table(), &l.id, None, |_| q.clone())
            .await
            .map_err(|e| email_taken(e, "create_failed"))?;
        tracing::info!(table = %l.table(), id = %mapper::field(&row, "id"), role = role.as_str(), "user registered");
        Ok(UserView::from_row(&row))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_and_founder_alias() {
        assert_eq!(Role::parse("Founder"), Some(Role::Startup));
        assert_eq!(Role::parse(" privileged_visitors "), Some(Role::PrivilegedVisitors));
        assert_eq!(Role::parse("root"), None);
        assert!(matches!(parse_role("root"), Err(AppError::Invalid { code: "invalid_role", .. })));
        assert_eq!(Role::Investor.as_str(), "investor");
    }

    #[test]
    fn startup_accounts_are_stored_as_founders() {
        assert_eq!(Role::parse("startup").map(Role::stored), Some("founder"));
        assert_eq!(Role::parse("founder").map(Role::stored), Some("founder"));
        assert_eq!(Role::Startup.as_str(), "startup");
        assert_eq!(Role::Admin.stored(), "admin");
        assert_eq!(Role::PrivilegedVisitors.stored(), "privileged_visitors");
    }

    #[test]
    fn email_shape() {
        assert!(valid_email("ada@example.com"));
        assert!(!valid_email("ada@example"));
        assert!(!valid_email("ada example@x.io"));
    }

    #[test]
    fn password_hash_round_trip() {
        let hash = hash_password("hunter2").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password(&hash, "hunter2"));
        assert!(!verify_password(&hash, "hunter3"));
        assert!(!verify_password("not a phc string", "hunter2"));
    }
}
