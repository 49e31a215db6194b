//! Build [`AdminConfig`] from environment variables.

use crate::config::types::*;
use crate::error::ConfigError;
use crate::sql::Ident;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_POOL_SIZE: u32 = 5;
const DEFAULT_ACQUIRE_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

struct Env<F> {
    lookup: F,
}

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, var: &str) -> Option<String> {
        (self.lookup)(var).map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
    }

    /// A table name must pass the sanitizer; a bad value is fatal.
    fn table(&self, var: &str, default: &str) -> Result<Ident, ConfigError> {
        let raw = self.get(var).unwrap_or_else(|| default.to_string());
        Ident::sanitize(&raw).ok_or(ConfigError::InvalidIdentifier {
            var: var.to_string(),
            value: raw,
        })
    }

    /// Env override first, then the fallbacks. A bad override is dropped with a warning.
    fn candidates(&self, var: Option<&str>, fallbacks: &[&str]) -> Candidates {
        let mut names = Vec::with_capacity(fallbacks.len() + 1);
        if let Some(var) = var {
            if let Some(raw) = self.get(var) {
                match Ident::sanitize(&raw) {
                    Some(ident) => names.push(ident),
                    None => tracing::warn!(var, value = %raw, "ignoring invalid column override"),
                }
            }
        }
        names.extend(fallbacks.iter().filter_map(|f| Ident::sanitize(f)));
        Candidates::new(names)
    }

    fn parse<T: FromStr>(&self, var: &str, default: T) -> Result<T, ConfigError> {
        match self.get(var) {
            None => Ok(default),
            Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
                var: var.to_string(),
                value: raw,
            }),
        }
    }
}

impl AdminConfig {
    /// Read the process environment. Callers load `.env` beforehand if they want one.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env { lookup };

        let database = match env.get("DATABASE_URL") {
            Some(url) => Some(DatabaseConfig {
                url,
                pool_size: env.parse("DB_POOL_SIZE", DEFAULT_POOL_SIZE)?,
                acquire_timeout: Duration::from_millis(
                    env.parse("DB_ACQUIRE_TIMEOUT_MS", DEFAULT_ACQUIRE_TIMEOUT_MS)?,
                ),
            }),
            None => None,
        };
        Ok(AdminConfig {
            database,
            request_timeout: Duration::from_millis(
                env.parse("REQUEST_TIMEOUT_MS", DEFAULT_REQUEST_TIMEOUT_MS)?,
            ),
            max_body_bytes: env.parse("MAX_BODY_BYTES", DEFAULT_MAX_BODY_BYTES)?,
            bind_addr: env
                .get("BIND_ADDR")
                .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            schema_cache: env.parse("SCHEMA_CACHE", SchemaCacheMode::Process)?,
            startups: startups(&env)?,
            founders: founders(&env)?,
            events: events(&env)?,
            news: news(&env)?,
            users: users(&env)?,
        })
    }
}

fn startups<F: Fn(&str) -> Option<String>>(env: &Env<F>) -> Result<StartupTable, ConfigError> {
    Ok(StartupTable {
        table: env.table("STARTUPS_TABLE", "startups")?,
        id: env.candidates(Some("STARTUPS_ID_COLUMN"), &["id"]),
        name: env.candidates(Some("STARTUPS_NAME_COLUMN"), &["name", "nom"]),
        slug: env.candidates(Some("STARTUPS_SLUG_COLUMN"), &["slug"]),
        sector: env.candidates(Some("STARTUPS_SECTOR_COLUMN"), &["sector", "secteur"]),
        stage: env.candidates(Some("STARTUPS_STAGE_COLUMN"), &["stage", "maturite"]),
        location: env.candidates(Some("STARTUPS_LOCATION_COLUMN"), &["location", "adresse"]),
        legal_status: env.candidates(
            Some("STARTUPS_LEGAL_STATUS_COLUMN"),
            &["legal_status", "statut_juridique"],
        ),
        website_url: env.candidates(
            Some("STARTUPS_WEBSITE_COLUMN"),
            &["website_url", "site_web", "website"],
        ),
        social_media_url: env.candidates(
            Some("STARTUPS_SOCIAL_COLUMN"),
            &["social_media_url", "reseaux_sociaux"],
        ),
        contact_email: env.candidates(Some("STARTUPS_EMAIL_COLUMN"), &["contact_email", "email"]),
        phone: env.candidates(Some("STARTUPS_PHONE_COLUMN"), &["phone", "contact_tel", "telephone"]),
        logo: env.candidates(Some("STARTUPS_LOGO_COLUMN"), &["logo", "logo_url"]),
        needs: env.candidates(Some("STARTUPS_NEEDS_COLUMN"), &["needs", "besoins"]),
        status: env.candidates(Some("STARTUPS_STATUS_COLUMN"), &["status"]),
        join_date: env.candidates(
            Some("STARTUPS_JOIN_COLUMN"),
            &["join_date", "created_at", "cree_le"],
        ),
        views: env.candidates(Some("STARTUPS_VIEWS_COLUMN"), &["views"]),
        short_description: env.candidates(
            Some("STARTUPS_DESCRIPTION_COLUMN"),
            &["description", "description_courte", "short_description"],
        ),
        long_description: env.candidates(
            Some("STARTUPS_LONG_DESCRIPTION_COLUMN"),
            &["description_longue", "description_long", "long_description"],
        ),
    })
}

fn founders<F: Fn(&str) -> Option<String>>(env: &Env<F>) -> Result<FounderTable, ConfigError> {
    Ok(FounderTable {
        table: env.table("FOUNDERS_TABLE", "founders")?,
        id: env.candidates(None, &["id"]),
        startup_fk: env.candidates(Some("FOUNDERS_STARTUP_FK_COLUMN"), &["startup_id"]),
        name: env.candidates(Some("FOUNDERS_NAME_COLUMN"), &["name", "full_name"]),
        role: env.candidates(Some("FOUNDERS_ROLE_COLUMN"), &["role"]),
        email: env.candidates(Some("FOUNDERS_EMAIL_COLUMN"), &["email"]),
    })
}

fn events<F: Fn(&str) -> Option<String>>(env: &Env<F>) -> Result<EventTable, ConfigError> {
    Ok(EventTable {
        table: env.table("EVENTS_TABLE", "events")?,
        id: env.candidates(Some("EVENTS_ID_COLUMN"), &["id"]),
        title: env.candidates(Some("EVENTS_TITLE_COLUMN"), &["title", "titre"]),
        description: env.candidates(Some("EVENTS_DESC_COLUMN"), &["description"]),
        start: env.candidates(
            Some("EVENTS_START_COLUMN"),
            &["start_datetime", "date_debut", "start_date"],
        ),
        end: env.candidates(Some("EVENTS_END_COLUMN"), &["end_datetime", "date_fin", "end_date"]),
        location: env.candidates(Some("EVENTS_LOCATION_COLUMN"), &["location", "lieu"]),
        attendees: env.candidates(Some("EVENTS_ATTENDEES_COLUMN"), &["attendees", "nb_registered"]),
        capacity: env.candidates(
            Some("EVENTS_CAPACITY_COLUMN"),
            &["max_attendees", "capacity", "max_capacity", "nb_max", "places"],
        ),
        image: env.candidates(Some("EVENTS_IMAGE_COLUMN"), &["image", "photo_url", "image_url"]),
        event_type: env.candidates(Some("EVENTS_TYPE_COLUMN"), &["event_type", "type", "type_event"]),
        target_audience: env.candidates(
            Some("EVENTS_TARGET_COLUMN"),
            &["target_audience", "target_audiance", "target"],
        ),
        dates: env.candidates(Some("EVENTS_DATES_COLUMN"), &["dates"]),
    })
}

fn news<F: Fn(&str) -> Option<String>>(env: &Env<F>) -> Result<NewsTable, ConfigError> {
    Ok(NewsTable {
        table: env.table("NEWS_TABLE", "news")?,
        id: env.candidates(Some("NEWS_ID_COLUMN"), &["id"]),
        title: env.candidates(Some("NEWS_TITLE_COLUMN"), &["title", "titre"]),
        content: env.candidates(Some("NEWS_CONTENT_COLUMN"), &["content", "contenu"]),
        published_at: env.candidates(
            Some("NEWS_CREATED_COLUMN"),
            &["publie_le", "published_at", "created_at"],
        ),
        image: env.candidates(Some("NEWS_IMAGE_COLUMN"), &["image_url", "image"]),
        status: env.candidates(Some("NEWS_STATUS_COLUMN"), &["status"]),
        slug: env.candidates(Some("NEWS_SLUG_COLUMN"), &["slug"]),
        views: env.candidates(Some("NEWS_VIEWS_COLUMN"), &["views"]),
    })
}

fn users<F: Fn(&str) -> Option<String>>(env: &Env<F>) -> Result<UserTable, ConfigError> {
    Ok(UserTable {
        table: env.table("USERS_TABLE", "users")?,
        id: env.candidates(Some("USERS_ID_COLUMN"), &["id"]),
        name: env.candidates(Some("USERS_NAME_COLUMN"), &["name", "nom"]),
        email: env.candidates(Some("USERS_EMAIL_COLUMN"), &["email"]),
        password: env.candidates(Some("USERS_PASSWORD_COLUMN"), &["password", "password_hash"]),
        role: env.candidates(Some("USERS_ROLE_COLUMN"), &["role"]),
        created_at: env.candidates(Some("USERS_CREATED_AT_COLUMN"), &["created_at", "cree_le"]),
        updated_at: env.candidates(Some("USERS_UPDATED_AT_COLUMN"), &["updated_at", "maj_le"]),
        startup_fk: env.candidates(Some("USERS_STARTUP_FK_COLUMN"), &["startup_id"]),
        token: env.candidates(Some("USERS_TOKEN_COLUMN"), &["token"]),
    })
}
