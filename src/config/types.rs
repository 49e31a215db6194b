//! Configuration types: physical table names and candidate column lists per logical field.

use crate::sql::Ident;
use std::time::Duration;

/// Ordered candidate column names for one logical field: the env override first, then
/// hard-coded fallbacks.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Candidates(Vec<Ident>);

impl Candidates {
    pub fn new(names: Vec<Ident>) -> Self {
        let mut out: Vec<Ident> = Vec::with_capacity(names.len());
        for n in names {
            if !out.contains(&n) {
                out.push(n);
            }
        }
        Candidates(out)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Ident> {
        self.0.iter()
    }
}

#[derive(Clone, Debug)]
pub struct StartupTable {
    pub table: Ident,
    pub id: Candidates,
    pub name: Candidates,
    pub slug: Candidates,
    pub sector: Candidates,
    pub stage: Candidates,
    pub location: Candidates,
    pub legal_status: Candidates,
    pub website_url: Candidates,
    pub social_media_url: Candidates,
    pub contact_email: Candidates,
    pub phone: Candidates,
    pub logo: Candidates,
    pub needs: Candidates,
    pub status: Candidates,
    pub join_date: Candidates,
    pub views: Candidates,
    pub short_description: Candidates,
    pub long_description: Candidates,
}

#[derive(Clone, Debug)]
pub struct FounderTable {
    pub table: Ident,
    pub id: Candidates,
    pub startup_fk: Candidates,
    pub name: Candidates,
    pub role: Candidates,
    pub email: Candidates,
}

#[derive(Clone, Debug)]
pub struct EventTable {
    pub table: Ident,
    pub id: Candidates,
    pub title: Candidates,
    pub description: Candidates,
    pub start: Candidates,
    pub end: Candidates,
    pub location: Candidates,
    pub attendees: Candidates,
    pub capacity: Candidates,
    pub image: Candidates,
    /// Legacy schemas carry several type columns; all present ones are written.
    pub event_type: Candidates,
    pub target_audience: Candidates,
    pub dates: Candidates,
}

#[derive(Clone, Debug)]
pub struct NewsTable {
    pub table: Ident,
    pub id: Candidates,
    pub title: Candidates,
    pub content: Candidates,
    pub published_at: Candidates,
    pub image: Candidates,
    pub status: Candidates,
    pub slug: Candidates,
    pub views: Candidates,
}

#[derive(Clone, Debug)]
pub struct UserTable {
    pub table: Ident,
    pub id: Candidates,
    pub name: Candidates,
    pub email: Candidates,
    pub password: Candidates,
    pub role: Candidates,
    pub created_at: Candidates,
    pub updated_at: Candidates,
    /// Link from an account to the startup it manages.
    pub startup_fk: Candidates,
    /// Session token column some deployments keep on the account row.
    pub token: Candidates,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub pool_size: u32,
    pub acquire_timeout: Duration,
}

/// How long discovered column sets are kept.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchemaCacheMode {
    Process,
    Request,
}

impl std::str::FromStr for SchemaCacheMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "process" => Ok(SchemaCacheMode::Process),
            "request" => Ok(SchemaCacheMode::Request),
            _ => Err(()),
        }
    }
}

/// Built once at startup and shared read-only with every request.
#[derive(Clone, Debug)]
pub struct AdminConfig {
    /// `None` when no credentials are configured; list endpoints then answer with
    /// partial, empty results.
    pub database: Option<DatabaseConfig>,
    pub request_timeout: Duration,
    pub max_body_bytes: usize,
    pub bind_addr: String,
    pub schema_cache: SchemaCacheMode,
    pub startups: StartupTable,
    pub founders: FounderTable,
    pub events: EventTable,
    pub news: NewsTable,
    pub users: UserTable,
}
