//! Per-entity column layouts: each logical field resolved against one table's column set.
//!
//! Identity fields (the id and the field an entity is listed by) are mandatory and fail
//! with a schema error naming the table's real columns. Everything else is optional and
//! simply left out of generated SQL when absent.

use super::catalog::Column;
use super::resolver::{SchemaResolver, TableColumns};
use crate::config::{EventTable, FounderTable, NewsTable, StartupTable, UserTable};
use crate::error::AppError;
use crate::sql::Ident;
use std::sync::Arc;

pub struct StartupLayout {
    pub cols: Arc<TableColumns>,
    pub id: Column,
    pub name: Column,
    pub slug: Option<Column>,
    pub sector: Option<Column>,
    pub stage: Option<Column>,
    pub location: Option<Column>,
    pub legal_status: Option<Column>,
    pub website_url: Option<Column>,
    pub social_media_url: Option<Column>,
    /// `contact_email`, falling back to a plain `email` column.
    pub contact_email: Option<Column>,
    pub phone: Option<Column>,
    pub logo: Option<Column>,
    pub needs: Option<Column>,
    pub status: Option<Column>,
    pub join_date: Option<Column>,
    pub views: Option<Column>,
    /// Every present synonym, preferred first.
    pub short_description: Vec<Column>,
    pub long_description: Vec<Column>,
}

impl StartupLayout {
    pub async fn resolve(schema: &SchemaResolver, cfg: &StartupTable) -> Result<Self, AppError> {
        Self::from_columns(schema.table(&cfg.table).await?, cfg)
    }

    pub fn from_columns(cols: Arc<TableColumns>, cfg: &StartupTable) -> Result<Self, AppError> {
        Ok(StartupLayout {
            id: cols.require(&cfg.id, "id")?,
            name: cols.require(&cfg.name, "name")?,
            slug: cols.first_of(&cfg.slug),
            sector: cols.first_of(&cfg.sector),
            stage: cols.first_of(&cfg.stage),
            location: cols.first_of(&cfg.location),
            legal_status: cols.first_of(&cfg.legal_status),
            website_url: cols.first_of(&cfg.website_url),
            social_media_url: cols.first_of(&cfg.social_media_url),
            contact_email: cols.first_of(&cfg.contact_email),
            phone: cols.first_of(&cfg.phone),
            logo: cols.first_of(&cfg.logo),
            needs: cols.first_of(&cfg.needs),
            status: cols.first_of(&cfg.status),
            join_date: cols.first_of(&cfg.join_date),
            views: cols.first_of(&cfg.views),
            short_description: cols.all_of(&cfg.short_description),
            long_description: cols.all_of(&cfg.long_description),
            cols,
        })
    }

    pub fn table(&self) -> &Ident {
        self.cols.table()
    }
}

/// Founder rows hang off a startup by foreign key. The whole table is optional.
pub struct FounderLayout {
    pub cols: Arc<TableColumns>,
    pub id: Option<Column>,
    pub startup_fk: Column,
    pub name: Column,
    pub role: Option<Column>,
    pub email: Option<Column>,
}

impl FounderLayout {
    /// `None` when the table is missing or lacks a foreign key or name column.
    pub async fn resolve(schema: &SchemaResolver, cfg: &FounderTable) -> Result<Option<Self>, AppError> {
        Ok(Self::from_columns(schema.table(&cfg.table).await?, cfg))
    }

    pub fn from_columns(cols: Arc<TableColumns>, cfg: &FounderTable) -> Option<Self> {
        if !cols.exists() {
            return None;
        }
        let (Some(startup_fk), Some(name)) = (cols.first_of(&cfg.startup_fk), cols.first_of(&cfg.name)) else {
            tracing::warn!(table = %cols.table(), columns = ?cols.names(), "founders table unusable");
            return None;
        };
        Some(FounderLayout {
            id: cols.first_of(&cfg.id),
            startup_fk,
            name,
            role: cols.first_of(&cfg.role),
            email: cols.first_of(&cfg.email),
            cols,
        })
    }

    pub fn table(&self) -> &Ident {
        self.cols.table()
    }
}

pub struct EventLayout {
    pub cols: Arc<TableColumns>,
    pub id: Column,
    pub title: Column,
    pub start: Column,
    pub description: Option<Column>,
    pub end: Option<Column>,
    pub location: Option<Column>,
    pub attendees: Option<Column>,
    pub capacity: Option<Column>,
    pub image: Option<Column>,
    /// All present type-like columns; writes keep them equal.
    pub types: Vec<Column>,
    pub target_audience: Option<Column>,
    pub dates: Option<Column>,
}

impl EventLayout {
    pub async fn resolve(schema: &SchemaResolver, cfg: &EventTable) -> Result<Self, AppError> {
        Self::from_columns(schema.table(&cfg.table).await?, cfg)
    }

    pub fn from_columns(cols: Arc<TableColumns>, cfg: &EventTable) -> Result<Self, AppError> {
        Ok(EventLayout {
            id: cols.require(&cfg.id, "id")?,
            title: cols.require(&cfg.title, "title")?,
            start: cols.require(&cfg.start, "start_datetime")?,
            description: cols.first_of(&cfg.description),
            end: cols.first_of(&cfg.end),
            location: cols.first_of(&cfg.location),
            attendees: cols.first_of(&cfg.attendees),
            capacity: cols.first_of(&cfg.capacity).filter(Column::is_numeric),
            image: cols.first_of(&cfg.image),
            types: cols.all_of(&cfg.event_type),
            target_audience: cols.first_of(&cfg.target_audience),
            dates: cols.first_of(&cfg.dates),
            cols,
        })
    }

    pub fn table(&self) -> &Ident {
        self.cols.table()
    }
}

pub struct NewsLayout {
    pub cols: Arc<TableColumns>,
    pub id: Column,
    pub title: Column,
    pub content: Option<Column>,
    pub published_at: Option<Column>,
    pub image: Option<Column>,
    pub status: Option<Column>,
    pub slug: Option<Column>,
    pub views: Option<Column>,
}

impl NewsLayout {
    pub async fn resolve(schema: &SchemaResolver, cfg: &NewsTable) -> Result<Self, AppError> {
        Self::from_columns(schema.table(&cfg.table).await?, cfg)
    }

    pub fn from_columns(cols: Arc<TableColumns>, cfg: &NewsTable) -> Result<Self, AppError> {
        Ok(NewsLayout {
            id: cols.require(&cfg.id, "id")?,
            title: cols.require(&cfg.title, "title")?,
            content: cols.first_of(&cfg.content),
            published_at: cols.first_of(&cfg.published_at),
            image: cols.first_of(&cfg.image),
            status: cols.first_of(&cfg.status),
            slug: cols.first_of(&cfg.slug),
            views: cols.first_of(&cfg.views),
            cols,
        })
    }

    pub fn table(&self) -> &Ident {
        self.cols.table()
    }
}

pub struct UserLayout {
    pub cols: Arc<TableColumns>,
    pub id: Column,
    pub email: Column,
    pub name: Option<Column>,
    pub password: Option<Column>,
    pub role: Option<Column>,
    pub created_at: Option<Column>,
    pub updated_at: Option<Column>,
    pub startup_fk: Option<Column>,
    pub token: Option<Column>,
}

impl UserLayout {
    pub async fn resolve(schema: &SchemaResolver, cfg: &UserTable) -> Result<Self, AppError> {
        Self::from_columns(schema.table(&cfg.table).await?, cfg)
    }

    pub fn from_columns(cols: Arc<TableColumns>, cfg: &UserTable) -> Result<Self, AppError> {
        Ok(UserLayout {
            id: cols.require(&cfg.id, "id")?,
            email: cols.require(&cfg.email, "email")?,
            name: cols.first_of(&cfg.name),
            password: cols.first_of(&cfg.password),
            role: cols.first_of(&cfg.role),
            created_at: cols.first_of(&cfg.created_at),
            updated_at: cols.first_of(&cfg.updated_at),
            startup_fk: cols.first_of(&cfg.startup_fk),
            token: cols.first_of(&cfg.token),
            cols,
        })
    }

    pub fn table(&self) -> &Ident {
        self.cols.table()
    }
}
