//! Paging, sort direction and sort-column whitelists for list endpoints.

use crate::schema::Column;
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SortDir {
    Asc,
    #[default]
    Desc,
}

impl SortDir {
    /// `asc` (any case) is ascending; everything else falls back to descending.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some(s) if s.trim().eq_ignore_ascii_case("asc") => SortDir::Asc,
            _ => SortDir::Desc,
        }
    }

    pub fn as_sql(self) -> &'static str {
        match self {
            SortDir::Asc => "ASC",
            SortDir::Desc => "DESC",
        }
    }
}

/// Default and ceiling for `limit` on one endpoint.
#[derive(Clone, Copy, Debug)]
pub struct PageBounds {
    pub default_limit: u32,
    pub max_limit: u32,
}

pub const STARTUP_PAGES: PageBounds = PageBounds {
    default_limit: 50,
    max_limit: 200,
};
pub const EVENT_PAGES: PageBounds = PageBounds {
    default_limit: 200,
    max_limit: 500,
};
pub const NEWS_PAGES: PageBounds = PageBounds {
    default_limit: 50,
    max_limit: 200,
};
pub const USER_PAGES: PageBounds = PageBounds {
    default_limit: 10,
    max_limit: 100,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl PageRequest {
    /// Unparseable values fall back to the defaults; `page >= 1`, `1 <= limit <= max`.
    pub fn clamp(page: Option<&str>, limit: Option<&str>, bounds: PageBounds) -> Self {
        let page = page
            .and_then(|p| p.trim().parse::<i64>().ok())
            .unwrap_or(1)
            .clamp(1, u32::MAX as i64) as u32;
        let limit = limit
            .and_then(|l| l.trim().parse::<i64>().ok())
            .unwrap_or(bounds.default_limit as i64)
            .clamp(1, bounds.max_limit as i64) as u32;
        PageRequest { page, limit }
    }

    pub fn offset(&self) -> u64 {
        (self.page as u64 - 1) * self.limit as u64
    }
}

/// Maps a requested logical sort key to a resolved column. Unknown keys and keys whose
/// column is absent yield `None`; the caller supplies the default.
pub fn resolve_order<'a>(requested: Option<&str>, whitelist: &[(&str, Option<&'a Column>)]) -> Option<&'a Column> {
    let requested = requested?.trim();
    whitelist
        .iter()
        .find(|(key, _)| *key == requested)
        .and_then(|(_, col)| *col)
}

/// One page of a list plus the total under the same filter.
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub limit: u32,
    pub partial: bool,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: i64, req: PageRequest) -> Self {
        Page {
            items,
            total,
            page: req.page,
            limit: req.limit,
            partial: false,
        }
    }

    /// Placeholder answer when no database is configured.
    pub fn unavailable(req: PageRequest) -> Self {
        Page {
            items: Vec::new(),
            total: 0,
            page: req.page,
            limit: req.limit,
            partial: true,
        }
    }
}
