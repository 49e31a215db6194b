//! Normalizes raw rows into stable response shapes.
//!
//! Rows arrive as JSON objects keyed by the aliases the builders assign, whatever the
//! physical column names were. Values still vary with the deployment's column types:
//! lists may be JSON arrays, JSON strings or CSV text, dates may be native timestamps,
//! date-only strings or JSON-encoded strings, counters may be numbers, numeric text or NULL.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;

static NULL: Value = Value::Null;

pub(crate) fn field<'a>(row: &'a Value, key: &str) -> &'a Value {
    row.get(key).unwrap_or(&NULL)
}

fn strip_quotes(s: &str) -> &str {
    let s = s.trim();
    for q in ['"', '\''] {
        if s.len() >= 2 && s.starts_with(q) && s.ends_with(q) {
            return s[1..s.len() - 1].trim();
        }
    }
    s
}

/// Any list-like value as an ordered list of non-empty strings.
pub fn normalize_list(v: &Value) -> Vec<String> {
    match v {
        Value::Null => Vec::new(),
        Value::Array(items) => items
            .iter()
            .filter_map(|i| match i {
                Value::Null => None,
                Value::String(s) => Some(strip_quotes(s).to_string()),
                other => Some(other.to_string()),
            })
            .filter(|s| !s.is_empty())
            .collect(),
        Value::String(s) => {
            let t = s.trim();
            if t.starts_with('[') || t.starts_with('"') {
                if let Ok(inner) = serde_json::from_str::<Value>(t) {
                    if inner != *v {
                        return normalize_list(&inner);
                    }
                }
            }
            let t = t
                .strip_prefix('{')
                .and_then(|r| r.strip_suffix('}'))
                .unwrap_or(t);
            t.split(',')
                .map(strip_quotes)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        }
        other => vec![other.to_string()],
    }
}

fn iso_millis(d: DateTime<Utc>) -> String {
    d.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parses the timestamp spellings rows and request bodies carry. Naive values are UTC.
pub fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(d) = DateTime::parse_from_rfc3339(s) {
        return Some(d.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%.f%#z", "%Y-%m-%dT%H:%M:%S%.f%#z"] {
        if let Ok(d) = DateTime::parse_from_str(s, fmt) {
            return Some(d.with_timezone(&Utc));
        }
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(d) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(d.and_utc());
        }
    }
    None
}

fn is_date_only(s: &str) -> bool {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok() && s.len() == 10
}

/// A calendar date or a timestamp in one of the accepted layouts.
pub fn is_date_like(s: &str) -> bool {
    let s = s.trim();
    is_date_only(s) || parse_datetime(s).is_some()
}

/// ISO-8601 string for any date-like value; date-only values stay date-only.
pub fn normalize_datetime(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => {
            let t = s.trim();
            if t.is_empty() {
                return None;
            }
            if t.starts_with('"') {
                if let Ok(Value::String(inner)) = serde_json::from_str::<Value>(t) {
                    return normalize_datetime(&Value::String(inner));
                }
            }
            if is_date_only(t) {
                return Some(t.to_string());
            }
            Some(parse_datetime(t).map(iso_millis).unwrap_or_else(|| t.to_string()))
        }
        Value::Number(n) => n
            .as_i64()
            .and_then(DateTime::<Utc>::from_timestamp_millis)
            .map(iso_millis),
        _ => None,
    }
}

/// `YYYY-MM-DD` part of a start timestamp, for calendar projections.
pub fn date_only(s: &str) -> Option<String> {
    let s = s.trim();
    if is_date_only(s) {
        return Some(s.to_string());
    }
    if let Some((day, _)) = s.split_once('T') {
        if is_date_only(day) {
            return Some(day.to_string());
        }
    }
    parse_datetime(s).map(|d| d.date_naive().format("%Y-%m-%d").to_string())
}

/// Counter value; missing or unparseable reads as zero.
pub fn as_count(v: &Value) -> i64 {
    as_opt_count(v).unwrap_or(0)
}

pub fn as_opt_count(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().map(|f| f as i64))
        }
        _ => None,
    }
}

pub fn as_text(v: &Value) -> Option<String> {
    match v {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

pub fn text_or_empty(v: &Value) -> String {
    as_text(v).unwrap_or_default()
}

/// First non-blank value among `keys`.
pub fn first_text(row: &Value, keys: &[String]) -> Option<String> {
    keys.iter()
        .filter_map(|k| as_text(field(row, k)))
        .find(|s| !s.trim().is_empty())
}

/// Text after the last comma of a location; the whole location when it has none.
pub fn country(location: &str) -> Option<String> {
    let part = match location.rsplit_once(',') {
        Some((_, tail)) => tail,
        None => location,
    };
    let part = part.trim();
    (!part.is_empty()).then(|| part.to_string())
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NewsStatus {
    Draft,
    Published,
}

impl NewsStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "draft" => Some(NewsStatus::Draft),
            "published" => Some(NewsStatus::Published),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            NewsStatus::Draft => "draft",
            NewsStatus::Published => "published",
        }
    }

    /// The status column when it holds a recognized value, else the publish timestamp
    /// compared to `now` (future means draft).
    pub fn resolve(status: &Value, published_at: &Value, now: DateTime<Utc>) -> Self {
        if let Some(s) = status.as_str().and_then(NewsStatus::parse) {
            return s;
        }
        let at = match published_at {
            Value::String(s) => parse_datetime(s).or_else(|| {
                NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                    .ok()
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
                    .map(|d| d.and_utc())
            }),
            _ => None,
        };
        match at {
            Some(at) if at > now => NewsStatus::Draft,
            Some(_) => NewsStatus::Published,
            None => NewsStatus::Draft,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Founder {
    pub id: Value,
    pub name: String,
    pub role: Option<String>,
    pub email: Option<String>,
}

impl Founder {
    pub fn from_row(row: &Value) -> Self {
        Founder {
            id: field(row, "id").clone(),
            name: text_or_empty(field(row, "name")),
            role: as_text(field(row, "role")),
            email: as_text(field(row, "email")),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StartupSummary {
    pub id: Value,
    pub name: String,
    pub slug: Option<String>,
    pub sector: String,
    pub stage: String,
    pub location: String,
    pub legal_status: Option<String>,
    pub logo: Option<String>,
    pub status: String,
    pub needs: Vec<String>,
    pub join_date: Option<String>,
    pub views: i64,
}

impl StartupSummary {
    pub fn from_row(row: &Value) -> Self {
        StartupSummary {
            id: field(row, "id").clone(),
            name: text_or_empty(field(row, "name")),
            slug: as_text(field(row, "slug")),
            sector: text_or_empty(field(row, "sector")),
            stage: text_or_empty(field(row, "stage")),
            location: text_or_empty(field(row, "location")),
            legal_status: as_text(field(row, "legal_status")),
            logo: as_text(field(row, "logo")),
            status: text_or_empty(field(row, "status")),
            needs: normalize_list(field(row, "needs")),
            join_date: normalize_datetime(field(row, "join_date")),
            views: as_count(field(row, "views")),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StartupDetail {
    #[serde(flatten)]
    pub summary: StartupSummary,
    pub country: Option<String>,
    pub website_url: String,
    pub social_media_url: String,
    pub email: String,
    pub phone: String,
    pub description: Option<String>,
    pub description_longue: Option<String>,
    pub founders: Vec<Founder>,
}

impl StartupDetail {
    /// `short`/`long` are the aliases of every present description synonym, preferred
    /// first; the first populated one wins.
    pub fn from_row(row: &Value, short: &[String], long: &[String], founders: Vec<Founder>) -> Self {
        let summary = StartupSummary::from_row(row);
        StartupDetail {
            country: country(&summary.location),
            website_url: text_or_empty(field(row, "website_url")),
            social_media_url: text_or_empty(field(row, "social_media_url")),
            email: text_or_empty(field(row, "email")),
            phone: text_or_empty(field(row, "phone")),
            description: first_text(row, short),
            description_longue: first_text(row, long),
            founders,
            summary,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct EventView {
    pub id: Value,
    pub title: String,
    pub description: Option<String>,
    pub start_datetime: Option<String>,
    pub end_datetime: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dates: Option<String>,
    pub location: Option<String>,
    pub attendees: i64,
    pub max_attendees: Option<i64>,
    pub image: Option<String>,
    pub event_type: Option<String>,
    pub target_audience: Option<String>,
}

impl EventView {
    pub fn from_row(row: &Value) -> Self {
        EventView {
            id: field(row, "id").clone(),
            title: text_or_empty(field(row, "title")),
            description: as_text(field(row, "description")),
            start_datetime: normalize_datetime(field(row, "start_datetime")),
            end_datetime: normalize_datetime(field(row, "end_datetime")),
            dates: normalize_datetime(field(row, "dates")),
            location: as_text(field(row, "location")),
            attendees: as_count(field(row, "attendees")),
            max_attendees: as_opt_count(field(row, "max_attendees")),
            image: as_text(field(row, "image")),
            event_type: as_text(field(row, "event_type")),
            target_audience: as_text(field(row, "target_audience")),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct NewsView {
    pub id: Value,
    pub title: String,
    pub status: NewsStatus,
    pub created_at: Option<String>,
    pub views: i64,
    pub slug: Option<String>,
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl NewsView {
    pub fn from_row(row: &Value, now: DateTime<Utc>) -> Self {
        NewsView {
            id: field(row, "id").clone(),
            title: text_or_empty(field(row, "title")),
            status: NewsStatus::resolve(field(row, "status"), field(row, "created_at"), now),
            created_at: normalize_datetime(field(row, "created_at")),
            views: as_count(field(row, "views")),
            slug: as_text(field(row, "slug")),
            image: as_text(field(row, "image")),
            content: as_text(field(row, "content")),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UserView {
    pub id: Value,
    pub name: String,
    pub email: String,
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl UserView {
    pub fn from_row(row: &Value) -> Self {
        UserView {
            id: field(row, "id").clone(),
            name: text_or_empty(field(row, "name")),
            email: text_or_empty(field(row, "email")),
            role: text_or_empty(field(row, "role")),
            created_at: normalize_datetime(field(row, "created_at")),
            updated_at: normalize_datetime(field(row, "updated_at")),
        }
    }
}
