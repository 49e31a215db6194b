//! Typed errors and HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// SQLSTATE for unique_violation.
pub const UNIQUE_VIOLATION: &str = "23505";
/// SQLSTATE for undefined_table.
pub const UNDEFINED_TABLE: &str = "42P01";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid identifier in {var}: {value:?}")]
    InvalidIdentifier { var: String, value: String },
    #[error("invalid value in {var}: {value:?}")]
    InvalidValue { var: String, value: String },
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// A field needed for entity identity resolved to no physical column.
    #[error("table {table} has no column for {field}")]
    Schema {
        table: String,
        field: &'static str,
        columns: Vec<String>,
    },
    #[error("database is not configured")]
    DbNotConfigured,
    #[error("{code}: {}", .fields.join(", "))]
    MissingFields {
        code: &'static str,
        fields: Vec<&'static str>,
    },
    #[error("invalid id")]
    InvalidId,
    #[error("no recognized field to update")]
    NothingToUpdate,
    #[error("not found")]
    NotFound,
    /// No forwarded email or token identifies the caller.
    #[error("caller email unknown")]
    NoCaller,
    #[error("{message}")]
    Conflict { code: &'static str, message: String },
    #[error("{message}")]
    Invalid { code: &'static str, message: String },
    #[error("request body exceeds the configured limit")]
    TooLarge,
    #[error("request deadline exceeded")]
    Timeout,
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
    /// Database failure tagged with the operation that failed.
    #[error("{code}: {source}")]
    Failed {
        code: &'static str,
        #[source]
        source: sqlx::Error,
    },
    #[error("internal: {0}")]
    Internal(String),
}

impl AppError {
    pub fn missing(code: &'static str, fields: Vec<&'static str>) -> Self {
        AppError::MissingFields { code, fields }
    }

    /// Tag a raw database error with the failing operation; other variants pass through.
    pub fn during(self, code: &'static str) -> Self {
        match self {
            AppError::Db(source) => AppError::Failed { code, source },
            other => other,
        }
    }

    /// Curried form of [`AppError::during`] for `map_err`.
    pub fn context(code: &'static str) -> impl Fn(AppError) -> AppError {
        move |e| e.during(code)
    }

    /// SQLSTATE of the underlying database error, if any.
    pub fn sql_state(&self) -> Option<String> {
        match self {
            AppError::Db(e) | AppError::Failed { source: e, .. } => sql_state(e),
            _ => None,
        }
    }

    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error"),
            AppError::Schema { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "schema_mismatch"),
            AppError::DbNotConfigured => (StatusCode::INTERNAL_SERVER_ERROR, "db_not_configured"),
            AppError::MissingFields { code, .. } => (StatusCode::BAD_REQUEST, *code),
            AppError::InvalidId => (StatusCode::BAD_REQUEST, "invalid_id"),
            AppError::NothingToUpdate => (StatusCode::BAD_REQUEST, "nothing_to_update"),
            AppError::NotFound => (StatusCode::NOT_FOUND, "not_found"),
            AppError::NoCaller => (StatusCode::UNAUTHORIZED, "no_email"),
            AppError::Conflict { code, .. } => (StatusCode::CONFLICT, *code),
            AppError::Invalid { code, .. } => (StatusCode::BAD_REQUEST, *code),
            AppError::TooLarge => (StatusCode::PAYLOAD_TOO_LARGE, "payload_too_large"),
            AppError::Timeout => (StatusCode::GATEWAY_TIMEOUT, "timeout"),
            AppError::Db(sqlx::Error::RowNotFound) => (StatusCode::NOT_FOUND, "not_found"),
            AppError::Db(_) => (StatusCode::INTERNAL_SERVER_ERROR, "query_failed"),
            AppError::Failed { code, .. } => (StatusCode::INTERNAL_SERVER_ERROR, *code),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        }
    }
}

pub(crate) fn sql_state(e: &sqlx::Error) -> Option<String> {
    e.as_database_error()
        .and_then(|d| d.code())
        .map(|c| c.into_owned())
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<String>>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let detail = match &self {
            AppError::NotFound | AppError::NothingToUpdate | AppError::InvalidId => None,
            // Driver messages can carry values and constraint internals.
            AppError::Db(_) | AppError::Failed { .. } => Some("unexpected database error".to_string()),
            other => Some(other.to_string()),
        };
        if status.is_server_error() {
            tracing::error!(error = %self, code, "request failed");
        }
        let columns = match self {
            AppError::Schema { columns, .. } => Some(columns),
            _ => None,
        };
        let body = ErrorBody {
            error: code,
            detail,
            columns,
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_categories_to_status_codes() {
        let cases = [
            (AppError::missing("missing_fields", vec!["title"]), StatusCode::BAD_REQUEST, "missing_fields"),
            (AppError::NothingToUpdate, StatusCode::BAD_REQUEST, "nothing_to_update"),
            (AppError::NotFound, StatusCode::NOT_FOUND, "not_found"),
            (AppError::NoCaller, StatusCode::UNAUTHORIZED, "no_email"),
            (
                AppError::Conflict {
                    code: "email_exists",
                    message: "email already registered".into(),
                },
                StatusCode::CONFLICT,
                "email_exists",
            ),
            (
                AppError::Schema {
                    table: "events".into(),
                    field: "title",
                    columns: vec!["id".into()],
                },
                StatusCode::INTERNAL_SERVER_ERROR,
                "schema_mismatch",
            ),
            (AppError::Timeout, StatusCode::GATEWAY_TIMEOUT, "timeout"),
            (AppError::TooLarge, StatusCode::PAYLOAD_TOO_LARGE, "payload_too_large"),
            (AppError::Db(sqlx::Error::RowNotFound), StatusCode::NOT_FOUND, "not_found"),
            (
                AppError::Db(sqlx::Error::PoolTimedOut).during("create_failed"),
                StatusCode::INTERNAL_SERVER_ERROR,
                "create_failed",
            ),
        ];
        for (err, status, code) in cases {
            assert_eq!(err.status_and_code(), (status, code));
        }
    }

    #[test]
    fn during_leaves_non_database_errors_alone() {
        let e = AppError::NotFound.during("update_failed");
        assert!(matches!(e, AppError::NotFound));
    }
}
