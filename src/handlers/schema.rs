//! `/api/admin/schema/refresh`: drop cached column sets after a migration.

use super::Params;
use crate::error::AppError;
use crate::sql::Ident;
use crate::state::AppState;
use axum::{
    extract::{Query, State},
    Json,
};
use serde::Serialize;

#[derive(Serialize)]
pub struct Refreshed {
    pub cleared: usize,
}

/// `?table=` drops one table, otherwise everything.
pub async fn refresh(
    State(state): State<AppState>,
    Query(params): Query<Params>,
) -> Result<Json<Refreshed>, AppError> {
    let cleared = match params.get("table") {
        Some(raw) => {
            let table = Ident::sanitize(raw).ok_or_else(|| AppError::Invalid {
                code: "invalid_identifier",
                message: format!("not a valid table name: {:?}", raw),
            })?;
            usize::from(state.schema.invalidate(&table))
        }
        None => state.schema.clear(),
    };
    tracing::info!(cleared, "schema cache refreshed");
    Ok(Json(Refreshed { cleared }))
}
