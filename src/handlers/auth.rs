//! `/api/auth/register`.

use super::body_to_map;
use crate::error::AppError;
use crate::extractors::{JsonBody, RequestDeadline};
use crate::response;
use crate::service::UserService;
use crate::state::AppState;
use axum::{extract::State, response::IntoResponse};
use serde_json::json;

pub async fn register(
    State(state): State<AppState>,
    RequestDeadline(deadline): RequestDeadline,
    JsonBody(body): JsonBody,
) -> Result<impl IntoResponse, AppError> {
    let body = body_to_map(body)?;
    let db = state.db(deadline)?;
    let user = UserService::register(&db, &body).await?;
    Ok(response::created(json!({ "user": user })))
}
