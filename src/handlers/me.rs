//! `/api/me/startup`: the caller's own startup.

use super::body_to_map;
use crate::error::AppError;
use crate::extractors::{JsonBody, RequestCaller, RequestDeadline};
use crate::response;
use crate::service::OwnerService;
use crate::state::AppState;
use axum::{extract::State, response::IntoResponse, Json};

pub async fn get_startup(
    State(state): State<AppState>,
    RequestDeadline(deadline): RequestDeadline,
    RequestCaller(caller): RequestCaller,
) -> Result<impl IntoResponse, AppError> {
    if caller.is_anonymous() {
        return Err(AppError::NoCaller);
    }
    let db = state.db(deadline)?;
    Ok(Json(OwnerService::detail(&db, &caller).await?))
}

pub async fn update_startup(
    State(state): State<AppState>,
    RequestDeadline(deadline): RequestDeadline,
    RequestCaller(caller): RequestCaller,
    JsonBody(body): JsonBody,
) -> Result<impl IntoResponse, AppError> {
    if caller.is_anonymous() {
        return Err(AppError::NoCaller);
    }
    let body = body_to_map(body)?;
    let db = state.db(deadline)?;
    OwnerService::update(&db, &caller, &body).await?;
    Ok(response::ok())
}
