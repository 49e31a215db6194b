//! `/api/admin/users`: listing and account edits. Accounts are created via registration.

use super::{body_to_map, id_param, page_param, Params};
use crate::error::AppError;
use crate::extractors::{JsonBody, RequestDeadline};
use crate::response;
use crate::service::mapper::UserView;
use crate::service::{UserList, UserService};
use crate::sql::{Page, USER_PAGES};
use crate::state::AppState;
use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use serde_json::json;

pub async fn list(
    State(state): State<AppState>,
    RequestDeadline(deadline): RequestDeadline,
    Query(params): Query<Params>,
) -> Result<Json<UserList>, AppError> {
    let page = page_param(&params, USER_PAGES);
    if !state.has_db() {
        return Ok(Json(Page::<UserView>::unavailable(page).into()));
    }
    let db = state.db(deadline)?;
    Ok(Json(UserService::list(&db, page).await?))
}

pub async fn update(
    State(state): State<AppState>,
    RequestDeadline(deadline): RequestDeadline,
    Query(params): Query<Params>,
    JsonBody(body): JsonBody,
) -> Result<impl IntoResponse, AppError> {
    let id = id_param(&params)?;
    let body = body_to_map(body)?;
    let db = state.db(deadline)?;
    let user = UserService::update(&db, &id, &body).await?;
    Ok(Json(json!({ "user": user })))
}

pub async fn delete(
    State(state): State<AppState>,
    RequestDeadline(deadline): RequestDeadline,
    Query(params): Query<Params>,
) -> Result<impl IntoResponse, AppError> {
    let id = id_param(&params)?;
    let db = state.db(deadline)?;
    UserService::delete(&db, &id).await?;
    Ok(response::ok())
}
