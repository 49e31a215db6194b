//! `/api/admin/startups` and the view counter.

use super::{body_to_map, id_param, page_param, Params};
use crate::error::AppError;
use crate::extractors::{JsonBody, RequestDeadline};
use crate::response;
use crate::service::mapper::StartupSummary;
use crate::service::{StartupListQuery, StartupService};
use crate::sql::{Page, SortDir, STARTUP_PAGES};
use crate::state::AppState;
use axum::{
    extract::{Query, State},
    response::{IntoResponse, Response},
    Json,
};

/// Detail with `?id=`, otherwise a filtered, sorted page.
pub async fn get(
    State(state): State<AppState>,
    RequestDeadline(deadline): RequestDeadline,
    Query(params): Query<Params>,
) -> Result<Response, AppError> {
    if params.contains_key("id") {
        let id = id_param(&params)?;
        let db = state.db(deadline)?;
        return Ok(Json(StartupService::detail(&db, &id).await?).into_response());
    }
    let query = StartupListQuery {
        page: page_param(&params, STARTUP_PAGES),
        order_by: params.get("order_by").cloned(),
        order_dir: SortDir::parse(params.get("order_dir").map(String::as_str)),
        stage: params.get("stage").cloned(),
    };
    if !state.has_db() {
        return Ok(Json(Page::<StartupSummary>::unavailable(query.page)).into_response());
    }
    let db = state.db(deadline)?;
    Ok(Json(StartupService::list(&db, &query).await?).into_response())
}

pub async fn create(
    State(state): State<AppState>,
    RequestDeadline(deadline): RequestDeadline,
    JsonBody(body): JsonBody,
) -> Result<impl IntoResponse, AppError> {
    let body = body_to_map(body)?;
    let db = state.db(deadline)?;
    Ok(response::created(StartupService::create(&db, &body).await?))
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
    Ok(response::ok_with_id(StartupService::update(&db, &id, &body).await?))
}

pub async fn delete(
    State(state): State<AppState>,
    RequestDeadline(deadline): RequestDeadline,
    Query(params): Query<Params>,
) -> Result<impl IntoResponse, AppError> {
    let id = id_param(&params)?;
    let db = state.db(deadline)?;
    StartupService::delete(&db, &id).await?;
    Ok(response::ok())
}

pub async fn views(
    State(state): State<AppState>,
    RequestDeadline(deadline): RequestDeadline,
    Query(params): Query<Params>,
) -> Result<impl IntoResponse, AppError> {
    let id = id_param(&params)?;
    let db = state.db(deadline)?;
    Ok(Json(StartupService::increment_views(&db, &id).await?))
}
