//! `/api/admin/news`.

use super::{body_to_map, id_param, page_param, Params};
use crate::error::AppError;
use crate::extractors::{JsonBody, RequestDeadline};
use crate::response;
use crate::service::mapper::NewsView;
use crate::service::NewsService;
use crate::sql::{Page, NEWS_PAGES};
use crate::state::AppState;
use axum::{
    extract::{Query, State},
    response::{IntoResponse, Response},
    Json,
};

pub async fn get(
    State(state): State<AppState>,
    RequestDeadline(deadline): RequestDeadline,
    Query(params): Query<Params>,
) -> Result<Response, AppError> {
    if params.contains_key("id") {
        let id = id_param(&params)?;
        let db = state.db(deadline)?;
        return Ok(Json(NewsService::detail(&db, &id).await?).into_response());
    }
    let page = page_param(&params, NEWS_PAGES);
    if !state.has_db() {
        return Ok(Json(Page::<NewsView>::unavailable(page)).into_response());
    }
    let db = state.db(deadline)?;
    Ok(Json(NewsService::list(&db, page).await?).into_response())
}

pub async fn create(
    State(state): State<AppState>,
    RequestDeadline(deadline): RequestDeadline,
    JsonBody(body): JsonBody,
) -> Result<impl IntoResponse, AppError> {
    let body = body_to_map(body)?;
    let db = state.db(deadline)?;
    Ok(response::created(NewsService::create(&db, &body).await?))
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
    Ok(response::ok_with_id(NewsService::update(&db, &id, &body).await?))
}

pub async fn delete(
    State(state): State<AppState>,
    RequestDeadline(deadline): RequestDeadline,
    Query(params): Query<Params>,
) -> Result<impl IntoResponse, AppError> {
    let id = id_param(&params)?;
    let db = state.db(deadline)?;
    NewsService::delete(&db, &id).await?;
    Ok(response::ok())
}
