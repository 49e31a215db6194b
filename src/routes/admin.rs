//! Admin API routes. Each entity is one path; the method drives the CRUD verb.

use crate::handlers::{auth, events, me, news, schema, startups, users};
use crate::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::limit::RequestBodyLimitLayer;

pub fn admin_routes(state: AppState) -> Router {
    let limit = state.config.max_body_bytes;
    Router::new()
        .route(
            "/api/admin/startups",
            get(startups::get)
                .post(startups::create)
                .put(startups::update)
                .delete(startups::delete),
        )
        .route("/api/admin/startups/views", post(startups::views))
        .route(
            "/api/admin/events",
            get(events::get)
                .post(events::create)
                .put(events::update)
                .delete(events::delete),
        )
        .route("/api/admin/events/attend", post(events::attend))
        .route(
            "/api/admin/news",
            get(news::get)
                .post(news::create)
                .put(news::update)
                .delete(news::delete),
        )
        .route(
            "/api/admin/users",
            get(users::list).put(users::update).delete(users::delete),
        )
        .route("/api/admin/schema/refresh", post(schema::refresh))
        .route("/api/auth/register", post(auth::register))
        .route("/api/me/startup", get(me::get_startup).put(me::update_startup))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(limit))
        .with_state(state)
}
