pub mod admin;
pub mod common;

pub use admin::admin_routes;
pub use common::common_routes;

use crate::state::AppState;
use axum::Router;

/// Everything the server mounts.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(common_routes(state.clone()))
        .merge(admin_routes(state))
}
