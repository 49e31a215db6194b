//! Request deadline from the configured timeout, optionally tightened by the client.

use crate::deadline::Deadline;
use crate::state::AppState;
use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};
use std::time::Duration;

/// Header a caller may use to ask for a shorter budget than the configured one.
pub const REQUEST_TIMEOUT_HEADER: &str = "X-Request-Timeout-Ms";

#[derive(Clone, Copy, Debug)]
pub struct RequestDeadline(pub Deadline);

pub(crate) fn budget(header: Option<&str>, ceiling: Duration) -> Duration {
    header
        .and_then(|v| v.trim().parse::<u64>().ok())
        .filter(|ms| *ms > 0)
        .map(Duration::from_millis)
        .map_or(ceiling, |d| d.min(ceiling))
}

#[async_trait]
impl FromRequestParts<AppState> for RequestDeadline {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(REQUEST_TIMEOUT_HEADER)
            .and_then(|v| v.to_str().ok());
        Ok(RequestDeadline(Deadline::after(budget(
            header,
            state.config.request_timeout,
        ))))
    }
}
