//! Caller identity for the self-service routes: a forwarded email header, `?email=`, or a
//! bearer token.

use crate::service::Caller;
use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Query},
    http::{header::AUTHORIZATION, request::Parts},
};
use std::collections::HashMap;

/// Header the auth front end sets to the signed-in account's email.
pub const USER_EMAIL_HEADER: &str = "X-User-Email";

#[derive(Clone, Debug)]
pub struct RequestCaller(pub Caller);

fn non_blank(s: Option<&str>) -> Option<String> {
    s.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

pub(crate) fn caller(header: Option<&str>, query: Option<&str>, authorization: Option<&str>) -> Caller {
    let token = authorization
        .and_then(|a| a.trim().strip_prefix("Bearer "))
        .and_then(|t| non_blank(Some(t)));
    Caller {
        email: non_blank(header).or_else(|| non_blank(query)),
        token,
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for RequestCaller {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let email = parts
            .headers
            .get(USER_EMAIL_HEADER)
            .and_then(|v| v.to_str().ok());
        let authorization = parts.headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());
        let query = Query::<HashMap<String, String>>::try_from_uri(&parts.uri)
            .map(|Query(q)| q)
            .unwrap_or_default();
        Ok(RequestCaller(caller(
            email,
            query.get("email").map(String::as_str),
            authorization,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_beats_query_and_token_is_kept() {
        let c = caller(Some(" ada@example.com "), Some("eve@example.com"), Some("Bearer t0k"));
        assert_eq!(c.email.as_deref(), Some("ada@example.com"));
        assert_eq!(c.token.as_deref(), Some("t0k"));

        let c = caller(None, Some("eve@example.com"), None);
        assert_eq!(c.email.as_deref(), Some("eve@example.com"));
    }

    #[test]
    fn blank_or_non_bearer_values_are_ignored() {
        let c = caller(Some("  "), Some(""), Some("Basic abc"));
        assert!(c.is_anonymous());
        assert!(caller(None, None, Some("Bearer   ")).is_anonymous());
    }
}
