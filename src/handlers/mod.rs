//! HTTP handlers for the admin API. One route per entity; the method picks the verb and
//! `?id=` selects a single row.

pub mod auth;
pub mod events;
pub mod me;
pub mod news;
pub mod schema;
pub mod startups;
pub mod users;

use crate::error::AppError;
use crate::service::Body;
use crate::sql::{PageBounds, PageRequest, RecordId};
use serde_json::Value;
use std::collections::HashMap;

pub type Params = HashMap<String, String>;

fn param<'a>(params: &'a Params, key: &str) -> Option<&'a str> {
    params.get(key).map(String::as_str)
}

pub(crate) fn id_param(params: &Params) -> Result<RecordId, AppError> {
    RecordId::parse(param(params, "id").unwrap_or_default())
}

pub(crate) fn page_param(params: &Params, bounds: PageBounds) -> PageRequest {
    PageRequest::clamp(param(params, "page"), param(params, "limit"), bounds)
}

pub(crate) fn body_to_map(value: Value) -> Result<Body, AppError> {
    match value {
        Value::Object(m) => Ok(m),
        _ => Err(AppError::Invalid {
            code: "invalid_body",
            message: "body must be a JSON object".into(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::STARTUP_PAGES;
    use serde_json::json;

    fn params(pairs: &[(&str, &str)]) -> Params {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn id_and_page_params() {
        assert!(matches!(id_param(&params(&[])), Err(AppError::InvalidId)));
        assert_eq!(id_param(&params(&[("id", "7")])).unwrap(), RecordId::Int(7));
        let page = page_param(&params(&[("page", "3"), ("limit", "999")]), STARTUP_PAGES);
        assert_eq!((page.page, page.limit), (3, 200));
    }

    #[test]
    fn body_must_be_an_object() {
        assert!(body_to_map(json!({"a": 1})).is_ok());
        assert!(matches!(
            body_to_map(json!([1])),
            Err(AppError::Invalid { code: "invalid_body", .. })
        ));
    }
}
