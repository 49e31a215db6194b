//! JSON request bodies with rejections in the API's error envelope.

use crate::error::AppError;
use async_trait::async_trait;
use axum::{
    extract::{rejection::JsonRejection, FromRequest, Request},
    http::StatusCode,
    Json,
};
use serde_json::Value;

/// Any JSON value; handlers decide whether the shape fits.
#[derive(Debug)]
pub struct JsonBody(pub Value);

pub(crate) fn rejected(rejection: JsonRejection) -> AppError {
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return AppError::TooLarge;
    }
    AppError::Invalid {
        code: "invalid_body",
        message: rejection.body_text(),
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequest<S> for JsonBody {
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<Value>::from_request(req, state).await {
            Ok(Json(value)) => Ok(JsonBody(value)),
            Err(rejection) => Err(rejected(rejection)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::header::CONTENT_TYPE;

    async fn extract(content_type: Option<&str>, body: &'static str) -> Result<Value, AppError> {
        let mut req = axum::http::Request::builder().method("POST").uri("/");
        if let Some(ct) = content_type {
            req = req.header(CONTENT_TYPE, ct);
        }
        let req = req.body(Body::from(body)).unwrap();
        JsonBody::from_request(req, &()).await.map(|JsonBody(v)| v)
    }

    #[tokio::test]
    async fn accepts_json_values() {
        let v = extract(Some("application/json"), r#"{"name":"Acme"}"#).await.unwrap();
        assert_eq!(v["name"], "Acme");
    }

    #[tokio::test]
    async fn malformed_or_untyped_bodies_are_invalid() {
        for (ct, body) in [
            (Some("application/json"), "{\"name\":"),
            (Some("text/plain"), "{}"),
            (None, "{}"),
        ] {
            let err = extract(ct, body).await.unwrap_err();
            assert!(matches!(err, AppError::Invalid { code: "invalid_body", .. }), "{ct:?} {body}");
        }
    }
}
