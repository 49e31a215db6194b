//! Router tests that need no running database: the no-credentials mode, request
//! validation, and the operational routes.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use incubator_admin::schema::{Column, ColumnCatalog};
use incubator_admin::sql::Ident;
use incubator_admin::{app, AdminConfig, AppError, AppState, Deadline};
use serde_json::{json, Value};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower::ServiceExt;

/// Never reached by the validation paths below.
struct EmptyCatalog;

#[async_trait]
impl ColumnCatalog for EmptyCatalog {
    async fn columns(&self, _table: &Ident, _deadline: Deadline) -> Result<Vec<Column>, AppError> {
        Ok(Vec::new())
    }
}

fn config(vars: &[(&str, &str)]) -> AdminConfig {
    let vars: Vec<(String, String)> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
    AdminConfig::from_lookup(move |k| vars.iter().find(|(n, _)| n == k).map(|(_, v)| v.clone())).unwrap()
}

fn without_db() -> Router {
    app(AppState::new(None, config(&[])))
}

/// A pool that never connects until a query runs; handlers that reject the request
/// first never touch it.
fn with_lazy_db(vars: &[(&str, &str)]) -> Router {
    let pool = PgPoolOptions::new()
        .connect_lazy("postgres://nobody@127.0.0.1:1/none")
        .unwrap();
    app(AppState::new(Some(pool), config(vars)).with_catalog(Arc::new(EmptyCatalog)))
}

async fn send(router: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let req = match body {
        Some(b) => builder
            .header("content-type", "application/json")
            .body(Body::from(b.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    read(router, req).await
}

async fn send_raw(
    router: Router,
    method: &str,
    uri: &str,
    headers: &[(&str, &str)],
    body: &'static str,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    read(router, builder.body(Body::from(body)).unwrap()).await
}

async fn read(router: Router, req: Request<Body>) -> (StatusCode, Value) {
    let res = router.oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn health_and_version() {
    let (status, body) = send(without_db(), "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ok"}));

    let (status, body) = send(without_db(), "GET", "/version", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "incubator-admin");
}

#[tokio::test]
async fn ready_reports_missing_database() {
    let (status, body) = send(without_db(), "GET", "/ready", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["database"], "not_configured");
}

#[tokio::test]
async fn lists_degrade_to_partial_without_credentials() {
    for uri in ["/api/admin/startups", "/api/admin/news?page=2", "/api/admin/events"] {
        let (status, body) = send(without_db(), "GET", uri, None).await;
        assert_eq!(status, StatusCode::OK, "{uri}");
        assert_eq!(body["partial"], true, "{uri}");
        assert_eq!(body["items"], json!([]), "{uri}");
    }

    let (status, body) = send(without_db(), "GET", "/api/admin/users?limit=500", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"users": [], "total": 0, "page": 1, "limit": 100, "partial": true})
    );
}

#[tokio::test]
async fn writes_need_a_database() {
    let (status, body) = send(
        without_db(),
        "POST",
        "/api/admin/events",
        Some(json!({"title": "Demo day"})),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "db_not_configured");

    let (status, body) = send(without_db(), "GET", "/api/admin/startups?id=7", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "db_not_configured");
}

#[tokio::test]
async fn create_validation_happens_before_the_database() {
    let (status, body) = send(
        with_lazy_db(&[]),
        "POST",
        "/api/admin/startups",
        Some(json!({"name": "Acme", "sector": "FinTech"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "missing_required");
    assert_eq!(body["detail"], "missing_required: stage, legal_status");

    let (status, body) = send(
        with_lazy_db(&[]),
        "POST",
        "/api/admin/events",
        Some(json!({"title": "Demo day", "start_datetime": ""})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "missing_fields");
    assert_eq!(body["detail"], "missing_fields: description, start_datetime");

    let (status, body) = send(with_lazy_db(&[]), "POST", "/api/admin/news", Some(json!({"title": "Hello"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "missing_fields");
}

#[tokio::test]
async fn registration_validation() {
    let cases = [
        (json!({"email": "ada@example.com"}), "missing_fields"),
        (json!({"email": "ada", "password": "pw"}), "invalid_email"),
        (
            json!({"email": "ada@example.com", "password": "pw", "role": "root"}),
            "invalid_role",
        ),
    ];
    for (body, code) in cases {
        let (status, res) = send(with_lazy_db(&[]), "POST", "/api/auth/register", Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{code}");
        assert_eq!(res["error"], code);
    }
}

#[tokio::test]
async fn updates_need_an_id_and_a_known_field() {
    let (status, body) = send(
        with_lazy_db(&[]),
        "PUT",
        "/api/admin/startups",
        Some(json!({"name": "Acme"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_id");

    for uri in ["/api/admin/startups?id=7", "/api/admin/events?id=7", "/api/admin/news?id=7"] {
        let (status, body) = send(with_lazy_db(&[]), "PUT", uri, Some(json!({"unknown": 1}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(body["error"], "nothing_to_update", "{uri}");
    }

    let (status, body) = send(
        with_lazy_db(&[]),
        "PUT",
        "/api/admin/users?id=7",
        Some(json!({"role": "overlord"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_role");

    let (status, body) = send(with_lazy_db(&[]), "PUT", "/api/admin/news?id=7", Some(json!([1, 2]))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_body");
}

#[tokio::test]
async fn schema_refresh() {
    let (status, body) = send(without_db(), "POST", "/api/admin/schema/refresh", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"cleared": 0}));

    let (status, body) = send(
        without_db(),
        "POST",
        "/api/admin/schema/refresh?table=users;drop",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_identifier");
}

#[tokio::test]
async fn oversized_bodies_are_rejected() {
    let router = with_lazy_db(&[("MAX_BODY_BYTES", "64")]);
    let big = json!({"name": "x".repeat(500)});
    let (status, body) = send(router, "POST", "/api/admin/startups", Some(big)).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["error"], "payload_too_large");
}

#[tokio::test]
async fn unreadable_bodies_use_the_error_envelope() {
    let json = [("content-type", "application/json")];
    let cases: [(&str, &[(&str, &str)], &str); 4] = [
        ("/api/admin/startups", &json, "{\"name\": "),
        ("/api/admin/events", &[("content-type", "text/plain")], "{}"),
        ("/api/admin/news", &[], "{\"title\": \"Hello\"}"),
        ("/api/auth/register", &json, "not json"),
    ];
    for (uri, headers, body) in cases {
        let (status, res) = send_raw(with_lazy_db(&[]), "POST", uri, headers, body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(res["error"], "invalid_body", "{uri}");
        assert!(res["detail"].is_string(), "{uri}");
    }
}

#[tokio::test]
async fn event_dates_are_validated_before_the_database() {
    let (status, body) = send(
        with_lazy_db(&[]),
        "POST",
        "/api/admin/events",
        Some(json!({"title": "Demo day", "description": "Pitches", "start_datetime": "soon"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_field");

    let (status, body) = send(
        with_lazy_db(&[]),
        "PUT",
        "/api/admin/events?id=7",
        Some(json!({"end_datetime": "next tuesday"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_field");
}

#[tokio::test]
async fn own_startup_needs_a_caller() {
    let (status, body) = send(with_lazy_db(&[]), "GET", "/api/me/startup", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "no_email");

    let (status, body) = send_raw(
        with_lazy_db(&[]),
        "PUT",
        "/api/me/startup",
        &[("content-type", "application/json"), ("authorization", "Basic abc")],
        "{\"name\": \"Acme\"}",
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "no_email");

    // Owners cannot touch the admin-only fields.
    let (status, body) = send_raw(
        with_lazy_db(&[]),
        "PUT",
        "/api/me/startup?email=ada@example.com",
        &[("content-type", "application/json")],
        "{\"status\": \"archived\"}",
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "nothing_to_update");

    let (status, body) = send_raw(
        without_db(),
        "GET",
        "/api/me/startup",
        &[("x-user-email", "ada@example.com")],
        "",
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "db_not_configured");
}
