//! Response bodies shared by the admin handlers.

use axum::{http::StatusCode, Json};
use serde::Serialize;
use serde_json::Value;

/// Acknowledgement for writes: `{ "ok": true }`, with the id when one is known.
#[derive(Debug, Serialize)]
pub struct Ack {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
}

pub fn ok() -> Json<Ack> {
    Json(Ack { ok: true, id: None })
}

pub fn ok_with_id(id: Value) -> Json<Ack> {
    Json(Ack { ok: true, id: Some(id) })
}

pub fn created<T: Serialize>(data: T) -> (StatusCode, Json<T>) {
    (StatusCode::CREATED, Json(data))
}

/// Created row identity plus `ok`, the shape the admin UI expects from event creation.
#[derive(Debug, Serialize)]
pub struct CreatedAck<T> {
    #[serde(flatten)]
    pub created: T,
    pub ok: bool,
}

pub fn created_ack<T: Serialize>(created: T) -> (StatusCode, Json<CreatedAck<T>>) {
    (StatusCode::CREATED, Json(CreatedAck { created, ok: true }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::Created;
    use serde_json::json;

    #[test]
    fn ack_shapes() {
        assert_eq!(serde_json::to_value(ok().0).unwrap(), json!({"ok": true}));
        assert_eq!(
            serde_json::to_value(ok_with_id(json!(7)).0).unwrap(),
            json!({"ok": true, "id": 7})
        );
        let (status, body) = created_ack(Created { id: json!(3), slug: None });
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(serde_json::to_value(body.0).unwrap(), json!({"id": 3, "ok": true}));
    }
}
