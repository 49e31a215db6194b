use super::exec;
use super::mapper::{self, EventView};
use super::{bind_for, mentions, pick, text, Body, Created, Db};
use crate::error::AppError;
use crate::schema::{Column, EventLayout};
use crate::sql::{delete_by_id, increment, Insert, PageRequest, PgBindValue, RecordId, Select, SortDir, Update};
use serde_json::Value;

const UPDATABLE: &[&str] = &[
    "title",
    "description",
    "start_datetime",
    "end_datetime",
    "location",
    "attendees",
    "max_attendees",
    "capacity",
    "image_base64",
    "image",
    "event_type",
    "target_audience",
];

/// Date-only projection of a start timestamp for the `dates` column.
fn dates_value(col: &Column, start: &Value) -> PgBindValue {
    let day = match start {
        Value::String(s) => mapper::date_only(s),
        _ => None,
    };
    match day {
        None => PgBindValue::Null,
        Some(d) if col.is_json() => PgBindValue::Json(Value::String(d)),
        Some(d) => PgBindValue::Text(d),
    }
}

/// Rejects a present date field that is not a date string. `null` is allowed only where
/// the column may be cleared.
fn check_date(body: &Body, key: &'static str, nullable: bool) -> Result<(), AppError> {
    let ok = match body.get(key) {
        None => true,
        Some(Value::Null) => nullable,
        Some(Value::String(s)) => mapper::is_date_like(s),
        Some(_) => false,
    };
    if ok {
        Ok(())
    } else {
        Err(AppError::Invalid {
            code: "invalid_field",
            message: format!("{} is not a date or timestamp", key),
        })
    }
}

pub struct EventService;

impl EventService {
    fn select(l: &EventLayout) -> Select {
        Select::from(l.table())
            .field(&l.id, "id")
            .field(&l.title, "title")
            .field_or_null(l.description.as_ref(), "description")
            .field(&l.start, "start_datetime")
            .field_or_null(l.end.as_ref(), "end_datetime")
            .field_or_null(l.dates.as_ref(), "dates")
            .field_or_null(l.location.as_ref(), "location")
            .field_or_null(l.attendees.as_ref(), "attendees")
            .field_or_null(l.capacity.as_ref(), "max_attendees")
            .field_or_null(l.image.as_ref(), "image")
            .field_or_null(l.types.first(), "event_type")
            .field_or_null(l.target_audience.as_ref(), "target_audience")
    }

    /// Upcoming-first: start ascending, id as tie-breaker.
    pub async fn list(db: &Db, page: PageRequest) -> Result<Vec<EventView>, AppError> {
        let l = EventLayout::resolve(&db.schema, &db.config.events).await?;
        let q = Self::select(&l)
            .order_by(&l.start, SortDir::Asc)
            .order_by(&l.id, SortDir::Asc)
            .page(page.limit, page.offset())
            .build();
        let rows = exec::fetch_all(&db.pool, &db.deadline, &q)
            .await
            .map_err(AppError::context("read_failed"))?;
        Ok(rows.iter().map(EventView::from_row).collect())
    }

    pub async fn detail(db: &Db, id: &RecordId) -> Result<EventView, AppError> {
        let l = EventLayout::resolve(&db.schema, &db.config.events).await?;
        let q = Self::select(&l).filter_id(&l.id, id).page(1, 0).build();
        let row = exec::fetch_optional(&db.pool, &db.deadline, &q)
            .await
            .map_err(AppError::context("read_failed"))?
            .ok_or(AppError::NotFound)?;
        Ok(EventView::from_row(&row))
    }

    pub async fn create(db: &Db, body: &Body) -> Result<Created, AppError> {
        let title = text(body, &["title"]);
        let description = text(body, &["description"]);
        let start = pick(body, &["start_datetime"]).filter(|v| match v {
            Value::Null => false,
            Value::String(s) => !s.trim().is_empty(),
            _ => true,
        });
        let (Some(title), Some(description), Some(start)) = (title.clone(), description.clone(), start) else {
            let mut missing = Vec::new();
            if title.is_none() {
                missing.push("title");
            }
            if description.is_none() {
                missing.push("description");
            }
            if start.is_none() {
                missing.push("start_datetime");
            }
            return Err(AppError::missing("missing_fields", missing));
        };
        check_date(body, "start_datetime", false)?;
        check_date(body, "end_datetime", true)?;

        let l = EventLayout::resolve(&db.schema, &db.config.events).await?;
        let desc_col = l.cols.needed(l.description.as_ref(), "description")?;

        let mut ins = Insert::into(l.table())
            .value(&l.title, title)
            .value(desc_col, description)
            .value(&l.start, bind_for(&l.start, start))
            .returning(&l.id, "id");
        if let Some(dates) = &l.dates {
            ins = ins.value(dates, dates_value(dates, start));
        }
        if let (Some(col), Some(v)) = (&l.end, pick(body, &["end_datetime"])) {
            ins = ins.value(col, bind_for(col, v));
        }
        if let (Some(col), Some(v)) = (&l.location, pick(body, &["location"])) {
            ins = ins.value(col, bind_for(col, v));
        }
        if let Some(col) = &l.attendees {
            let n = pick(body, &["attendees"]).map(mapper::as_count).unwrap_or(0);
            ins = ins.value(col, n);
        }
        if let (Some(col), Some(v)) = (&l.capacity, pick(body, &["max_attendees", "capacity"])) {
            ins = ins.value(col, PgBindValue::from(mapper::as_opt_count(v).map_or(Value::Null, Value::from)));
        }
        if let (Some(col), Some(v)) = (&l.image, pick(body, &["image_base64", "image"])) {
            ins = ins.value(col, bind_for(col, v));
        }
        if let Some(v) = pick(body, &["event_type"]) {
            ins = ins.value_all(&l.types, PgBindValue::from_json(v));
        }
        if let (Some(col), Some(v)) = (&l.target_audience, pick(body, &["target_audience"])) {
            ins = ins.value(col, bind_for(col, v));
        }
        let q = ins.build();

        let mut conn = db
            .deadline
            .run(db.pool.acquire())
            .await
            .map_err(AppError::context("create_failed"))?;
        let row = exec::insert_recovering(&mut conn, &db.deadline, l.table(), &l.id, None, |_| q.clone())
            .await
            .map_err(AppError::context("create_failed"))?;
        tracing::info!(table = %l.table(), id = %mapper::field(&row, "id"), "event created");
        Ok(Created {
            id: mapper::field(&row, "id").clone(),
            slug: None,
        })
    }

    /// Partial update. `event_type` is written to every type column; a new start also
    /// refreshes the `dates` projection.
    pub async fn update(db: &Db, id: &RecordId, body: &Body) -> Result<Value, AppError> {
        if !mentions(body, UPDATABLE) {
            return Err(AppError::NothingToUpdate);
        }
        check_date(body, "start_datetime", false)?;
        check_date(body, "end_datetime", true)?;
        let l = EventLayout::resolve(&db.schema, &db.config.events).await?;
        let plain = [
            ("title", Some(&l.title)),
            ("description", l.description.as_ref()),
            ("start_datetime", Some(&l.start)),
            ("end_datetime", l.end.as_ref()),
            ("location", l.location.as_ref()),
            ("target_audience", l.target_audience.as_ref()),
        ];
        let mut upd = Update::table(l.table());
        for (key, col) in plain {
            if let (Some(col), Some(v)) = (col, body.get(key)) {
                upd = upd.set(col, bind_for(col, v));
            }
        }
        if let (Some(dates), Some(start)) = (&l.dates, body.get("start_datetime")) {
            upd = upd.set(dates, dates_value(dates, start));
        }
        if let (Some(col), Some(v)) = (&l.attendees, body.get("attendees")) {
            upd = upd.set(col, mapper::as_count(v));
        }
        if let (Some(col), Some(v)) = (&l.capacity, pick(body, &["max_attendees", "capacity"])) {
            upd = upd.set(col, PgBindValue::from(mapper::as_opt_count(v).map_or(Value::Null, Value::from)));
        }
        if let (Some(col), Some(v)) = (&l.image, pick(body, &["image_base64", "image"])) {
            upd = upd.set(col, bind_for(col, v));
        }
        if let Some(v) = body.get("event_type") {
            upd = upd.set_all(&l.types, PgBindValue::from_json(v));
        }
        let q = upd.returning(&l.id, "id").build(&l.id, id)?;
        let row = exec::fetch_optional(&db.pool, &db.deadline, &q)
            .await
            .map_err(AppError::context("update_failed"))?
            .ok_or(AppError::NotFound)?;
        Ok(mapper::field(&row, "id").clone())
    }

    pub async fn delete(db: &Db, id: &RecordId) -> Result<(), AppError> {
        let l = EventLayout::resolve(&db.schema, &db.config.events).await?;
        exec::fetch_optional(&db.pool, &db.deadline, &delete_by_id(l.table(), &l.id, id))
            .await
            .map_err(AppError::context("delete_failed"))?
            .ok_or(AppError::NotFound)?;
        tracing::info!(table = %l.table(), %id, "event deleted");
        Ok(())
    }

    /// One more attendee, refused at capacity. Returns the new attendee count.
    pub async fn attend(db: &Db, id: &RecordId) -> Result<i64, AppError> {
        let l = EventLayout::resolve(&db.schema, &db.config.events).await?;
        let attendees = l.cols.needed(l.attendees.as_ref(), "attendees")?;
        let q = increment(l.table(), &l.id, id, attendees, l.capacity.as_ref());
        if let Some(row) = exec::fetch_optional(&db.pool, &db.deadline, &q).await? {
            return Ok(mapper::as_count(mapper::field(&row, "count")));
        }
        let exists = Select::from(l.table())
            .field(&l.id, "id")
            .filter_id(&l.id, id)
            .page(1, 0)
            .build();
        match exec::fetch_optional(&db.pool, &db.deadline, &exists).await? {
            Some(_) => Err(AppError::Conflict {
                code: "event_full",
                message: "event is at capacity".to_string(),
            }),
            None => Err(AppError::NotFound),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn dates_projection_follows_column_type() {
        let start = json!("2025-03-14T18:30:00Z");
        assert_eq!(
            dates_value(&Column::new("dates", "jsonb"), &start),
            PgBindValue::Json(json!("2025-03-14"))
        );
        assert_eq!(
            dates_value(&Column::new("dates", "date"), &start),
            PgBindValue::text("2025-03-14")
        );
        assert_eq!(dates_value(&Column::new("dates", "jsonb"), &json!("soon")), PgBindValue::Null);
    }

    #[test]
    fn dates_must_parse() {
        let body = |v: Value| v.as_object().cloned().unwrap();
        for ok in [
            json!({"start_datetime": "2025-03-14T18:30:00Z"}),
            json!({"start_datetime": "2025-03-14T18:30"}),
            json!({"start_datetime": "2025-03-14", "end_datetime": null}),
            json!({"title": "no dates at all"}),
        ] {
            let b = body(ok);
            assert!(check_date(&b, "start_datetime", false).is_ok(), "{b:?}");
            assert!(check_date(&b, "end_datetime", true).is_ok(), "{b:?}");
        }
        for bad in [
            json!({"start_datetime": "soon"}),
            json!({"start_datetime": "2025-13-40"}),
            json!({"start_datetime": 1741977000000u64}),
            json!({"start_datetime": null}),
        ] {
            assert!(matches!(
                check_date(&body(bad), "start_datetime", false),
                Err(AppError::Invalid { code: "invalid_field", .. })
            ));
        }
        assert!(check_date(&body(json!({"end_datetime": "later"})), "end_datetime", true).is_err());
    }
}
