use super::exec::{self, SlugTarget};
use super::mapper::{self, NewsStatus, NewsView};
use super::{bind_for, mentions, pick, text, Body, Db};
use crate::error::AppError;
use crate::schema::NewsLayout;
use crate::service::slug::base_slug;
use crate::sql::{delete_by_id, Insert, Page, PageRequest, PgBindValue, RecordId, Select, SortDir, Update};
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;

const UPDATABLE: &[&str] = &["title", "content", "image_base64", "image", "draft", "status"];

/// Drafts are parked a century ahead so date-ordered public feeds never reach them.
fn publish_at(status: NewsStatus, now: DateTime<Utc>) -> String {
    let at = match status {
        NewsStatus::Draft => now + Duration::days(365 * 100),
        NewsStatus::Published => now,
    };
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Requested status: explicit `status` wins over the `draft` flag. `None` when the body
/// says nothing about publication.
fn requested_status(body: &Body) -> Result<Option<NewsStatus>, AppError> {
    if let Some(v) = body.get("status").filter(|v| !v.is_null()) {
        let parsed = v.as_str().and_then(NewsStatus::parse);
        return parsed.map(Some).ok_or_else(|| AppError::Invalid {
            code: "invalid_status",
            message: format!("status must be draft or published, got {}", v),
        });
    }
    Ok(body.get("draft").map(|d| {
        let draft = match d {
            Value::Bool(b) => *b,
            Value::String(s) => matches!(s.trim(), "true" | "1"),
            Value::Number(n) => n.as_i64() == Some(1),
            _ => false,
        };
        if draft {
            NewsStatus::Draft
        } else {
            NewsStatus::Published
        }
    }))
}

#[derive(Debug, Serialize)]
pub struct NewsCreated {
    pub id: Value,
    pub title: String,
    pub status: NewsStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
}

pub struct NewsService;

impl NewsService {
    fn select(l: &NewsLayout) -> Select {
        Select::from(l.table())
            .field(&l.id, "id")
            .field(&l.title, "title")
            .field_or_null(l.status.as_ref(), "status")
            .field_or_null(l.published_at.as_ref(), "created_at")
            .field_or_null(l.views.as_ref(), "views")
            .field_or_null(l.slug.as_ref(), "slug")
            .field_or_null(l.image.as_ref(), "image")
    }

    /// Newest first by publish timestamp, id otherwise.
    pub async fn list(db: &Db, page: PageRequest) -> Result<Page<NewsView>, AppError> {
        let l = NewsLayout::resolve(&db.schema, &db.config.news).await?;
        let mut select = Self::select(&l);
        if let Some(at) = &l.published_at {
            select = select.order_by(at, SortDir::Desc);
        }
        select = select.order_by(&l.id, SortDir::Desc);

        let total = exec::count(&db.pool, &db.deadline, &select.build_count())
            .await
            .map_err(AppError::context("read_failed"))?;
        let rows = exec::fetch_all(
            &db.pool,
            &db.deadline,
            &select.page(page.limit, page.offset()).build(),
        )
        .await
        .map_err(AppError::context("read_failed"))?;
        let now = Utc::now();
        Ok(Page::new(
            rows.iter().map(|r| NewsView::from_row(r, now)).collect(),
            total,
            page,
        ))
    }

    pub async fn detail(db: &Db, id: &RecordId) -> Result<NewsView, AppError> {
        let l = NewsLayout::resolve(&db.schema, &db.config.news).await?;
        let q = Self::select(&l)
            .field_or_null(l.content.as_ref(), "content")
            .filter_id(&l.id, id)
            .page(1, 0)
            .build();
        let row = exec::fetch_optional(&db.pool, &db.deadline, &q)
            .await
            .map_err(AppError::context("read_failed"))?
            .ok_or(AppError::NotFound)?;
        Ok(NewsView::from_row(&row, Utc::now()))
    }

    pub async fn create(db: &Db, body: &Body) -> Result<NewsCreated, AppError> {
        let title = text(body, &["title"]);
        let content = text(body, &["content"]);
        let (Some(title), Some(content)) = (title.clone(), content.clone()) else {
            let missing = [("title", title.is_none()), ("content", content.is_none())]
                .into_iter()
                .filter_map(|(f, absent)| absent.then_some(f))
                .collect();
            return Err(AppError::missing("missing_fields", missing));
        };
        let status = requested_status(body)?.unwrap_or(NewsStatus::Published);

        let l = NewsLayout::resolve(&db.schema, &db.config.news).await?;
        let content_col = l.cols.needed(l.content.as_ref(), "content")?;
        let published_at = publish_at(status, Utc::now());

        let build = |slug: Option<&str>| {
            let mut ins = Insert::into(l.table())
                .value(&l.title, title.as_str())
                .value(content_col, content.as_str())
                .value_opt(l.published_at.as_ref(), published_at.as_str())
                .value_opt(l.status.as_ref(), status.as_str())
                .returning(&l.id, "id");
            if let (Some(col), Some(v)) = (&l.image, pick(body, &["image_base64", "image"])) {
                ins = ins.value(col, bind_for(col, v));
            }
            if let (Some(col), Some(slug)) = (&l.slug, slug) {
                ins = ins.value(col, slug).returning(col, "slug");
            }
            ins.build()
        };
        let slug = l.slug.as_ref().map(|column| SlugTarget {
            column,
            base: base_slug(&title, "news"),
        });

        let mut conn = db
            .deadline
            .run(db.pool.acquire())
            .await
            .map_err(AppError::context("create_failed"))?;
        let row = exec::insert_recovering(&mut conn, &db.deadline, l.table(), &l.id, slug, build)
            .await
            .map_err(AppError::context("create_failed"))?;
        tracing::info!(table = %l.table(), id = %mapper::field(&row, "id"), status = status.as_str(), "news created");
        Ok(NewsCreated {
            id: mapper::field(&row, "id").clone(),
            title,
            status,
            slug: mapper::as_text(mapper::field(&row, "slug")),
        })
    }

    /// Partial update. A publication change rewrites the timestamp and the status column
    /// together; the slug never changes.
    pub async fn update(db: &Db, id: &RecordId, body: &Body) -> Result<Value, AppError> {
        if !mentions(body, UPDATABLE) {
            return Err(AppError::NothingToUpdate);
        }
        let status = requested_status(body)?;
        let l = NewsLayout::resolve(&db.schema, &db.config.news).await?;
        let mut upd = Update::table(l.table());
        if let Some(v) = body.get("title") {
            upd = upd.set(&l.title, bind_for(&l.title, v));
        }
        if let (Some(col), Some(v)) = (&l.content, body.get("content")) {
            upd = upd.set(col, bind_for(col, v));
        }
        if let (Some(col), Some(v)) = (&l.image, pick(body, &["image_base64", "image"])) {
            upd = upd.set(col, bind_for(col, v));
        }
        if let Some(status) = status {
            upd = upd
                .set_opt(l.published_at.as_ref(), publish_at(status, Utc::now()))
                .set_opt(l.status.as_ref(), PgBindValue::text(status.as_str()));
        }
        let q = upd.returning(&l.id, "id").build(&l.id, id)?;
        let row = exec::fetch_optional(&db.pool, &db.deadline, &q)
            .await
            .map_err(AppError::context("update_failed"))?
            .ok_or(AppError::NotFound)?;
        Ok(mapper::field(&row, "id").clone())
    }

    pub async fn delete(db: &Db, id: &RecordId) -> Result<(), AppError> {
        let l = NewsLayout::resolve(&db.schema, &db.config.news).await?;
        exec::fetch_optional(&db.pool, &db.deadline, &delete_by_id(l.table(), &l.id, id))
            .await
            .map_err(AppError::context("delete_failed"))?
            .ok_or(AppError::NotFound)?;
        tracing::info!(table = %l.table(), %id, "news deleted");
        Ok(())
    }
}
