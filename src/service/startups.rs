//! Startups and their founders.

use super::exec::{self, SlugTarget};
use super::mapper::{self, Founder, StartupDetail, StartupSummary};
use super::{bind_for, list_for, mentions, pick, text, Body, Created, Db};
use crate::error::{AppError, UNDEFINED_TABLE};
use crate::schema::{FounderLayout, StartupLayout};
use crate::service::slug::base_slug;
use crate::sql::{
    delete_by_id, delete_dependents, increment, resolve_order, Insert, Page, PageRequest,
    PgBindValue, RecordId, Select, SortDir, Update,
};
use serde::Serialize;
use serde_json::Value;
use sqlx::{Connection, PgConnection};

const REQUIRED: [&str; 4] = ["name", "sector", "stage", "legal_status"];

const UPDATABLE: &[&str] = &[
    "name",
    "sector",
    "stage",
    "location",
    "website_url",
    "social_media_url",
    "email",
    "contact_email",
    "phone",
    "legal_status",
    "needs",
    "logo",
    "logo_base64",
    "status",
    "description",
    "short_description",
    "description_longue",
    "long_description",
];

#[derive(Clone, Debug)]
pub struct StartupListQuery {
    pub page: PageRequest,
    pub order_by: Option<String>,
    pub order_dir: SortDir,
    pub stage: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ViewCount {
    pub id: Value,
    pub views: Option<i64>,
}

struct NewFounder {
    name: String,
    role: Option<String>,
    email: Option<String>,
}

fn founders_from(body: &Body) -> Vec<NewFounder> {
    let Some(Value::Array(items)) = body.get("founders") else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(Value::as_object)
        .filter_map(|f| {
            Some(NewFounder {
                name: text(f, &["name", "full_name"])?,
                role: text(f, &["role"]),
                email: text(f, &["email"]),
            })
        })
        .collect()
}

fn numbered(prefix: &str, n: usize) -> Vec<String> {
    (0..n).map(|i| format!("{}_{}", prefix, i)).collect()
}

pub struct StartupService;

impl StartupService {
    fn summary_select(l: &StartupLayout) -> Select {
        Select::from(l.table())
            .field(&l.id, "id")
            .field(&l.name, "name")
            .field_or_null(l.slug.as_ref(), "slug")
            .field_or_null(l.sector.as_ref(), "sector")
            .field_or_null(l.stage.as_ref(), "stage")
            .field_or_null(l.location.as_ref(), "location")
            .field_or_null(l.legal_status.as_ref(), "legal_status")
            .field_or_null(l.logo.as_ref(), "logo")
            .field_or_null(l.status.as_ref(), "status")
            .field_or_null(l.needs.as_ref(), "needs")
            .field_or_null(l.join_date.as_ref(), "join_date")
            .field_or_null(l.views.as_ref(), "views")
    }

    /// Page of startups, optionally filtered by stage (case-insensitive) and sorted by a
    /// whitelisted field (default: join date, then id).
    pub async fn list(db: &Db, query: &StartupListQuery) -> Result<Page<StartupSummary>, AppError> {
        let page = query.page;
        let l = StartupLayout::resolve(&db.schema, &db.config.startups).await?;
        let mut select = Self::summary_select(&l);
        if let Some(stage) = query.stage.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            match &l.stage {
                Some(col) => select = select.filter_ieq(col, stage),
                None => return Ok(Page::new(Vec::new(), 0, page)),
            }
        }
        let whitelist = [
            ("id", Some(&l.id)),
            ("name", Some(&l.name)),
            ("sector", l.sector.as_ref()),
            ("stage", l.stage.as_ref()),
            ("location", l.location.as_ref()),
            ("join_date", l.join_date.as_ref()),
            ("legal_status", l.legal_status.as_ref()),
        ];
        let order = resolve_order(query.order_by.as_deref(), &whitelist)
            .or(l.join_date.as_ref())
            .unwrap_or(&l.id);
        select = select.order_by(order, query.order_dir);
        if order.name != l.id.name {
            select = select.order_by(&l.id, query.order_dir);
        }

        let total = exec::count(&db.pool, &db.deadline, &select.build_count()).await?;
        let rows = exec::fetch_all(
            &db.pool,
            &db.deadline,
            &select.page(page.limit, page.offset()).build(),
        )
        .await?;
        Ok(Page::new(
            rows.iter().map(StartupSummary::from_row).collect(),
            total,
            page,
        ))
    }

    /// Full row plus founders.
    pub async fn detail(db: &Db, id: &RecordId) -> Result<StartupDetail, AppError> {
        let l = StartupLayout::resolve(&db.schema, &db.config.startups).await?;
        let q = Self::summary_select(&l)
            .field_or_null(l.website_url.as_ref(), "website_url")
            .field_or_null(l.social_media_url.as_ref(), "social_media_url")
            .field_or_null(l.contact_email.as_ref(), "email")
            .field_or_null(l.phone.as_ref(), "phone")
            .fields_numbered(&l.short_description, "short")
            .fields_numbered(&l.long_description, "long")
            .filter_id(&l.id, id)
            .page(1, 0)
            .build();
        let row = exec::fetch_optional(&db.pool, &db.deadline, &q)
            .await
            .map_err(AppError::context("read_failed"))?
            .ok_or(AppError::NotFound)?;
        let founders = Self::founders(db, mapper::field(&row, "id")).await?;
        Ok(StartupDetail::from_row(
            &row,
            &numbered("short", l.short_description.len()),
            &numbered("long", l.long_description.len()),
            founders,
        ))
    }

    async fn founders(db: &Db, startup_id: &Value) -> Result<Vec<Founder>, AppError> {
        let Some(f) = FounderLayout::resolve(&db.schema, &db.config.founders).await? else {
            return Ok(Vec::new());
        };
        let mut select = Select::from(f.table())
            .field_or_null(f.id.as_ref(), "id")
            .field(&f.name, "name")
            .field_or_null(f.role.as_ref(), "role")
            .field_or_null(f.email.as_ref(), "email")
            .filter_eq(&f.startup_fk, bind_for(&f.startup_fk, startup_id));
        if let Some(fid) = &f.id {
            select = select.order_by(fid, SortDir::Asc);
        }
        match exec::fetch_all(&db.pool, &db.deadline, &select.build()).await {
            Ok(rows) => Ok(rows.iter().map(Founder::from_row).collect()),
            Err(e) if e.sql_state().as_deref() == Some(UNDEFINED_TABLE) => {
                db.schema.cache().invalidate(f.table());
                Ok(Vec::new())
            }
            Err(e) => Err(e.during("read_failed")),
        }
    }

    /// Insert with a unique slug derived from the name; founders given in the body are
    /// inserted in the same transaction.
    pub async fn create(db: &Db, body: &Body) -> Result<Created, AppError> {
        let missing: Vec<&'static str> = REQUIRED
            .iter()
            .copied()
            .filter(|k| text(body, &[*k]).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(AppError::missing("missing_required", missing));
        }
        let name = text(body, &["name"]).unwrap_or_default();
        let founders = founders_from(body);

        let l = StartupLayout::resolve(&db.schema, &db.config.startups).await?;
        let sector = l.cols.needed(l.sector.as_ref(), "sector")?;
        let stage = l.cols.needed(l.stage.as_ref(), "stage")?;
        let legal = l.cols.needed(l.legal_status.as_ref(), "legal_status")?;
        let founder_layout = if founders.is_empty() {
            None
        } else {
            let f = FounderLayout::resolve(&db.schema, &db.config.founders).await?;
            if f.is_none() {
                tracing::warn!(count = founders.len(), "founders given but no usable founders table");
            }
            f
        };

        let build = |slug: Option<&str>| {
            let mut ins = Insert::into(l.table())
                .value(&l.name, name.as_str())
                .value(sector, text(body, &["sector"]).unwrap_or_default())
                .value(stage, text(body, &["stage"]).unwrap_or_default())
                .value(legal, text(body, &["legal_status"]).unwrap_or_default())
                .value_opt(l.location.as_ref(), text(body, &["location"]).unwrap_or_default())
                .value_opt(l.website_url.as_ref(), text(body, &["website_url"]).unwrap_or_default())
                .value_opt(
                    l.social_media_url.as_ref(),
                    text(body, &["social_media_url"]).unwrap_or_default(),
                )
                .value_opt(
                    l.contact_email.as_ref(),
                    text(body, &["email", "contact_email"]).unwrap_or_default(),
                )
                .value_opt(l.phone.as_ref(), text(body, &["phone"]).unwrap_or_default())
                .now(l.join_date.as_ref())
                .returning(&l.id, "id");
            if let (Some(col), Some(slug)) = (&l.slug, slug) {
                ins = ins.value(col, slug).returning(col, "slug");
            }
            if let (Some(col), Some(v)) = (&l.needs, pick(body, &["needs"])) {
                ins = ins.value(col, list_for(col, v));
            }
            if let (Some(col), Some(v)) = (&l.logo, text(body, &["logo_base64", "logo"])) {
                ins = ins.value(col, v);
            }
            if let (Some(col), Some(v)) = (&l.status, text(body, &["status"])) {
                ins = ins.value(col, v);
            }
            if let (Some(col), Some(v)) = (l.short_description.first(), text(body, &["description", "short_description"])) {
                ins = ins.value(col, v);
            }
            if let (Some(col), Some(v)) = (
                l.long_description.first(),
                text(body, &["description_longue", "long_description"]),
            ) {
                ins = ins.value(col, v);
            }
            ins.build()
        };
        let slug = l.slug.as_ref().map(|column| SlugTarget {
            column,
            base: base_slug(&name, "startup"),
        });

        let mut conn = db
            .deadline
            .run(db.pool.acquire())
            .await
            .map_err(AppError::context("create_failed"))?;
        let row = match founder_layout {
            None => exec::insert_recovering(&mut conn, &db.deadline, l.table(), &l.id, slug, build)
                .await
                .map_err(AppError::context("create_failed"))?,
            Some(f) => {
                let mut tx = db
                    .deadline
                    .run(conn.begin())
                    .await
                    .map_err(AppError::context("create_failed"))?;
                let row = exec::insert_recovering(&mut tx, &db.deadline, l.table(), &l.id, slug, build)
                    .await
                    .map_err(AppError::context("create_failed"))?;
                Self::insert_founders(&mut tx, db, &f, mapper::field(&row, "id"), &founders)
                    .await
                    .map_err(AppError::context("create_failed"))?;
                db.deadline
                    .run(tx.commit())
                    .await
                    .map_err(AppError::context("create_failed"))?;
                row
            }
        };
        tracing::info!(table = %l.table(), id = %mapper::field(&row, "id"), "startup created");
        Ok(Created {
            id: mapper::field(&row, "id").clone(),
            slug: mapper::as_text(mapper::field(&row, "slug")),
        })
    }

    async fn insert_founders(
        conn: &mut PgConnection,
        db: &Db,
        f: &FounderLayout,
        startup_id: &Value,
        founders: &[NewFounder],
    ) -> Result<(), AppError> {
        for founder in founders {
            let q = Insert::into(f.table())
                .value(&f.startup_fk, bind_for(&f.startup_fk, startup_id))
                .value(&f.name, founder.name.as_str())
                .value_opt(f.role.as_ref(), PgBindValue::opt_text(founder.role.clone()))
                .value_opt(f.email.as_ref(), PgBindValue::opt_text(founder.email.clone()))
                .build();
            exec::execute(&mut *conn, &db.deadline, &q).await?;
        }
        Ok(())
    }

    /// Partial update; the slug never changes.
    pub async fn update(db: &Db, id: &RecordId, body: &Body) -> Result<Value, AppError> {
        if !mentions(body, UPDATABLE) {
            return Err(AppError::NothingToUpdate);
        }
        let l = StartupLayout::resolve(&db.schema, &db.config.startups).await?;
        let plain = [
            ("name", Some(&l.name)),
            ("sector", l.sector.as_ref()),
            ("stage", l.stage.as_ref()),
            ("location", l.location.as_ref()),
            ("website_url", l.website_url.as_ref()),
            ("social_media_url", l.social_media_url.as_ref()),
            ("phone", l.phone.as_ref()),
            ("legal_status", l.legal_status.as_ref()),
            ("status", l.status.as_ref()),
        ];
        let mut upd = Update::table(l.table());
        for (key, col) in plain {
            if let (Some(col), Some(v)) = (col, body.get(key)) {
                upd = upd.set(col, bind_for(col, v));
            }
        }
        let synonyms = [
            (&["email", "contact_email"][..], l.contact_email.as_ref()),
            (&["logo_base64", "logo"][..], l.logo.as_ref()),
            (&["description", "short_description"][..], l.short_description.first()),
            (&["description_longue", "long_description"][..], l.long_description.first()),
        ];
        for (keys, col) in synonyms {
            if let (Some(col), Some(v)) = (col, pick(body, keys)) {
                upd = upd.set(col, bind_for(col, v));
            }
        }
        if let (Some(col), Some(v)) = (&l.needs, body.get("needs")) {
            upd = upd.set(col, list_for(col, v));
        }
        let q = upd.returning(&l.id, "id").build(&l.id, id)?;
        let row = exec::fetch_optional(&db.pool, &db.deadline, &q)
            .await
            .map_err(AppError::context("update_failed"))?
            .ok_or(AppError::NotFound)?;
        Ok(mapper::field(&row, "id").clone())
    }

    /// Founders first, then the startup, in one transaction. A missing founders table is
    /// not an error; anything else rolls the whole delete back.
    pub async fn delete(db: &Db, id: &RecordId) -> Result<(), AppError> {
        let l = StartupLayout::resolve(&db.schema, &db.config.startups).await?;
        let founders = FounderLayout::resolve(&db.schema, &db.config.founders).await?;
        let ctx = AppError::context("delete_failed");

        let mut tx = db.deadline.run(db.pool.begin()).await.map_err(&ctx)?;
        if let Some(f) = &founders {
            let q = delete_dependents(f.table(), &f.startup_fk, l.table(), &l.id, id);
            let mut sp = db.deadline.run(tx.begin()).await.map_err(&ctx)?;
            match exec::execute(&mut *sp, &db.deadline, &q).await {
                Ok(n) => {
                    db.deadline.run(sp.commit()).await.map_err(&ctx)?;
                    tracing::debug!(founders = n, "founders deleted");
                }
                Err(e) if e.sql_state().as_deref() == Some(UNDEFINED_TABLE) => {
                    db.deadline.run(sp.rollback()).await.map_err(&ctx)?;
                    db.schema.cache().invalidate(f.table());
                }
                Err(e) => return Err(ctx(e)),
            }
        }
        let deleted = exec::fetch_optional(&mut *tx, &db.deadline, &delete_by_id(l.table(), &l.id, id))
            .await
            .map_err(&ctx)?;
        if deleted.is_none() {
            db.deadline.run(tx.rollback()).await.map_err(&ctx)?;
            return Err(AppError::NotFound);
        }
        db.deadline.run(tx.commit()).await.map_err(&ctx)?;
        tracing::info!(table = %l.table(), %id, "startup deleted");
        Ok(())
    }

    /// Atomic view counter bump. `views` is `None` when the table has no views column.
    pub async fn increment_views(db: &Db, id: &RecordId) -> Result<ViewCount, AppError> {
        let l = StartupLayout::resolve(&db.schema, &db.config.startups).await?;
        let Some(views) = &l.views else {
            let q = Select::from(l.table())
                .field(&l.id, "id")
                .filter_id(&l.id, id)
                .page(1, 0)
                .build();
            let row = exec::fetch_optional(&db.pool, &db.deadline, &q)
                .await?
                .ok_or(AppError::NotFound)?;
            return Ok(ViewCount {
                id: mapper::field(&row, "id").clone(),
                views: None,
            });
        };
        let row = exec::fetch_optional(
            &db.pool,
            &db.deadline,
            &increment(l.table(), &l.id, id, views, None),
        )
        .await?
        .ok_or(AppError::NotFound)?;
        Ok(ViewCount {
            id: mapper::field(&row, "id").clone(),
            views: mapper::as_opt_count(mapper::field(&row, "count")),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn founders_need_a_name() {
        let body = json!({"founders": [
            {"name": "Ada", "role": "CEO"},
            {"full_name": "Grace", "email": "g@example.com"},
            {"role": "CTO"},
            "not an object"
        ]});
        let founders = founders_from(body.as_object().unwrap());
        let names: Vec<_> = founders.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["Ada", "Grace"]);
        assert_eq!(founders[0].role.as_deref(), Some("CEO"));
        assert_eq!(founders[1].email.as_deref(), Some("g@example.com"));
    }

    #[test]
    fn numbered_aliases() {
        assert_eq!(numbered("long", 2), ["long_0", "long_1"]);
        assert!(numbered("short", 0).is_empty());
    }
}
