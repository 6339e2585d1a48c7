use axum::{extract::State, http::StatusCode, routing::get, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use tracing::instrument;
use uuid::Uuid;

use crate::audit::AuditResource;
use crate::auth::{AuthUser, RequestMeta};
use crate::error::{ApiError, ApiResult};
use crate::extract::{Json, Path, Query};
use crate::pagination::{Paginated, Pagination};
use crate::slug;
use crate::state::AppState;
use crate::users::Role;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Tag {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Deserialize)]
pub struct CreateTagRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTagRequest {
    pub name: Option<String>,
}

impl Tag {
    pub async fn find_by_slug(db: &PgPool, slug: &str) -> sqlx::Result<Option<Tag>> {
        sqlx::query_as::<_, Tag>("SELECT id, name, slug, created_at FROM tags WHERE slug = $1")
            .bind(slug)
            .fetch_optional(db)
            .await
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> sqlx::Result<Option<Tag>> {
        sqlx::query_as::<_, Tag>("SELECT id, name, slug, created_at FROM tags WHERE id = $1")
            .bind(id)
            .fetch_optional(db)
            .await
    }

    pub async fn slug_exists(db: &PgPool, slug: &str) -> sqlx::Result<bool> {
        let row: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM tags WHERE slug = $1")
            .bind(slug)
            .fetch_optional(db)
            .await?;
        Ok(row.is_some())
    }

    pub async fn create(db: &PgPool, name: &str, slug: &str) -> sqlx::Result<Tag> {
        sqlx::query_as::<_, Tag>(
            "INSERT INTO tags (name, slug) VALUES ($1, $2) \
             RETURNING id, name, slug, created_at",
        )
        .bind(name)
        .bind(slug)
        .fetch_one(db)
        .await
    }

    pub async fn list(
        db: &PgPool,
        limit: i64,
        offset: i64,
        search: Option<&str>,
    ) -> sqlx::Result<Vec<Tag>> {
        sqlx::query_as::<_, Tag>(
            "SELECT id, name, slug, created_at FROM tags \
             WHERE ($3::text IS NULL OR name ILIKE '%' || $3 || '%') \
             ORDER BY name LIMIT $1 OFFSET $2",
        )
        .bind(limit)
        .bind(offset)
        .bind(search)
        .fetch_all(db)
        .await
    }

    pub async fn count(db: &PgPool, search: Option<&str>) -> sqlx::Result<i64> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM tags WHERE ($1::text IS NULL OR name ILIKE '%' || $1 || '%')",
        )
        .bind(search)
        .fetch_one(db)
        .await?;
        Ok(count)
    }

    pub async fn update(db: &PgPool, id: Uuid, name: Option<&str>) -> sqlx::Result<Tag> {
        sqlx::query_as::<_, Tag>(
            "UPDATE tags SET name = COALESCE($2, name) WHERE id = $1 \
             RETURNING id, name, slug, created_at",
        )
        .bind(id)
        .bind(name)
        .fetch_one(db)
        .await
    }

    pub async fn delete(db: &PgPool, id: Uuid) -> sqlx::Result<u64> {
        let result = sqlx::query("DELETE FROM tags WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
        Ok(result.rows_affected())
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/tags", get(list_tags).post(create_tag))
        .route("/tags/:slug", get(get_tag).put(update_tag).delete(delete_tag))
}

#[instrument(skip(state))]
async fn list_tags(
    State(state): State<AppState>,
    Query(p): Query<Pagination>,
) -> ApiResult<Json<Paginated<Tag>>> {
    let (page, limit) = p.clamped();
    let search = p.search.as_deref();
    let total = Tag::count(&state.db, search).await?;
    let data = Tag::list(&state.db, limit, p.offset(), search).await?;
    Ok(Json(Paginated::new(data, page, limit, total)))
}

#[instrument(skip(state))]
async fn get_tag(
    State(state): State<AppState>,
    Path(tag_slug): Path<String>,
) -> ApiResult<Json<Tag>> {
    let tag = Tag::find_by_slug(&state.db, &tag_slug)
        .await?
        .ok_or_else(|| ApiError::not_found("Tag"))?;
    Ok(Json(tag))
}

#[instrument(skip(state, auth, meta, payload))]
async fn create_tag(
    State(state): State<AppState>,
    auth: AuthUser,
    meta: RequestMeta,
    Json(payload): Json<CreateTagRequest>,
) -> ApiResult<(StatusCode, Json<Tag>)> {
    auth.require(Role::Editor)?;
    if payload.name.trim().is_empty() {
        return Err(ApiError::field("name", "Name is required"));
    }

    let mut tag_slug = slug::slugify(&payload.name);
    if tag_slug.is_empty() {
        tag_slug = slug::with_suffix("tag");
    } else if Tag::slug_exists(&state.db, &tag_slug).await? {
        tag_slug = slug::with_suffix(&tag_slug);
    }

    let tag = Tag::create(&state.db, payload.name.trim(), &tag_slug).await?;

    state
        .audit
        .log_create(
            AuditResource::Tag,
            &tag.id.to_string(),
            Some(auth.0.sub),
            Some(json!({ "name": &tag.name })),
            &meta,
        )
        .await;

    Ok((StatusCode::CREATED, Json(tag)))
}

#[instrument(skip(state, auth, meta, payload))]
async fn update_tag(
    State(state): State<AppState>,
    auth: AuthUser,
    meta: RequestMeta,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateTagRequest>,
) -> ApiResult<Json<Tag>> {
    auth.require(Role::Editor)?;
    if Tag::find_by_id(&state.db, id).await?.is_none() {
        return Err(ApiError::not_found("Tag"));
    }

    let tag = Tag::update(&state.db, id, payload.name.as_deref()).await?;

    state
        .audit
        .log_update(
            AuditResource::Tag,
            &id.to_string(),
            Some(auth.0.sub),
            Some(json!({ "name": &tag.name })),
            &meta,
        )
        .await;

    Ok(Json(tag))
}

#[instrument(skip(state, auth, meta))]
async fn delete_tag(
    State(state): State<AppState>,
    auth: AuthUser,
    meta: RequestMeta,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    auth.require(Role::Editor)?;
    let deleted = Tag::delete(&state.db, id).await?;
    if deleted == 0 {
        return Err(ApiError::not_found("Tag"));
    }

    state
        .audit
        .log_delete(AuditResource::Tag, &id.to_string(), Some(auth.0.sub), None, &meta)
        .await;

    Ok(StatusCode::NO_CONTENT)
}
