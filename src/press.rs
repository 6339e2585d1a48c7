use axum::{extract::State, http::StatusCode, routing::get, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::audit::AuditResource;
use crate::auth::{AuthUser, RequestMeta};
use crate::error::{ApiError, ApiResult};
use crate::extract::{Json, Path, Query};
use crate::pagination::{Paginated, Pagination};
use crate::slug;
use crate::state::AppState;
use crate::users::Role;

const PRESS_COLUMNS: &str = "id, title, slug, content, published_at, created_at, updated_at";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PressRelease {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub content: String,
    #[serde(with = "time::serde::rfc3339::option")]
    pub published_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Deserialize)]
pub struct CreatePressRequest {
    pub title: String,
    pub content: String,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub published_at: Option<OffsetDateTime>,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePressRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub published_at: Option<OffsetDateTime>,
}

impl PressRelease {
    pub async fn find_by_slug(db: &PgPool, slug: &str) -> sqlx::Result<Option<PressRelease>> {
        sqlx::query_as::<_, PressRelease>(&format!(
            "SELECT {PRESS_COLUMNS} FROM press_releases WHERE slug = $1"
        ))
        .bind(slug)
        .fetch_optional(db)
        .await
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> sqlx::Result<Option<PressRelease>> {
        sqlx::query_as::<_, PressRelease>(&format!(
            "SELECT {PRESS_COLUMNS} FROM press_releases WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(db)
        .await
    }

    pub async fn slug_exists(db: &PgPool, slug: &str) -> sqlx::Result<bool> {
        let row: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM press_releases WHERE slug = $1")
            .bind(slug)
            .fetch_optional(db)
            .await?;
        Ok(row.is_some())
    }

    pub async fn create(
        db: &PgPool,
        title: &str,
        slug: &str,
        content: &str,
        published_at: Option<OffsetDateTime>,
    ) -> sqlx::Result<PressRelease> {
        sqlx::query_as::<_, PressRelease>(&format!(
            "INSERT INTO press_releases (title, slug, content, published_at) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {PRESS_COLUMNS}"
        ))
        .bind(title)
        .bind(slug)
        .bind(content)
        .bind(published_at)
        .fetch_one(db)
        .await
    }

    pub async fn list(
        db: &PgPool,
        limit: i64,
        offset: i64,
        search: Option<&str>,
    ) -> sqlx::Result<Vec<PressRelease>> {
        sqlx::query_as::<_, PressRelease>(&format!(
            "SELECT {PRESS_COLUMNS} FROM press_releases \
             WHERE ($3::text IS NULL OR title ILIKE '%' || $3 || '%' \
                    OR content ILIKE '%' || $3 || '%') \
             ORDER BY created_at DESC LIMIT $1 OFFSET $2"
        ))
        .bind(limit)
        .bind(offset)
        .bind(search)
        .fetch_all(db)
        .await
    }

    pub async fn count(db: &PgPool, search: Option<&str>) -> sqlx::Result<i64> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM press_releases \
             WHERE ($1::text IS NULL OR title ILIKE '%' || $1 || '%' \
                    OR content ILIKE '%' || $1 || '%')",
        )
        .bind(search)
        .fetch_one(db)
        .await?;
        Ok(count)
    }

    pub async fn update(
        db: &PgPool,
        id: Uuid,
        changes: &UpdatePressRequest,
    ) -> sqlx::Result<PressRelease> {
        sqlx::query_as::<_, PressRelease>(&format!(
            "UPDATE press_releases SET \
               title = COALESCE($2, title), \
               content = COALESCE($3, content), \
               published_at = COALESCE($4, published_at), \
               updated_at = now() \
             WHERE id = $1 \
             RETURNING {PRESS_COLUMNS}"
        ))
        .bind(id)
        .bind(changes.title.as_deref())
        .bind(changes.content.as_deref())
        .bind(changes.published_at)
        .fetch_one(db)
        .await
    }

    pub async fn delete(db: &PgPool, id: Uuid) -> sqlx::Result<u64> {
        let result = sqlx::query("DELETE FROM press_releases WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
        Ok(result.rows_affected())
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/press", get(list_releases).post(create_release))
        .route(
            "/press/:slug",
            get(get_release).put(update_release).delete(delete_release),
        )
}

#[instrument(skip(state))]
async fn list_releases(
    State(state): State<AppState>,
    Query(p): Query<Pagination>,
) -> ApiResult<Json<Paginated<PressRelease>>> {
    let (page, limit) = p.clamped();
    let search = p.search.as_deref();
    let total = PressRelease::count(&state.db, search).await?;
    let data = PressRelease::list(&state.db, limit, p.offset(), search).await?;
    Ok(Json(Paginated::new(data, page, limit, total)))
}

#[instrument(skip(state))]
async fn get_release(
    State(state): State<AppState>,
    Path(press_slug): Path<String>,
) -> ApiResult<Json<PressRelease>> {
    let release = PressRelease::find_by_slug(&state.db, &press_slug)
        .await?
        .ok_or_else(|| ApiError::not_found("Press release"))?;
    Ok(Json(release))
}

#[instrument(skip(state, auth, meta, payload))]
async fn create_release(
    State(state): State<AppState>,
    auth: AuthUser,
    meta: RequestMeta,
    Json(payload): Json<CreatePressRequest>,
) -> ApiResult<(StatusCode, Json<PressRelease>)> {
    auth.require(Role::Editor)?;
    if payload.title.trim().is_empty() {
        return Err(ApiError::field("title", "Title is required"));
    }
    if payload.content.trim().is_empty() {
        return Err(ApiError::field("content", "Content is required"));
    }

    let mut press_slug = slug::slugify(&payload.title);
    if press_slug.is_empty() {
        press_slug = slug::with_suffix("press");
    } else if PressRelease::slug_exists(&state.db, &press_slug).await? {
        press_slug = slug::with_suffix(&press_slug);
    }

    let release = PressRelease::create(
        &state.db,
        payload.title.trim(),
        &press_slug,
        &payload.content,
        payload.published_at,
    )
    .await?;

    state
        .audit
        .log_create(
            AuditResource::Press,
            &release.id.to_string(),
            Some(auth.0.sub),
            Some(json!({ "title": &release.title, "slug": &release.slug })),
            &meta,
        )
        .await;

    info!(release_id = %release.id, "press release created");
    Ok((StatusCode::CREATED, Json(release)))
}

#[instrument(skip(state, auth, meta, payload))]
async fn update_release(
    State(state): State<AppState>,
    auth: AuthUser,
    meta: RequestMeta,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdatePressRequest>,
) -> ApiResult<Json<PressRelease>> {
    auth.require(Role::Editor)?;
    if PressRelease::find_by_id(&state.db, id).await?.is_none() {
        return Err(ApiError::not_found("Press release"));
    }

    let release = PressRelease::update(&state.db, id, &payload).await?;

    state
        .audit
        .log_update(
            AuditResource::Press,
            &id.to_string(),
            Some(auth.0.sub),
            Some(json!({ "title": &release.title })),
            &meta,
        )
        .await;

    Ok(Json(release))
}

#[instrument(skip(state, auth, meta))]
async fn delete_release(
    State(state): State<AppState>,
    auth: AuthUser,
    meta: RequestMeta,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    auth.require(Role::Editor)?;
    let deleted = PressRelease::delete(&state.db, id).await?;
    if deleted == 0 {
        return Err(ApiError::not_found("Press release"));
    }

    state
        .audit
        .log_delete(AuditResource::Press, &id.to_string(), Some(auth.0.sub), None, &meta)
        .await;

    Ok(StatusCode::NO_CONTENT)
}
