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

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Deserialize)]
pub struct CreateCategoryRequest {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCategoryRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

impl Category {
    pub async fn find_by_slug(db: &PgPool, slug: &str) -> sqlx::Result<Option<Category>> {
        sqlx::query_as::<_, Category>(
            "SELECT id, name, slug, description, created_at FROM categories WHERE slug = $1",
        )
        .bind(slug)
        .fetch_optional(db)
        .await
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> sqlx::Result<Option<Category>> {
        sqlx::query_as::<_, Category>(
            "SELECT id, name, slug, description, created_at FROM categories WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(db)
        .await
    }

    pub async fn slug_exists(db: &PgPool, slug: &str) -> sqlx::Result<bool> {
        let row: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM categories WHERE slug = $1")
            .bind(slug)
            .fetch_optional(db)
            .await?;
        Ok(row.is_some())
    }

    pub async fn create(
        db: &PgPool,
        name: &str,
        slug: &str,
        description: Option<&str>,
    ) -> sqlx::Result<Category> {
        sqlx::query_as::<_, Category>(
            "INSERT INTO categories (name, slug, description) VALUES ($1, $2, $3) \
             RETURNING id, name, slug, description, created_at",
        )
        .bind(name)
        .bind(slug)
        .bind(description)
        .fetch_one(db)
        .await
    }

    pub async fn list(
        db: &PgPool,
        limit: i64,
        offset: i64,
        search: Option<&str>,
    ) -> sqlx::Result<Vec<Category>> {
        sqlx::query_as::<_, Category>(
            "SELECT id, name, slug, description, created_at FROM categories \
             WHERE ($3::text IS NULL OR name ILIKE '%' || $3 || '%') \
             ORDER BY created_at DESC LIMIT $1 OFFSET $2",
        )
        .bind(limit)
        .bind(offset)
        .bind(search)
        .fetch_all(db)
        .await
    }

    pub async fn count(db: &PgPool, search: Option<&str>) -> sqlx::Result<i64> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM categories \
             WHERE ($1::text IS NULL OR name ILIKE '%' || $1 || '%')",
        )
        .bind(search)
        .fetch_one(db)
        .await?;
        Ok(count)
    }

    pub async fn update(
        db: &PgPool,
        id: Uuid,
        name: Option<&str>,
        description: Option<&str>,
    ) -> sqlx::Result<Category> {
        sqlx::query_as::<_, Category>(
            "UPDATE categories SET \
               name = COALESCE($2, name), \
               description = COALESCE($3, description) \
             WHERE id = $1 \
             RETURNING id, name, slug, description, created_at",
        )
        .bind(id)
        .bind(name)
        .bind(description)
        .fetch_one(db)
        .await
    }

    pub async fn delete(db: &PgPool, id: Uuid) -> sqlx::Result<u64> {
        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
        Ok(result.rows_affected())
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/categories", get(list_categories).post(create_category))
        .route(
            "/categories/:slug",
            get(get_category).put(update_category).delete(delete_category),
        )
}

#[instrument(skip(state))]
async fn list_categories(
    State(state): State<AppState>,
    Query(p): Query<Pagination>,
) -> ApiResult<Json<Paginated<Category>>> {
    let (page, limit) = p.clamped();
    let search = p.search.as_deref();
    let total = Category::count(&state.db, search).await?;
    let data = Category::list(&state.db, limit, p.offset(), search).await?;
    Ok(Json(Paginated::new(data, page, limit, total)))
}

#[instrument(skip(state))]
async fn get_category(
    State(state): State<AppState>,
    Path(category_slug): Path<String>,
) -> ApiResult<Json<Category>> {
    let category = Category::find_by_slug(&state.db, &category_slug)
        .await?
        .ok_or_else(|| ApiError::not_found("Category"))?;
    Ok(Json(category))
}

#[instrument(skip(state, auth, meta, payload))]
async fn create_category(
    State(state): State<AppState>,
    auth: AuthUser,
    meta: RequestMeta,
    Json(payload): Json<CreateCategoryRequest>,
) -> ApiResult<(StatusCode, Json<Category>)> {
    auth.require(Role::Editor)?;
    if payload.name.trim().is_empty() {
        return Err(ApiError::field("name", "Name is required"));
    }

    let mut category_slug = slug::slugify(&payload.name);
    if category_slug.is_empty() {
        category_slug = slug::with_suffix("category");
    } else if Category::slug_exists(&state.db, &category_slug).await? {
        category_slug = slug::with_suffix(&category_slug);
    }

    let category = Category::create(
        &state.db,
        payload.name.trim(),
        &category_slug,
        payload.description.as_deref(),
    )
    .await?;

    state
        .audit
        .log_create(
            AuditResource::Category,
            &category.id.to_string(),
            Some(auth.0.sub),
            Some(json!({ "name": &category.name })),
            &meta,
        )
        .await;

    info!(category_id = %category.id, "category created");
    Ok((StatusCode::CREATED, Json(category)))
}

#[instrument(skip(state, auth, meta, payload))]
async fn update_category(
    State(state): State<AppState>,
    auth: AuthUser,
    meta: RequestMeta,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateCategoryRequest>,
) -> ApiResult<Json<Category>> {
    auth.require(Role::Editor)?;
    if Category::find_by_id(&state.db, id).await?.is_none() {
        return Err(ApiError::not_found("Category"));
    }

    let category = Category::update(
        &state.db,
        id,
        payload.name.as_deref(),
        payload.description.as_deref(),
    )
    .await?;

    state
        .audit
        .log_update(
            AuditResource::Category,
            &id.to_string(),
            Some(auth.0.sub),
            Some(json!({ "name": &category.name })),
            &meta,
        )
        .await;

    Ok(Json(category))
}

#[instrument(skip(state, auth, meta))]
async fn delete_category(
    State(state): State<AppState>,
    auth: AuthUser,
    meta: RequestMeta,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    auth.require(Role::Editor)?;
    let deleted = Category::delete(&state.db, id).await?;
    if deleted == 0 {
        return Err(ApiError::not_found("Category"));
    }

    state
        .audit
        .log_delete(AuditResource::Category, &id.to_string(), Some(auth.0.sub), None, &meta)
        .await;

    Ok(StatusCode::NO_CONTENT)
}
