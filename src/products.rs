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

const PRODUCT_COLUMNS: &str = "id, name, slug, description, price_cents, sku, created_at, updated_at";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub price_cents: i64,
    pub sku: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    pub description: Option<String>,
    pub price_cents: i64,
    pub sku: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price_cents: Option<i64>,
    pub sku: Option<String>,
}

impl Product {
    pub async fn find_by_slug(db: &PgPool, slug: &str) -> sqlx::Result<Option<Product>> {
        sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE slug = $1"
        ))
        .bind(slug)
        .fetch_optional(db)
        .await
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> sqlx::Result<Option<Product>> {
        sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(db)
        .await
    }

    pub async fn slug_exists(db: &PgPool, slug: &str) -> sqlx::Result<bool> {
        let row: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM products WHERE slug = $1")
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
        price_cents: i64,
        sku: Option<&str>,
    ) -> sqlx::Result<Product> {
        sqlx::query_as::<_, Product>(&format!(
            "INSERT INTO products (name, slug, description, price_cents, sku) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(name)
        .bind(slug)
        .bind(description)
        .bind(price_cents)
        .bind(sku)
        .fetch_one(db)
        .await
    }

    pub async fn list(
        db: &PgPool,
        limit: i64,
        offset: i64,
        search: Option<&str>,
    ) -> sqlx::Result<Vec<Product>> {
        sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products \
             WHERE ($3::text IS NULL OR name ILIKE '%' || $3 || '%' \
                    OR sku ILIKE '%' || $3 || '%') \
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
            "SELECT COUNT(*) FROM products \
             WHERE ($1::text IS NULL OR name ILIKE '%' || $1 || '%' \
                    OR sku ILIKE '%' || $1 || '%')",
        )
        .bind(search)
        .fetch_one(db)
        .await?;
        Ok(count)
    }

    pub async fn update(
        db: &PgPool,
        id: Uuid,
        changes: &UpdateProductRequest,
    ) -> sqlx::Result<Product> {
        sqlx::query_as::<_, Product>(&format!(
            "UPDATE products SET \
               name = COALESCE($2, name), \
               description = COALESCE($3, description), \
               price_cents = COALESCE($4, price_cents), \
               sku = COALESCE($5, sku), \
               updated_at = now() \
             WHERE id = $1 \
             RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(id)
        .bind(changes.name.as_deref())
        .bind(changes.description.as_deref())
        .bind(changes.price_cents)
        .bind(changes.sku.as_deref())
        .fetch_one(db)
        .await
    }

    pub async fn delete(db: &PgPool, id: Uuid) -> sqlx::Result<u64> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
        Ok(result.rows_affected())
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/products", get(list_products).post(create_product))
        .route(
            "/products/:slug",
            get(get_product).put(update_product).delete(delete_product),
        )
}

#[instrument(skip(state))]
async fn list_products(
    State(state): State<AppState>,
    Query(p): Query<Pagination>,
) -> ApiResult<Json<Paginated<Product>>> {
    let (page, limit) = p.clamped();
    let search = p.search.as_deref();
    let total = Product::count(&state.db, search).await?;
    let data = Product::list(&state.db, limit, p.offset(), search).await?;
    Ok(Json(Paginated::new(data, page, limit, total)))
}

#[instrument(skip(state))]
async fn get_product(
    State(state): State<AppState>,
    Path(product_slug): Path<String>,
) -> ApiResult<Json<Product>> {
    let product = Product::find_by_slug(&state.db, &product_slug)
        .await?
        .ok_or_else(|| ApiError::not_found("Product"))?;
    Ok(Json(product))
}

#[instrument(skip(state, auth, meta, payload))]
async fn create_product(
    State(state): State<AppState>,
    auth: AuthUser,
    meta: RequestMeta,
    Json(payload): Json<CreateProductRequest>,
) -> ApiResult<(StatusCode, Json<Product>)> {
    auth.require(Role::Editor)?;
    if payload.name.trim().is_empty() {
        return Err(ApiError::field("name", "Name is required"));
    }
    if payload.price_cents < 0 {
        return Err(ApiError::field("price_cents", "Price must not be negative"));
    }

    let mut product_slug = slug::slugify(&payload.name);
    if product_slug.is_empty() {
        product_slug = slug::with_suffix("product");
    } else if Product::slug_exists(&state.db, &product_slug).await? {
        product_slug = slug::with_suffix(&product_slug);
    }

    let product = Product::create(
        &state.db,
        payload.name.trim(),
        &product_slug,
        payload.description.as_deref(),
        payload.price_cents,
        payload.sku.as_deref(),
    )
    .await?;

    state
        .audit
        .log_create(
            AuditResource::Product,
            &product.id.to_string(),
            Some(auth.0.sub),
            Some(json!({ "name": &product.name, "price_cents": product.price_cents })),
            &meta,
        )
        .await;

    info!(product_id = %product.id, "product created");
    Ok((StatusCode::CREATED, Json(product)))
}

#[instrument(skip(state, auth, meta, payload))]
async fn update_product(
    State(state): State<AppState>,
    auth: AuthUser,
    meta: RequestMeta,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateProductRequest>,
) -> ApiResult<Json<Product>> {
    auth.require(Role::Editor)?;
    if let Some(price) = payload.price_cents {
        if price < 0 {
            return Err(ApiError::field("price_cents", "Price must not be negative"));
        }
    }
    if Product::find_by_id(&state.db, id).await?.is_none() {
        return Err(ApiError::not_found("Product"));
    }

    let product = Product::update(&state.db, id, &payload).await?;

    state
        .audit
        .log_update(
            AuditResource::Product,
            &id.to_string(),
            Some(auth.0.sub),
            Some(json!({ "name": &product.name, "price_cents": product.price_cents })),
            &meta,
        )
        .await;

    Ok(Json(product))
}

#[instrument(skip(state, auth, meta))]
async fn delete_product(
    State(state): State<AppState>,
    auth: AuthUser,
    meta: RequestMeta,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    auth.require(Role::Editor)?;
    let deleted = Product::delete(&state.db, id).await?;
    if deleted == 0 {
        return Err(ApiError::not_found("Product"));
    }

    state
        .audit
        .log_delete(AuditResource::Product, &id.to_string(), Some(auth.0.sub), None, &meta)
        .await;

    Ok(StatusCode::NO_CONTENT)
}
