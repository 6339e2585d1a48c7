use axum::{extract::State, http::StatusCode, routing::get, Router};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use tracing::instrument;
use uuid::Uuid;

use crate::audit::AuditResource;
use crate::auth::handlers::is_valid_email;
use crate::auth::{AuthUser, RequestMeta};
use crate::error::{ApiError, ApiResult};
use crate::extract::{Json, Path, Query};
use crate::pagination::{Paginated, Pagination};
use crate::state::AppState;
use crate::users::Role;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ContactSubmission {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub subject: Option<String>,
    pub message: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Deserialize)]
pub struct CreateContactRequest {
    pub name: String,
    pub email: String,
    pub subject: Option<String>,
    pub message: String,
}

impl ContactSubmission {
    pub async fn find_by_id(db: &PgPool, id: Uuid) -> sqlx::Result<Option<ContactSubmission>> {
        sqlx::query_as::<_, ContactSubmission>(
            "SELECT id, name, email, subject, message, created_at \
             FROM contact_submissions WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(db)
        .await
    }

    pub async fn create(db: &PgPool, new: &CreateContactRequest) -> sqlx::Result<ContactSubmission> {
        sqlx::query_as::<_, ContactSubmission>(
            "INSERT INTO contact_submissions (name, email, subject, message) \
             VALUES ($1, $2, $3, $4) \
             RETURNING id, name, email, subject, message, created_at",
        )
        .bind(new.name.trim())
        .bind(new.email.trim())
        .bind(new.subject.as_deref())
        .bind(new.message.trim())
        .fetch_one(db)
        .await
    }

    pub async fn list(
        db: &PgPool,
        limit: i64,
        offset: i64,
        search: Option<&str>,
    ) -> sqlx::Result<Vec<ContactSubmission>> {
        sqlx::query_as::<_, ContactSubmission>(
            "SELECT id, name, email, subject, message, created_at \
             FROM contact_submissions \
             WHERE ($3::text IS NULL OR name ILIKE '%' || $3 || '%' \
                    OR email ILIKE '%' || $3 || '%' OR subject ILIKE '%' || $3 || '%') \
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
            "SELECT COUNT(*) FROM contact_submissions \
             WHERE ($1::text IS NULL OR name ILIKE '%' || $1 || '%' \
                    OR email ILIKE '%' || $1 || '%' OR subject ILIKE '%' || $1 || '%')",
        )
        .bind(search)
        .fetch_one(db)
        .await?;
        Ok(count)
    }

    pub async fn delete(db: &PgPool, id: Uuid) -> sqlx::Result<u64> {
        let result = sqlx::query("DELETE FROM contact_submissions WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
        Ok(result.rows_affected())
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/contact", get(list_submissions).post(create_submission))
        .route(
            "/contact/:id",
            get(get_submission).delete(delete_submission),
        )
}

#[instrument(skip(state, auth, meta))]
async fn list_submissions(
    State(state): State<AppState>,
    auth: AuthUser,
    meta: RequestMeta,
    Query(p): Query<Pagination>,
) -> ApiResult<Json<Paginated<ContactSubmission>>> {
    auth.require(Role::Admin)?;

    let (page, limit) = p.clamped();
    let search = p.search.as_deref();
    let total = ContactSubmission::count(&state.db, search).await?;
    let data = ContactSubmission::list(&state.db, limit, p.offset(), search).await?;

    state
        .audit
        .log_read(AuditResource::Contact, "*", Some(auth.0.sub), &meta)
        .await;

    Ok(Json(Paginated::new(data, page, limit, total)))
}

#[instrument(skip(state, auth))]
async fn get_submission(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ContactSubmission>> {
    auth.require(Role::Admin)?;
    let submission = ContactSubmission::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Contact submission"))?;
    Ok(Json(submission))
}

#[instrument(skip(state, auth, meta, payload))]
async fn create_submission(
    State(state): State<AppState>,
    auth: AuthUser,
    meta: RequestMeta,
    Json(payload): Json<CreateContactRequest>,
) -> ApiResult<(StatusCode, Json<ContactSubmission>)> {
    if payload.name.trim().is_empty() {
        return Err(ApiError::field("name", "Name is required"));
    }
    if !is_valid_email(payload.email.trim()) {
        return Err(ApiError::field("email", "Invalid email"));
    }
    if payload.message.trim().is_empty() {
        return Err(ApiError::field("message", "Message is required"));
    }

    let submission = ContactSubmission::create(&state.db, &payload).await?;

    state
        .audit
        .log_create(
            AuditResource::Contact,
            &submission.id.to_string(),
            Some(auth.0.sub),
            None,
            &meta,
        )
        .await;

    Ok((StatusCode::CREATED, Json(submission)))
}

#[instrument(skip(state, auth, meta))]
async fn delete_submission(
    State(state): State<AppState>,
    auth: AuthUser,
    meta: RequestMeta,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    auth.require(Role::Admin)?;
    let deleted = ContactSubmission::delete(&state.db, id).await?;
    if deleted == 0 {
        return Err(ApiError::not_found("Contact submission"));
    }

    state
        .audit
        .log_delete(AuditResource::Contact, &id.to_string(), Some(auth.0.sub), None, &meta)
        .await;

    Ok(StatusCode::NO_CONTENT)
}
