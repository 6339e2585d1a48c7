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
use crate::state::AppState;
use crate::users::Role;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Comment {
    pub id: Uuid,
    pub post_id: Uuid,
    pub author_id: Option<Uuid>,
    pub author_name: String,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Deserialize)]
pub struct CreateCommentRequest {
    pub post_id: Uuid,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCommentRequest {
    pub content: String,
}

/// List filter: comments are usually browsed per post.
#[derive(Debug, Deserialize)]
pub struct CommentListParams {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub post_id: Option<Uuid>,
}

impl CommentListParams {
    fn pagination(&self) -> Pagination {
        Pagination {
            page: self.page.unwrap_or(1),
            limit: self.limit.unwrap_or(20),
            search: None,
        }
    }
}

impl Comment {
    pub async fn find_by_id(db: &PgPool, id: Uuid) -> sqlx::Result<Option<Comment>> {
        sqlx::query_as::<_, Comment>(
            "SELECT id, post_id, author_id, author_name, content, created_at \
             FROM comments WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(db)
        .await
    }

    pub async fn create(
        db: &PgPool,
        post_id: Uuid,
        author_id: Uuid,
        author_name: &str,
        content: &str,
    ) -> sqlx::Result<Comment> {
        sqlx::query_as::<_, Comment>(
            "INSERT INTO comments (post_id, author_id, author_name, content) \
             VALUES ($1, $2, $3, $4) \
             RETURNING id, post_id, author_id, author_name, content, created_at",
        )
        .bind(post_id)
        .bind(author_id)
        .bind(author_name)
        .bind(content)
        .fetch_one(db)
        .await
    }

    pub async fn list(
        db: &PgPool,
        limit: i64,
        offset: i64,
        post_id: Option<Uuid>,
    ) -> sqlx::Result<Vec<Comment>> {
        sqlx::query_as::<_, Comment>(
            "SELECT id, post_id, author_id, author_name, content, created_at \
             FROM comments \
             WHERE ($3::uuid IS NULL OR post_id = $3) \
             ORDER BY created_at DESC LIMIT $1 OFFSET $2",
        )
        .bind(limit)
        .bind(offset)
        .bind(post_id)
        .fetch_all(db)
        .await
    }

    pub async fn count(db: &PgPool, post_id: Option<Uuid>) -> sqlx::Result<i64> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM comments WHERE ($1::uuid IS NULL OR post_id = $1)",
        )
        .bind(post_id)
        .fetch_one(db)
        .await?;
        Ok(count)
    }

    pub async fn update(db: &PgPool, id: Uuid, content: &str) -> sqlx::Result<Comment> {
        sqlx::query_as::<_, Comment>(
            "UPDATE comments SET content = $2 WHERE id = $1 \
             RETURNING id, post_id, author_id, author_name, content, created_at",
        )
        .bind(id)
        .bind(content)
        .fetch_one(db)
        .await
    }

    pub async fn delete(db: &PgPool, id: Uuid) -> sqlx::Result<u64> {
        let result = sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
        Ok(result.rows_affected())
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/comments", get(list_comments).post(create_comment))
        .route(
            "/comments/:id",
            get(get_comment).put(update_comment).delete(delete_comment),
        )
}

#[instrument(skip(state))]
async fn list_comments(
    State(state): State<AppState>,
    Query(params): Query<CommentListParams>,
) -> ApiResult<Json<Paginated<Comment>>> {
    let p = params.pagination();
    let (page, limit) = p.clamped();
    let total = Comment::count(&state.db, params.post_id).await?;
    let data = Comment::list(&state.db, limit, p.offset(), params.post_id).await?;
    Ok(Json(Paginated::new(data, page, limit, total)))
}

#[instrument(skip(state))]
async fn get_comment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Comment>> {
    let comment = Comment::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Comment"))?;
    Ok(Json(comment))
}

#[instrument(skip(state, auth, meta, payload))]
async fn create_comment(
    State(state): State<AppState>,
    auth: AuthUser,
    meta: RequestMeta,
    Json(payload): Json<CreateCommentRequest>,
) -> ApiResult<(StatusCode, Json<Comment>)> {
    if payload.content.trim().is_empty() {
        return Err(ApiError::field("content", "Content is required"));
    }
    if crate::posts::Post::find_by_id(&state.db, payload.post_id)
        .await?
        .is_none()
    {
        return Err(ApiError::not_found("Post"));
    }

    let user = crate::users::User::find_by_id(&state.db, auth.0.sub)
        .await?
        .ok_or_else(|| ApiError::auth("User no longer exists"))?;

    let comment = Comment::create(
        &state.db,
        payload.post_id,
        user.id,
        &user.name,
        payload.content.trim(),
    )
    .await?;

    state
        .audit
        .log_create(
            AuditResource::Comment,
            &comment.id.to_string(),
            Some(auth.0.sub),
            Some(json!({ "post_id": comment.post_id })),
            &meta,
        )
        .await;

    Ok((StatusCode::CREATED, Json(comment)))
}

#[instrument(skip(state, auth, meta, payload))]
async fn update_comment(
    State(state): State<AppState>,
    auth: AuthUser,
    meta: RequestMeta,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateCommentRequest>,
) -> ApiResult<Json<Comment>> {
    if payload.content.trim().is_empty() {
        return Err(ApiError::field("content", "Content is required"));
    }
    let existing = Comment::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Comment"))?;

    // Own comments only, unless the caller moderates.
    if existing.author_id != Some(auth.0.sub) {
        auth.require(Role::Editor)?;
    }

    let comment = Comment::update(&state.db, id, payload.content.trim()).await?;

    state
        .audit
        .log_update(
            AuditResource::Comment,
            &id.to_string(),
            Some(auth.0.sub),
            Some(json!({ "post_id": comment.post_id })),
            &meta,
        )
        .await;

    Ok(Json(comment))
}

#[instrument(skip(state, auth, meta))]
async fn delete_comment(
    State(state): State<AppState>,
    auth: AuthUser,
    meta: RequestMeta,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let existing = Comment::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Comment"))?;

    if existing.author_id != Some(auth.0.sub) {
        auth.require(Role::Editor)?;
    }

    Comment::delete(&state.db, id).await?;

    state
        .audit
        .log_delete(
            AuditResource::Comment,
            &id.to_string(),
            Some(auth.0.sub),
            Some(json!({ "post_id": existing.post_id })),
            &meta,
        )
        .await;

    Ok(StatusCode::NO_CONTENT)
}
