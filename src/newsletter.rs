use axum::{extract::State, http::StatusCode, routing::get, Router};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use tracing::{info, instrument};
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
pub struct Subscriber {
    pub id: Uuid,
    pub email: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Deserialize)]
pub struct SubscribeRequest {
    pub email: String,
}

impl Subscriber {
    pub async fn find_by_email(db: &PgPool, email: &str) -> sqlx::Result<Option<Subscriber>> {
        sqlx::query_as::<_, Subscriber>(
            "SELECT id, email, created_at FROM newsletter_subscribers WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(db)
        .await
    }

    pub async fn create(db: &PgPool, email: &str) -> sqlx::Result<Subscriber> {
        sqlx::query_as::<_, Subscriber>(
            "INSERT INTO newsletter_subscribers (email) VALUES ($1) \
             RETURNING id, email, created_at",
        )
        .bind(email)
        .fetch_one(db)
        .await
    }

    pub async fn list(
        db: &PgPool,
        limit: i64,
        offset: i64,
        search: Option<&str>,
    ) -> sqlx::Result<Vec<Subscriber>> {
        sqlx::query_as::<_, Subscriber>(
            "SELECT id, email, created_at FROM newsletter_subscribers \
             WHERE ($3::text IS NULL OR email ILIKE '%' || $3 || '%') \
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
            "SELECT COUNT(*) FROM newsletter_subscribers \
             WHERE ($1::text IS NULL OR email ILIKE '%' || $1 || '%')",
        )
        .bind(search)
        .fetch_one(db)
        .await?;
        Ok(count)
    }

    pub async fn delete(db: &PgPool, id: Uuid) -> sqlx::Result<u64> {
        let result = sqlx::query("DELETE FROM newsletter_subscribers WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
        Ok(result.rows_affected())
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/newsletter", get(list_subscribers).post(subscribe))
        .route("/newsletter/:id", axum::routing::delete(unsubscribe))
}

#[instrument(skip(state, auth, meta))]
async fn list_subscribers(
    State(state): State<AppState>,
    auth: AuthUser,
    meta: RequestMeta,
    Query(p): Query<Pagination>,
) -> ApiResult<Json<Paginated<Subscriber>>> {
    // Subscriber emails are sensitive; admin-only and recorded in the ledger.
    auth.require(Role::Admin)?;

    let (page, limit) = p.clamped();
    let search = p.search.as_deref();
    let total = Subscriber::count(&state.db, search).await?;
    let data = Subscriber::list(&state.db, limit, p.offset(), search).await?;

    state
        .audit
        .log_read(AuditResource::Newsletter, "*", Some(auth.0.sub), &meta)
        .await;

    Ok(Json(Paginated::new(data, page, limit, total)))
}

#[instrument(skip(state, auth, meta, payload))]
async fn subscribe(
    State(state): State<AppState>,
    auth: AuthUser,
    meta: RequestMeta,
    Json(mut payload): Json<SubscribeRequest>,
) -> ApiResult<(StatusCode, Json<Subscriber>)> {
    payload.email = payload.email.trim().to_lowercase();
    if !is_valid_email(&payload.email) {
        return Err(ApiError::field("email", "Invalid email"));
    }
    if Subscriber::find_by_email(&state.db, &payload.email)
        .await?
        .is_some()
    {
        return Err(ApiError::conflict("Email already subscribed"));
    }

    let subscriber = Subscriber::create(&state.db, &payload.email).await?;

    state
        .audit
        .log_create(
            AuditResource::Newsletter,
            &subscriber.id.to_string(),
            Some(auth.0.sub),
            None,
            &meta,
        )
        .await;

    info!(subscriber_id = %subscriber.id, "newsletter subscription added");
    Ok((StatusCode::CREATED, Json(subscriber)))
}

#[instrument(skip(state, auth, meta))]
async fn unsubscribe(
    State(state): State<AppState>,
    auth: AuthUser,
    meta: RequestMeta,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    // Same gate as listing: subscriber records are admin territory.
    auth.require(Role::Admin)?;

    let deleted = Subscriber::delete(&state.db, id).await?;
    if deleted == 0 {
        return Err(ApiError::not_found("Subscriber"));
    }

    state
        .audit
        .log_delete(AuditResource::Newsletter, &id.to_string(), Some(auth.0.sub), None, &meta)
        .await;

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::Claims;

    fn reader_auth() -> AuthUser {
        AuthUser(Claims {
            sub: Uuid::new_v4(),
            email: "reader@x.com".into(),
            role: Role::Reader,
            iat: 0,
            exp: 0,
            iss: "t".into(),
            aud: "t".into(),
        })
    }

    #[tokio::test]
    async fn unsubscribe_requires_admin() {
        let err = unsubscribe(
            State(AppState::fake()),
            reader_auth(),
            RequestMeta::default(),
            Path(Uuid::new_v4()),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code(), "AUTHORIZATION_ERROR");
    }
}
