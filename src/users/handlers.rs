use axum::{extract::State, http::StatusCode, routing::get, Router};
use serde_json::json;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::audit::AuditResource;
use crate::auth::handlers::is_valid_email;
use crate::auth::password::hash_password;
use crate::auth::{AuthUser, RequestMeta};
use crate::error::{ApiError, ApiResult};
use crate::extract::{Json, Path, Query};
use crate::pagination::{Paginated, Pagination};
use crate::slug;
use crate::state::AppState;
use crate::users::dto::{CreateUserRequest, PublicUser, UpdateUserRequest};
use crate::users::repo::{NewUser, UserChanges};
use crate::users::{Role, User};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route(
            "/users/:id",
            get(get_user).put(update_user).delete(delete_user),
        )
}

#[instrument(skip(state, auth, meta))]
pub async fn list_users(
    State(state): State<AppState>,
    auth: AuthUser,
    meta: RequestMeta,
    Query(p): Query<Pagination>,
) -> ApiResult<Json<Paginated<PublicUser>>> {
    auth.require(Role::Admin)?;

    let (page, limit) = p.clamped();
    let search = p.search.as_deref();
    let total = User::count(&state.db, search).await?;
    let users = User::list(&state.db, limit, p.offset(), search).await?;
    let data: Vec<PublicUser> = users.into_iter().map(PublicUser::from).collect();

    // Listing accounts is a sensitive read; it goes in the ledger.
    state
        .audit
        .log_read(AuditResource::User, "*", Some(auth.0.sub), &meta)
        .await;

    Ok(Json(Paginated::new(data, page, limit, total)))
}

#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<PublicUser>> {
    let user = User::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;
    Ok(Json(PublicUser::from(user)))
}

#[instrument(skip(state, auth, meta, payload))]
pub async fn create_user(
    State(state): State<AppState>,
    auth: AuthUser,
    meta: RequestMeta,
    Json(mut payload): Json<CreateUserRequest>,
) -> ApiResult<(StatusCode, Json<PublicUser>)> {
    auth.require(Role::Admin)?;

    payload.email = payload.email.trim().to_lowercase();
    if !is_valid_email(&payload.email) {
        return Err(ApiError::field("email", "Invalid email"));
    }
    if payload.password.len() < 8 {
        return Err(ApiError::field("password", "Password too short"));
    }
    if payload.name.trim().is_empty() {
        return Err(ApiError::field("name", "Name is required"));
    }

    if User::find_by_email(&state.db, &payload.email).await?.is_some() {
        warn!(email = %payload.email, "email already registered");
        return Err(ApiError::conflict("Email already registered"));
    }

    let hash = hash_password(&payload.password)?;
    let mut user_slug = slug::slugify(&payload.name);
    if user_slug.is_empty() {
        user_slug = slug::with_suffix("user");
    } else if User::slug_exists(&state.db, &user_slug).await? {
        user_slug = slug::with_suffix(&user_slug);
    }

    let user = User::create(
        &state.db,
        &NewUser {
            email: &payload.email,
            name: payload.name.trim(),
            password_hash: &hash,
            role: payload.role.unwrap_or(Role::Reader),
            slug: &user_slug,
        },
    )
    .await?;

    state
        .audit
        .log_create(
            AuditResource::User,
            &user.id.to_string(),
            Some(auth.0.sub),
            Some(json!({ "email": &user.email, "role": user.role })),
            &meta,
        )
        .await;

    info!(user_id = %user.id, "user created");
    Ok((StatusCode::CREATED, Json(PublicUser::from(user))))
}

#[instrument(skip(state, auth, meta, payload))]
pub async fn update_user(
    State(state): State<AppState>,
    auth: AuthUser,
    meta: RequestMeta,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateUserRequest>,
) -> ApiResult<Json<PublicUser>> {
    // Users edit themselves; admins edit anyone. Role changes are
    // admin-only either way.
    if auth.0.sub != id {
        auth.require(Role::Admin)?;
    }
    if payload.role.is_some() && !auth.0.role.at_least(Role::Admin) {
        return Err(ApiError::forbidden("Only admins may change roles"));
    }

    if User::find_by_id(&state.db, id).await?.is_none() {
        return Err(ApiError::not_found("User"));
    }

    let changes = UserChanges {
        name: payload.name,
        bio: payload.bio,
        avatar_url: payload.avatar_url,
        social_links: payload.social_links,
        role: payload.role,
    };
    let user = User::update(&state.db, id, &changes).await?;

    state
        .audit
        .log_update(
            AuditResource::User,
            &id.to_string(),
            Some(auth.0.sub),
            serde_json::to_value(&ChangeSummary::from(&changes)).ok(),
            &meta,
        )
        .await;

    Ok(Json(PublicUser::from(user)))
}

#[instrument(skip(state, auth, meta))]
pub async fn delete_user(
    State(state): State<AppState>,
    auth: AuthUser,
    meta: RequestMeta,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    auth.require(Role::Admin)?;

    let deleted = User::delete(&state.db, id).await?;
    if deleted == 0 {
        return Err(ApiError::not_found("User"));
    }

    state
        .audit
        .log_delete(AuditResource::User, &id.to_string(), Some(auth.0.sub), None, &meta)
        .await;

    info!(user_id = %id, "user deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Which fields an update touched, for the audit changes payload.
#[derive(serde::Serialize)]
struct ChangeSummary {
    fields: Vec<&'static str>,
}

impl From<&UserChanges> for ChangeSummary {
    fn from(c: &UserChanges) -> Self {
        let mut fields = Vec::new();
        if c.name.is_some() {
            fields.push("name");
        }
        if c.bio.is_some() {
            fields.push("bio");
        }
        if c.avatar_url.is_some() {
            fields.push("avatar_url");
        }
        if c.social_links.is_some() {
            fields.push("social_links");
        }
        if c.role.is_some() {
            fields.push("role");
        }
        Self { fields }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn change_summary_lists_touched_fields() {
        let changes = UserChanges {
            name: Some("New".into()),
            role: Some(Role::Editor),
            ..Default::default()
        };
        let summary = ChangeSummary::from(&changes);
        assert_eq!(summary.fields, vec!["name", "role"]);
    }
}
