use axum::{extract::State, http::StatusCode, routing::get, Router};
use serde_json::json;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::audit::AuditResource;
use crate::auth::{AuthUser, RequestMeta};
use crate::error::{ApiError, ApiResult};
use crate::extract::{Json, Path, Query};
use crate::pagination::{Paginated, Pagination};
use crate::posts::dto::{CreatePostRequest, PostDetails, PostListItem, UpdatePostRequest};
use crate::posts::repo::{NewPost, PostChanges};
use crate::posts::repo_types::Post;
use crate::slug;
use crate::state::AppState;
use crate::users::Role;

pub fn router() -> Router<AppState> {
    // GET takes a slug, PUT/DELETE take an id; one route entry serves both.
    Router::new()
        .route("/posts", get(list_posts).post(create_post))
        .route(
            "/posts/:slug",
            get(get_post).put(update_post).delete(delete_post),
        )
}

#[instrument(skip(state))]
pub async fn list_posts(
    State(state): State<AppState>,
    Query(p): Query<Pagination>,
) -> ApiResult<Json<Paginated<PostListItem>>> {
    let (page, limit) = p.clamped();
    let search = p.search.as_deref();
    let total = Post::count(&state.db, search).await?;
    let posts = Post::list(&state.db, limit, p.offset(), search).await?;
    let data = posts.into_iter().map(PostListItem::from).collect();
    Ok(Json(Paginated::new(data, page, limit, total)))
}

#[instrument(skip(state))]
pub async fn get_post(
    State(state): State<AppState>,
    Path(post_slug): Path<String>,
) -> ApiResult<Json<PostDetails>> {
    let post = Post::find_by_slug(&state.db, &post_slug)
        .await?
        .ok_or_else(|| ApiError::not_found("Post"))?;
    let tags = Post::tags_for(&state.db, post.id).await?;
    Ok(Json(PostDetails { post, tags }))
}

#[instrument(skip(state, auth, meta, payload))]
pub async fn create_post(
    State(state): State<AppState>,
    auth: AuthUser,
    meta: RequestMeta,
    Json(payload): Json<CreatePostRequest>,
) -> ApiResult<(StatusCode, Json<PostDetails>)> {
    auth.require(Role::Author)?;

    if payload.title.trim().is_empty() {
        return Err(ApiError::field("title", "Title is required"));
    }
    if payload.content.trim().is_empty() {
        return Err(ApiError::field("content", "Content is required"));
    }

    let mut post_slug = slug::slugify(&payload.title);
    if post_slug.is_empty() {
        post_slug = slug::with_suffix("post");
    } else if Post::slug_exists(&state.db, &post_slug).await? {
        post_slug = slug::with_suffix(&post_slug);
    }

    let post = Post::create(
        &state.db,
        &NewPost {
            title: payload.title.trim(),
            slug: &post_slug,
            excerpt: payload.excerpt.as_deref(),
            content: &payload.content,
            published: payload.published,
            author_id: auth.0.sub,
            category_id: payload.category_id,
        },
    )
    .await?;

    if !payload.tag_ids.is_empty() {
        Post::set_tags(&state.db, post.id, &payload.tag_ids).await?;
    }
    let tags = Post::tags_for(&state.db, post.id).await?;

    state
        .audit
        .log_create(
            AuditResource::Post,
            &post.id.to_string(),
            Some(auth.0.sub),
            Some(json!({ "title": &post.title, "slug": &post.slug, "published": post.published })),
            &meta,
        )
        .await;

    info!(post_id = %post.id, slug = %post.slug, "post created");
    Ok((StatusCode::CREATED, Json(PostDetails { post, tags })))
}

#[instrument(skip(state, auth, meta, payload))]
pub async fn update_post(
    State(state): State<AppState>,
    auth: AuthUser,
    meta: RequestMeta,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdatePostRequest>,
) -> ApiResult<Json<PostDetails>> {
    let existing = Post::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Post"))?;

    // Authors may edit their own posts; anything else takes editor rights.
    if existing.author_id != auth.0.sub {
        auth.require(Role::Editor)?;
    } else {
        auth.require(Role::Author)?;
    }

    let changes = PostChanges {
        title: payload.title,
        excerpt: payload.excerpt,
        content: payload.content,
        published: payload.published,
        category_id: payload.category_id,
    };
    let post = Post::update(&state.db, id, &changes).await?;

    if let Some(tag_ids) = &payload.tag_ids {
        Post::set_tags(&state.db, id, tag_ids).await?;
    }
    let tags = Post::tags_for(&state.db, id).await?;

    state
        .audit
        .log_update(
            AuditResource::Post,
            &id.to_string(),
            Some(auth.0.sub),
            Some(json!({ "title": &post.title, "published": post.published })),
            &meta,
        )
        .await;

    Ok(Json(PostDetails { post, tags }))
}

#[instrument(skip(state, auth, meta))]
pub async fn delete_post(
    State(state): State<AppState>,
    auth: AuthUser,
    meta: RequestMeta,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let existing = Post::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Post"))?;

    if existing.author_id != auth.0.sub {
        auth.require(Role::Editor)?;
    } else {
        auth.require(Role::Author)?;
    }

    Post::delete(&state.db, id).await?;

    state
        .audit
        .log_delete(
            AuditResource::Post,
            &id.to_string(),
            Some(auth.0.sub),
            Some(json!({ "title": existing.title })),
            &meta,
        )
        .await;

    info!(post_id = %id, "post deleted");
    Ok(StatusCode::NO_CONTENT)
}
