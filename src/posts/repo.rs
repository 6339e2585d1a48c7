use sqlx::PgPool;
use uuid::Uuid;

use crate::posts::repo_types::Post;
use crate::tags::Tag;

const POST_COLUMNS: &str = "id, title, slug, excerpt, content, published, author_id, \
                            category_id, created_at, updated_at";

pub struct NewPost<'a> {
    pub title: &'a str,
    pub slug: &'a str,
    pub excerpt: Option<&'a str>,
    pub content: &'a str,
    pub published: bool,
    pub author_id: Uuid,
    pub category_id: Option<Uuid>,
}

#[derive(Debug, Default)]
pub struct PostChanges {
    pub title: Option<String>,
    pub excerpt: Option<String>,
    pub content: Option<String>,
    pub published: Option<bool>,
    pub category_id: Option<Uuid>,
}

impl Post {
    pub async fn find_by_id(db: &PgPool, id: Uuid) -> sqlx::Result<Option<Post>> {
        sqlx::query_as::<_, Post>(&format!("SELECT {POST_COLUMNS} FROM posts WHERE id = $1"))
            .bind(id)
            .fetch_optional(db)
            .await
    }

    pub async fn find_by_slug(db: &PgPool, slug: &str) -> sqlx::Result<Option<Post>> {
        sqlx::query_as::<_, Post>(&format!("SELECT {POST_COLUMNS} FROM posts WHERE slug = $1"))
            .bind(slug)
            .fetch_optional(db)
            .await
    }

    pub async fn slug_exists(db: &PgPool, slug: &str) -> sqlx::Result<bool> {
        let row: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM posts WHERE slug = $1")
            .bind(slug)
            .fetch_optional(db)
            .await?;
        Ok(row.is_some())
    }

    pub async fn create(db: &PgPool, new: &NewPost<'_>) -> sqlx::Result<Post> {
        sqlx::query_as::<_, Post>(&format!(
            "INSERT INTO posts (title, slug, excerpt, content, published, author_id, category_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {POST_COLUMNS}"
        ))
        .bind(new.title)
        .bind(new.slug)
        .bind(new.excerpt)
        .bind(new.content)
        .bind(new.published)
        .bind(new.author_id)
        .bind(new.category_id)
        .fetch_one(db)
        .await
    }

    pub async fn list(
        db: &PgPool,
        limit: i64,
        offset: i64,
        search: Option<&str>,
    ) -> sqlx::Result<Vec<Post>> {
        sqlx::query_as::<_, Post>(&format!(
            "SELECT {POST_COLUMNS} FROM posts \
             WHERE ($3::text IS NULL OR title ILIKE '%' || $3 || '%' \
                    OR content ILIKE '%' || $3 || '%') \
             ORDER BY created_at DESC \
             LIMIT $1 OFFSET $2"
        ))
        .bind(limit)
        .bind(offset)
        .bind(search)
        .fetch_all(db)
        .await
    }

    pub async fn count(db: &PgPool, search: Option<&str>) -> sqlx::Result<i64> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM posts \
             WHERE ($1::text IS NULL OR title ILIKE '%' || $1 || '%' \
                    OR content ILIKE '%' || $1 || '%')",
        )
        .bind(search)
        .fetch_one(db)
        .await?;
        Ok(count)
    }

    pub async fn update(db: &PgPool, id: Uuid, changes: &PostChanges) -> sqlx::Result<Post> {
        sqlx::query_as::<_, Post>(&format!(
            "UPDATE posts SET \
               title = COALESCE($2, title), \
               excerpt = COALESCE($3, excerpt), \
               content = COALESCE($4, content), \
               published = COALESCE($5, published), \
               category_id = COALESCE($6, category_id), \
               updated_at = now() \
             WHERE id = $1 \
             RETURNING {POST_COLUMNS}"
        ))
        .bind(id)
        .bind(changes.title.as_deref())
        .bind(changes.excerpt.as_deref())
        .bind(changes.content.as_deref())
        .bind(changes.published)
        .bind(changes.category_id)
        .fetch_one(db)
        .await
    }

    pub async fn delete(db: &PgPool, id: Uuid) -> sqlx::Result<u64> {
        let result = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
        Ok(result.rows_affected())
    }

    /// Replaces the post's tag set.
    pub async fn set_tags(db: &PgPool, post_id: Uuid, tag_ids: &[Uuid]) -> sqlx::Result<()> {
        sqlx::query("DELETE FROM post_tags WHERE post_id = $1")
            .bind(post_id)
            .execute(db)
            .await?;
        for tag_id in tag_ids {
            sqlx::query("INSERT INTO post_tags (post_id, tag_id) VALUES ($1, $2) ON CONFLICT DO NOTHING")
                .bind(post_id)
                .bind(tag_id)
                .execute(db)
                .await?;
        }
        Ok(())
    }

    pub async fn tags_for(db: &PgPool, post_id: Uuid) -> sqlx::Result<Vec<Tag>> {
        sqlx::query_as::<_, Tag>(
            "SELECT t.id, t.name, t.slug, t.created_at \
             FROM tags t \
             JOIN post_tags pt ON pt.tag_id = t.id \
             WHERE pt.post_id = $1 \
             ORDER BY t.name",
        )
        .bind(post_id)
        .fetch_all(db)
        .await
    }
}
