use sqlx::SqlitePool;

use crate::db::models::{NewPost, PostRow};

/// Insert a new post with a zero tally. Any image is already stored, so the
/// row is complete the moment it exists.
pub async fn insert_post(pool: &SqlitePool, post: &NewPost<'_>) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO posts (id, community_id, creator_id, creator_display_name, title, body, \
         community_image_url, image_url) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(post.id)
    .bind(post.community_id)
    .bind(post.creator_id)
    .bind(post.creator_display_name)
    .bind(post.title)
    .bind(post.body)
    .bind(post.community_image_url)
    .bind(post.image_url)
    .execute(pool)
    .await?;
    Ok(())
}

/// Get a post by ID.
pub async fn get_post(pool: &SqlitePool, post_id: &str) -> Result<Option<PostRow>, sqlx::Error> {
    sqlx::query_as::<_, PostRow>("SELECT * FROM posts WHERE id = ?")
        .bind(post_id)
        .fetch_optional(pool)
        .await
}

/// List a community's posts, newest first.
pub async fn list_posts_for_community(
    pool: &SqlitePool,
    community_id: &str,
    limit: i64,
) -> Result<Vec<PostRow>, sqlx::Error> {
    sqlx::query_as::<_, PostRow>(
        "SELECT * FROM posts WHERE community_id = ? \
         ORDER BY created_at DESC, rowid DESC LIMIT ?",
    )
    .bind(community_id)
    .bind(limit)
    .fetch_all(pool)
    .await
}

/// Delete a post, but only if `creator_id` wrote it. Votes cascade.
/// Returns whether a row was removed.
pub async fn delete_post(
    pool: &SqlitePool,
    post_id: &str,
    creator_id: &str,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM posts WHERE id = ? AND creator_id = ?")
        .bind(post_id)
        .bind(creator_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
