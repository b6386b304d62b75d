use sqlx::SqlitePool;

use crate::db::models::{CommunityRow, PrivacyType};

/// Create a community and its creator's moderator snippet in one transaction.
///
/// The name is the primary key, so the existence check and the insert are the
/// same statement. Returns `false` (and writes nothing) if the name is taken.
pub async fn create_community(
    pool: &SqlitePool,
    id: &str,
    creator_id: &str,
    privacy_type: PrivacyType,
) -> Result<bool, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let inserted = sqlx::query(
        "INSERT INTO communities (id, creator_id, number_of_members, privacy_type) \
         VALUES (?, ?, 1, ?) ON CONFLICT(id) DO NOTHING",
    )
    .bind(id)
    .bind(creator_id)
    .bind(privacy_type)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    if inserted == 0 {
        tx.rollback().await?;
        return Ok(false);
    }

    sqlx::query(
        "INSERT INTO community_snippets (user_id, community_id, is_moderator) VALUES (?, ?, 1)",
    )
    .bind(creator_id)
    .bind(id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(true)
}

/// Get a community by ID.
pub async fn get_community(
    pool: &SqlitePool,
    community_id: &str,
) -> Result<Option<CommunityRow>, sqlx::Error> {
    sqlx::query_as::<_, CommunityRow>("SELECT * FROM communities WHERE id = ?")
        .bind(community_id)
        .fetch_optional(pool)
        .await
}

/// List communities with the most members first.
pub async fn list_top_by_members(
    pool: &SqlitePool,
    limit: i64,
) -> Result<Vec<CommunityRow>, sqlx::Error> {
    sqlx::query_as::<_, CommunityRow>(
        "SELECT * FROM communities ORDER BY number_of_members DESC, id ASC LIMIT ?",
    )
    .bind(limit)
    .fetch_all(pool)
    .await
}

/// Set a community's image. Members' snippets carry a copy of it, so they are
/// updated in the same transaction. Returns false if the community is gone.
pub async fn set_community_image(
    pool: &SqlitePool,
    community_id: &str,
    image_url: &str,
) -> Result<bool, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let updated = sqlx::query("UPDATE communities SET image_url = ? WHERE id = ?")
        .bind(image_url)
        .bind(community_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();
    if updated == 0 {
        tx.rollback().await?;
        return Ok(false);
    }

    sqlx::query("UPDATE community_snippets SET image_url = ? WHERE community_id = ?")
        .bind(image_url)
        .bind(community_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(true)
}
