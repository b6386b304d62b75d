use sqlx::SqlitePool;

use crate::db::models::CommunitySnippetRow;

/// Outcome of a join attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum JoinOutcome {
    Joined(CommunitySnippetRow),
    AlreadyMember,
    CommunityNotFound,
}

/// Outcome of a leave attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveOutcome {
    Left,
    NotMember,
}

/// Join a community: bump the member count and write the user's snippet in
/// one transaction. Nothing is written unless both steps apply.
pub async fn join_community(
    pool: &SqlitePool,
    community_id: &str,
    user_id: &str,
) -> Result<JoinOutcome, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let updated = sqlx::query(
        "UPDATE communities SET number_of_members = number_of_members + 1 WHERE id = ?",
    )
    .bind(community_id)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    if updated == 0 {
        tx.rollback().await?;
        return Ok(JoinOutcome::CommunityNotFound);
    }

    // The creator re-joining gets the moderator flag back.
    let inserted = sqlx::query(
        "INSERT INTO community_snippets (user_id, community_id, is_moderator, image_url) \
         SELECT ?, id, creator_id = ?, image_url FROM communities WHERE id = ? \
         ON CONFLICT(user_id, community_id) DO NOTHING",
    )
    .bind(user_id)
    .bind(user_id)
    .bind(community_id)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    if inserted == 0 {
        tx.rollback().await?;
        return Ok(JoinOutcome::AlreadyMember);
    }

    let snippet = sqlx::query_as::<_, CommunitySnippetRow>(
        "SELECT * FROM community_snippets WHERE user_id = ? AND community_id = ?",
    )
    .bind(user_id)
    .bind(community_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(JoinOutcome::Joined(snippet))
}

/// Leave a community: delete the snippet and decrement the member count in
/// one transaction. The count is never taken below zero.
pub async fn leave_community(
    pool: &SqlitePool,
    community_id: &str,
    user_id: &str,
) -> Result<LeaveOutcome, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let deleted =
        sqlx::query("DELETE FROM community_snippets WHERE user_id = ? AND community_id = ?")
            .bind(user_id)
            .bind(community_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

    if deleted == 0 {
        tx.rollback().await?;
        return Ok(LeaveOutcome::NotMember);
    }

    sqlx::query(
        "UPDATE communities SET number_of_members = number_of_members - 1 \
         WHERE id = ? AND number_of_members > 0",
    )
    .bind(community_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(LeaveOutcome::Left)
}

/// All of a user's snippets, oldest membership first.
pub async fn list_snippets_for_user(
    pool: &SqlitePool,
    user_id: &str,
) -> Result<Vec<CommunitySnippetRow>, sqlx::Error> {
    sqlx::query_as::<_, CommunitySnippetRow>(
        "SELECT * FROM community_snippets WHERE user_id = ? ORDER BY joined_at, community_id",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}

/// Get one user's snippet for a community.
pub async fn get_snippet(
    pool: &SqlitePool,
    user_id: &str,
    community_id: &str,
) -> Result<Option<CommunitySnippetRow>, sqlx::Error> {
    sqlx::query_as::<_, CommunitySnippetRow>(
        "SELECT * FROM community_snippets WHERE user_id = ? AND community_id = ?",
    )
    .bind(user_id)
    .bind(community_id)
    .fetch_optional(pool)
    .await
}

/// Check whether a user is a member of a community.
pub async fn is_member(
    pool: &SqlitePool,
    user_id: &str,
    community_id: &str,
) -> Result<bool, sqlx::Error> {
    Ok(get_snippet(pool, user_id, community_id).await?.is_some())
}
