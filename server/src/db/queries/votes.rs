use sqlx::SqlitePool;

use crate::db::models::{PostVoteRow, VoteOutcome};

/// Apply one user's vote to a post in a single transaction.
///
/// * no previous vote: the vote is recorded and the tally moves by `value`;
/// * same value again: the vote is removed and the tally moves back;
/// * opposite value: the vote flips and the tally moves by `2 * value`.
///
/// `vote_id` is only used when a new vote row is created. Returns `None` if
/// the post does not exist.
pub async fn apply_vote(
    pool: &SqlitePool,
    vote_id: &str,
    user_id: &str,
    post_id: &str,
    value: i64,
) -> Result<Option<VoteOutcome>, sqlx::Error> {
    let mut tx = pool.begin().await?;

    // A no-op write first, so the transaction holds the write lock before it
    // reads and concurrent voters on the same database queue up behind it.
    let community_id: Option<String> = sqlx::query_scalar(
        "UPDATE posts SET vote_status = vote_status WHERE id = ? RETURNING community_id",
    )
    .bind(post_id)
    .fetch_optional(&mut *tx)
    .await?;
    let Some(community_id) = community_id else {
        tx.rollback().await?;
        return Ok(None);
    };

    let existing = sqlx::query_as::<_, PostVoteRow>(
        "SELECT * FROM post_votes WHERE user_id = ? AND post_id = ?",
    )
    .bind(user_id)
    .bind(post_id)
    .fetch_optional(&mut *tx)
    .await?;

    let (delta, current_vote_id) = match existing {
        None => {
            sqlx::query(
                "INSERT INTO post_votes (id, user_id, post_id, community_id, vote_value) \
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(vote_id)
            .bind(user_id)
            .bind(post_id)
            .bind(&community_id)
            .bind(value)
            .execute(&mut *tx)
            .await?;
            (value, Some(vote_id.to_string()))
        }
        Some(prev) if prev.vote_value == value => {
            sqlx::query("DELETE FROM post_votes WHERE id = ?")
                .bind(&prev.id)
                .execute(&mut *tx)
                .await?;
            (-value, None)
        }
        Some(prev) => {
            sqlx::query("UPDATE post_votes SET vote_value = ? WHERE id = ?")
                .bind(value)
                .bind(&prev.id)
                .execute(&mut *tx)
                .await?;
            (2 * value, Some(prev.id))
        }
    };

    let vote_status: i64 = sqlx::query_scalar(
        "UPDATE posts SET vote_status = vote_status + ? WHERE id = ? RETURNING vote_status",
    )
    .bind(delta)
    .bind(post_id)
    .fetch_one(&mut *tx)
    .await?;

    let vote = match current_vote_id {
        Some(id) => Some(
            sqlx::query_as::<_, PostVoteRow>("SELECT * FROM post_votes WHERE id = ?")
                .bind(id)
                .fetch_one(&mut *tx)
                .await?,
        ),
        None => None,
    };

    tx.commit().await?;
    Ok(Some(VoteOutcome {
        post_id: post_id.to_string(),
        vote,
        vote_status,
    }))
}

/// Get a user's vote on a post.
pub async fn get_vote(
    pool: &SqlitePool,
    user_id: &str,
    post_id: &str,
) -> Result<Option<PostVoteRow>, sqlx::Error> {
    sqlx::query_as::<_, PostVoteRow>("SELECT * FROM post_votes WHERE user_id = ? AND post_id = ?")
        .bind(user_id)
        .bind(post_id)
        .fetch_optional(pool)
        .await
}

/// All of a user's votes on posts in one community.
pub async fn list_votes_for_user_in_community(
    pool: &SqlitePool,
    user_id: &str,
    community_id: &str,
) -> Result<Vec<PostVoteRow>, sqlx::Error> {
    sqlx::query_as::<_, PostVoteRow>(
        "SELECT * FROM post_votes WHERE user_id = ? AND community_id = ? ORDER BY created_at",
    )
    .bind(user_id)
    .bind(community_id)
    .fetch_all(pool)
    .await
}
