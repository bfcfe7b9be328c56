//! Social domain - follow/like/retweet toggles and the trending aggregate
//!
//! A toggle is a DELETE keyed by the unique pair, falling back to an
//! `INSERT .. ON CONFLICT DO NOTHING` when nothing was deleted. Each
//! statement is atomic and the UNIQUE index caps every pair at one row, so
//! concurrent toggles cannot duplicate a relationship.

use sqlx::{Executor, Sqlite, SqlitePool};

use super::tweets;

#[derive(Debug)]
pub enum SocialError {
    /// Target missing or not visible to the actor; the two cases are
    /// deliberately indistinguishable.
    NotFoundOrForbidden,
    Database(sqlx::Error),
}

impl std::fmt::Display for SocialError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SocialError::NotFoundOrForbidden => write!(f, "Not found"),
            SocialError::Database(e) => write!(f, "Database error: {}", e),
        }
    }
}

/// An externally maintained aggregate; this layer only reads it.
#[derive(Debug, serde::Serialize, sqlx::FromRow)]
pub struct TrendingTopic {
    pub topic: String,
    pub tweet_count: i64,
}

/// Flip the (user, target) row in the given relationship table. Returns true
/// when the relationship is active afterwards.
async fn toggle_pair(
    db: &SqlitePool,
    delete_sql: &str,
    insert_sql: &str,
    user_id: i64,
    target_id: i64,
) -> Result<bool, sqlx::Error> {
    let deleted = sqlx::query(delete_sql)
        .bind(user_id)
        .bind(target_id)
        .execute(db)
        .await?;
    if deleted.rows_affected() > 0 {
        return Ok(false);
    }

    // A conflict means a concurrent toggle won the insert; either way the
    // relationship is now on.
    sqlx::query(insert_sql)
        .bind(user_id)
        .bind(target_id)
        .execute(db)
        .await?;
    Ok(true)
}

/// Follow or unfollow a user. The target must exist; there is no guard
/// against following yourself.
pub async fn toggle_follow(
    db: &SqlitePool,
    follower_id: i64,
    followed_id: i64,
) -> Result<bool, SocialError> {
    let target: Option<(i64,)> = sqlx::query_as("SELECT id FROM users WHERE id = ?")
        .bind(followed_id)
        .fetch_optional(db)
        .await
        .map_err(SocialError::Database)?;
    if target.is_none() {
        return Err(SocialError::NotFoundOrForbidden);
    }

    toggle_pair(
        db,
        "DELETE FROM follows WHERE user_id = ? AND following_id = ?",
        "INSERT INTO follows (user_id, following_id) VALUES (?, ?) ON CONFLICT DO NOTHING",
        follower_id,
        followed_id,
    )
    .await
    .map_err(SocialError::Database)
}

/// Like or unlike a tweet the user is allowed to see.
pub async fn toggle_like(
    db: &SqlitePool,
    user_id: i64,
    tweet_id: i64,
) -> Result<bool, SocialError> {
    require_visible(db, user_id, tweet_id).await?;

    toggle_pair(
        db,
        "DELETE FROM likes WHERE user_id = ? AND tweet_id = ?",
        "INSERT INTO likes (user_id, tweet_id) VALUES (?, ?) ON CONFLICT DO NOTHING",
        user_id,
        tweet_id,
    )
    .await
    .map_err(SocialError::Database)
}

/// Retweet or un-retweet a tweet the user is allowed to see.
pub async fn toggle_retweet(
    db: &SqlitePool,
    user_id: i64,
    tweet_id: i64,
) -> Result<bool, SocialError> {
    require_visible(db, user_id, tweet_id).await?;

    toggle_pair(
        db,
        "DELETE FROM retweets WHERE user_id = ? AND tweet_id = ?",
        "INSERT INTO retweets (user_id, tweet_id) VALUES (?, ?) ON CONFLICT DO NOTHING",
        user_id,
        tweet_id,
    )
    .await
    .map_err(SocialError::Database)
}

async fn require_visible(
    db: &SqlitePool,
    viewer_id: i64,
    tweet_id: i64,
) -> Result<(), SocialError> {
    match tweets::find_visible(db, viewer_id, tweet_id).await {
        Ok(Some(_)) => Ok(()),
        Ok(None) => Err(SocialError::NotFoundOrForbidden),
        Err(e) => Err(SocialError::Database(e)),
    }
}

/// Whether `follower` currently follows `followed`.
pub async fn is_following<'e, E>(
    executor: E,
    follower_id: i64,
    followed_id: i64,
) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row: Option<(i64,)> =
        sqlx::query_as("SELECT 1 FROM follows WHERE user_id = ? AND following_id = ?")
            .bind(follower_id)
            .bind(followed_id)
            .fetch_optional(executor)
            .await?;
    Ok(row.is_some())
}

/// Top 10 topics by tweet count.
pub async fn trending_topics<'e, E>(executor: E) -> Result<Vec<TrendingTopic>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as("SELECT topic, tweet_count FROM trending_topics ORDER BY tweet_count DESC LIMIT 10")
        .fetch_all(executor)
        .await
}
