//! Tweet domain - posting, deletion, visibility, and feed queries
//!
//! All single-statement functions use the generic Executor pattern, allowing
//! them to work with both `&SqlitePool` (for standalone queries) and
//! `&mut SqliteConnection` (for transactions).

use chrono::{DateTime, Utc};
use sqlx::{Executor, Sqlite};

/// A bare tweet row.
#[derive(Debug, serde::Serialize, sqlx::FromRow)]
pub struct Tweet {
    pub id: i64,
    pub user_id: i64,
    pub tweet_text: String,
    pub is_private: bool,
    pub created_at: DateTime<Utc>,
}

/// A tweet row joined with its author's username, the shape every feed
/// returns.
#[derive(Debug, serde::Serialize, sqlx::FromRow)]
pub struct FeedTweet {
    pub id: i64,
    pub user_id: i64,
    pub username: String,
    pub tweet_text: String,
    pub is_private: bool,
    pub created_at: DateTime<Utc>,
}

const FEED_SELECT: &str = "SELECT t.id, t.user_id, u.username, t.tweet_text, t.is_private, \
                           t.created_at FROM tweets t JOIN users u ON t.user_id = u.id";

/// Insert a tweet for the given author, timestamped now. No content
/// validation happens at this layer.
pub async fn create_tweet<'e, E>(
    executor: E,
    author_id: i64,
    text: &str,
    is_private: bool,
) -> Result<i64, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row: (i64,) = sqlx::query_as(
        "INSERT INTO tweets (user_id, tweet_text, is_private, created_at) VALUES (?, ?, ?, ?) \
         RETURNING id",
    )
    .bind(author_id)
    .bind(text)
    .bind(is_private)
    .bind(Utc::now())
    .fetch_one(executor)
    .await?;

    Ok(row.0)
}

/// Delete a tweet iff the requester owns it. Returns true if a row was
/// removed; a missing tweet and someone else's tweet are indistinguishable.
pub async fn delete_tweet<'e, E>(
    executor: E,
    requester_id: i64,
    tweet_id: i64,
) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query("DELETE FROM tweets WHERE id = ? AND user_id = ?")
        .bind(tweet_id)
        .bind(requester_id)
        .execute(executor)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Fetch a tweet only if the viewer may see it: their own, a public one, or
/// one from an author they follow. Invisible and missing tweets both come
/// back as None.
pub async fn find_visible<'e, E>(
    executor: E,
    viewer_id: i64,
    tweet_id: i64,
) -> Result<Option<Tweet>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as(
        "SELECT id, user_id, tweet_text, is_private, created_at FROM tweets \
         WHERE id = ? AND (user_id = ? OR is_private = 0 \
            OR user_id IN (SELECT following_id FROM follows WHERE user_id = ?))",
    )
    .bind(tweet_id)
    .bind(viewer_id)
    .bind(viewer_id)
    .fetch_optional(executor)
    .await
}

/// Every tweet regardless of privacy, newest first. The index listing is a
/// firehose; the visibility rule applies to interactions, not to it.
pub async fn global_feed<'e, E>(executor: E) -> Result<Vec<FeedTweet>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let query = format!("{} ORDER BY t.created_at DESC", FEED_SELECT);
    sqlx::query_as(&query).fetch_all(executor).await
}

/// Tweets by the viewer or by anyone the viewer follows, newest first.
pub async fn personal_timeline<'e, E>(
    executor: E,
    viewer_id: i64,
) -> Result<Vec<FeedTweet>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let query = format!(
        "{} WHERE t.user_id = ? OR t.user_id IN \
         (SELECT following_id FROM follows WHERE user_id = ?) \
         ORDER BY t.created_at DESC",
        FEED_SELECT
    );
    sqlx::query_as(&query)
        .bind(viewer_id)
        .bind(viewer_id)
        .fetch_all(executor)
        .await
}

/// Public tweets only, newest first.
pub async fn public_feed<'e, E>(executor: E) -> Result<Vec<FeedTweet>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let query = format!("{} WHERE t.is_private = 0 ORDER BY t.created_at DESC", FEED_SELECT);
    sqlx::query_as(&query).fetch_all(executor).await
}

/// Tweets whose text contains the query, newest first.
pub async fn search_tweets<'e, E>(executor: E, query: &str) -> Result<Vec<FeedTweet>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("{} WHERE t.tweet_text LIKE ? ORDER BY t.created_at DESC", FEED_SELECT);
    sqlx::query_as(&sql)
        .bind(format!("%{}%", query))
        .fetch_all(executor)
        .await
}

/// All tweets by one author, newest first. Used for the owner's own profile
/// page, so no visibility filter.
pub async fn tweets_by_user<'e, E>(executor: E, user_id: i64) -> Result<Vec<Tweet>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as(
        "SELECT id, user_id, tweet_text, is_private, created_at FROM tweets \
         WHERE user_id = ? ORDER BY created_at DESC",
    )
    .bind(user_id)
    .fetch_all(executor)
    .await
}

/// Tweets by one author as seen by a (possibly anonymous) viewer: private
/// tweets appear only to the owner and to followers.
pub async fn visible_tweets_by_user<'e, E>(
    executor: E,
    viewer_id: Option<i64>,
    owner_id: i64,
) -> Result<Vec<Tweet>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    match viewer_id {
        Some(viewer) => {
            sqlx::query_as(
                "SELECT id, user_id, tweet_text, is_private, created_at FROM tweets \
                 WHERE user_id = ? AND (user_id = ? OR is_private = 0 \
                    OR user_id IN (SELECT following_id FROM follows WHERE user_id = ?)) \
                 ORDER BY created_at DESC",
            )
            .bind(owner_id)
            .bind(viewer)
            .bind(viewer)
            .fetch_all(executor)
            .await
        }
        None => {
            sqlx::query_as(
                "SELECT id, user_id, tweet_text, is_private, created_at FROM tweets \
                 WHERE user_id = ? AND is_private = 0 ORDER BY created_at DESC",
            )
            .bind(owner_id)
            .fetch_all(executor)
            .await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::domain::users::create_user;
    use sqlx::sqlite::SqlitePoolOptions;
    use sqlx::SqlitePool;
    use std::time::Duration;

    async fn setup() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("in-memory pool");
        db::init_schema(&pool).await.expect("schema");
        pool
    }

    async fn seed_user(pool: &SqlitePool, username: &str) -> i64 {
        create_user(pool, username, &format!("{}@x.com", username), "h")
            .await
            .expect("seed user")
    }

    async fn follow(pool: &SqlitePool, follower: i64, followed: i64) {
        sqlx::query("INSERT INTO follows (user_id, following_id) VALUES (?, ?)")
            .bind(follower)
            .bind(followed)
            .execute(pool)
            .await
            .expect("seed follow");
    }

    // created_at has sub-millisecond precision, but keep orderings unambiguous
    async fn pause() {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    #[tokio::test]
    async fn test_delete_requires_ownership() {
        let pool = setup().await;
        let alice = seed_user(&pool, "alice").await;
        let bob = seed_user(&pool, "bob").await;

        let tweet = create_tweet(&pool, alice, "mine", false).await.expect("post");

        assert!(!delete_tweet(&pool, bob, tweet).await.expect("denied"));
        let still_there = sqlx::query("SELECT 1 FROM tweets WHERE id = ?")
            .bind(tweet)
            .fetch_optional(&pool)
            .await
            .expect("query");
        assert!(still_there.is_some());

        assert!(delete_tweet(&pool, alice, tweet).await.expect("allowed"));
        assert!(!delete_tweet(&pool, alice, tweet).await.expect("already gone"));
    }

    #[tokio::test]
    async fn test_visibility_owner_public_follower() {
        let pool = setup().await;
        let alice = seed_user(&pool, "alice").await;
        let bob = seed_user(&pool, "bob").await;

        let public = create_tweet(&pool, alice, "hello world", false).await.expect("post");
        let private = create_tweet(&pool, alice, "secret", true).await.expect("post");

        // Owner sees both
        assert!(find_visible(&pool, alice, private).await.expect("q").is_some());
        // Stranger sees only the public one
        assert!(find_visible(&pool, bob, public).await.expect("q").is_some());
        assert!(find_visible(&pool, bob, private).await.expect("q").is_none());
        // Following flips the private one visible
        follow(&pool, bob, alice).await;
        assert!(find_visible(&pool, bob, private).await.expect("q").is_some());
        // Nonexistent id behaves like an invisible one
        assert!(find_visible(&pool, bob, 9999).await.expect("q").is_none());
    }

    #[tokio::test]
    async fn test_global_feed_is_a_firehose_and_newest_first() {
        let pool = setup().await;
        let alice = seed_user(&pool, "alice").await;

        create_tweet(&pool, alice, "first", false).await.expect("post");
        pause().await;
        create_tweet(&pool, alice, "second, private", true).await.expect("post");

        let feed = global_feed(&pool).await.expect("feed");
        assert_eq!(feed.len(), 2);
        assert_eq!(feed[0].tweet_text, "second, private");
        assert!(feed[0].is_private);
        assert_eq!(feed[0].username, "alice");
    }

    #[tokio::test]
    async fn test_public_feed_excludes_private_tweets() {
        let pool = setup().await;
        let alice = seed_user(&pool, "alice").await;

        create_tweet(&pool, alice, "open", false).await.expect("post");
        create_tweet(&pool, alice, "hidden", true).await.expect("post");

        let feed = public_feed(&pool).await.expect("feed");
        assert_eq!(feed.len(), 1);
        assert_eq!(feed[0].tweet_text, "open");
    }

    #[tokio::test]
    async fn test_timeline_covers_self_and_followed_only() {
        let pool = setup().await;
        let alice = seed_user(&pool, "alice").await;
        let carol = seed_user(&pool, "carol").await;
        let dave = seed_user(&pool, "dave").await;

        follow(&pool, alice, carol).await;

        create_tweet(&pool, alice, "from alice", false).await.expect("post");
        pause().await;
        create_tweet(&pool, carol, "from carol", false).await.expect("post");
        pause().await;
        create_tweet(&pool, dave, "from dave", false).await.expect("post");

        let timeline = personal_timeline(&pool, alice).await.expect("timeline");
        let texts: Vec<_> = timeline.iter().map(|t| t.tweet_text.as_str()).collect();
        assert_eq!(texts, vec!["from carol", "from alice"]);
    }

    #[tokio::test]
    async fn test_search_tweets_by_substring() {
        let pool = setup().await;
        let alice = seed_user(&pool, "alice").await;

        create_tweet(&pool, alice, "rust is nice", false).await.expect("post");
        create_tweet(&pool, alice, "unrelated", false).await.expect("post");

        let hits = search_tweets(&pool, "rust").await.expect("search");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].tweet_text, "rust is nice");
    }

    #[tokio::test]
    async fn test_visible_tweets_by_user_respects_viewer() {
        let pool = setup().await;
        let alice = seed_user(&pool, "alice").await;
        let bob = seed_user(&pool, "bob").await;

        create_tweet(&pool, alice, "open", false).await.expect("post");
        create_tweet(&pool, alice, "hidden", true).await.expect("post");

        // Anonymous and stranger both get the public tweet only
        assert_eq!(visible_tweets_by_user(&pool, None, alice).await.expect("q").len(), 1);
        assert_eq!(
            visible_tweets_by_user(&pool, Some(bob), alice).await.expect("q").len(),
            1
        );

        follow(&pool, bob, alice).await;
        assert_eq!(
            visible_tweets_by_user(&pool, Some(bob), alice).await.expect("q").len(),
            2
        );
        // The owner always sees everything
        assert_eq!(
            visible_tweets_by_user(&pool, Some(alice), alice).await.expect("q").len(),
            2
        );
    }
}
