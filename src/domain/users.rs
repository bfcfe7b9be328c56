//! User domain - DB queries for accounts, credentials, and profiles
//!
//! All single-statement functions use the generic Executor pattern, allowing
//! them to work with both `&SqlitePool` (for standalone queries) and
//! `&mut SqliteConnection` (for transactions).

use sqlx::{Executor, Sqlite, SqlitePool};

use crate::services::password;

/// A user row as exposed to handlers. The password hash never leaves this
/// module.
#[derive(Debug, serde::Serialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
}

/// Public view of a user (no email), used for search results and profiles
/// of other people.
#[derive(Debug, serde::Serialize, sqlx::FromRow)]
pub struct PublicUser {
    pub id: i64,
    pub username: String,
    pub name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
}

/// Public user row annotated with follower count, for the explore page.
#[derive(Debug, serde::Serialize, sqlx::FromRow)]
pub struct PopularUser {
    pub id: i64,
    pub username: String,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    pub follower_count: i64,
}

#[derive(Debug)]
pub enum IdentityError {
    /// Username or email already taken
    DuplicateIdentity,
    /// Unknown username or wrong password, deliberately indistinguishable
    InvalidCredential,
    Database(sqlx::Error),
}

impl std::fmt::Display for IdentityError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IdentityError::DuplicateIdentity => write!(f, "Username or email already taken"),
            IdentityError::InvalidCredential => write!(f, "Invalid username or password"),
            IdentityError::Database(e) => write!(f, "Database error: {}", e),
        }
    }
}

/// Create a user with an already-hashed password. Uniqueness of username and
/// email is enforced by the schema; the single INSERT keeps registration
/// atomic under concurrent signups.
pub async fn create_user<'e, E>(
    executor: E,
    username: &str,
    email: &str,
    password_hash: &str,
) -> Result<i64, IdentityError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row: (i64,) = sqlx::query_as(
        "INSERT INTO users (username, email, password) VALUES (?, ?, ?) RETURNING id",
    )
    .bind(username)
    .bind(email)
    .bind(password_hash)
    .fetch_one(executor)
    .await
    .map_err(|e| {
        if let sqlx::Error::Database(db) = &e {
            if db.is_unique_violation() {
                return IdentityError::DuplicateIdentity;
            }
        }
        IdentityError::Database(e)
    })?;

    Ok(row.0)
}

/// Check a username/password pair and return the user id on success.
/// A missing user and a failed hash check produce the same error.
pub async fn authenticate(
    db: &SqlitePool,
    username: &str,
    password_attempt: &str,
) -> Result<i64, IdentityError> {
    let row: Option<(i64, String)> =
        sqlx::query_as("SELECT id, password FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(db)
            .await
            .map_err(IdentityError::Database)?;

    match row {
        Some((id, stored)) if password::verify_password(password_attempt, &stored) => Ok(id),
        _ => Err(IdentityError::InvalidCredential),
    }
}

/// Get a user by id
pub async fn get_user<'e, E>(executor: E, user_id: i64) -> Result<Option<User>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as("SELECT id, username, email, name, bio, avatar_url FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(executor)
        .await
}

/// Get the public view of a user by id
pub async fn get_public_user<'e, E>(
    executor: E,
    user_id: i64,
) -> Result<Option<PublicUser>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as("SELECT id, username, name, bio, avatar_url FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(executor)
        .await
}

/// Update display name and bio; the avatar reference only changes when a new
/// one was stored.
pub async fn update_profile<'e, E>(
    executor: E,
    user_id: i64,
    name: &str,
    bio: &str,
    avatar_url: Option<&str>,
) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    match avatar_url {
        Some(avatar) => {
            sqlx::query("UPDATE users SET name = ?, bio = ?, avatar_url = ? WHERE id = ?")
                .bind(name)
                .bind(bio)
                .bind(avatar)
                .bind(user_id)
                .execute(executor)
                .await?;
        }
        None => {
            sqlx::query("UPDATE users SET name = ?, bio = ? WHERE id = ?")
                .bind(name)
                .bind(bio)
                .bind(user_id)
                .execute(executor)
                .await?;
        }
    }
    Ok(())
}

/// Users whose username contains the query, case-insensitively.
pub async fn search_users<'e, E>(executor: E, query: &str) -> Result<Vec<PublicUser>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as(
        "SELECT id, username, name, bio, avatar_url FROM users WHERE username LIKE ?",
    )
    .bind(format!("%{}%", query))
    .fetch_all(executor)
    .await
}

/// Top 10 users by follower count, for the explore page.
pub async fn popular_users<'e, E>(executor: E) -> Result<Vec<PopularUser>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as(
        r#"
        SELECT u.id, u.username, u.name, u.avatar_url, COUNT(f.id) AS follower_count
        FROM users u
        LEFT JOIN follows f ON u.id = f.following_id
        GROUP BY u.id
        ORDER BY follower_count DESC
        LIMIT 10
        "#,
    )
    .fetch_all(executor)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("in-memory pool");
        db::init_schema(&pool).await.expect("schema");
        pool
    }

    #[tokio::test]
    async fn test_register_rejects_duplicate_username_and_email() {
        let pool = setup().await;

        create_user(&pool, "alice", "a@x.com", "h1")
            .await
            .expect("first registration");

        let dup_name = create_user(&pool, "alice", "other@x.com", "h2").await;
        assert!(matches!(dup_name, Err(IdentityError::DuplicateIdentity)));

        let dup_mail = create_user(&pool, "bob", "a@x.com", "h3").await;
        assert!(matches!(dup_mail, Err(IdentityError::DuplicateIdentity)));

        // Neither failed attempt left a row behind
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&pool)
            .await
            .expect("count");
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_authenticate_accepts_only_the_right_password() {
        let pool = setup().await;

        let hash = crate::services::password::hash_password("pw1").expect("hash");
        let id = create_user(&pool, "alice", "a@x.com", &hash)
            .await
            .expect("register");

        assert_eq!(authenticate(&pool, "alice", "pw1").await.expect("login"), id);

        let wrong_pw = authenticate(&pool, "alice", "pw2").await;
        assert!(matches!(wrong_pw, Err(IdentityError::InvalidCredential)));

        let no_user = authenticate(&pool, "nobody", "pw1").await;
        assert!(matches!(no_user, Err(IdentityError::InvalidCredential)));
    }

    #[tokio::test]
    async fn test_update_profile_keeps_avatar_unless_replaced() {
        let pool = setup().await;
        let id = create_user(&pool, "alice", "a@x.com", "h").await.expect("register");

        update_profile(&pool, id, "Alice", "hello", Some("/uploads/a.png"))
            .await
            .expect("set avatar");
        update_profile(&pool, id, "Alice A.", "hi again", None)
            .await
            .expect("edit text only");

        let user = get_user(&pool, id).await.expect("query").expect("exists");
        assert_eq!(user.name.as_deref(), Some("Alice A."));
        assert_eq!(user.bio.as_deref(), Some("hi again"));
        assert_eq!(user.avatar_url.as_deref(), Some("/uploads/a.png"));
    }

    #[tokio::test]
    async fn test_search_users_matches_substring_case_insensitively() {
        let pool = setup().await;
        create_user(&pool, "Alice", "a@x.com", "h").await.expect("alice");
        create_user(&pool, "malice", "m@x.com", "h").await.expect("malice");
        create_user(&pool, "bob", "b@x.com", "h").await.expect("bob");

        let hits = search_users(&pool, "alic").await.expect("search");
        let names: Vec<_> = hits.iter().map(|u| u.username.as_str()).collect();
        assert_eq!(names.len(), 2);
        assert!(names.contains(&"Alice"));
        assert!(names.contains(&"malice"));
    }

    #[tokio::test]
    async fn test_popular_users_ranked_by_follower_count() {
        let pool = setup().await;
        let a = create_user(&pool, "a", "a@x.com", "h").await.expect("a");
        let b = create_user(&pool, "b", "b@x.com", "h").await.expect("b");
        let c = create_user(&pool, "c", "c@x.com", "h").await.expect("c");

        // b and c follow a; c follows b
        for (follower, followed) in [(b, a), (c, a), (c, b)] {
            sqlx::query("INSERT INTO follows (user_id, following_id) VALUES (?, ?)")
                .bind(follower)
                .bind(followed)
                .execute(&pool)
                .await
                .expect("seed follow");
        }

        let ranked = popular_users(&pool).await.expect("explore");
        assert_eq!(ranked[0].username, "a");
        assert_eq!(ranked[0].follower_count, 2);
        assert_eq!(ranked[1].username, "b");
        assert_eq!(ranked[1].follower_count, 1);
    }
}
