use crate::models::User;
use chrono::Utc;
use sqlx::SqlitePool;

/// Users are created lazily the first time they are referenced.
pub async fn get_or_create(pool: &SqlitePool, username: &str) -> Result<User, sqlx::Error> {
    let now = Utc::now();

    sqlx::query(
        r#"
        INSERT INTO users (username, created_at, updated_at)
        VALUES (?, ?, ?)
        ON CONFLICT (username) DO NOTHING
        "#,
    )
    .bind(username)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    sqlx::query_as::<_, User>(
        r#"
        SELECT id, username, phone, created_at, updated_at
        FROM users
        WHERE username = ?
        "#,
    )
    .bind(username)
    .fetch_one(pool)
    .await
}

pub async fn get_by_username(
    pool: &SqlitePool,
    username: &str,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(
        r#"
        SELECT id, username, phone, created_at, updated_at
        FROM users
        WHERE username = ?
        "#,
    )
    .bind(username)
    .fetch_optional(pool)
    .await
}
