use crate::models::{Channel, Subscription};
use chrono::Utc;
use sqlx::SqlitePool;

/// Subscribe a user to a channel. Re-subscribing re-activates the existing
/// row instead of adding a second one.
pub async fn upsert(
    pool: &SqlitePool,
    user_id: i64,
    channel_id: i64,
) -> Result<Subscription, sqlx::Error> {
    let now = Utc::now();

    sqlx::query_as::<_, Subscription>(
        r#"
        INSERT INTO subscriptions (user_id, channel_id, is_active, created_at, updated_at)
        VALUES (?, ?, 1, ?, ?)
        ON CONFLICT (user_id, channel_id) DO UPDATE SET
            is_active = 1,
            updated_at = excluded.updated_at
        RETURNING id, user_id, channel_id, is_active, created_at, updated_at
        "#,
    )
    .bind(user_id)
    .bind(channel_id)
    .bind(now)
    .bind(now)
    .fetch_one(pool)
    .await
}

/// Returns whether an active subscription was switched off.
pub async fn deactivate(
    pool: &SqlitePool,
    user_id: i64,
    channel_id: i64,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE subscriptions
        SET is_active = 0, updated_at = ?
        WHERE user_id = ? AND channel_id = ? AND is_active = 1
        "#,
    )
    .bind(Utc::now())
    .bind(user_id)
    .bind(channel_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn list_channels_for_user(
    pool: &SqlitePool,
    user_id: i64,
) -> Result<Vec<Channel>, sqlx::Error> {
    sqlx::query_as::<_, Channel>(
        r#"
        SELECT c.id, c.telegram_id, c.username, c.title, c.description,
               c.member_count, c.is_active, c.created_at, c.updated_at
        FROM channels c
        JOIN subscriptions s ON c.id = s.channel_id
        WHERE s.user_id = ? AND s.is_active = 1
        ORDER BY c.title
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}
