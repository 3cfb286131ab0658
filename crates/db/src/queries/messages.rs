//! Message storage.
//!
//! Remote message ids are only unique within their channel, so every lookup
//! and write is keyed on `(telegram_id, channel_id)`.

use crate::models::{Message, NewMessage};
use chrono::Utc;
use sqlx::SqlitePool;

/// Insert a message, or refresh text and engagement counters if the pair
/// `(telegram_id, channel_id)` was stored before.
pub async fn upsert(pool: &SqlitePool, message: &NewMessage) -> Result<Message, sqlx::Error> {
    let now = Utc::now();

    sqlx::query_as::<_, Message>(
        r#"
        INSERT INTO messages
            (telegram_id, channel_id, sender_id, sender_name, text,
             media_type, media_url, views, forwards, replies, date,
             created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT (telegram_id, channel_id) DO UPDATE SET
            text = excluded.text,
            views = excluded.views,
            forwards = excluded.forwards,
            replies = excluded.replies,
            updated_at = excluded.updated_at
        RETURNING id, telegram_id, channel_id, sender_id, sender_name, text,
                  media_type, media_url, views, forwards, replies, date,
                  created_at, updated_at
        "#,
    )
    .bind(message.telegram_id)
    .bind(message.channel_id)
    .bind(message.sender_id)
    .bind(message.sender_name.as_deref())
    .bind(message.text.as_str())
    .bind(message.media_type)
    .bind(message.media_url.as_deref())
    .bind(message.views)
    .bind(message.forwards)
    .bind(message.replies)
    .bind(message.date)
    .bind(now)
    .bind(now)
    .fetch_one(pool)
    .await
}

/// Highest remote id stored for a channel, used as the polling high-water
/// mark.
pub async fn latest_telegram_id(
    pool: &SqlitePool,
    channel_id: i64,
) -> Result<Option<i64>, sqlx::Error> {
    sqlx::query_scalar::<_, Option<i64>>(
        r#"
        SELECT MAX(telegram_id)
        FROM messages
        WHERE channel_id = ?
        "#,
    )
    .bind(channel_id)
    .fetch_one(pool)
    .await
}

pub async fn get(
    pool: &SqlitePool,
    channel_id: i64,
    telegram_id: i64,
) -> Result<Option<Message>, sqlx::Error> {
    sqlx::query_as::<_, Message>(
        r#"
        SELECT id, telegram_id, channel_id, sender_id, sender_name, text,
               media_type, media_url, views, forwards, replies, date,
               created_at, updated_at
        FROM messages
        WHERE channel_id = ? AND telegram_id = ?
        "#,
    )
    .bind(channel_id)
    .bind(telegram_id)
    .fetch_optional(pool)
    .await
}

/// Newest first.
pub async fn list_by_channel(
    pool: &SqlitePool,
    channel_id: i64,
    limit: i64,
    offset: i64,
) -> Result<Vec<Message>, sqlx::Error> {
    sqlx::query_as::<_, Message>(
        r#"
        SELECT id, telegram_id, channel_id, sender_id, sender_name, text,
               media_type, media_url, views, forwards, replies, date,
               created_at, updated_at
        FROM messages
        WHERE channel_id = ?
        ORDER BY date DESC, telegram_id DESC
        LIMIT ? OFFSET ?
        "#,
    )
    .bind(channel_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
}

pub async fn list_recent(
    pool: &SqlitePool,
    limit: i64,
    offset: i64,
) -> Result<Vec<Message>, sqlx::Error> {
    sqlx::query_as::<_, Message>(
        r#"
        SELECT id, telegram_id, channel_id, sender_id, sender_name, text,
               media_type, media_url, views, forwards, replies, date,
               created_at, updated_at
        FROM messages
        ORDER BY date DESC, id DESC
        LIMIT ? OFFSET ?
        "#,
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
}

pub async fn count_by_channel(pool: &SqlitePool, channel_id: i64) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM messages WHERE channel_id = ?")
        .bind(channel_id)
        .fetch_one(pool)
        .await
}
