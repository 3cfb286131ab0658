use crate::models::Channel;
use archiver_core::types::{normalize_handle, ChannelMetadata};
use chrono::Utc;
use sqlx::SqlitePool;

/// Insert or refresh a channel from freshly fetched remote metadata.
///
/// Keyed on the remote id. If another remote channel still holds the same
/// handle locally, that stale claim is released first so the handle stays
/// unique.
pub async fn upsert(pool: &SqlitePool, metadata: &ChannelMetadata) -> Result<Channel, sqlx::Error> {
    let username = metadata
        .username
        .as_deref()
        .map(normalize_handle)
        .filter(|handle| !handle.is_empty());
    let now = Utc::now();

    let mut tx = pool.begin().await?;

    if let Some(handle) = username.as_deref() {
        sqlx::query(
            r#"
            UPDATE channels
            SET username = NULL, updated_at = ?
            WHERE username = ? AND telegram_id != ?
            "#,
        )
        .bind(now)
        .bind(handle)
        .bind(metadata.id)
        .execute(&mut *tx)
        .await?;
    }

    let channel = sqlx::query_as::<_, Channel>(
        r#"
        INSERT INTO channels
            (telegram_id, username, title, description, member_count,
             is_active, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, 1, ?, ?)
        ON CONFLICT (telegram_id) DO UPDATE SET
            username = excluded.username,
            title = excluded.title,
            description = COALESCE(excluded.description, channels.description),
            member_count = excluded.member_count,
            is_active = 1,
            updated_at = excluded.updated_at
        RETURNING id, telegram_id, username, title, description, member_count,
                  is_active, created_at, updated_at
        "#,
    )
    .bind(metadata.id)
    .bind(username.as_deref())
    .bind(metadata.title.as_str())
    .bind(metadata.description.as_deref())
    .bind(metadata.member_count)
    .bind(now)
    .bind(now)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(channel)
}

pub async fn get_by_id(pool: &SqlitePool, id: i64) -> Result<Option<Channel>, sqlx::Error> {
    sqlx::query_as::<_, Channel>(
        r#"
        SELECT id, telegram_id, username, title, description, member_count,
               is_active, created_at, updated_at
        FROM channels
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn get_by_telegram_id(
    pool: &SqlitePool,
    telegram_id: i64,
) -> Result<Option<Channel>, sqlx::Error> {
    sqlx::query_as::<_, Channel>(
        r#"
        SELECT id, telegram_id, username, title, description, member_count,
               is_active, created_at, updated_at
        FROM channels
        WHERE telegram_id = ?
        "#,
    )
    .bind(telegram_id)
    .fetch_optional(pool)
    .await
}

/// Handles compare case-insensitively and may be passed with a leading `@`.
pub async fn get_by_username(
    pool: &SqlitePool,
    username: &str,
) -> Result<Option<Channel>, sqlx::Error> {
    sqlx::query_as::<_, Channel>(
        r#"
        SELECT id, telegram_id, username, title, description, member_count,
               is_active, created_at, updated_at
        FROM channels
        WHERE username = ?
        "#,
    )
    .bind(normalize_handle(username))
    .fetch_optional(pool)
    .await
}

pub async fn list_active(pool: &SqlitePool) -> Result<Vec<Channel>, sqlx::Error> {
    sqlx::query_as::<_, Channel>(
        r#"
        SELECT id, telegram_id, username, title, description, member_count,
               is_active, created_at, updated_at
        FROM channels
        WHERE is_active = 1
        ORDER BY title
        "#,
    )
    .fetch_all(pool)
    .await
}
