use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;

/// Closed classification of message attachments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum MediaKind {
    None,
    Photo,
    Document,
    Webpage,
    Unknown,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::None => "none",
            MediaKind::Photo => "photo",
            MediaKind::Document => "document",
            MediaKind::Webpage => "webpage",
            MediaKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub username: Option<String>,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Channel {
    pub id: i64,
    pub telegram_id: i64,
    pub username: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub member_count: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Subscription {
    pub id: i64,
    pub user_id: i64,
    pub channel_id: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Message {
    pub id: i64,
    pub telegram_id: i64,
    pub channel_id: i64,
    pub sender_id: Option<i64>,
    pub sender_name: Option<String>,
    pub text: String,
    pub media_type: MediaKind,
    pub media_url: Option<String>,
    pub views: i64,
    pub forwards: i64,
    pub replies: i64,
    pub date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A normalized message ready to be written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMessage {
    pub telegram_id: i64,
    pub channel_id: i64,
    pub sender_id: Option<i64>,
    pub sender_name: Option<String>,
    pub text: String,
    pub media_type: MediaKind,
    pub media_url: Option<String>,
    pub views: i64,
    pub forwards: i64,
    pub replies: i64,
    pub date: DateTime<Utc>,
}
