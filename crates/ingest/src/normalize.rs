//! Mapping from raw remote messages to stored records.
//!
//! Normalization is total over the known shapes: unknown media is recorded as
//! [`MediaKind::Unknown`], and only entries that carry no storable content are
//! rejected as [`MalformedMessage`]. A rejection never fails the surrounding
//! page.

use archiver_core::{MessageOrigin, RawMedia, RawMessage, WebPagePreview};
use archiver_db::models::{Channel, MediaKind, Message, NewMessage};
use archiver_db::queries::messages;
use archiver_db::Database;
use chrono::DateTime;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedMessage {
    #[error("service message {id} has no content")]
    Service { id: i64 },

    #[error("message {id} is empty")]
    Empty { id: i64 },

    #[error("unrecognized message shape (id {id:?})")]
    UnknownShape { id: Option<i64> },

    #[error("message {id:?} could not be parsed: {reason}")]
    Unparsable { id: Option<i64>, reason: String },

    #[error("message id {id} is not positive")]
    InvalidId { id: i64 },

    #[error("message {id} has invalid timestamp {date}")]
    InvalidTimestamp { id: i64, date: i64 },
}

impl MalformedMessage {
    pub fn message_id(&self) -> Option<i64> {
        match self {
            MalformedMessage::Service { id }
            | MalformedMessage::Empty { id }
            | MalformedMessage::InvalidId { id }
            | MalformedMessage::InvalidTimestamp { id, .. } => Some(*id),
            MalformedMessage::UnknownShape { id } | MalformedMessage::Unparsable { id, .. } => *id,
        }
    }
}

pub fn normalize(raw: &RawMessage, channel_id: i64) -> Result<NewMessage, MalformedMessage> {
    let message = match raw {
        RawMessage::Message(message) => message,
        RawMessage::Service { id, .. } => return Err(MalformedMessage::Service { id: *id }),
        RawMessage::Empty { id } => return Err(MalformedMessage::Empty { id: *id }),
        RawMessage::Unknown { id } => return Err(MalformedMessage::UnknownShape { id: *id }),
        RawMessage::Malformed { id, reason } => {
            return Err(MalformedMessage::Unparsable {
                id: *id,
                reason: reason.clone(),
            })
        }
    };

    if message.id <= 0 {
        return Err(MalformedMessage::InvalidId { id: message.id });
    }

    // A zero date means the remote side left the field unset.
    let date = Some(message.date)
        .filter(|secs| *secs > 0)
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .ok_or(MalformedMessage::InvalidTimestamp {
            id: message.id,
            date: message.date,
        })?;

    let (sender_id, sender_name) = sender(message.from.as_ref());
    let (media_type, media_url) = classify_media(message.media.as_ref());

    Ok(NewMessage {
        telegram_id: message.id,
        channel_id,
        sender_id,
        sender_name,
        text: message.text.clone(),
        media_type,
        media_url,
        views: counter(message.views),
        forwards: counter(message.forwards),
        replies: counter(message.replies),
        date,
    })
}

/// Only user-typed origins identify a sender.
fn sender(origin: Option<&MessageOrigin>) -> (Option<i64>, Option<String>) {
    match origin {
        Some(MessageOrigin::User { user_id, name }) => (
            Some(*user_id),
            name.clone().filter(|name| !name.is_empty()),
        ),
        _ => (None, None),
    }
}

pub fn classify_media(media: Option<&RawMedia>) -> (MediaKind, Option<String>) {
    match media {
        None => (MediaKind::None, None),
        Some(RawMedia::Photo { .. }) => (MediaKind::Photo, None),
        Some(RawMedia::Document { .. }) => (MediaKind::Document, None),
        Some(RawMedia::WebPage { webpage }) => {
            let url = match webpage {
                WebPagePreview::Page { url, .. } if !url.is_empty() => Some(url.clone()),
                _ => None,
            };
            (MediaKind::Webpage, url)
        }
        Some(RawMedia::Unknown) => (MediaKind::Unknown, None),
    }
}

fn counter(value: Option<i64>) -> i64 {
    value.unwrap_or(0).max(0)
}

/// Normalize and upsert one message, logging and swallowing any failure.
pub(crate) async fn store(db: &Database, channel: &Channel, raw: &RawMessage) -> Option<Message> {
    let record = match normalize(raw, channel.id) {
        Ok(record) => record,
        Err(err) => {
            warn!(
                channel_id = channel.id,
                remote_channel_id = channel.telegram_id,
                message_id = ?err.message_id(),
                error = %err,
                "skipping malformed message"
            );
            return None;
        }
    };

    match messages::upsert(db.pool(), &record).await {
        Ok(message) => Some(message),
        Err(err) => {
            warn!(
                channel_id = channel.id,
                remote_channel_id = channel.telegram_id,
                message_id = record.telegram_id,
                error = %err,
                "failed to persist message"
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use archiver_core::RemoteMessage;

    fn message(id: i64) -> RemoteMessage {
        RemoteMessage {
            id,
            date: 1_700_000_000,
            text: "hello".to_string(),
            from: None,
            media: None,
            views: Some(12),
            forwards: Some(3),
            replies: None,
        }
    }

    #[test]
    fn test_text_counters_and_timestamp_copied() {
        let record = normalize(&RawMessage::Message(message(5)), 9).unwrap();

        assert_eq!(record.telegram_id, 5);
        assert_eq!(record.channel_id, 9);
        assert_eq!(record.text, "hello");
        assert_eq!(record.views, 12);
        assert_eq!(record.forwards, 3);
        assert_eq!(record.replies, 0);
        assert_eq!(record.date.timestamp(), 1_700_000_000);
        assert_eq!(record.media_type, MediaKind::None);
        assert!(record.media_url.is_none());
    }

    #[test]
    fn test_sender_only_from_user_origin() {
        let mut raw = message(1);
        raw.from = Some(MessageOrigin::User {
            user_id: 77,
            name: Some("Ada".to_string()),
        });
        let record = normalize(&RawMessage::Message(raw.clone()), 1).unwrap();
        assert_eq!(record.sender_id, Some(77));
        assert_eq!(record.sender_name.as_deref(), Some("Ada"));

        raw.from = Some(MessageOrigin::Channel { channel_id: 5 });
        let record = normalize(&RawMessage::Message(raw.clone()), 1).unwrap();
        assert!(record.sender_id.is_none());
        assert!(record.sender_name.is_none());

        raw.from = Some(MessageOrigin::Unknown);
        let record = normalize(&RawMessage::Message(raw), 1).unwrap();
        assert!(record.sender_id.is_none());
    }

    #[test]
    fn test_media_classification() {
        assert_eq!(classify_media(None), (MediaKind::None, None));
        assert_eq!(
            classify_media(Some(&RawMedia::Photo { photo_id: Some(1) })),
            (MediaKind::Photo, None)
        );
        assert_eq!(
            classify_media(Some(&RawMedia::Document {
                mime_type: Some("application/pdf".to_string()),
                file_name: None,
            })),
            (MediaKind::Document, None)
        );
        assert_eq!(
            classify_media(Some(&RawMedia::WebPage {
                webpage: WebPagePreview::Page {
                    url: "https://example.com/post".to_string(),
                    title: None,
                }
            })),
            (MediaKind::Webpage, Some("https://example.com/post".to_string()))
        );
        assert_eq!(
            classify_media(Some(&RawMedia::WebPage {
                webpage: WebPagePreview::Pending
            })),
            (MediaKind::Webpage, None)
        );
        assert_eq!(
            classify_media(Some(&RawMedia::Unknown)),
            (MediaKind::Unknown, None)
        );
    }

    #[test]
    fn test_contentless_entries_are_malformed() {
        assert_eq!(
            normalize(&RawMessage::Service { id: 4, date: 1 }, 1),
            Err(MalformedMessage::Service { id: 4 })
        );
        assert_eq!(
            normalize(&RawMessage::Empty { id: 3 }, 1),
            Err(MalformedMessage::Empty { id: 3 })
        );
        assert_eq!(
            normalize(&RawMessage::Unknown { id: Some(2) }, 1),
            Err(MalformedMessage::UnknownShape { id: Some(2) })
        );

        let err = normalize(
            &RawMessage::Malformed {
                id: Some(11),
                reason: "missing field `date`".to_string(),
            },
            1,
        )
        .unwrap_err();
        assert_eq!(err.message_id(), Some(11));
        assert_eq!(
            err.to_string(),
            "message Some(11) could not be parsed: missing field `date`"
        );
    }

    #[test]
    fn test_invalid_id_and_timestamp() {
        assert_eq!(
            normalize(&RawMessage::Message(message(0)), 1),
            Err(MalformedMessage::InvalidId { id: 0 })
        );

        let mut raw = message(8);
        raw.date = 0;
        let err = normalize(&RawMessage::Message(raw), 1).unwrap_err();
        assert_eq!(err, MalformedMessage::InvalidTimestamp { id: 8, date: 0 });
        assert_eq!(err.message_id(), Some(8));

        let mut raw = message(9);
        raw.date = i64::MAX;
        assert!(normalize(&RawMessage::Message(raw), 1).is_err());
    }

    #[test]
    fn test_negative_counters_clamped() {
        let mut raw = message(2);
        raw.views = Some(-1);
        let record = normalize(&RawMessage::Message(raw), 1).unwrap();
        assert_eq!(record.views, 0);
    }
}
