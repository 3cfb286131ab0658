use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A channel as the operator names it: either its public handle or its
/// numeric remote identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum ChannelTarget {
    Handle(String),
    Id(i64),
}

impl ChannelTarget {
    pub fn handle(raw: &str) -> Self {
        ChannelTarget::Handle(normalize_handle(raw))
    }

    pub fn id(id: i64) -> Self {
        ChannelTarget::Id(id)
    }
}

/// Strip surrounding whitespace and a single leading `@` marker.
pub fn normalize_handle(raw: &str) -> String {
    let trimmed = raw.trim();
    trimmed.strip_prefix('@').unwrap_or(trimmed).to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid channel target: {0:?}")]
pub struct InvalidTarget(pub String);

impl FromStr for ChannelTarget {
    type Err = InvalidTarget;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(id) = trimmed.parse::<i64>() {
            return Ok(ChannelTarget::Id(id));
        }
        let handle = normalize_handle(trimmed);
        if handle.is_empty() || handle.contains(char::is_whitespace) {
            return Err(InvalidTarget(s.to_string()));
        }
        Ok(ChannelTarget::Handle(handle))
    }
}

impl fmt::Display for ChannelTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelTarget::Handle(handle) => write!(f, "@{}", handle),
            ChannelTarget::Id(id) => write!(f, "{}", id),
        }
    }
}

/// Everything the remote protocol needs to address a channel's history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeerAddress {
    pub channel_id: i64,
    pub access_hash: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelMetadata {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub member_count: i64,
}

/// One entry of a history page as the remote side returns it.
///
/// Deserialization never fails on a single entry: shapes this crate does not
/// know yet land in `Unknown`, and known shapes with a broken body land in
/// `Malformed`. Both keep the remote id when the entry carries one.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RawMessage {
    Message(RemoteMessage),
    Service {
        id: i64,
        date: i64,
    },
    Empty {
        id: i64,
    },
    Unknown {
        id: Option<i64>,
    },
    Malformed {
        id: Option<i64>,
        reason: String,
    },
}

/// The shapes with a known body, parsed strictly.
#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum KnownShape {
    Message(RemoteMessage),
    Service {
        id: i64,
        #[serde(default)]
        date: i64,
    },
    Empty {
        id: i64,
    },
}

impl RawMessage {
    pub fn id(&self) -> Option<i64> {
        match self {
            RawMessage::Message(message) => Some(message.id),
            RawMessage::Service { id, .. } | RawMessage::Empty { id } => Some(*id),
            RawMessage::Unknown { id } | RawMessage::Malformed { id, .. } => *id,
        }
    }

    pub fn from_value(value: Value) -> Self {
        let id = value.get("id").and_then(Value::as_i64);
        let known = matches!(
            value.get("type").and_then(Value::as_str),
            Some("message" | "service" | "empty")
        );
        if !known {
            return RawMessage::Unknown { id };
        }

        match serde_json::from_value::<KnownShape>(value) {
            Ok(KnownShape::Message(message)) => RawMessage::Message(message),
            Ok(KnownShape::Service { id, date }) => RawMessage::Service { id, date },
            Ok(KnownShape::Empty { id }) => RawMessage::Empty { id },
            Err(err) => RawMessage::Malformed {
                id,
                reason: err.to_string(),
            },
        }
    }
}

impl<'de> Deserialize<'de> for RawMessage {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Value::deserialize(deserializer).map(RawMessage::from_value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteMessage {
    pub id: i64,
    /// Seconds since the Unix epoch.
    pub date: i64,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub from: Option<MessageOrigin>,
    #[serde(default)]
    pub media: Option<RawMedia>,
    #[serde(default)]
    pub views: Option<i64>,
    #[serde(default)]
    pub forwards: Option<i64>,
    #[serde(default)]
    pub replies: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageOrigin {
    User {
        user_id: i64,
        #[serde(default)]
        name: Option<String>,
    },
    Channel {
        channel_id: i64,
    },
    Chat {
        chat_id: i64,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RawMedia {
    Photo {
        #[serde(default)]
        photo_id: Option<i64>,
    },
    Document {
        #[serde(default)]
        mime_type: Option<String>,
        #[serde(default)]
        file_name: Option<String>,
    },
    WebPage {
        webpage: WebPagePreview,
    },
    #[serde(other)]
    Unknown,
}

/// Link preview attached to a message. The remote side may still be
/// building the preview, in which case only a placeholder is available.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WebPagePreview {
    Page {
        url: String,
        #[serde(default)]
        title: Option<String>,
    },
    Pending,
    Empty,
    #[serde(other)]
    Unknown,
}
