//! Scripted remote client and fixtures for engine tests.

use archiver_core::{
    ChannelClient, ChannelMetadata, PeerAddress, RawMedia, RawMessage, RemoteError, RemoteMessage,
};
use archiver_db::Database;
use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;

use crate::config::IngestConfig;

pub(crate) async fn test_db() -> Database {
    let db = Database::connect_with_pool_size("sqlite::memory:", 1)
        .await
        .unwrap();
    db.migrate().await.unwrap();
    db
}

/// Fast pacing so tests never wait on real rate limits.
pub(crate) fn test_config(batch_size: i64) -> IngestConfig {
    IngestConfig::new(
        batch_size,
        Duration::from_millis(1),
        Duration::from_millis(10),
    )
}

pub(crate) fn text_message(id: i64) -> RawMessage {
    RawMessage::Message(RemoteMessage {
        id,
        date: 1_700_000_000 + id,
        text: format!("post {}", id),
        from: None,
        media: None,
        views: Some(id),
        forwards: Some(0),
        replies: Some(0),
    })
}

pub(crate) fn message_with_media(id: i64, media: RawMedia) -> RawMessage {
    match text_message(id) {
        RawMessage::Message(mut message) => {
            message.media = Some(media);
            RawMessage::Message(message)
        }
        other => other,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FetchCall {
    pub channel_id: i64,
    pub cursor: Option<i64>,
    pub limit: i64,
}

struct StubChannel {
    handle: String,
    address: PeerAddress,
    metadata: ChannelMetadata,
    /// Newest first.
    history: Vec<RawMessage>,
    removed: bool,
}

#[derive(Default)]
struct StubState {
    channels: Vec<StubChannel>,
    non_channels: Vec<String>,
    fetch_calls: Vec<FetchCall>,
    failing_fetches: Vec<usize>,
    resolve_calls: usize,
    metadata_calls: usize,
}

impl StubState {
    fn live(&self, channel_id: i64) -> Option<&StubChannel> {
        self.channels
            .iter()
            .find(|c| c.address.channel_id == channel_id && !c.removed)
    }
}

#[derive(Default)]
pub(crate) struct StubChannelClient {
    state: Mutex<StubState>,
}

impl StubChannelClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_channel(
        self,
        handle: &str,
        telegram_id: i64,
        ids: impl IntoIterator<Item = i64>,
    ) -> Self {
        let mut ids: Vec<i64> = ids.into_iter().collect();
        ids.sort_unstable_by(|a, b| b.cmp(a));
        let history = ids.into_iter().map(text_message).collect();
        self.with_history(handle, telegram_id, history)
    }

    /// `history` is served exactly in the given order, newest first.
    pub fn with_history(self, handle: &str, telegram_id: i64, history: Vec<RawMessage>) -> Self {
        self.state.lock().unwrap().channels.push(StubChannel {
            handle: handle.to_string(),
            address: address_for(telegram_id),
            metadata: ChannelMetadata {
                id: telegram_id,
                username: Some(handle.to_string()),
                title: format!("Channel {}", telegram_id),
                description: None,
                member_count: 100,
            },
            history,
            removed: false,
        });
        self
    }

    /// A handle that resolves to something other than a broadcast channel.
    pub fn with_non_channel(self, handle: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .non_channels
            .push(handle.to_string());
        self
    }

    /// Make the `index`-th history request (0-based) fail transiently.
    pub fn fail_fetch_call(self, index: usize) -> Self {
        self.state.lock().unwrap().failing_fetches.push(index);
        self
    }

    pub fn fail_next_fetch(&self) {
        let mut state = self.state.lock().unwrap();
        let next = state.fetch_calls.len();
        state.failing_fetches.push(next);
    }

    pub fn push_message(&self, telegram_id: i64, raw: RawMessage) {
        let mut state = self.state.lock().unwrap();
        if let Some(channel) = state
            .channels
            .iter_mut()
            .find(|c| c.address.channel_id == telegram_id)
        {
            channel.history.insert(0, raw);
        }
    }

    /// The channel stops resolving and its history becomes unreachable.
    pub fn remove_channel(&self, telegram_id: i64) {
        let mut state = self.state.lock().unwrap();
        for channel in state
            .channels
            .iter_mut()
            .filter(|c| c.address.channel_id == telegram_id)
        {
            channel.removed = true;
        }
    }

    pub fn address_of(&self, telegram_id: i64) -> PeerAddress {
        address_for(telegram_id)
    }

    pub fn fetch_calls(&self) -> Vec<FetchCall> {
        self.state.lock().unwrap().fetch_calls.clone()
    }

    pub fn resolve_calls(&self) -> usize {
        self.state.lock().unwrap().resolve_calls
    }

    pub fn metadata_calls(&self) -> usize {
        self.state.lock().unwrap().metadata_calls
    }
}

fn address_for(telegram_id: i64) -> PeerAddress {
    PeerAddress {
        channel_id: telegram_id,
        access_hash: telegram_id * 31 + 7,
    }
}

#[async_trait]
impl ChannelClient for StubChannelClient {
    async fn resolve_handle(
        &self,
        handle: &str,
    ) -> Result<(PeerAddress, ChannelMetadata), RemoteError> {
        let mut state = self.state.lock().unwrap();
        state.resolve_calls += 1;

        if state.non_channels.iter().any(|h| h == handle) {
            return Err(RemoteError::WrongEntityKind(handle.to_string()));
        }
        state
            .channels
            .iter()
            .find(|c| !c.removed && c.handle.eq_ignore_ascii_case(handle))
            .map(|c| (c.address, c.metadata.clone()))
            .ok_or_else(|| RemoteError::NotFound(handle.to_string()))
    }

    async fn resolve_numeric_id(&self, id: i64) -> Result<PeerAddress, RemoteError> {
        let mut state = self.state.lock().unwrap();
        state.resolve_calls += 1;
        state
            .live(id)
            .map(|c| c.address)
            .ok_or_else(|| RemoteError::NotFound(id.to_string()))
    }

    async fn channel_metadata(&self, peer: &PeerAddress) -> Result<ChannelMetadata, RemoteError> {
        let mut state = self.state.lock().unwrap();
        state.metadata_calls += 1;
        match state.live(peer.channel_id) {
            Some(c) if c.address == *peer => Ok(c.metadata.clone()),
            Some(_) => Err(RemoteError::Transient("CHANNEL_INVALID".to_string())),
            None => Err(RemoteError::NotFound(peer.channel_id.to_string())),
        }
    }

    async fn followed_channels(&self, limit: i64) -> Result<Vec<ChannelMetadata>, RemoteError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .channels
            .iter()
            .filter(|c| !c.removed)
            .take(limit.max(0) as usize)
            .map(|c| c.metadata.clone())
            .collect())
    }

    async fn fetch_history(
        &self,
        peer: &PeerAddress,
        cursor: Option<i64>,
        limit: i64,
    ) -> Result<Vec<RawMessage>, RemoteError> {
        let mut state = self.state.lock().unwrap();
        let index = state.fetch_calls.len();
        state.fetch_calls.push(FetchCall {
            channel_id: peer.channel_id,
            cursor,
            limit,
        });

        if state.failing_fetches.contains(&index) {
            return Err(RemoteError::Transient("FLOOD_WAIT_5".to_string()));
        }

        let channel = match state.live(peer.channel_id) {
            Some(c) if c.address == *peer => c,
            _ => return Err(RemoteError::Transient("CHANNEL_PRIVATE".to_string())),
        };

        Ok(channel
            .history
            .iter()
            .filter(|raw| match cursor {
                Some(cursor) => raw.id().is_some_and(|id| id < cursor),
                None => true,
            })
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }
}
