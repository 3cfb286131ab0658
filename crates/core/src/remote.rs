//! Contract of the remote channel client.
//!
//! The engine treats the messaging platform as an opaque RPC boundary; any
//! transport that can answer these calls can feed it.

use async_trait::async_trait;
use thiserror::Error;

use crate::types::{ChannelMetadata, PeerAddress, RawMessage};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    #[error("no entity found for {0}")]
    NotFound(String),

    #[error("{0} is not a broadcast channel")]
    WrongEntityKind(String),

    #[error("remote call failed: {0}")]
    Transient(String),
}

#[async_trait]
pub trait ChannelClient: Send + Sync {
    /// Resolve a public handle (without marker) to an address plus current
    /// metadata in one round trip.
    async fn resolve_handle(
        &self,
        handle: &str,
    ) -> Result<(PeerAddress, ChannelMetadata), RemoteError>;

    /// Look up the access credential for a bare numeric identifier.
    async fn resolve_numeric_id(&self, id: i64) -> Result<PeerAddress, RemoteError>;

    async fn channel_metadata(&self, peer: &PeerAddress) -> Result<ChannelMetadata, RemoteError>;

    /// Channels the logged-in account currently follows, at most `limit`.
    async fn followed_channels(&self, limit: i64) -> Result<Vec<ChannelMetadata>, RemoteError>;

    /// Fetch up to `limit` messages, newest first. With a cursor, only
    /// messages strictly older than the cursor id are returned.
    async fn fetch_history(
        &self,
        peer: &PeerAddress,
        cursor: Option<i64>,
        limit: i64,
    ) -> Result<Vec<RawMessage>, RemoteError>;
}
