//! Shared domain types for the channel archiver.
//!
//! Everything the ingestion engine and its callers exchange lives here: channel
//! targets, peer addresses, the raw shapes returned by the remote channel
//! client, and runtime settings.

pub mod config;
pub mod remote;
pub mod types;


pub use remote::{ChannelClient, RemoteError};
pub use types::{
    ChannelMetadata, ChannelTarget, MessageOrigin, PeerAddress, RawMedia, RawMessage,
    RemoteMessage, WebPagePreview,
};
