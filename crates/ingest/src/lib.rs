//! Channel history ingestion: resolve channels, backfill their history and
//! poll them for new posts.

pub mod backfill;
pub mod config;
pub mod engine;
pub mod error;
pub mod normalize;
pub mod poller;
pub mod resolver;

#[cfg(test)]
mod testing;

pub use backfill::{BackfillController, BackfillReport};
pub use config::IngestConfig;
pub use engine::Ingester;
pub use error::IngestError;
pub use normalize::{classify_media, normalize, MalformedMessage};
pub use poller::{ChannelPoller, PollOutcome, PollerExit, PollerState, StopReason};
pub use resolver::{PeerResolver, ResolvedChannel};
