//! Peer resolution and channel registration.
//!
//! Resolving a target also upserts its local channel row, so any holder of a
//! [`ResolvedChannel`] can rely on the row existing.

use archiver_core::{ChannelClient, ChannelTarget, PeerAddress};
use archiver_db::models::Channel;
use archiver_db::queries::channels;
use archiver_db::Database;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::error::IngestError;

#[derive(Debug, Clone)]
pub struct ResolvedChannel {
    pub address: PeerAddress,
    pub channel: Channel,
}

/// Resolves channel targets for one owner.
///
/// Each backfill call and each poller owns its own resolver, so cached
/// addresses are never shared between them.
pub struct PeerResolver {
    client: Arc<dyn ChannelClient>,
    db: Database,
    cache: HashMap<ChannelTarget, ResolvedChannel>,
}

impl PeerResolver {
    pub fn new(client: Arc<dyn ChannelClient>, db: Database) -> Self {
        Self {
            client,
            db,
            cache: HashMap::new(),
        }
    }

    /// Resolve against the remote side, refresh the local channel row and
    /// replace any cached address for the target.
    pub async fn resolve(&mut self, target: &ChannelTarget) -> Result<ResolvedChannel, IngestError> {
        let (address, metadata) = match target {
            ChannelTarget::Handle(handle) => self
                .client
                .resolve_handle(handle)
                .await
                .map_err(|err| IngestError::from_remote(target, err))?,
            ChannelTarget::Id(id) => {
                // The bare id cannot address the channel; the access hash comes
                // from a separate lookup.
                let address = self
                    .client
                    .resolve_numeric_id(*id)
                    .await
                    .map_err(|err| IngestError::from_remote(target, err))?;
                let metadata = self
                    .client
                    .channel_metadata(&address)
                    .await
                    .map_err(|err| IngestError::from_remote(target, err))?;
                (address, metadata)
            }
        };

        let channel = channels::upsert(self.db.pool(), &metadata).await?;
        debug!(
            %target,
            channel_id = channel.id,
            remote_channel_id = channel.telegram_id,
            title = %channel.title,
            member_count = channel.member_count,
            "resolved channel"
        );

        let resolved = ResolvedChannel { address, channel };
        self.cache.insert(target.clone(), resolved.clone());
        Ok(resolved)
    }

    /// Reuse a previously resolved address when there is one.
    pub async fn resolve_cached(
        &mut self,
        target: &ChannelTarget,
    ) -> Result<ResolvedChannel, IngestError> {
        if let Some(resolved) = self.cache.get(target) {
            return Ok(resolved.clone());
        }
        self.resolve(target).await
    }

    /// Drop the cached address so the next lookup goes to the remote side.
    pub fn invalidate(&mut self, target: &ChannelTarget) -> bool {
        self.cache.remove(target).is_some()
    }
}
