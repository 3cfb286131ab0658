//! Entry points exposed to the command line layer.

use archiver_core::{ChannelClient, ChannelMetadata, ChannelTarget, RemoteError};
use archiver_db::models::Channel;
use archiver_db::queries::{channels, subscriptions, users};
use archiver_db::Database;
use futures_util::future::join_all;
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::backfill::{BackfillController, BackfillReport};
use crate::config::IngestConfig;
use crate::error::IngestError;
use crate::poller::{ChannelPoller, PollerExit};
use crate::resolver::PeerResolver;

#[derive(Clone)]
pub struct Ingester {
    client: Arc<dyn ChannelClient>,
    db: Database,
    config: IngestConfig,
}

impl Ingester {
    pub fn new(client: Arc<dyn ChannelClient>, db: Database, config: IngestConfig) -> Self {
        Self { client, db, config }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn config(&self) -> IngestConfig {
        self.config
    }

    pub async fn backfill_by_handle(
        &self,
        handle: &str,
        limit: u64,
        cancel: &CancellationToken,
    ) -> Result<BackfillReport, IngestError> {
        self.backfill(&ChannelTarget::handle(handle), limit, cancel)
            .await
    }

    pub async fn backfill_by_id(
        &self,
        id: i64,
        limit: u64,
        cancel: &CancellationToken,
    ) -> Result<BackfillReport, IngestError> {
        self.backfill(&ChannelTarget::id(id), limit, cancel).await
    }

    /// Resolve the target afresh and pull up to `limit` of its newest
    /// messages. The resolved address lives only for this call.
    pub async fn backfill(
        &self,
        target: &ChannelTarget,
        limit: u64,
        cancel: &CancellationToken,
    ) -> Result<BackfillReport, IngestError> {
        let mut resolver = PeerResolver::new(self.client.clone(), self.db.clone());
        let resolved = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(IngestError::Cancelled { processed: 0 }),
            resolved = resolver.resolve(target) => resolved?,
        };

        info!(
            %target,
            channel_id = resolved.channel.id,
            limit,
            batch_size = self.config.batch_size(),
            "starting backfill"
        );

        BackfillController::new(self.client.as_ref(), &self.db, self.config)
            .run(&resolved, limit, cancel)
            .await
    }

    /// Poll every given channel until `cancel` fires. Duplicate targets share
    /// one poller. Returns once every poller has exited.
    pub async fn listen(
        &self,
        targets: Vec<ChannelTarget>,
        cancel: CancellationToken,
    ) -> Vec<PollerExit> {
        let mut seen = HashSet::new();
        let targets: Vec<ChannelTarget> = targets
            .into_iter()
            .filter(|target| seen.insert(target.clone()))
            .collect();

        if targets.is_empty() {
            info!("no channels to poll, waiting for shutdown");
            cancel.cancelled().await;
            return Vec::new();
        }

        info!(channels = targets.len(), "listening for new messages");

        let handles: Vec<_> = targets
            .into_iter()
            .map(|target| {
                let poller =
                    ChannelPoller::new(target, self.client.clone(), self.db.clone(), self.config);
                tokio::spawn(poller.run(cancel.clone()))
            })
            .collect();

        join_all(handles)
            .await
            .into_iter()
            .filter_map(|joined| match joined {
                Ok(exit) => Some(exit),
                Err(err) => {
                    error!(error = %err, "poller task failed");
                    None
                }
            })
            .collect()
    }

    /// Channels the remote account follows, straight from the remote side.
    /// Nothing is registered locally.
    pub async fn followed_channels(&self, limit: i64) -> Result<Vec<ChannelMetadata>, RemoteError> {
        self.client.followed_channels(limit).await
    }

    /// Record that `username` follows the target, registering both sides
    /// as needed.
    pub async fn subscribe(
        &self,
        username: &str,
        target: &ChannelTarget,
    ) -> Result<Channel, IngestError> {
        let user = users::get_or_create(self.db.pool(), username).await?;
        let resolved = PeerResolver::new(self.client.clone(), self.db.clone())
            .resolve(target)
            .await?;
        subscriptions::upsert(self.db.pool(), user.id, resolved.channel.id).await?;

        info!(username, channel_id = resolved.channel.id, "subscribed");
        Ok(resolved.channel)
    }

    /// Returns whether an active subscription was removed. Purely local.
    pub async fn unsubscribe(
        &self,
        username: &str,
        target: &ChannelTarget,
    ) -> Result<bool, IngestError> {
        let Some(user) = users::get_by_username(self.db.pool(), username).await? else {
            return Ok(false);
        };
        let channel = match target {
            ChannelTarget::Handle(handle) => channels::get_by_username(self.db.pool(), handle).await?,
            ChannelTarget::Id(id) => channels::get_by_telegram_id(self.db.pool(), *id).await?,
        };
        let Some(channel) = channel else {
            return Ok(false);
        };

        let removed = subscriptions::deactivate(self.db.pool(), user.id, channel.id).await?;
        if removed {
            info!(username, channel_id = channel.id, "unsubscribed");
        }
        Ok(removed)
    }

    /// Active subscriptions of a user as pollable targets.
    pub async fn subscribed_targets(&self, username: &str) -> Result<Vec<ChannelTarget>, IngestError> {
        let Some(user) = users::get_by_username(self.db.pool(), username).await? else {
            return Ok(Vec::new());
        };
        let channels = subscriptions::list_channels_for_user(self.db.pool(), user.id).await?;
        Ok(channels
            .into_iter()
            .map(|channel| ChannelTarget::id(channel.telegram_id))
            .collect())
    }
}
