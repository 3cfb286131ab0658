//! Per-channel incremental update polling.
//!
//! Every poller owns its resolver, timer and high-water mark. Pollers only
//! meet each other through the database.

use archiver_core::{ChannelClient, ChannelTarget, RawMessage};
use archiver_db::queries::messages;
use archiver_db::Database;
use std::sync::Arc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::IngestConfig;
use crate::normalize;
use crate::resolver::PeerResolver;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    Idle,
    Fetching,
    Waiting,
    Stopped,
}

/// Result of a single poll attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Fetched {
        persisted: u64,
        skipped: u64,
        high_water_mark: i64,
    },
    /// A recoverable failure; the next tick tries again.
    Deferred,
    /// The channel can no longer be resolved.
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Cancelled,
    Unresolvable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollerExit {
    pub target: ChannelTarget,
    pub reason: StopReason,
    pub high_water_mark: Option<i64>,
}

pub struct ChannelPoller {
    target: ChannelTarget,
    client: Arc<dyn ChannelClient>,
    db: Database,
    config: IngestConfig,
    resolver: PeerResolver,
    state: PollerState,
    high_water_mark: Option<i64>,
}

impl ChannelPoller {
    pub fn new(
        target: ChannelTarget,
        client: Arc<dyn ChannelClient>,
        db: Database,
        config: IngestConfig,
    ) -> Self {
        let resolver = PeerResolver::new(client.clone(), db.clone());
        Self {
            target,
            client,
            db,
            config,
            resolver,
            state: PollerState::Idle,
            high_water_mark: None,
        }
    }

    pub fn target(&self) -> &ChannelTarget {
        &self.target
    }

    pub fn state(&self) -> PollerState {
        self.state
    }

    /// `None` until the first poll has loaded the mark from storage.
    pub fn high_water_mark(&self) -> Option<i64> {
        self.high_water_mark
    }

    /// Fetch the newest page and persist whatever is newer than the mark.
    pub async fn poll_once(&mut self) -> PollOutcome {
        if self.state == PollerState::Stopped {
            return PollOutcome::Stopped;
        }
        self.state = PollerState::Fetching;

        let resolved = match self.resolver.resolve_cached(&self.target).await {
            Ok(resolved) => resolved,
            Err(err) if err.is_unresolvable() => {
                warn!(target_channel = %self.target, error = %err, "channel unresolvable, stopping poller");
                self.state = PollerState::Stopped;
                return PollOutcome::Stopped;
            }
            Err(err) => {
                warn!(target_channel = %self.target, error = %err, "resolution failed, retrying next tick");
                self.state = PollerState::Waiting;
                return PollOutcome::Deferred;
            }
        };
        let channel = &resolved.channel;

        let mark = match self.high_water_mark {
            Some(mark) => mark,
            None => match messages::latest_telegram_id(self.db.pool(), channel.id).await {
                Ok(latest) => *self.high_water_mark.insert(latest.unwrap_or(0)),
                Err(err) => {
                    warn!(channel_id = channel.id, error = %err, "failed to load high-water mark");
                    self.state = PollerState::Waiting;
                    return PollOutcome::Deferred;
                }
            },
        };

        let page = match self
            .client
            .fetch_history(&resolved.address, None, self.config.batch_size() as i64)
            .await
        {
            Ok(page) => page,
            Err(err) => {
                warn!(
                    channel_id = channel.id,
                    remote_channel_id = channel.telegram_id,
                    error = %err,
                    "poll fetch failed, retrying next tick"
                );
                // The access hash may have gone stale; look it up again next time.
                self.resolver.invalidate(&self.target);
                self.state = PollerState::Waiting;
                return PollOutcome::Deferred;
            }
        };

        let mut fresh: Vec<&RawMessage> = page
            .iter()
            .filter(|raw| raw.id().is_some_and(|id| id > mark))
            .collect();
        fresh.sort_by_key(|raw| raw.id());

        let mut persisted = 0;
        let mut skipped = 0;
        let mut high_water_mark = mark;
        for raw in fresh {
            match normalize::store(&self.db, channel, raw).await {
                Some(message) => {
                    persisted += 1;
                    high_water_mark = high_water_mark.max(message.telegram_id);
                }
                None => skipped += 1,
            }
        }
        self.high_water_mark = Some(high_water_mark);
        self.state = PollerState::Waiting;

        if persisted > 0 {
            info!(
                channel_id = channel.id,
                remote_channel_id = channel.telegram_id,
                persisted,
                high_water_mark,
                "new messages"
            );
        } else {
            debug!(channel_id = channel.id, high_water_mark, "no new messages");
        }

        PollOutcome::Fetched {
            persisted,
            skipped,
            high_water_mark,
        }
    }

    /// Poll on every interval tick until cancelled or the channel becomes
    /// unresolvable. The first poll happens one interval after start.
    pub async fn run(mut self, cancel: CancellationToken) -> PollerExit {
        let period = self.config.poll_interval();
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.state = PollerState::Idle;

        info!(target_channel = %self.target, interval = ?period, "poller started");

        let reason = loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break StopReason::Cancelled,
                _ = ticker.tick() => {}
            }

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => break StopReason::Cancelled,
                outcome = self.poll_once() => outcome,
            };
            if outcome == PollOutcome::Stopped {
                break StopReason::Unresolvable;
            }
        };

        self.state = PollerState::Stopped;
        info!(target_channel = %self.target, reason = ?reason, "poller stopped");

        PollerExit {
            target: self.target,
            reason,
            high_water_mark: self.high_water_mark,
        }
    }
}
