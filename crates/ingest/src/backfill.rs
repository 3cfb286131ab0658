//! One-shot paginated history retrieval.

use archiver_core::{ChannelClient, RawMessage};
use archiver_db::Database;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::IngestConfig;
use crate::error::IngestError;
use crate::normalize;
use crate::resolver::ResolvedChannel;

/// Outcome of a completed backfill.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackfillReport {
    /// Local channel row id.
    pub channel_id: i64,
    /// Messages normalized and persisted.
    pub processed: u64,
    /// Messages fetched but skipped as malformed or unstorable.
    pub skipped: u64,
    /// History requests issued.
    pub pages: u64,
    /// Cursor used for the last request, `None` when only the newest page was read.
    pub last_cursor: Option<i64>,
}

pub struct BackfillController<'a> {
    client: &'a dyn ChannelClient,
    db: &'a Database,
    config: IngestConfig,
}

impl<'a> BackfillController<'a> {
    pub fn new(client: &'a dyn ChannelClient, db: &'a Database, config: IngestConfig) -> Self {
        Self { client, db, config }
    }

    /// Walk history newest first until `limit` messages were stored, the
    /// remote side runs dry, or a page comes back short. Skipped messages do
    /// not count toward the limit.
    pub async fn run(
        &self,
        resolved: &ResolvedChannel,
        limit: u64,
        cancel: &CancellationToken,
    ) -> Result<BackfillReport, IngestError> {
        let channel = &resolved.channel;
        let mut report = BackfillReport {
            channel_id: channel.id,
            ..Default::default()
        };
        let mut cursor: Option<i64> = None;

        while report.processed < limit {
            if report.pages > 0 {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        info!(
                            channel_id = channel.id,
                            processed = report.processed,
                            "backfill cancelled"
                        );
                        return Err(IngestError::Cancelled { processed: report.processed });
                    }
                    _ = tokio::time::sleep(self.config.request_delay()) => {}
                }
            }

            let request = self.config.batch_size().min(limit - report.processed);
            let fetched = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(IngestError::Cancelled { processed: report.processed });
                }
                result = self.client.fetch_history(&resolved.address, cursor, request as i64) => result,
            };
            report.pages += 1;
            report.last_cursor = cursor;

            let mut page = fetched.map_err(|source| IngestError::Fetch {
                offset: cursor,
                processed: report.processed,
                source,
            })?;
            page.truncate(request as usize);

            debug!(
                channel_id = channel.id,
                cursor = ?cursor,
                requested = request,
                received = page.len(),
                "fetched history page"
            );

            if page.is_empty() {
                break;
            }

            for raw in &page {
                match normalize::store(self.db, channel, raw).await {
                    Some(_) => report.processed += 1,
                    None => report.skipped += 1,
                }
            }

            if (page.len() as u64) < request {
                break;
            }

            match next_cursor(&page, cursor) {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        info!(
            channel_id = channel.id,
            remote_channel_id = channel.telegram_id,
            processed = report.processed,
            skipped = report.skipped,
            pages = report.pages,
            "backfill finished"
        );
        Ok(report)
    }
}

/// Oldest id in the page, provided it moves strictly past the previous cursor.
fn next_cursor(page: &[RawMessage], previous: Option<i64>) -> Option<i64> {
    let oldest = page.iter().filter_map(RawMessage::id).min()?;
    match previous {
        Some(previous) if oldest >= previous => None,
        _ => Some(oldest),
    }
}
