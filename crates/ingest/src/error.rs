use archiver_core::{ChannelTarget, RemoteError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("channel {0} not found")]
    NotFound(ChannelTarget),

    #[error("{0} is not a broadcast channel")]
    WrongEntityKind(ChannelTarget),

    #[error("resolving {target} failed: {source}")]
    Transient {
        target: ChannelTarget,
        #[source]
        source: RemoteError,
    },

    #[error("history fetch failed at offset {offset:?} after {processed} messages: {source}")]
    Fetch {
        offset: Option<i64>,
        processed: u64,
        #[source]
        source: RemoteError,
    },

    #[error("cancelled after {processed} messages")]
    Cancelled { processed: u64 },

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

impl IngestError {
    pub(crate) fn from_remote(target: &ChannelTarget, err: RemoteError) -> Self {
        match err {
            RemoteError::NotFound(_) => IngestError::NotFound(target.clone()),
            RemoteError::WrongEntityKind(_) => IngestError::WrongEntityKind(target.clone()),
            source @ RemoteError::Transient(_) => IngestError::Transient {
                target: target.clone(),
                source,
            },
        }
    }

    /// Whether retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            IngestError::Transient { .. }
                | IngestError::Fetch {
                    source: RemoteError::Transient(_),
                    ..
                }
        )
    }

    /// The channel can no longer be addressed at all.
    pub fn is_unresolvable(&self) -> bool {
        matches!(
            self,
            IngestError::NotFound(_) | IngestError::WrongEntityKind(_)
        )
    }

    /// Messages already stored when the operation stopped early.
    pub fn processed(&self) -> u64 {
        match self {
            IngestError::Fetch { processed, .. } | IngestError::Cancelled { processed } => {
                *processed
            }
            _ => 0,
        }
    }
}
