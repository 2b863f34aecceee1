//! Indexer orchestration service
//!
//! Drives one poll cycle: read the checkpoint, build the time window,
//! fetch the window's events through the feed port, publish them, and only
//! then advance the checkpoint. A partially fetched window is never
//! checkpointed as complete.

use std::sync::Arc;

use auditflow_domain::constants::{DEFAULT_CHECKPOINT_KEY, DEFAULT_LOOKBACK_HOURS};
use auditflow_domain::{Result, TimeWindow};
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::ports::{ActivityFeedSource, CheckpointStore, EventSink};

/// Configuration for the indexer service
#[derive(Debug, Clone)]
pub struct IndexerServiceConfig {
    /// Key under which the checkpoint is stored
    pub checkpoint_key: String,

    /// Window start fallback when no checkpoint exists
    pub lookback_hours: i64,
}

impl Default for IndexerServiceConfig {
    fn default() -> Self {
        Self {
            checkpoint_key: DEFAULT_CHECKPOINT_KEY.to_string(),
            lookback_hours: DEFAULT_LOOKBACK_HOURS,
        }
    }
}

/// Checkpoint-driven indexer service
///
/// Constructed once per process and shared with the scheduler; credential
/// expiry is handled inside the feed source, so the service itself holds no
/// mutable state.
pub struct IndexerService {
    feed: Arc<dyn ActivityFeedSource>,
    checkpoints: Arc<dyn CheckpointStore>,
    sink: Arc<dyn EventSink>,
    config: IndexerServiceConfig,
}

impl IndexerService {
    pub fn new(
        feed: Arc<dyn ActivityFeedSource>,
        checkpoints: Arc<dyn CheckpointStore>,
        sink: Arc<dyn EventSink>,
        config: IndexerServiceConfig,
    ) -> Self {
        Self { feed, checkpoints, sink, config }
    }

    /// Run one poll cycle ending at `now`.
    ///
    /// Returns the number of events published. The checkpoint advances to
    /// `now` only after the sink accepted the batch; any failure leaves it
    /// untouched so the next tick re-covers the same window.
    #[instrument(skip(self, cancel), fields(checkpoint_key = %self.config.checkpoint_key))]
    pub async fn run_once(
        &self,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<usize> {
        let since = self
            .checkpoints
            .read_checkpoint(&self.config.checkpoint_key)
            .await?
            .unwrap_or_else(|| now - chrono::Duration::hours(self.config.lookback_hours));

        if since >= now {
            debug!(%since, %now, "checkpoint has not fallen behind; nothing to fetch");
            return Ok(0);
        }

        let window = TimeWindow::new(since, now)?;
        info!(start = %window.api_start(), end = %window.api_end(), "fetching events for window");

        let events = self.feed.fetch_window(&window, cancel).await?;

        self.sink.publish(&events).await?;
        self.checkpoints.write_checkpoint(&self.config.checkpoint_key, now).await?;

        info!(count = events.len(), "window indexed and checkpoint advanced");
        Ok(events.len())
    }
}
