//! Indexer scheduler
//!
//! Periodically drives the indexer service with lifecycle management.
//! Each tick receives a child cancellation token so stopping the
//! scheduler aborts an in-flight fetch promptly.

use std::sync::Arc;
use std::time::Duration;

use auditflow_core::IndexerService;
use chrono::Utc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};

/// Type alias for task handle to avoid complexity warnings
type TaskHandle = Arc<Mutex<Option<JoinHandle<()>>>>;

/// Configuration for the indexer scheduler
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Poll interval
    pub interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(300), // 5 minutes
        }
    }
}

impl SchedulerConfig {
    pub fn from_config(config: &auditflow_domain::IndexerConfig) -> Self {
        Self { interval: Duration::from_secs(config.schedule.interval_seconds) }
    }
}

/// Periodic indexer scheduler
pub struct IndexerScheduler {
    service: Arc<IndexerService>,
    config: SchedulerConfig,
    cancellation_token: CancellationToken,
    task_handle: TaskHandle,
}

impl IndexerScheduler {
    /// Create a new scheduler around an indexer service.
    pub fn new(service: Arc<IndexerService>, config: SchedulerConfig) -> Self {
        Self {
            service,
            config,
            cancellation_token: CancellationToken::new(),
            task_handle: Arc::new(Mutex::new(None)),
        }
    }

    /// Start the scheduler
    ///
    /// Spawns a background task that runs one poll cycle per interval.
    ///
    /// # Errors
    /// Returns error if scheduler is already running
    #[instrument(skip(self))]
    pub async fn start(&mut self) -> Result<(), String> {
        if self.is_running().await {
            return Err("Scheduler already running".to_string());
        }

        info!("Starting indexer scheduler");

        // Create a new cancellation token (supports restart after stop)
        self.cancellation_token = CancellationToken::new();

        let service = Arc::clone(&self.service);
        let interval = self.config.interval;
        let cancel = self.cancellation_token.clone();

        let handle = tokio::spawn(async move {
            Self::poll_loop(service, interval, cancel).await;
        });

        *self.task_handle.lock().await = Some(handle);

        info!("Indexer scheduler started");

        Ok(())
    }

    /// Stop the scheduler gracefully
    ///
    /// Cancels the background task and awaits completion.
    ///
    /// # Errors
    /// Returns error if scheduler is not running
    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> Result<(), String> {
        if !self.is_running().await {
            return Err("Scheduler not running".to_string());
        }

        info!("Stopping indexer scheduler");

        self.cancellation_token.cancel();

        if let Some(handle) = self.task_handle.lock().await.take() {
            match tokio::time::timeout(Duration::from_secs(5), handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    error!("Scheduler task panicked: {}", e);
                    return Err("Scheduler task panicked".to_string());
                }
                Err(_) => {
                    error!("Scheduler task did not complete within timeout");
                    return Err("Scheduler task timeout".to_string());
                }
            }
        }

        info!("Indexer scheduler stopped");

        Ok(())
    }

    /// Check if scheduler is running
    pub async fn is_running(&self) -> bool {
        self.task_handle.lock().await.is_some()
    }

    /// Background poll loop
    async fn poll_loop(
        service: Arc<IndexerService>,
        interval: Duration,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Poll loop cancelled");
                    break;
                }
                _ = tokio::time::sleep(interval) => {
                    // Each tick gets its own child token so stop() aborts
                    // an in-flight fetch, not only the sleep
                    let tick_cancel = cancel.child_token();
                    match service.run_once(Utc::now(), &tick_cancel).await {
                        Ok(count) => {
                            debug!(count, "poll cycle complete");
                        }
                        Err(e) => {
                            // The checkpoint did not advance; the next tick
                            // re-covers the same window
                            error!(error = %e, "poll cycle failed");
                        }
                    }
                }
            }
        }
    }
}

/// Ensure scheduler is stopped when dropped
impl Drop for IndexerScheduler {
    fn drop(&mut self) {
        if !self.cancellation_token.is_cancelled() {
            debug!("IndexerScheduler dropped while running; cancelling");
            self.cancellation_token.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use auditflow_core::{ActivityFeedSource, CheckpointStore, EventSink, IndexerServiceConfig};
    use auditflow_domain::{AuditEvent, Result, TimeWindow};
    use chrono::{DateTime, Utc};

    use super::*;

    struct EmptyFeed;

    #[async_trait]
    impl ActivityFeedSource for EmptyFeed {
        async fn fetch_window(
            &self,
            _window: &TimeWindow,
            _cancel: &CancellationToken,
        ) -> Result<Vec<AuditEvent>> {
            Ok(Vec::new())
        }
    }

    struct NullCheckpoints;

    #[async_trait]
    impl CheckpointStore for NullCheckpoints {
        async fn read_checkpoint(&self, _key: &str) -> Result<Option<DateTime<Utc>>> {
            Ok(None)
        }

        async fn write_checkpoint(&self, _key: &str, _at: DateTime<Utc>) -> Result<()> {
            Ok(())
        }
    }

    struct NullSink;

    #[async_trait]
    impl EventSink for NullSink {
        async fn publish(&self, _batch: &[AuditEvent]) -> Result<()> {
            Ok(())
        }
    }

    fn test_service() -> Arc<IndexerService> {
        Arc::new(IndexerService::new(
            Arc::new(EmptyFeed),
            Arc::new(NullCheckpoints),
            Arc::new(NullSink),
            IndexerServiceConfig::default(),
        ))
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_scheduler_lifecycle() {
        let mut scheduler = IndexerScheduler::new(test_service(), SchedulerConfig::default());

        // Initially not running
        assert!(!scheduler.is_running().await);

        // Start succeeds
        scheduler.start().await.unwrap();
        assert!(scheduler.is_running().await);

        // Stop succeeds
        scheduler.stop().await.unwrap();
        assert!(!scheduler.is_running().await);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_double_start_fails() {
        let mut scheduler = IndexerScheduler::new(test_service(), SchedulerConfig::default());

        scheduler.start().await.unwrap();

        // Second start should fail
        let result = scheduler.start().await;
        assert!(result.is_err());

        scheduler.stop().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_restart_after_stop() {
        let mut scheduler = IndexerScheduler::new(test_service(), SchedulerConfig::default());

        scheduler.start().await.unwrap();
        scheduler.stop().await.unwrap();

        scheduler.start().await.unwrap();
        assert!(scheduler.is_running().await);
        scheduler.stop().await.unwrap();
    }
}
