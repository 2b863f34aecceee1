//! Port interfaces for external collaborators
//!
//! The indexer core treats the secret vault, the checkpoint store and the
//! event sink as simple I/O collaborators behind async traits. Concrete
//! implementations live in the embedding process; tests use in-memory
//! mocks.

use async_trait::async_trait;
use auditflow_domain::{AuditEvent, Result, TimeWindow};
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

/// Trait for retrieving named secrets (the certificate bundle).
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Fetch a secret by name.
    ///
    /// A missing or empty secret surfaces
    /// `AuditFlowError::SecretUnavailable`.
    async fn get_secret(&self, name: &str) -> Result<String>;
}

/// Trait for persisting the "last successful fetch" timestamp.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Read the checkpoint, `None` when no fetch has succeeded yet.
    async fn read_checkpoint(&self, key: &str) -> Result<Option<DateTime<Utc>>>;

    /// Advance the checkpoint. Called only after a successful publish.
    async fn write_checkpoint(&self, key: &str, at: DateTime<Utc>) -> Result<()>;
}

/// Trait for the downstream event sink.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Publish a complete, filtered batch for one window.
    async fn publish(&self, batch: &[AuditEvent]) -> Result<()>;
}

/// Trait for enumerating events over a time window.
///
/// Implemented by both the paginated activity-feed client and the
/// single-request message-trace client.
#[async_trait]
pub trait ActivityFeedSource: Send + Sync {
    /// Fetch every event in `[window.start, window.end)`, already filtered.
    ///
    /// Must abort promptly and surface `AuditFlowError::Cancelled` when
    /// `cancel` fires.
    async fn fetch_window(
        &self,
        window: &TimeWindow,
        cancel: &CancellationToken,
    ) -> Result<Vec<AuditEvent>>;
}
