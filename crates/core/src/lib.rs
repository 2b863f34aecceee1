//! # AuditFlow Core
//!
//! Orchestration logic for the audit-feed indexer.
//!
//! This crate contains:
//! - Port traits for external collaborators (secret store, checkpoint
//!   store, event sink, feed source)
//! - The `IndexerService` that drives checkpoint → window → fetch →
//!   publish → checkpoint advance
//!
//! ## Architecture
//! - Depends only on `auditflow-domain`
//! - No I/O of its own; all side effects live behind ports implemented in
//!   `auditflow-infra` or by the embedding process

pub mod indexer;
pub mod ports;

// Re-export commonly used items
pub use indexer::{IndexerService, IndexerServiceConfig};
pub use ports::{ActivityFeedSource, CheckpointStore, EventSink, SecretStore};
