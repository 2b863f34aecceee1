//! Upstream feed clients
//!
//! Two window-oriented event sources: the paginated activity feed and the
//! single-request message-trace report.

mod activity;
mod trace;

pub use activity::{ActivityFeedClient, ActivityFeedConfig};
pub use trace::{MessageTraceClient, MessageTraceConfig};
