//! HTTP transport layer

mod transport;

pub use auditflow_domain::ProxyConfig;
pub use transport::{RequestDispatcher, Transport, TransportBuilder, TransportResponse};
