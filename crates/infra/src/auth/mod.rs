//! Certificate-based confidential-client authentication
//!
//! Mirrors the upstream app-registration flow: the certificate bundle is
//! pulled from the secret vault, split into signing material, exchanged for
//! a bearer credential, and cached until near-expiry.

mod assertion;
mod certificate;
mod confidential;
mod provider;

pub use certificate::Certificate;
pub use confidential::ConfidentialClient;
pub use provider::{CredentialProvider, CredentialProviderConfig};
