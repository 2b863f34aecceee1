//! Client-assertion JWT construction
//!
//! The confidential-client grant authenticates with a signed assertion
//! instead of a shared secret: an RS256 JWT whose `x5t` header carries the
//! certificate thumbprint and whose audience is the token endpoint.

use auditflow_domain::{AuditFlowError, Result};
use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::Serialize;
use uuid::Uuid;

use super::certificate::Certificate;

/// Assertion lifetime; only needs to outlive the one token request it
/// authenticates.
const ASSERTION_LIFETIME_SECS: i64 = 600;

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    aud: &'a str,
    iss: &'a str,
    sub: &'a str,
    jti: String,
    nbf: i64,
    iat: i64,
    exp: i64,
}

/// Build the signed client assertion for one token request.
pub(crate) fn build_client_assertion(
    certificate: &Certificate,
    client_id: &str,
    audience: &str,
    now: DateTime<Utc>,
) -> Result<String> {
    let mut header = Header::new(Algorithm::RS256);
    header.x5t = Some(certificate.thumbprint().to_string());

    let issued = now.timestamp();
    let claims = AssertionClaims {
        aud: audience,
        iss: client_id,
        sub: client_id,
        jti: Uuid::new_v4().to_string(),
        nbf: issued,
        iat: issued,
        exp: issued + ASSERTION_LIFETIME_SECS,
    };

    let key = EncodingKey::from_rsa_pem(certificate.private_key_pem().as_bytes()).map_err(
        |err| AuditFlowError::InvalidCertificate(format!("private key rejected: {err}")),
    )?;

    jsonwebtoken::encode(&header, &claims, &key)
        .map_err(|err| AuditFlowError::AuthenticationFailed(format!("failed to sign client assertion: {err}")))
}
