use std::fmt;

use http::HeaderName;

use super::{ClientInfo, Fingerprint, FingerprintSource, FINGERPRINT_DELIMITER};
use crate::error::IdentityError;

/// Default header carrying the client certificate fingerprint from a TLS proxy.
pub const DEFAULT_CLIENT_CERT_HEADER: &str = "x-client-cert-fingerprint";

// =============================================================================
// Header Fingerprint
// =============================================================================

/// Fingerprint built from the client address and a few request headers.
///
/// Every input is visible to, and forgeable by, anyone on the network path.
/// Tokens bound this way resist casual link sharing, not a determined
/// attacker.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeaderFingerprint;

impl FingerprintSource for HeaderFingerprint {
    fn name(&self) -> &'static str {
        "headers"
    }

    fn fingerprint(&self, client: &ClientInfo<'_>) -> Result<Fingerprint, IdentityError> {
        Ok(Fingerprint::from_request(client.addr, client.headers))
    }
}

// =============================================================================
// Pre-Shared Key
// =============================================================================

/// Header fingerprint prefixed with a key only the server knows.
///
/// Secrets stay bound to the same client attributes but can no longer be
/// reproduced by someone who merely spoofs them.
#[derive(Clone)]
pub struct PreSharedKeyFingerprint {
    key: String,
}

impl PreSharedKeyFingerprint {
    /// Create a source keyed by `key`.
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

impl fmt::Debug for PreSharedKeyFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreSharedKeyFingerprint")
            .field("key", &"<redacted>")
            .finish()
    }
}

impl FingerprintSource for PreSharedKeyFingerprint {
    fn name(&self) -> &'static str {
        "psk"
    }

    fn fingerprint(&self, client: &ClientInfo<'_>) -> Result<Fingerprint, IdentityError> {
        let base = Fingerprint::from_request(client.addr, client.headers);
        Ok(Fingerprint::new(format!(
            "psk{}{}{}{}",
            FINGERPRINT_DELIMITER,
            self.key,
            FINGERPRINT_DELIMITER,
            base.as_str()
        )))
    }
}

// =============================================================================
// Client Certificate
// =============================================================================

/// Fingerprint of the client's TLS certificate, as forwarded by the proxy
/// that terminated mutual TLS.
///
/// The header must hold a SHA-256 certificate digest in hex, with or without
/// `:` separators. Requests without it are refused.
#[derive(Debug, Clone)]
pub struct ClientCertFingerprint {
    header: HeaderName,
}

impl ClientCertFingerprint {
    /// Read the certificate digest from `header`.
    pub fn new(header: HeaderName) -> Self {
        Self { header }
    }

    /// The header the digest is read from.
    pub fn header(&self) -> &HeaderName {
        &self.header
    }
}

impl Default for ClientCertFingerprint {
    fn default() -> Self {
        Self::new(HeaderName::from_static(DEFAULT_CLIENT_CERT_HEADER))
    }
}

impl FingerprintSource for ClientCertFingerprint {
    fn name(&self) -> &'static str {
        "client-cert"
    }

    fn fingerprint(&self, client: &ClientInfo<'_>) -> Result<Fingerprint, IdentityError> {
        let raw = client
            .headers
            .get(&self.header)
            .ok_or_else(|| IdentityError::MissingClientCertificate {
                header: self.header.to_string(),
            })?;
        let raw = raw
            .to_str()
            .map_err(|_| IdentityError::InvalidClientCertificate("not ASCII".to_string()))?;

        let compact: String = raw.trim().chars().filter(|c| *c != ':').collect();
        let digest = hex::decode(&compact)
            .map_err(|e| IdentityError::InvalidClientCertificate(e.to_string()))?;
        if digest.len() != 32 {
            return Err(IdentityError::InvalidClientCertificate(format!(
                "expected 32 bytes, got {}",
                digest.len()
            )));
        }

        Ok(Fingerprint::new(format!(
            "cert{}{}",
            FINGERPRINT_DELIMITER,
            hex::encode(digest)
        )))
    }
}
