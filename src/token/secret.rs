use std::fmt;

use sha2::{Digest, Sha256};

/// Length of a derived client secret in bytes.
pub const CLIENT_SECRET_LEN: usize = 32;

/// Per-client signing key, the SHA-256 digest of a fingerprint.
///
/// Nothing stores it; every request recomputes it from the same fingerprint.
/// Anyone able to reproduce the fingerprint can reproduce the secret, so its
/// strength is exactly that of the fingerprint source.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientSecret([u8; CLIENT_SECRET_LEN]);

impl ClientSecret {
    /// Wrap raw secret bytes.
    pub fn from_bytes(bytes: [u8; CLIENT_SECRET_LEN]) -> Self {
        Self(bytes)
    }

    /// Raw secret bytes.
    pub fn as_bytes(&self) -> &[u8; CLIENT_SECRET_LEN] {
        &self.0
    }

    /// Lowercase hex rendering of the secret.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for ClientSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ClientSecret(<redacted>)")
    }
}

/// Derive the client secret for a fingerprint string.
pub fn derive_secret(fingerprint: &str) -> ClientSecret {
    ClientSecret(Sha256::digest(fingerprint.as_bytes()).into())
}
