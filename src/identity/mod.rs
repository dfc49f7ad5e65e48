//! Client identity binding.
//!
//! Tokens are signed with a secret derived from a [`Fingerprint`] of the
//! requesting client. How that fingerprint is obtained decides how hard it is
//! to impersonate the client, so it is pluggable:
//!
//! | Source                      | Inputs                                   | Strength |
//! |-----------------------------|------------------------------------------|----------|
//! | [`HeaderFingerprint`]       | address, user-agent, accept-language, host | spoofable |
//! | [`PreSharedKeyFingerprint`] | server key + the header fingerprint      | needs the server key |
//! | [`ClientCertFingerprint`]   | TLS client certificate digest from a proxy | needs the client's private key |

mod fingerprint;
mod sources;

use std::fmt::Debug;
use std::net::IpAddr;

use http::HeaderMap;

use crate::error::IdentityError;

pub use fingerprint::{Fingerprint, FINGERPRINT_DELIMITER, FINGERPRINT_HEADERS};
pub use sources::{
    ClientCertFingerprint, HeaderFingerprint, PreSharedKeyFingerprint, DEFAULT_CLIENT_CERT_HEADER,
};

/// What the server knows about the client making a request.
#[derive(Debug, Clone, Copy)]
pub struct ClientInfo<'a> {
    /// Peer address of the connection
    pub addr: IpAddr,

    /// Request headers
    pub headers: &'a HeaderMap,
}

impl<'a> ClientInfo<'a> {
    /// Describe a client by address and headers.
    pub fn new(addr: IpAddr, headers: &'a HeaderMap) -> Self {
        Self { addr, headers }
    }
}

/// Strategy turning a request into the fingerprint its secret derives from.
///
/// Implementations must be deterministic: the same client has to produce the
/// same fingerprint on the minting request and on every later download.
pub trait FingerprintSource: Send + Sync + Debug {
    /// Short name for logs and configuration.
    fn name(&self) -> &'static str;

    /// Fingerprint the client, or refuse if it cannot be identified.
    fn fingerprint(&self, client: &ClientInfo<'_>) -> Result<Fingerprint, IdentityError>;
}
