use std::fmt;
use std::net::IpAddr;

use http::header::{ACCEPT_LANGUAGE, HOST, USER_AGENT};
use http::{HeaderMap, HeaderName, HeaderValue};

use crate::token::{derive_secret, ClientSecret};

/// Separator between fingerprint segments.
pub const FINGERPRINT_DELIMITER: char = ';';

/// Request headers folded into a header fingerprint, in order.
pub const FINGERPRINT_HEADERS: [HeaderName; 3] = [USER_AGENT, ACCEPT_LANGUAGE, HOST];

/// The identity string a client secret is derived from.
///
/// Segment order and delimiter are part of the token contract; changing
/// either changes every derived secret.
#[derive(Clone, PartialEq, Eq)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Wrap a pre-built fingerprint string.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// `addr;user-agent;accept-language;host`, empty for absent headers.
    pub fn from_request(addr: IpAddr, headers: &HeaderMap) -> Self {
        let mut value = addr.to_string();
        for name in &FINGERPRINT_HEADERS {
            value.push(FINGERPRINT_DELIMITER);
            if let Some(header) = headers.get(name) {
                push_latin1(&mut value, header);
            }
        }
        Self(value)
    }

    /// The fingerprint string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Derive the signing secret for this fingerprint.
    pub fn derive_secret(&self) -> ClientSecret {
        derive_secret(&self.0)
    }
}

// Fingerprints embed client addresses and sometimes server-held keys.
impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({} bytes)", self.0.len())
    }
}

/// Header bytes are ISO-8859-1; each byte maps to the code point of the same value.
fn push_latin1(out: &mut String, value: &HeaderValue) {
    out.extend(value.as_bytes().iter().map(|&b| char::from(b)));
}
