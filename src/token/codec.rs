//! Minting and verification of signed download tokens.
//!
//! # Wire Format
//!
//! ```text
//! token     = base64url("{expiry}:{path}:{signature}")
//! signature = base64url(MAC(client_secret, "{expiry}:{path}"))
//! ```
//!
//! Both layers use the URL-safe alphabet with `=` padding. `expiry` is a
//! Unix timestamp in seconds and is inclusive: a token is still accepted
//! during the second it expires.
//!
//! The path may contain colons. Parsing takes the signature from after the
//! last colon (base64url never produces one) and the expiry from before the
//! first, leaving everything in between as the path.

use std::fmt;
use std::num::NonZeroU64;

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use super::clock::{Clock, SystemClock};
use super::secret::ClientSecret;
use crate::error::{TokenError, TokenRejection};

type HmacSha256 = Hmac<Sha256>;

/// Field delimiter inside the decoded token.
pub const FIELD_DELIMITER: char = ':';

// =============================================================================
// Parameters
// =============================================================================

/// How long a minted token stays valid. Never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidityPeriod(NonZeroU64);

impl ValidityPeriod {
    /// Validity of `secs` seconds. Zero is rejected.
    pub fn from_secs(secs: u64) -> Result<Self, TokenError> {
        NonZeroU64::new(secs)
            .map(Self)
            .ok_or(TokenError::ZeroValidity)
    }

    /// Length of the period in seconds.
    pub fn as_secs(&self) -> u64 {
        self.0.get()
    }
}

/// Keyed construction used for the signature field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignatureScheme {
    /// HMAC-SHA256 keyed by the client secret.
    #[default]
    HmacSha256,

    /// SHA-256 over `secret || message`.
    ///
    /// Produces tokens byte-identical to the ones issued by the earlier
    /// service. The construction is open to length extension, so only enable
    /// it to keep already issued links working.
    PrefixSha256,
}

impl SignatureScheme {
    /// Stable name used in configuration and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            SignatureScheme::HmacSha256 => "hmac-sha256",
            SignatureScheme::PrefixSha256 => "prefix-sha256",
        }
    }

    fn sign(&self, secret: &ClientSecret, message: &str) -> String {
        let digest: [u8; 32] = match self {
            SignatureScheme::HmacSha256 => {
                let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
                    .expect("HMAC can take key of any size");
                mac.update(message.as_bytes());
                mac.finalize().into_bytes().into()
            }
            SignatureScheme::PrefixSha256 => {
                let mut hasher = Sha256::new();
                hasher.update(secret.as_bytes());
                hasher.update(message.as_bytes());
                hasher.finalize().into()
            }
        };
        URL_SAFE.encode(digest)
    }
}

// =============================================================================
// Token Types
// =============================================================================

/// An opaque, URL-safe token string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SignedToken(String);

impl SignedToken {
    /// The encoded token.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SignedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SignedToken {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// What an accepted token grants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenClaims {
    /// Unix timestamp after which the token is refused
    pub expiry: u64,

    /// Resource the token was minted for
    pub path: String,
}

// =============================================================================
// Codec
// =============================================================================

/// Mints and verifies tokens against a clock.
///
/// The codec holds no key material and no record of issued tokens; the same
/// instance can be shared freely between request handlers.
#[derive(Debug, Clone, Default)]
pub struct TokenCodec<C: Clock = SystemClock> {
    clock: C,
    scheme: SignatureScheme,
}

impl TokenCodec<SystemClock> {
    /// Codec on the system clock with the default scheme.
    pub fn new() -> Self {
        Self::default()
    }
}

impl<C: Clock> TokenCodec<C> {
    /// Codec reading time from `clock`.
    pub fn with_clock(clock: C) -> Self {
        Self {
            clock,
            scheme: SignatureScheme::default(),
        }
    }

    /// Use a different signature scheme.
    pub fn with_scheme(mut self, scheme: SignatureScheme) -> Self {
        self.scheme = scheme;
        self
    }

    /// The signature scheme in use.
    pub fn scheme(&self) -> SignatureScheme {
        self.scheme
    }

    /// The clock in use.
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Mint a token for `path` that expires `validity` from now.
    pub fn mint(
        &self,
        validity: ValidityPeriod,
        secret: &ClientSecret,
        path: &str,
    ) -> SignedToken {
        self.issue(validity, secret, path).0
    }

    /// Like [`TokenCodec::mint`], also returning the claims the token carries.
    pub fn issue(
        &self,
        validity: ValidityPeriod,
        secret: &ClientSecret,
        path: &str,
    ) -> (SignedToken, TokenClaims) {
        let expiry = self.clock.unix_now().saturating_add(validity.as_secs());
        let token = self.mint_with_expiry(expiry, secret, path);
        let claims = TokenClaims {
            expiry,
            path: path.to_string(),
        };
        (token, claims)
    }

    /// Mint a token for `path` with an explicit expiry timestamp.
    pub fn mint_with_expiry(&self, expiry: u64, secret: &ClientSecret, path: &str) -> SignedToken {
        let message = signed_message(&expiry.to_string(), path);
        let signature = self.scheme.sign(secret, &message);
        let payload = format!("{}{}{}", message, FIELD_DELIMITER, signature);
        SignedToken(URL_SAFE.encode(payload))
    }

    /// Whether `token` grants access to `expected_path` for this secret.
    ///
    /// Never fails: malformed, forged, expired, and misdirected tokens all
    /// yield `false`.
    pub fn verify(&self, token: &str, secret: &ClientSecret, expected_path: &str) -> bool {
        self.check(token, secret, expected_path).is_ok()
    }

    /// Verify `token` and report the first failed check.
    ///
    /// Signature, expiry and path are all required. The signature is compared
    /// in constant time.
    pub fn check(
        &self,
        token: &str,
        secret: &ClientSecret,
        expected_path: &str,
    ) -> Result<TokenClaims, TokenRejection> {
        let decoded = URL_SAFE
            .decode(token.as_bytes())
            .map_err(|_| TokenRejection::Encoding)?;
        let payload = String::from_utf8(decoded).map_err(|_| TokenRejection::NotUtf8)?;

        let fields = split_fields(&payload)?;

        let expected_signature = self.scheme.sign(secret, fields.message);
        let signature_ok: bool = fields
            .signature
            .as_bytes()
            .ct_eq(expected_signature.as_bytes())
            .into();
        if !signature_ok {
            return Err(TokenRejection::SignatureMismatch);
        }

        let expiry = parse_expiry(fields.expiry)?;
        let now = self.clock.unix_now();
        if now > expiry {
            return Err(TokenRejection::Expired {
                expired_at: expiry,
                now,
            });
        }

        if fields.path != expected_path {
            return Err(TokenRejection::PathMismatch);
        }

        Ok(TokenClaims {
            expiry,
            path: fields.path.to_string(),
        })
    }
}

// =============================================================================
// Encoding Helpers
// =============================================================================

struct TokenFields<'a> {
    /// `"{expiry}:{path}"` exactly as it appeared in the token
    message: &'a str,
    expiry: &'a str,
    path: &'a str,
    signature: &'a str,
}

fn signed_message(expiry: &str, path: &str) -> String {
    format!("{}{}{}", expiry, FIELD_DELIMITER, path)
}

fn split_fields(payload: &str) -> Result<TokenFields<'_>, TokenRejection> {
    let (message, signature) = payload
        .rsplit_once(FIELD_DELIMITER)
        .ok_or(TokenRejection::MissingField)?;
    let (expiry, path) = message
        .split_once(FIELD_DELIMITER)
        .ok_or(TokenRejection::MissingField)?;

    Ok(TokenFields {
        message,
        expiry,
        path,
        signature,
    })
}

fn parse_expiry(raw: &str) -> Result<u64, TokenRejection> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(TokenRejection::InvalidExpiry);
    }
    raw.parse().map_err(|_| TokenRejection::InvalidExpiry)
}

// =============================================================================
// Tests
// =============================================================================
