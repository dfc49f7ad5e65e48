//! Stateless capability tokens.
//!
//! A token authorizes one client to fetch one path until an expiry time.
//! Everything needed to check it travels inside the token; the server keeps
//! no session state and no list of issued tokens.
//!
//! ```text
//! fingerprint ──derive_secret──▶ ClientSecret
//!                                     │
//!                  ┌──────────────────┴──────────────────┐
//!                  ▼                                     ▼
//!   mint(validity, secret, path)           verify(token, secret, path)
//!                  │                                     │
//!                  ▼                                     ▼
//!            SignedToken ─────── handed to client ───▶ bool
//! ```
//!
//! There is no revocation: a token stays usable until it expires.
//!
//! # Example
//!
//! ```
//! use fileserv::token::{derive_secret, ManualClock, TokenCodec, ValidityPeriod};
//!
//! let secret = derive_secret("10.0.0.1;TestAgent;en-US;localhost");
//! let codec = TokenCodec::with_clock(ManualClock::new(1000));
//!
//! let token = codec.mint(ValidityPeriod::from_secs(5).unwrap(), &secret, "testfile.txt");
//! assert!(codec.verify(token.as_str(), &secret, "testfile.txt"));
//! assert!(!codec.verify(token.as_str(), &secret, "otherfile.txt"));
//!
//! codec.clock().set(1006);
//! assert!(!codec.verify(token.as_str(), &secret, "testfile.txt"));
//! ```

mod clock;
mod codec;
mod secret;

pub use clock::{Clock, ManualClock, SystemClock};
pub use codec::{
    SignatureScheme, SignedToken, TokenClaims, TokenCodec, ValidityPeriod, FIELD_DELIMITER,
};
pub use secret::{derive_secret, ClientSecret, CLIENT_SECRET_LEN};

/// Mint a token on the system clock with the default signature scheme.
pub fn mint(validity: ValidityPeriod, secret: &ClientSecret, path: &str) -> SignedToken {
    TokenCodec::new().mint(validity, secret, path)
}

/// Verify a token on the system clock with the default signature scheme.
pub fn verify(token: &str, secret: &ClientSecret, expected_path: &str) -> bool {
    TokenCodec::new().verify(token, secret, expected_path)
}
