//! # fileserv
//!
//! A file server that hands out short-lived download links bound to the
//! client that asked for them.
//!
//! A client first requests a file without a token and receives a signed URL.
//! Fetching that URL streams the file, but only for the same client and only
//! until the token expires. The server keeps no record of issued tokens:
//! everything needed to check one is carried inside it.
//!
//! ## Features
//!
//! - **Stateless tokens**: expiry, path and signature packed into one base64url string
//! - **Client binding**: the signing secret is derived from a client fingerprint
//! - **Pluggable identity**: request headers, a server-held key, or a proxied client certificate
//! - **Rooted file store**: traversal and symlink escapes are refused
//! - **API key gate**: optional deployment-wide `X-API-Key` check
//!
//! ## Architecture
//!
//! - [`token`] - Secret derivation, token minting and verification
//! - [`identity`] - Client fingerprints and fingerprint sources
//! - [`store`] - Files under the serve root
//! - [`server`] - Axum-based HTTP server and routes
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::net::SocketAddr;
//! use std::sync::Arc;
//!
//! use fileserv::{
//!     create_router, AppState, FileStore, HeaderFingerprint, RouterConfig, TokenCodec,
//!     ValidityPeriod,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let state = AppState::new(
//!         TokenCodec::new(),
//!         Arc::new(HeaderFingerprint),
//!         FileStore::new("files")?,
//!         ValidityPeriod::from_secs(300)?,
//!         "http://localhost:8000",
//!     );
//!     let router = create_router(state, RouterConfig::new().with_api_key("secret"));
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:8000").await?;
//!     axum::serve(
//!         listener,
//!         router.into_make_service_with_connect_info::<SocketAddr>(),
//!     )
//!     .await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod identity;
pub mod server;
pub mod store;
pub mod token;

// Re-export commonly used types
pub use config::{Cli, Command, MintConfig, MintedToken, ServeConfig, VerifyConfig};
pub use error::{FileError, IdentityError, TokenError, TokenRejection};
pub use identity::{
    ClientCertFingerprint, ClientInfo, Fingerprint, FingerprintSource, HeaderFingerprint,
    PreSharedKeyFingerprint,
};
pub use server::{create_router, AppState, RouterConfig};
pub use store::FileStore;
pub use token::{
    derive_secret, ClientSecret, Clock, ManualClock, SignatureScheme, SignedToken, SystemClock,
    TokenClaims, TokenCodec, ValidityPeriod,
};
