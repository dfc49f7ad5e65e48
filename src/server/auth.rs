//! Access control for the file routes.
//!
//! Two independent checks protect a download:
//!
//! 1. An optional deployment-wide API key, sent by every caller in the
//!    `X-API-Key` header. This is enforced by [`api_key_middleware`].
//! 2. A per-client token in the `token` query parameter, minted on the first
//!    request and verified by the file handler.
//!
//! # Signed URL Format
//!
//! ```text
//! {scheme}://{domain}:{port}/{path}?token={token}
//! ```
//!
//! Path segments and the token are percent-encoded; the server decodes them
//! before checking, so the token is checked against the decoded path.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use subtle::ConstantTimeEq;
use tracing::warn;
use url::form_urlencoded;

use super::handlers::ErrorResponse;
use crate::token::SignedToken;

/// Header carrying the deployment API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Query parameter carrying the download token.
pub const TOKEN_QUERY_PARAM: &str = "token";

// =============================================================================
// Auth Error
// =============================================================================

/// API key failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// The request did not carry an API key
    MissingApiKey,

    /// The request carried the wrong API key
    InvalidApiKey,
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::MissingApiKey => write!(f, "Forbidden: Missing API key"),
            AuthError::InvalidApiKey => write!(f, "Forbidden: Invalid API key"),
        }
    }
}

impl std::error::Error for AuthError {}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = StatusCode::FORBIDDEN;
        let error_type = match &self {
            AuthError::MissingApiKey => "missing_api_key",
            AuthError::InvalidApiKey => "invalid_api_key",
        };
        let error_response = ErrorResponse::with_status(error_type, self.to_string(), status);
        (status, Json(error_response)).into_response()
    }
}

// =============================================================================
// API Key Gate
// =============================================================================

/// The API key every file request must present.
#[derive(Clone)]
pub struct ApiKey(Arc<str>);

impl ApiKey {
    /// Require `key` on file requests.
    pub fn new(key: impl AsRef<str>) -> Self {
        Self(Arc::from(key.as_ref()))
    }

    /// Compare a presented key in constant time.
    pub fn matches(&self, presented: &[u8]) -> bool {
        self.0.as_bytes().ct_eq(presented).into()
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ApiKey(<redacted>)")
    }
}

/// Axum middleware rejecting requests without the configured API key.
///
/// # Example
///
/// ```ignore
/// use axum::{Router, middleware};
/// use fileserv::server::auth::{ApiKey, api_key_middleware};
///
/// let app = Router::new()
///     .route("/{*file_path}", get(file_handler))
///     .route_layer(middleware::from_fn_with_state(ApiKey::new("key"), api_key_middleware));
/// ```
pub async fn api_key_middleware(
    State(expected): State<ApiKey>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let client = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_default();

    let presented = match request.headers().get(API_KEY_HEADER) {
        Some(value) => value,
        None => {
            warn!(client = %client, "Missing API key");
            return Err(AuthError::MissingApiKey);
        }
    };

    if !expected.matches(presented.as_bytes()) {
        warn!(client = %client, "Invalid API key");
        return Err(AuthError::InvalidApiKey);
    }

    Ok(next.run(request).await)
}

// =============================================================================
// Token Query
// =============================================================================

/// Query parameters of a file request.
#[derive(Debug, Default, Deserialize)]
pub struct TokenQuery {
    /// Download token; absent on the minting request
    pub token: Option<String>,
}

/// Build the URL a client uses to download `path` with `token`.
///
/// `base_url` is `{scheme}://{domain}:{port}` with or without a trailing
/// slash.
pub fn build_signed_url(base_url: &str, path: &str, token: &SignedToken) -> String {
    let encoded_path = path
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/");
    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair(TOKEN_QUERY_PARAM, token.as_str())
        .finish();

    format!(
        "{}/{}?{}",
        base_url.trim_end_matches('/'),
        encoded_path,
        query
    )
}

// =============================================================================
// Tests
// =============================================================================
