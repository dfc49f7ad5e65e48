//! HTTP request handlers for fileserv.
//!
//! # Endpoints
//!
//! - `GET /{file_path}` - Mint a download URL for a file
//! - `GET /{file_path}?token=...` - Download the file with a token
//! - `GET /health` - Health check endpoint
//! - anything else - 404 `not_found`

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{rejection::QueryRejection, ConnectInfo, Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tokio_util::io::ReaderStream;
use tracing::{debug, error, info, warn};

use super::auth::{build_signed_url, TokenQuery};
use crate::error::{FileError, IdentityError, TokenRejection};
use crate::identity::{ClientInfo, FingerprintSource};
use crate::store::{FileStore, OpenedFile};
use crate::token::{Clock, SystemClock, TokenCodec, ValidityPeriod};

// =============================================================================
// Application State
// =============================================================================

/// Shared application state.
///
/// This is passed to all handlers via Axum's State extractor.
pub struct AppState<C: Clock = SystemClock> {
    /// Mints and checks tokens
    pub codec: Arc<TokenCodec<C>>,

    /// Turns a request into the fingerprint its secret derives from
    pub identity: Arc<dyn FingerprintSource>,

    /// Files that can be handed out
    pub store: FileStore,

    /// Lifetime of minted tokens
    pub validity: ValidityPeriod,

    /// `{scheme}://{domain}:{port}` prefix of signed URLs
    pub public_base_url: Arc<str>,
}

impl<C: Clock> AppState<C> {
    /// Create application state.
    pub fn new(
        codec: TokenCodec<C>,
        identity: Arc<dyn FingerprintSource>,
        store: FileStore,
        validity: ValidityPeriod,
        public_base_url: impl AsRef<str>,
    ) -> Self {
        Self {
            codec: Arc::new(codec),
            identity,
            store,
            validity,
            public_base_url: Arc::from(public_base_url.as_ref()),
        }
    }
}

impl<C: Clock> Clone for AppState<C> {
    fn clone(&self) -> Self {
        Self {
            codec: Arc::clone(&self.codec),
            identity: Arc::clone(&self.identity),
            store: self.store.clone(),
            validity: self.validity,
            public_base_url: Arc::clone(&self.public_base_url),
        }
    }
}

// =============================================================================
// Response Types
// =============================================================================

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error type identifier (e.g., "not_found", "invalid_token")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// HTTP status code (included for convenience)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl ErrorResponse {
    /// Create a new error response with status code.
    pub fn with_status(
        error: impl Into<String>,
        message: impl Into<String>,
        status: StatusCode,
    ) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: Some(status.as_u16()),
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always "OK"
    pub message: String,

    /// HTTP status, repeated in the body
    pub status: u16,

    /// Service version
    pub version: String,
}

// =============================================================================
// Error Handling
// =============================================================================

/// Errors from the file route.
#[derive(Debug)]
pub enum ServeError {
    /// The client could not be identified
    Identity(IdentityError),

    /// The file could not be resolved or read
    File(FileError),

    /// The token was rejected
    InvalidToken(TokenRejection),
}

impl From<IdentityError> for ServeError {
    fn from(err: IdentityError) -> Self {
        ServeError::Identity(err)
    }
}

impl From<FileError> for ServeError {
    fn from(err: FileError) -> Self {
        ServeError::File(err)
    }
}

impl From<TokenRejection> for ServeError {
    fn from(err: TokenRejection) -> Self {
        ServeError::InvalidToken(err)
    }
}

/// Convert ServeError to HTTP response.
///
/// Every token rejection becomes the same 403 so clients learn nothing about
/// which check failed. The cause is logged: a signature mismatch may be a
/// forgery attempt and is logged at warn, the rest at debug.
impl IntoResponse for ServeError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match &self {
            ServeError::Identity(err) => {
                warn!(error = %err, "Client identification failed");
                (
                    StatusCode::FORBIDDEN,
                    "identity_required",
                    err.to_string(),
                )
            }
            ServeError::File(FileError::NotFound(path)) => {
                info!(path = %path, "File not found");
                not_found()
            }
            ServeError::File(FileError::InvalidPath(path)) => {
                warn!(path = %path, "Rejected path outside the serve root");
                not_found()
            }
            ServeError::File(err @ FileError::Io { .. }) => {
                error!(error = %err, "Failed to read file");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal server error".to_string(),
                )
            }
            ServeError::InvalidToken(rejection) => {
                match rejection {
                    TokenRejection::SignatureMismatch => {
                        warn!(reason = %rejection, "Token rejected");
                    }
                    _ => {
                        debug!(reason = %rejection, "Token rejected");
                    }
                }
                (
                    StatusCode::FORBIDDEN,
                    "invalid_token",
                    "Invalid or expired token".to_string(),
                )
            }
        };

        let error_response = ErrorResponse::with_status(error_type, message, status);
        (status, Json(error_response)).into_response()
    }
}

fn not_found() -> (StatusCode, &'static str, String) {
    (
        StatusCode::NOT_FOUND,
        "not_found",
        "Path not found".to_string(),
    )
}

// =============================================================================
// Handlers
// =============================================================================

/// Handle file requests.
///
/// # Endpoint
///
/// `GET /{file_path}[?token=...]`
///
/// Without a token the response is a JSON string holding a signed URL for
/// the file, valid for the requesting client only. With a token the file
/// is streamed as an attachment.
///
/// # Errors
///
/// - 403 Forbidden: client cannot be identified, or the token is invalid
/// - 404 Not Found: no such file under the serve root
/// - 500 Internal Server Error: file could not be read
pub async fn file_handler<C: Clock + 'static>(
    State(state): State<AppState<C>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Path(file_path): Path<String>,
    query: Result<Query<TokenQuery>, QueryRejection>,
    headers: HeaderMap,
) -> Result<Response, ServeError> {
    let addr = peer.ip().to_canonical();
    info!(path = %file_path, client = %addr, "Request received");

    // A query string that does not parse (e.g. a repeated `token`) is a
    // malformed token, not a client error of its own.
    let Query(query) = query.map_err(|rejection| {
        debug!(error = %rejection, "Unreadable query string");
        ServeError::InvalidToken(TokenRejection::Encoding)
    })?;

    let fingerprint = state
        .identity
        .fingerprint(&ClientInfo::new(addr, &headers))?;
    let secret = fingerprint.derive_secret();

    let Some(token) = query.token else {
        state.store.resolve(&file_path).await?;

        let token = state.codec.mint(state.validity, &secret, &file_path);
        let signed_url = build_signed_url(&state.public_base_url, &file_path, &token);
        info!(path = %file_path, client = %addr, "Issued download token");
        debug!(url = %signed_url, "Signed URL");
        return Ok(Json(signed_url).into_response());
    };

    let claims = state.codec.check(&token, &secret, &file_path)?;
    let OpenedFile {
        file,
        len,
        file_name,
    } = state.store.open(&file_path).await?;

    info!(
        path = %file_path,
        client = %addr,
        bytes = len,
        expires = claims.expiry,
        "Serving file"
    );

    let body = Body::from_stream(ReaderStream::new(file));
    Ok((
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/octet-stream"),
            ),
            (header::CONTENT_LENGTH, HeaderValue::from(len)),
            (header::CONTENT_DISPOSITION, content_disposition(&file_name)),
        ],
        body,
    )
        .into_response())
}

/// Answer requests that match no route.
///
/// `GET /` names no file, so it gets the same 404 as a missing one.
pub async fn not_found_handler(uri: Uri) -> ServeError {
    ServeError::File(FileError::NotFound(uri.path().to_string()))
}

/// Handle health check requests.
///
/// # Endpoint
///
/// `GET /health`
///
/// # Response
///
/// ```json
/// {
///   "message": "OK",
///   "status": 200,
///   "version": "0.1.0"
/// }
/// ```
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        message: "OK".to_string(),
        status: StatusCode::OK.as_u16(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// `attachment` disposition naming the download.
///
/// Names that are not plain printable ASCII use the RFC 6266 `filename*`
/// form.
fn content_disposition(file_name: &str) -> HeaderValue {
    let plain = !file_name.is_empty()
        && file_name
            .bytes()
            .all(|b| (b' '..=b'~').contains(&b) && b != b'"' && b != b'\\');
    let value = if plain {
        format!("attachment; filename=\"{}\"", file_name)
    } else {
        format!(
            "attachment; filename*=utf-8''{}",
            urlencoding::encode(file_name)
        )
    };
    HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}

// =============================================================================
// Tests
// =============================================================================
