use thiserror::Error;

/// Errors raised while constructing token parameters.
///
/// These indicate a programming or configuration mistake and are surfaced
/// loudly instead of producing a token nobody can use.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    /// A validity period of zero seconds would expire before it is handed out
    #[error("token validity period must be greater than zero seconds")]
    ZeroValidity,
}

/// Reasons a presented token was rejected.
///
/// Verification collapses all of these into a single `false`; the variants
/// exist so the caller can log the cause.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenRejection {
    /// Envelope is not valid padded URL-safe base64
    #[error("token is not valid base64url")]
    Encoding,

    /// Decoded envelope is not UTF-8
    #[error("token payload is not valid UTF-8")]
    NotUtf8,

    /// Payload does not carry expiry, path and signature
    #[error("token payload is missing a field")]
    MissingField,

    /// Expiry field is not an unsigned integer
    #[error("token expiry is not a valid timestamp")]
    InvalidExpiry,

    /// Signature does not match the one recomputed from the client secret
    #[error("token signature does not match")]
    SignatureMismatch,

    /// Token was valid until `expired_at`
    #[error("token expired at {expired_at} (current time: {now})")]
    Expired {
        /// Expiry carried by the token
        expired_at: u64,
        /// Clock reading at verification
        now: u64,
    },

    /// Token was minted for another resource
    #[error("token was issued for a different path")]
    PathMismatch,
}

/// Errors from resolving the client identity of a request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    /// The proxy did not forward a client certificate fingerprint
    #[error("missing client certificate fingerprint header '{header}'")]
    MissingClientCertificate { header: String },

    /// The forwarded certificate fingerprint is not hex
    #[error("invalid client certificate fingerprint: {0}")]
    InvalidClientCertificate(String),
}

/// Errors from the file store.
#[derive(Debug, Clone, Error)]
pub enum FileError {
    /// Path is empty, absolute, walks upward, or escapes the serve root
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// No regular file at the path
    #[error("file not found: {0}")]
    NotFound(String),

    /// Underlying filesystem error
    #[error("I/O error on {path}: {message}")]
    Io { path: String, message: String },
}
