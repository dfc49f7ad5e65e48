//! Configuration management for fileserv.
//!
//! Settings come from command-line arguments, environment variables, or a
//! `.env` file in the working directory. The server reads them once at
//! startup and passes them on as plain values; nothing is global.
//!
//! # Environment Variables
//!
//! The first group keeps the names used by earlier deployments:
//!
//! - `API_KEY` - Required `X-API-Key` value (empty disables the gate)
//! - `SERVE_PATH` - Directory to serve (default: files)
//! - `SERVE_DOMAIN` - Host name used in signed URLs (default: localhost)
//! - `SERVE_PORT` - Port used in signed URLs (default: 8000)
//! - `TOKEN_EXPIRY_SECONDS` - Token lifetime (default: 300)
//! - `LOG_LEVEL` - trace, debug, info, warn or error (default: info)
//!
//! - `FILESERV_HOST` - Bind address (default: 0.0.0.0)
//! - `FILESERV_LISTEN_PORT` - Bind port (default: `SERVE_PORT`)
//! - `FILESERV_PUBLIC_SCHEME` - Scheme used in signed URLs (default: http)
//! - `FILESERV_IDENTITY` - headers, psk or client-cert (default: headers)
//! - `FILESERV_IDENTITY_KEY` - Server key for the psk identity
//! - `FILESERV_CLIENT_CERT_HEADER` - Header carrying the client certificate digest
//! - `FILESERV_SIGNATURE` - hmac or legacy (default: hmac)
//! - `FILESERV_CORS_ORIGINS` - Allowed CORS origins, comma-separated

use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand, ValueEnum};
use http::{HeaderMap, HeaderName, HeaderValue};

use crate::identity::{
    ClientCertFingerprint, ClientInfo, Fingerprint, FingerprintSource, HeaderFingerprint,
    PreSharedKeyFingerprint, DEFAULT_CLIENT_CERT_HEADER,
};
use crate::error::TokenRejection;
use crate::server::build_signed_url;
use crate::token::{
    ClientSecret, Clock, ManualClock, SignatureScheme, SignedToken, SystemClock, TokenClaims,
    TokenCodec, ValidityPeriod,
};

// =============================================================================
// Default Values
// =============================================================================

/// Default bind address.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default directory to serve.
pub const DEFAULT_SERVE_PATH: &str = "files";

/// Default host name in signed URLs.
pub const DEFAULT_SERVE_DOMAIN: &str = "localhost";

/// Default port, both advertised and bound.
pub const DEFAULT_SERVE_PORT: u16 = 8000;

/// Default token lifetime in seconds.
pub const DEFAULT_TOKEN_EXPIRY_SECONDS: u64 = 300;

/// Default scheme in signed URLs.
pub const DEFAULT_PUBLIC_SCHEME: &str = "http";

// =============================================================================
// Value Enums
// =============================================================================

/// How clients are identified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum IdentityMode {
    /// Client address and request headers (spoofable)
    Headers,
    /// Request headers combined with a server-held key
    Psk,
    /// Client certificate digest forwarded by a TLS proxy
    ClientCert,
}

/// Token signature construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SignatureAlgorithm {
    /// HMAC-SHA256
    Hmac,
    /// SHA-256 over secret and message, compatible with previously issued links
    Legacy,
}

impl From<SignatureAlgorithm> for SignatureScheme {
    fn from(algorithm: SignatureAlgorithm) -> Self {
        match algorithm {
            SignatureAlgorithm::Hmac => SignatureScheme::HmacSha256,
            SignatureAlgorithm::Legacy => SignatureScheme::PrefixSha256,
        }
    }
}

/// Log verbosity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Directive understood by `tracing_subscriber::EnvFilter`.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Output format for the mint command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MintOutputFormat {
    /// The bare token
    Token,
    /// A complete download URL
    Url,
    /// JSON with token, expiry and URL
    Json,
}

// =============================================================================
// CLI
// =============================================================================

/// fileserv - serve files behind short-lived, client-bound download tokens.
///
/// The first request for a path returns a signed URL. Only the same client
/// can use that URL, and only until it expires.
#[derive(Parser, Debug, Clone)]
#[command(name = "fileserv")]
#[command(author, version, about, long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    serve: ServeConfig,
}

impl Cli {
    /// The selected command; `serve` when none is given.
    pub fn into_command(self) -> Command {
        self.command.unwrap_or(Command::Serve(self.serve))
    }
}

/// Top-level commands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the file server (default)
    Serve(ServeConfig),

    /// Mint a token for a client description without running the server
    Mint(MintConfig),

    /// Check a token for a client description
    Verify(VerifyConfig),
}

// =============================================================================
// Shared Identity Options
// =============================================================================

/// Options selecting the identity binding and signature scheme.
#[derive(Args, Debug, Clone)]
pub struct IdentityArgs {
    /// How clients are identified.
    #[arg(long, value_enum, default_value_t = IdentityMode::Headers, env = "FILESERV_IDENTITY")]
    pub identity: IdentityMode,

    /// Server-held key for the psk identity.
    #[arg(long, env = "FILESERV_IDENTITY_KEY", hide_env_values = true)]
    pub identity_key: Option<String>,

    /// Header a TLS proxy uses to forward the client certificate SHA-256 digest.
    #[arg(long, default_value = DEFAULT_CLIENT_CERT_HEADER, env = "FILESERV_CLIENT_CERT_HEADER")]
    pub client_cert_header: String,

    /// Token signature construction.
    #[arg(long, value_enum, default_value_t = SignatureAlgorithm::Hmac, env = "FILESERV_SIGNATURE")]
    pub signature: SignatureAlgorithm,
}

impl IdentityArgs {
    /// Validate identity options.
    pub fn validate(&self) -> Result<(), String> {
        match self.identity {
            IdentityMode::Psk => match self.identity_key.as_deref() {
                Some(key) if !key.is_empty() => Ok(()),
                _ => Err("The psk identity requires a key. \
                     Set --identity-key or FILESERV_IDENTITY_KEY"
                    .to_string()),
            },
            IdentityMode::ClientCert => self.cert_header().map(|_| ()),
            IdentityMode::Headers => Ok(()),
        }
    }

    /// Build the configured fingerprint source.
    pub fn fingerprint_source(&self) -> Result<Arc<dyn FingerprintSource>, String> {
        self.validate()?;
        let source: Arc<dyn FingerprintSource> = match self.identity {
            IdentityMode::Headers => Arc::new(HeaderFingerprint),
            IdentityMode::Psk => Arc::new(PreSharedKeyFingerprint::new(
                self.identity_key.clone().unwrap_or_default(),
            )),
            IdentityMode::ClientCert => Arc::new(ClientCertFingerprint::new(self.cert_header()?)),
        };
        Ok(source)
    }

    /// The configured signature scheme.
    pub fn signature_scheme(&self) -> SignatureScheme {
        self.signature.into()
    }

    fn cert_header(&self) -> Result<HeaderName, String> {
        HeaderName::from_bytes(self.client_cert_header.to_ascii_lowercase().as_bytes())
            .map_err(|_| format!("Invalid client certificate header: '{}'", self.client_cert_header))
    }
}

// =============================================================================
// Serve Command
// =============================================================================

/// Options for running the server.
#[derive(Args, Debug, Clone)]
pub struct ServeConfig {
    // =========================================================================
    // Access Control
    // =========================================================================
    /// Value clients must send in the X-API-Key header. Empty disables the check.
    #[arg(long, default_value = "", env = "API_KEY", hide_env_values = true)]
    pub api_key: String,

    /// Token lifetime in seconds.
    #[arg(long, default_value_t = DEFAULT_TOKEN_EXPIRY_SECONDS, env = "TOKEN_EXPIRY_SECONDS")]
    pub token_expiry_seconds: u64,

    #[command(flatten)]
    pub identity: IdentityArgs,

    // =========================================================================
    // Files and Links
    // =========================================================================
    /// Directory to serve files from.
    #[arg(long, default_value = DEFAULT_SERVE_PATH, env = "SERVE_PATH")]
    pub serve_path: PathBuf,

    /// Host name placed in signed URLs.
    #[arg(long, default_value = DEFAULT_SERVE_DOMAIN, env = "SERVE_DOMAIN")]
    pub serve_domain: String,

    /// Port placed in signed URLs.
    #[arg(long, default_value_t = DEFAULT_SERVE_PORT, env = "SERVE_PORT")]
    pub serve_port: u16,

    /// Scheme placed in signed URLs.
    #[arg(long, default_value = DEFAULT_PUBLIC_SCHEME, env = "FILESERV_PUBLIC_SCHEME")]
    pub public_scheme: String,

    // =========================================================================
    // Listener
    // =========================================================================
    /// Address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "FILESERV_HOST")]
    pub host: String,

    /// Port to bind. Defaults to the advertised port.
    #[arg(long, env = "FILESERV_LISTEN_PORT")]
    pub listen_port: Option<u16>,

    /// Allowed CORS origins (comma-separated). Any origin when unset.
    #[arg(long, env = "FILESERV_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Option<Vec<String>>,

    // =========================================================================
    // Logging
    // =========================================================================
    /// Log level.
    #[arg(long, value_enum, ignore_case = true, default_value_t = LogLevel::Info, env = "LOG_LEVEL")]
    pub log_level: LogLevel,

    /// Shortcut for debug logging.
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Disable request tracing.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,
}

impl ServeConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.token_expiry_seconds == 0 {
            return Err("token_expiry_seconds must be greater than 0".to_string());
        }

        if self.serve_domain.is_empty() {
            return Err(
                "Serve domain is required. Set --serve-domain or SERVE_DOMAIN".to_string(),
            );
        }

        if self.serve_port == 0 {
            return Err("serve_port must be greater than 0".to_string());
        }

        if self.public_scheme != "http" && self.public_scheme != "https" {
            return Err(format!(
                "public_scheme must be http or https, got '{}'",
                self.public_scheme
            ));
        }

        self.identity.validate()
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!(
            "{}:{}",
            self.host,
            self.listen_port.unwrap_or(self.serve_port)
        )
    }

    /// Base of every signed URL, without a trailing slash.
    pub fn public_base_url(&self) -> String {
        format!(
            "{}://{}:{}",
            self.public_scheme, self.serve_domain, self.serve_port
        )
    }

    /// Token lifetime.
    pub fn validity(&self) -> Result<ValidityPeriod, String> {
        ValidityPeriod::from_secs(self.token_expiry_seconds).map_err(|e| e.to_string())
    }

    /// The API key, if the gate is enabled.
    pub fn api_key(&self) -> Option<&str> {
        Some(self.api_key.as_str()).filter(|key| !key.is_empty())
    }

    /// Effective log level after `--verbose`.
    pub fn effective_log_level(&self) -> LogLevel {
        if self.verbose {
            LogLevel::Debug
        } else {
            self.log_level
        }
    }
}

// =============================================================================
// Mint / Verify Commands
// =============================================================================

/// Description of a client, mirroring what the server sees on a request.
#[derive(Args, Debug, Clone)]
pub struct ClientArgs {
    /// Client IP address.
    #[arg(long)]
    pub client_addr: IpAddr,

    /// User-Agent header sent by the client.
    #[arg(long)]
    pub user_agent: Option<String>,

    /// Accept-Language header sent by the client.
    #[arg(long)]
    pub accept_language: Option<String>,

    /// Host header sent by the client.
    #[arg(long = "host-header")]
    pub host: Option<String>,

    /// Client certificate SHA-256 digest (client-cert identity).
    #[arg(long)]
    pub client_cert: Option<String>,

    #[command(flatten)]
    pub identity: IdentityArgs,
}

impl ClientArgs {
    /// Request headers this client would send.
    pub fn headers(&self) -> Result<HeaderMap, String> {
        let mut headers = HeaderMap::new();
        let pairs = [
            (http::header::USER_AGENT, &self.user_agent),
            (http::header::ACCEPT_LANGUAGE, &self.accept_language),
            (http::header::HOST, &self.host),
        ];
        for (name, value) in pairs {
            if let Some(value) = value {
                headers.insert(name.clone(), header_value(name.as_str(), value)?);
            }
        }
        if let Some(cert) = &self.client_cert {
            let name = self.identity.cert_header()?;
            headers.insert(name, header_value(&self.identity.client_cert_header, cert)?);
        }
        Ok(headers)
    }

    /// Fingerprint the described client with the configured source.
    pub fn fingerprint(&self) -> Result<Fingerprint, String> {
        let source = self.identity.fingerprint_source()?;
        let headers = self.headers()?;
        source
            .fingerprint(&ClientInfo::new(self.client_addr, &headers))
            .map_err(|e| e.to_string())
    }
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue, String> {
    HeaderValue::from_str(value).map_err(|_| format!("Invalid value for header '{}'", name))
}

/// Options for minting a token offline.
#[derive(Args, Debug, Clone)]
pub struct MintConfig {
    #[command(flatten)]
    pub client: ClientArgs,

    /// File path the token grants access to (relative to the serve root).
    #[arg(long)]
    pub path: String,

    /// Token lifetime in seconds.
    #[arg(long, default_value_t = DEFAULT_TOKEN_EXPIRY_SECONDS, env = "TOKEN_EXPIRY_SECONDS")]
    pub ttl: u64,

    /// Output format.
    #[arg(long, value_enum, default_value_t = MintOutputFormat::Token)]
    pub format: MintOutputFormat,

    /// Base URL for url/json output (e.g. http://localhost:8000).
    #[arg(long)]
    pub base_url: Option<String>,
}

impl MintConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.ttl == 0 {
            return Err("ttl must be greater than 0".to_string());
        }
        if self.path.is_empty() {
            return Err("path must not be empty".to_string());
        }
        self.client.identity.validate()
    }

    /// Mint a token for the described client, reading time from `clock`.
    pub fn mint<C: Clock>(&self, clock: C) -> Result<MintedToken, String> {
        self.validate()?;
        let validity = ValidityPeriod::from_secs(self.ttl).map_err(|e| e.to_string())?;
        let secret = self.client.fingerprint()?.derive_secret();

        let (token, claims) = TokenCodec::with_clock(clock)
            .with_scheme(self.client.identity.signature_scheme())
            .issue(validity, &secret, &self.path);
        let url = self
            .base_url
            .as_deref()
            .map(|base_url| build_signed_url(base_url, &self.path, &token));

        Ok(MintedToken { token, claims, url })
    }

    /// Render `minted` in the configured output format.
    ///
    /// Without `--base-url` the url format falls back to `{path}?token=...`.
    pub fn render(&self, minted: &MintedToken) -> Result<String, String> {
        match self.format {
            MintOutputFormat::Token => Ok(minted.token.to_string()),
            MintOutputFormat::Url => Ok(match &minted.url {
                Some(url) => url.clone(),
                None => format!("{}?token={}", self.path, minted.token),
            }),
            MintOutputFormat::Json => {
                let json = serde_json::json!({
                    "token": minted.token.as_str(),
                    "path": minted.claims.path,
                    "expiry": minted.claims.expiry,
                    "ttl": self.ttl,
                    "signature": self.client.identity.signature_scheme().as_str(),
                    "url": minted.url,
                });
                serde_json::to_string_pretty(&json).map_err(|e| e.to_string())
            }
        }
    }
}

/// Result of the `mint` command.
#[derive(Debug, Clone)]
pub struct MintedToken {
    /// The token
    pub token: SignedToken,

    /// Path and expiry carried by the token
    pub claims: TokenClaims,

    /// Complete download URL, when a base URL was given
    pub url: Option<String>,
}

/// Options for checking a token offline.
#[derive(Args, Debug, Clone)]
pub struct VerifyConfig {
    #[command(flatten)]
    pub client: ClientArgs,

    /// File path being requested.
    #[arg(long)]
    pub path: String,

    /// Token to check.
    #[arg(long)]
    pub token: String,

    /// Evaluate at this Unix time instead of now.
    #[arg(long)]
    pub at: Option<u64>,
}

impl VerifyConfig {
    /// Secret of the described client.
    pub fn secret(&self) -> Result<ClientSecret, String> {
        Ok(self.client.fingerprint()?.derive_secret())
    }

    /// Check the token for `secret` at `--at`, or now when unset.
    pub fn check(&self, secret: &ClientSecret) -> Result<TokenClaims, TokenRejection> {
        let now = self.at.unwrap_or_else(|| SystemClock.unix_now());
        TokenCodec::with_clock(ManualClock::new(now))
            .with_scheme(self.client.identity.signature_scheme())
            .check(&self.token, secret, &self.path)
    }
}

// =============================================================================
// Tests
// =============================================================================
