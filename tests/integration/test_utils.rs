//! Test utilities for integration tests.
//!
//! Builds a router over a temporary serve root with a manual clock, so tests
//! can mint links, move time, and fetch files as different clients.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::connect_info::MockConnectInfo;
use axum::http::{request, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tempfile::TempDir;

use fileserv::{
    create_router, AppState, FileStore, FingerprintSource, HeaderFingerprint, ManualClock,
    RouterConfig, SignatureScheme, TokenCodec, ValidityPeriod,
};

/// Unix time the manual clock starts at.
pub const START_TIME: u64 = 1000;

/// Token lifetime used by test servers.
pub const TTL_SECS: u64 = 300;

/// Public base URL placed in minted links.
pub const PUBLIC_BASE_URL: &str = "http://localhost:8000";

/// Contents of `hello.txt`.
pub const HELLO_CONTENTS: &[u8] = b"hello world";

/// Address of the default test client.
pub fn client_addr() -> SocketAddr {
    SocketAddr::from(([10, 0, 0, 1], 52000))
}

// =============================================================================
// Fixture Files
// =============================================================================

/// Serve root with a few files:
///
/// ```text
/// hello.txt
/// testfile.txt
/// docs/report.pdf
/// my docs/notes.txt
/// ```
pub fn fixture_dir() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("hello.txt"), HELLO_CONTENTS).unwrap();
    std::fs::write(dir.path().join("testfile.txt"), b"test file").unwrap();
    std::fs::create_dir(dir.path().join("docs")).unwrap();
    std::fs::write(dir.path().join("docs").join("report.pdf"), b"%PDF-1.4 fake").unwrap();
    std::fs::create_dir(dir.path().join("my docs")).unwrap();
    std::fs::write(dir.path().join("my docs").join("notes.txt"), b"notes").unwrap();
    dir
}

// =============================================================================
// Test Server
// =============================================================================

/// A router over a fixture directory with a controllable clock.
pub struct TestServer {
    pub dir: TempDir,
    pub clock: Arc<ManualClock>,
    router: Router,
}

/// Options for building a [`TestServer`].
pub struct TestServerBuilder {
    scheme: SignatureScheme,
    identity: Arc<dyn FingerprintSource>,
    config: RouterConfig,
    ttl: u64,
}

impl TestServerBuilder {
    pub fn new() -> Self {
        Self {
            scheme: SignatureScheme::default(),
            identity: Arc::new(HeaderFingerprint),
            config: RouterConfig::new().with_tracing(false),
            ttl: TTL_SECS,
        }
    }

    pub fn scheme(mut self, scheme: SignatureScheme) -> Self {
        self.scheme = scheme;
        self
    }

    pub fn identity(mut self, identity: Arc<dyn FingerprintSource>) -> Self {
        self.identity = identity;
        self
    }

    pub fn api_key(mut self, key: &str) -> Self {
        self.config = self.config.with_api_key(key);
        self
    }

    pub fn ttl(mut self, ttl: u64) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn build(self) -> TestServer {
        let dir = fixture_dir();
        let clock = Arc::new(ManualClock::new(START_TIME));
        let state = AppState::new(
            TokenCodec::with_clock(Arc::clone(&clock)).with_scheme(self.scheme),
            self.identity,
            FileStore::new(dir.path()).unwrap(),
            ValidityPeriod::from_secs(self.ttl).unwrap(),
            PUBLIC_BASE_URL,
        );
        let router = create_router(state, self.config);
        TestServer { dir, clock, router }
    }
}

impl TestServer {
    /// Default server: HMAC tokens, header identity, no API key.
    pub fn new() -> Self {
        TestServerBuilder::new().build()
    }

    /// Router as seen from the default client address.
    pub fn router(&self) -> Router {
        self.router_from(client_addr())
    }

    /// Router as seen from `addr`.
    pub fn router_from(&self, addr: SocketAddr) -> Router {
        self.router.clone().layer(MockConnectInfo(addr))
    }

    /// Send a request from the default client address.
    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        use tower::ServiceExt;
        self.router().oneshot(request).await.unwrap()
    }

    /// Request a signed URL for `path` as the default client and return it.
    pub async fn mint_url(&self, path: &str) -> String {
        let response = self.send(client_get(path).body(Body::empty()).unwrap()).await;
        assert_eq!(response.status(), 200, "minting {path} failed");
        let json = body_json(response).await;
        json.as_str().unwrap().to_string()
    }
}

// =============================================================================
// Requests and Responses
// =============================================================================

/// GET request carrying the default client's headers.
pub fn client_get(uri: &str) -> request::Builder {
    Request::builder()
        .uri(uri)
        .header("user-agent", "TestAgent")
        .header("accept-language", "en-US")
        .header("host", "localhost")
}

/// Path and query of a signed URL, ready to use as a request URI.
pub fn request_uri(signed_url: &str) -> String {
    let url = url::Url::parse(signed_url).unwrap();
    match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    }
}

/// Token carried by a signed URL.
pub fn token_of(signed_url: &str) -> String {
    let url = url::Url::parse(signed_url).unwrap();
    url.query_pairs()
        .find(|(key, _)| key == "token")
        .map(|(_, value)| value.into_owned())
        .unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}
