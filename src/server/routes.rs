//! Router configuration for fileserv.
//!
//! # Route Structure
//!
//! ```text
//! /health          - Health check (public)
//! /{*file_path}    - Mint a signed URL or download a file (API key, if configured)
//! anything else    - 404 JSON (including `/`, which names no file)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::net::SocketAddr;
//! use fileserv::server::{create_router, AppState, RouterConfig};
//!
//! let config = RouterConfig::new()
//!     .with_api_key("deployment-key")
//!     .with_cors_origins(vec!["https://example.com".to_string()]);
//!
//! let router = create_router(state, config);
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8000").await?;
//! axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>()).await?;
//! ```

use std::time::Duration;

use axum::{middleware, routing::get, Router};
use http::header::CONTENT_TYPE;
use http::{HeaderName, Method};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::auth::{api_key_middleware, ApiKey, API_KEY_HEADER};
use super::handlers::{file_handler, health_handler, not_found_handler, AppState};
use crate::token::Clock;

// =============================================================================
// Router Configuration
// =============================================================================

/// Configuration for the HTTP router.
#[derive(Clone)]
pub struct RouterConfig {
    /// API key required on file routes (None = no key required)
    pub api_key: Option<String>,

    /// Allowed CORS origins (None = allow any origin)
    pub cors_origins: Option<Vec<String>>,

    /// Whether to enable request tracing
    pub enable_tracing: bool,
}

impl RouterConfig {
    /// Create a router configuration.
    ///
    /// By default:
    /// - No API key is required
    /// - CORS allows any origin
    /// - Tracing is enabled
    pub fn new() -> Self {
        Self {
            api_key: None,
            cors_origins: None,
            enable_tracing: true,
        }
    }

    /// Require `key` in the `X-API-Key` header. An empty key disables the check.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        let key = key.into();
        self.api_key = if key.is_empty() { None } else { Some(key) };
        self
    }

    /// Set allowed CORS origins.
    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = Some(origins);
        self
    }

    /// Allow any CORS origin.
    pub fn with_cors_any_origin(mut self) -> Self {
        self.cors_origins = None;
        self
    }

    /// Enable or disable request tracing.
    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.enable_tracing = enabled;
        self
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RouterConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouterConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("cors_origins", &self.cors_origins)
            .field("enable_tracing", &self.enable_tracing)
            .finish()
    }
}

// =============================================================================
// Router Creation
// =============================================================================

/// Create the Axum router.
///
/// The file handler reads the peer address, so the router must be served
/// with `into_make_service_with_connect_info::<SocketAddr>()` (or, in tests,
/// wrapped in `MockConnectInfo`).
pub fn create_router<C>(state: AppState<C>, config: RouterConfig) -> Router
where
    C: Clock + 'static,
{
    let cors = build_cors_layer(&config);

    let mut file_routes = Router::new()
        .route("/{*file_path}", get(file_handler::<C>))
        .with_state(state);

    if let Some(key) = &config.api_key {
        file_routes = file_routes.route_layer(middleware::from_fn_with_state(
            ApiKey::new(key),
            api_key_middleware,
        ));
    }

    let router = Router::new()
        .route("/health", get(health_handler))
        .merge(file_routes)
        .fallback(not_found_handler)
        .layer(cors);

    if config.enable_tracing {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

/// Build the CORS layer based on configuration.
fn build_cors_layer(config: &RouterConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::HEAD, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, HeaderName::from_static(API_KEY_HEADER)])
        .max_age(Duration::from_secs(86400)); // 24 hours

    match &config.cors_origins {
        None => cors.allow_origin(Any),
        Some(origins) if origins.is_empty() => cors,
        Some(origins) => {
            let parsed_origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            cors.allow_origin(parsed_origins)
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
