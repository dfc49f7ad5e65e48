//! HTTP server layer for fileserv.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         HTTP Layer                              │
//! │              GET /{file_path}[?token=...]                       │
//! │                                                                 │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────────┐  │
//! │  │    auth     │  │  handlers   │  │        routes           │  │
//! │  │  (API key)  │─▶│ (mint/serve)│  │  (router config)        │  │
//! │  └─────────────┘  └──────┬──────┘  └─────────────────────────┘  │
//! └──────────────────────────┼──────────────────────────────────────┘
//!                            │
//!          ┌─────────────────┼──────────────────┐
//!          ▼                 ▼                  ▼
//!      identity            token              store
//!   (fingerprint)     (mint / check)    (resolve / open)
//! ```

pub mod auth;
pub mod handlers;
pub mod routes;

pub use auth::{
    api_key_middleware, build_signed_url, ApiKey, AuthError, TokenQuery, API_KEY_HEADER,
    TOKEN_QUERY_PARAM,
};
pub use handlers::{
    file_handler, health_handler, not_found_handler, AppState, ErrorResponse, HealthResponse,
    ServeError,
};
pub use routes::{create_router, RouterConfig};
