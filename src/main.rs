//! fileserv - serve files behind short-lived, client-bound download tokens.
//!
//! This binary starts the HTTP server, or mints and checks tokens offline.

use clap::Parser;
use std::net::SocketAddr;
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fileserv::{
    config::{
        Cli, Command, IdentityMode, LogLevel, MintConfig, MintOutputFormat, ServeConfig,
        VerifyConfig,
    },
    server::{create_router, AppState, RouterConfig},
    store::FileStore,
    token::{SystemClock, TokenCodec},
};

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env file is fine; the environment and flags still apply.
    dotenv::dotenv().ok();

    let cli = Cli::parse();

    match cli.into_command() {
        Command::Serve(config) => run_serve(config).await,
        Command::Mint(config) => run_mint(config),
        Command::Verify(config) => run_verify(config),
    }
}

// =============================================================================
// Serve Command
// =============================================================================

async fn run_serve(config: ServeConfig) -> ExitCode {
    init_logging(config.effective_log_level());

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    info!("Starting fileserv v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration:");
    info!("  Serve path: {}", config.serve_path.display());
    info!("  Public URL: {}", config.public_base_url());
    info!("  Token expiry: {}s", config.token_expiry_seconds);
    info!("  Signature: {:?}", config.identity.signature);
    info!("  Identity: {:?}", config.identity.identity);

    if config.api_key().is_some() {
        info!("  API key: required");
    } else {
        warn!("  API key: DISABLED - anyone can request download links");
        warn!("           Set API_KEY to require the X-API-Key header");
    }

    if config.identity.identity == IdentityMode::Headers {
        warn!("  Identity is derived from client address and headers, which clients can forge");
    }

    let store = match FileStore::new(&config.serve_path) {
        Ok(store) => store,
        Err(e) => {
            error!("Cannot serve {}: {}", config.serve_path.display(), e);
            return ExitCode::FAILURE;
        }
    };

    let (identity, validity) = match (config.identity.fingerprint_source(), config.validity()) {
        (Ok(identity), Ok(validity)) => (identity, validity),
        (Err(e), _) | (_, Err(e)) => {
            error!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let codec = TokenCodec::new().with_scheme(config.identity.signature_scheme());
    let state = AppState::new(codec, identity, store, validity, config.public_base_url());
    let router = create_router(state, build_router_config(&config));

    let addr = config.bind_address();
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };

    info!("Server listening on: http://{}", addr);

    if let Err(e) = axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

/// Initialize the tracing/logging subsystem.
///
/// `RUST_LOG` takes precedence over the configured level.
fn init_logging(level: LogLevel) {
    let level = level.as_str();
    let env_filter = format!("fileserv={level},tower_http={level}");

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Build RouterConfig from the application ServeConfig.
fn build_router_config(config: &ServeConfig) -> RouterConfig {
    let mut router_config = RouterConfig::new().with_api_key(config.api_key.clone());

    if let Some(ref origins) = config.cors_origins {
        router_config = router_config.with_cors_origins(origins.clone());
    }

    router_config.with_tracing(!config.no_tracing)
}

// =============================================================================
// Mint Command
// =============================================================================

fn run_mint(config: MintConfig) -> ExitCode {
    let output = config
        .mint(SystemClock)
        .and_then(|minted| config.render(&minted));

    match output {
        Ok(output) => {
            println!("{}", output);
            if config.format == MintOutputFormat::Url && config.base_url.is_none() {
                eprintln!();
                eprintln!("Tip: Use --base-url to generate a complete URL");
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

// =============================================================================
// Verify Command
// =============================================================================

fn run_verify(config: VerifyConfig) -> ExitCode {
    let secret = match config.secret() {
        Ok(secret) => secret,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match config.check(&secret) {
        Ok(claims) => {
            println!("valid");
            println!("  path: {}", claims.path);
            println!("  expires: {}", claims.expiry);
            ExitCode::SUCCESS
        }
        Err(rejection) => {
            println!("invalid: {}", rejection);
            ExitCode::FAILURE
        }
    }
}
