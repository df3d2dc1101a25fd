//! # Speech Proxy Backend - Main Application Entry Point
//!
//! A thin backend for a browser speech and translation client. It never exposes the
//! cloud service API keys to the browser; instead it:
//!
//! - hands out short-lived speech-to-text access tokens (`GET /token`)
//! - forwards translation requests with its own credentials (`POST /api/translate`)
//! - proxies text-to-speech synthesis and repairs the streamed WAV header (`GET /synthesize`)
//!
//! ## Key Rust Concepts Used:
//! - **async/await**: every request handler awaits the upstream HTTP calls
//! - **modules**: one module per concern (config, clients, audio, handlers...)
//! - **Result<T, E>**: start-up fails fast with `anyhow`, handlers return `AppError`
//! - **Arc**: the service clients are built once and shared read-only by all workers
//!
//! ## Application Architecture:
//! - **config**: layered configuration (defaults, config file, env vars, platform vars)
//! - **clients**: outbound clients for the token issuer, translator and synthesizer
//! - **audio**: WAV header inspection and repair
//! - **state**: shared application state and request metrics
//! - **health**: health and metrics endpoints
//! - **middleware**: request logging, metrics, HTTPS redirect and error redaction
//! - **handlers**: the HTTP endpoints
//! - **error**: error types and their HTTP responses

mod audio;
mod clients;
mod config;
mod error;
mod handlers;
mod health;
mod middleware;
mod state;

use actix_cors::Cors;
use actix_web::{middleware::Condition, web, App, HttpServer};
use anyhow::Result;
use config::AppConfig;
use state::AppState;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, info, warn};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Set by the signal handler task once SIGTERM or SIGINT arrives.
static SHUTDOWN_SIGNAL: AtomicBool = AtomicBool::new(false);

/// The main application entry point.
///
/// ## What this function does:
/// 1. Loads `.env`, then sets up logging
/// 2. Loads and validates configuration; a missing API key stops start-up here
/// 3. Builds the shared state, which owns the three service clients
/// 4. Starts the HTTP server and waits for it to stop or for a shutdown signal
///
/// ## Key Rust Concepts:
/// - `#[actix_web::main]`: sets up the async runtime
/// - `?`: returns early with the error, which `anyhow` prints on exit
/// - `move` closure: `HttpServer::new` calls it once per worker thread, so everything it
///   captures must be `Clone` (the state is a bundle of `Arc`s)
#[actix_web::main]
async fn main() -> Result<()> {
    // It's fine if there's no .env file
    dotenv::dotenv().ok();

    init_tracing()?;

    let config = AppConfig::load()?;
    config.validate()?;

    info!("Starting speech-proxy-backend v{}", env!("CARGO_PKG_VERSION"));
    info!(
        host = %config.server.host,
        port = config.server.port,
        hosted = config.platform.hosted,
        "Configuration loaded"
    );

    let hosted = config.platform.hosted;
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let app_state = AppState::new(config)?;

    setup_signal_handlers();

    info!("Starting HTTP server on {}", bind_addr);

    let server = HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        // Middleware runs outermost-last: TracingLogger sees every request first
        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .wrap(Condition::new(hosted, middleware::redact_server_errors()))
            .wrap(cors)
            .wrap(Condition::new(hosted, middleware::HttpsRedirect))
            .wrap(middleware::MetricsMiddleware)
            .wrap(middleware::RequestLogging)
            .wrap(TracingLogger::default())
            .configure(handlers::configure)
    })
    .bind(&bind_addr)?
    .run();

    let server_handle = server.handle();
    let server_task = tokio::spawn(server);

    tokio::select! {
        result = server_task => {
            match result {
                Ok(Err(e)) => error!("Server error: {}", e),
                Err(e) => error!("Server task error: {}", e),
                Ok(Ok(())) => {}
            }
        }
        _ = wait_for_shutdown() => {
            info!("Shutdown signal received, stopping server...");
            // Graceful: in-flight synthesis streams are allowed to finish
            server_handle.stop(true).await;
        }
    }

    info!("Server stopped gracefully");
    Ok(())
}

/// Initialize the tracing (logging) system.
///
/// `RUST_LOG` controls the filter; without it the crate logs at debug and actix at info.
fn init_tracing() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "speech_proxy_backend=debug,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    Ok(())
}

/// Spawns a task that flips `SHUTDOWN_SIGNAL` on SIGTERM or SIGINT.
///
/// If the handlers cannot be installed the server keeps running and actix's own
/// signal handling still applies; the failure is only logged.
fn setup_signal_handlers() {
    use tokio::signal::unix::{signal, SignalKind};

    tokio::spawn(async {
        let (mut sigterm, mut sigint) = match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
            (Ok(term), Ok(int)) => (term, int),
            (Err(e), _) | (_, Err(e)) => {
                warn!("Failed to install signal handlers: {}", e);
                return;
            }
        };

        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM"),
            _ = sigint.recv() => info!("Received SIGINT"),
        }

        SHUTDOWN_SIGNAL.store(true, Ordering::SeqCst);
    });
}

/// Polls the shutdown flag every 100ms.
async fn wait_for_shutdown() {
    while !SHUTDOWN_SIGNAL.load(Ordering::SeqCst) {
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
    }
}
