//! # STT Relay Backend - Main Application Entry Point
//!
//! A WebSocket relay for streaming speech recognition. Clients stream raw
//! PCM16 audio over `/ws` and receive partial and final transcripts as JSON.
//!
//! ## Key Rust Concepts Used:
//! - **async/await**: the server and every connection run on the actix runtime
//! - **actors**: each WebSocket connection is an independent actor with its own recognizer
//! - **Arc**: the recognizer factory is loaded once and shared read-only
//! - **Result<T, E>**: startup failures propagate with `?` and abort the process
//!
//! ## Application Architecture:
//! - **config**: configuration (config.toml + environment variables)
//! - **error**: engine, session and startup error types
//! - **protocol**: wire format (control commands, outbound events)
//! - **transcription**: recognizer engines behind one trait
//! - **audio**: PCM helpers and the per-connection RecognizerSession
//! - **websocket**: the connection state machine and its actor
//! - **state**: shared state and metrics
//! - **health**: liveness, health and metrics endpoints
//! - **middleware**: per-endpoint request metrics

mod audio; // PCM decoding and recognizer sessions (audio/ directory)
mod config; // Configuration management (config.rs)
mod error; // Error types (error.rs)
mod health; // Health check endpoints (health.rs)
mod middleware; // Custom middleware (middleware/ directory)
mod protocol; // Wire protocol (protocol.rs)
mod state; // Application state management (state.rs)
mod transcription; // Recognizer engines (transcription/ directory)
mod websocket; // WebSocket relay (websocket.rs)

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use anyhow::{Context, Result};
use crate::config::AppConfig;
use crate::state::AppState;
use tracing::{error, info, warn};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// The main application entry point.
///
/// ## Startup order:
/// 1. **Environment**: `.env` is loaded if present
/// 2. **Logging**: tracing subscriber installed
/// 3. **Configuration**: loaded and validated
/// 4. **Engine**: the recognizer factory is loaded; a missing model or an
///    engine not compiled in stops the process before anything binds
/// 5. **Server**: routes mounted, then serve until SIGINT/SIGTERM
#[actix_web::main]
async fn main() -> Result<()> {
    // .ok(): a missing .env file is fine
    dotenv::dotenv().ok();

    init_tracing();

    let config = AppConfig::load().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    info!("Starting {} v{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
    info!("Configuration loaded: {}:{}", config.server.host, config.server.port);

    let engine = transcription::load_factory(&config.recognizer)
        .with_context(|| format!("Failed to load the '{}' recognizer", config.recognizer.engine))?;
    info!(
        engine = engine.name(),
        sample_rate = config.recognizer.sample_rate,
        words = config.recognizer.words,
        "Recognizer engine ready"
    );

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let app_state = AppState::new(config, engine);

    info!("Starting HTTP server on {}", bind_addr);

    let server = HttpServer::new(move || {
        // Browsers connect from arbitrary origins
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            // Middleware runs in reverse registration order for requests
            .wrap(middleware::MetricsMiddleware)
            .wrap(TracingLogger::default())
            .wrap(cors)
            .route("/", web::get().to(health::root))
            .route("/health", web::get().to(health::health_check))
            .route("/ws", web::get().to(websocket::relay_websocket))
            .service(
                web::scope("/api/v1")
                    .route("/health", web::get().to(health::health_check))
                    .route("/metrics", web::get().to(health::detailed_metrics)),
            )
    })
    .bind(&bind_addr)
    .with_context(|| format!("Failed to bind {}", bind_addr))?
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
            server_handle.stop(true).await;
        }
    }

    info!("Server stopped gracefully");
    Ok(())
}

/// Initialize the tracing subscriber.
///
/// ## Environment Variables:
/// - `RUST_LOG`: log filter (e.g. "debug", "stt_relay_backend=trace")
/// - defaults to "stt_relay_backend=debug,actix_web=info"
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stt_relay_backend=debug,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Resolve when SIGINT (Ctrl+C) or SIGTERM arrives.
///
/// If a handler cannot be installed the server keeps running and that
/// signal falls back to the default process behaviour.
async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for SIGINT: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Received SIGINT");
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                info!("Received SIGTERM");
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
