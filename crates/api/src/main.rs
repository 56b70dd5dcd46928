use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use genstudio_provider::http::{HttpProvider, HttpProviderConfig};
use genstudio_provider::scripted::ScriptedProvider;
use genstudio_provider::GenerationProvider;
use genstudio_store::HistoryStore;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use genstudio_api::background::janitor::Janitor;
use genstudio_api::config::{LogFormat, ProviderConfig, ProviderKind, ServerConfig};
use genstudio_api::engine::Engine;
use genstudio_api::router::build_app_router;
use genstudio_api::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // --- Configuration ---
    let config = ServerConfig::from_env().context("Invalid configuration")?;

    // --- Tracing ---
    let json = config.log_format == LogFormat::Json;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| {
                    "genstudio_api=debug,genstudio_provider=debug,tower_http=debug".into()
                }),
        )
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(|| tracing_subscriber::fmt::layer()))
        .init();

    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- History store ---
    let history = HistoryStore::open(
        &config.storage.history_file,
        config.storage.history_max_items,
    )
    .await
    .context("Failed to open history store")?;
    let history = Arc::new(history);
    tracing::info!(
        path = %config.storage.history_file.display(),
        items = history.len().await,
        "History store opened"
    );

    // --- Provider ---
    let provider = build_provider(&config.provider);
    tracing::info!(provider = provider.name(), "Generation provider ready");

    // --- Engine ---
    let engine = Arc::new(Engine::new(
        &config.engine,
        Arc::clone(&provider),
        Arc::clone(&history),
    ));

    // Spawn janitor (evicts expired jobs and sessions).
    let janitor_cancel = CancellationToken::new();
    let janitor = Janitor::new(&engine, config.engine.janitor_interval);
    let janitor_handle = tokio::spawn(janitor.run(janitor_cancel.clone()));

    // --- App state ---
    let state = AppState {
        config: Arc::new(config.clone()),
        engine: Arc::clone(&engine),
        history,
    };

    // --- Router ---
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().context("Invalid HOST address")?,
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    // Stop janitor.
    janitor_cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(5), janitor_handle).await;
    tracing::info!("Janitor stopped");

    // Let in-flight jobs finish so their results reach history.
    let tasks = engine.tasks();
    tasks.close();
    let in_flight = engine.registry().active_count();
    tracing::info!(in_flight, "Waiting for running jobs");
    if tokio::time::timeout(
        Duration::from_secs(config.shutdown_timeout_secs),
        tasks.wait(),
    )
    .await
    .is_err()
    {
        tracing::warn!(
            remaining = engine.registry().active_count(),
            "Shutdown timeout reached; abandoning running jobs"
        );
    }

    tracing::info!("Graceful shutdown complete");
    Ok(())
}

fn build_provider(config: &ProviderConfig) -> Arc<dyn GenerationProvider> {
    match config.kind {
        ProviderKind::Http => Arc::new(HttpProvider::new(HttpProviderConfig {
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            poll_interval: config.poll_interval,
        })),
        ProviderKind::Scripted => Arc::new(ScriptedProvider::new(config.scripted_step)),
    }
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Listens for SIGINT (Ctrl-C) and, on Unix, SIGTERM. If a handler cannot
/// be installed the corresponding branch never resolves.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
