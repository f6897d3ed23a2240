use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use eventhub_server::config::{generate_config_template, Config};
use eventhub_server::hub::BroadcastHub;
use eventhub_server::routes;
use eventhub_server::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load config with layered precedence: defaults < TOML < env < CLI
    let config = Config::load()?;

    // Handle --generate-config: print template and exit
    if config.generate_config {
        print!("{}", generate_config_template());
        return Ok(());
    }

    // Initialize tracing/logging
    let filter = || {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("eventhub_server=info"))
    };
    if config.json_logs {
        tracing_subscriber::fmt().json().with_env_filter(filter()).init();
    } else {
        tracing_subscriber::fmt().pretty().with_env_filter(filter()).init();
    }

    tracing::info!("eventhub server v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        buffer_capacity = config.hub.buffer_capacity,
        send_timeout_ms = config.hub.send_timeout_ms,
        "Broadcast hub configured"
    );

    // One hub for the process lifetime
    let hub = BroadcastHub::new(&config.hub);
    let app = routes::build_router(AppState::new(hub.clone(), config.ws.clone()));

    // Bind and serve
    let addr = config.listen_addr();
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(hub))
        .await?;

    tracing::info!("eventhub server stopped");
    Ok(())
}

/// Resolve on Ctrl-C or SIGTERM, then shut the hub down so every
/// subscriber connection closes and the server can drain.
async fn shutdown_signal(hub: BroadcastHub) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }

    tracing::info!("Shutdown signal received");
    hub.shutdown();
}
