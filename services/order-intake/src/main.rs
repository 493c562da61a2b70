use std::time::Duration;

use order_intake::config::Config;
use order_intake::observability::{init_metrics, init_tracing};
use order_intake::{AppState, create_router};
use tokio::net::TcpListener;

const PURGE_INTERVAL: Duration = Duration::from_secs(60);
const SHUTDOWN_FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    // .env is optional; real environment variables win
    let dotenv = dotenvy::dotenv();

    let config = Config::from_env()?;
    init_tracing(config.log_format);
    if let Err(e) = dotenv {
        if !e.not_found() {
            tracing::warn!(error = %e, "Failed to read .env file");
        }
    }

    tracing::info!(
        version = %config.build.version,
        env = %config.build.env,
        backend = config.backend.as_str(),
        "Starting order intake service"
    );

    let metrics = init_metrics()?;
    let state = AppState::connect(&config, metrics).await?;

    let purge = {
        let store = state.idempotency().clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(PURGE_INTERVAL);
            loop {
                interval.tick().await;
                let purged = store.purge_expired();
                if purged > 0 {
                    tracing::debug!(purged, remaining = store.len(), "Purged idempotency entries");
                }
            }
        })
    };

    let app = create_router(state.clone());

    let listener = TcpListener::bind(config.listen_addr).await?;
    tracing::info!("Listening on {}", config.listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    purge.abort();
    state.shutdown(SHUTDOWN_FLUSH_TIMEOUT).await;
    tracing::info!("Order intake service stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for ctrl-c");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
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
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}
