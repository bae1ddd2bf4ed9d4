//! Signal handling for graceful shutdown.

use tokio::signal;
use tracing::{error, info};

/// Resolves when the process is asked to terminate.
///
/// Handles SIGINT and SIGTERM on Unix and Ctrl+C elsewhere. If the handlers
/// cannot be installed the error is logged and the future never resolves, so
/// the server keeps running until it is killed.
pub async fn shutdown_signal() {
    if let Err(e) = wait_for_signal().await {
        error!("Failed to install signal handlers: {}", e);
        std::future::pending::<()>().await;
    }
}

async fn wait_for_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use signal::unix::{signal, SignalKind};

        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;

        tokio::select! {
            _ = sigint.recv() => info!("Received SIGINT"),
            _ = sigterm.recv() => info!("Received SIGTERM"),
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c().await?;
        info!("Received Ctrl+C");
    }

    Ok(())
}
