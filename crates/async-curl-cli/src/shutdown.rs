use std::future::pending;

use tokio::signal;

/// Resolves on the first Ctrl-C or SIGTERM. A signal whose handler cannot be
/// installed is logged and never fires.
pub async fn shutdown_signal() {
    let received = tokio::select! {
        name = ctrl_c() => name,
        name = terminate() => name,
    };
    tracing::warn!("Received {}, stopping", received);
}

async fn ctrl_c() -> &'static str {
    if let Err(e) = signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl+C: {}", e);
        pending::<()>().await;
    }
    "Ctrl+C"
}

#[cfg(unix)]
async fn terminate() -> &'static str {
    match signal::unix::signal(signal::unix::SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            tracing::error!("Failed to listen for SIGTERM: {}", e);
            pending::<()>().await;
        }
    }
    "SIGTERM"
}

#[cfg(not(unix))]
async fn terminate() -> &'static str {
    pending().await
}
