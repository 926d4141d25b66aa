//! Ctrl+C handling for the long-running commands.

/// Resolve on the first Ctrl+C.
///
/// If the handler cannot be installed this never resolves, so the worker
/// keeps running and only an external kill stops it.
pub(crate) async fn interrupted() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::warn!("Shutdown requested, abandoning in-flight work"),
        Err(e) => {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    }
}
