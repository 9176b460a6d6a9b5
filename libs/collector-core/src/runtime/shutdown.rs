//! OS signal handling for the runner.

use tokio::signal;

/// Resolve once Ctrl+C or, on Unix, SIGTERM arrives.
///
/// # Errors
/// Returns an error if a signal handler cannot be installed.
pub async fn wait_for_shutdown() -> anyhow::Result<()> {
    #[cfg(unix)]
    let received = {
        let mut terminate = signal::unix::signal(signal::unix::SignalKind::terminate())
            .map_err(|e| anyhow::anyhow!("cannot install SIGTERM handler: {e}"))?;
        tokio::select! {
            result = signal::ctrl_c() => {
                result?;
                "ctrl_c"
            }
            _ = terminate.recv() => "sigterm",
        }
    };

    #[cfg(not(unix))]
    let received = {
        signal::ctrl_c().await?;
        "ctrl_c"
    };

    tracing::info!(signal = received, "Shutdown signal received, stopping modules");
    Ok(())
}
