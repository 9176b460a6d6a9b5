//! Collector runtime runner.
//!
//! Phase order: **assemble → prepare → start → notify → wait → stop**.
//! Shutdown can be driven by OS signals, an external `CancellationToken`,
//! or an arbitrary future.

use std::{future::Future, pin::Pin, sync::Arc};

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::ConfigProvider;
use crate::manager::{ModuleManager, ProviderSet};
use crate::runtime::shutdown;

/// What ends a running collector.
pub enum ShutdownOptions {
    /// Ctrl+C, or SIGTERM on Unix.
    Signals,
    /// Cancellation of a token owned by the caller.
    Token(CancellationToken),
    /// Completion of a future.
    Future(Pin<Box<dyn Future<Output = ()> + Send>>),
}

/// Options for running the collector runtime.
pub struct RunOptions {
    /// Candidate providers compiled into this process.
    pub providers: ProviderSet,
    /// Provider of module config sections (raw JSON by module name).
    pub modules_cfg: Arc<dyn ConfigProvider>,
    pub shutdown: ShutdownOptions,
    /// Process instance id; generated when absent.
    pub instance_id: Option<Uuid>,
}

/// Root token of the run, cancelled by whatever `shutdown` names.
fn shutdown_token(shutdown: ShutdownOptions) -> CancellationToken {
    match shutdown {
        ShutdownOptions::Token(token) => {
            tracing::debug!("Lifecycle bound to an external token");
            token
        }
        ShutdownOptions::Signals => {
            let token = CancellationToken::new();
            let trigger = token.clone();
            tokio::spawn(async move {
                if let Err(e) = shutdown::wait_for_shutdown().await {
                    tracing::warn!(error = %e, "Signal handling failed; waiting for Ctrl+C only");
                    tokio::signal::ctrl_c().await.ok();
                }
                trigger.cancel();
            });
            token
        }
        ShutdownOptions::Future(waiter) => {
            let token = CancellationToken::new();
            let trigger = token.clone();
            tokio::spawn(async move {
                waiter.await;
                tracing::info!("Shutdown future completed");
                trigger.cancel();
            });
            token
        }
    }
}

/// Assemble the providers, boot them, wait for shutdown and stop them.
///
/// # Errors
/// Returns an error if assembly or any bootstrap phase fails. Modules that had
/// already started are stopped before returning.
pub async fn run(opts: RunOptions) -> anyhow::Result<()> {
    // Cancelling the child on a failed start leaves a caller-owned token untouched.
    let cancel = shutdown_token(opts.shutdown).child_token();

    let mut manager = ModuleManager::assemble(opts.providers, opts.modules_cfg.as_ref())?
        .with_cancellation(cancel.clone());
    if let Some(id) = opts.instance_id {
        manager = manager.with_instance_id(id);
    }
    tracing::info!(instance_id = %manager.instance_id(), "Process instance id");

    if let Err(e) = manager.bootstrap().await {
        tracing::error!(error = %e, "Bootstrap failed; aborting start");
        cancel.cancel();
        manager.stop().await;
        return Err(e.into());
    }

    cancel.cancelled().await;
    manager.stop().await;
    Ok(())
}
