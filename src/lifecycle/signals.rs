//! OS signal handling.
//!
//! # Responsibilities
//! - Register signal handlers (SIGTERM, SIGINT, SIGHUP)
//! - Translate signals to internal events
//! - Trigger appropriate actions (shutdown, descriptor reload)
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - SIGHUP triggers a descriptor reload, not shutdown

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::lifecycle::shutdown::{Shutdown, ShutdownReason};

/// Spawn the signal loop. SIGINT/SIGTERM trigger `shutdown`; SIGHUP sends
/// on `reload` when one is given.
pub fn spawn_signal_handler(
    shutdown: Arc<Shutdown>,
    reload: Option<mpsc::UnboundedSender<()>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let reason = wait_for_shutdown_signal(reload).await;
        shutdown.trigger(reason);
    })
}

#[cfg(unix)]
async fn wait_for_shutdown_signal(reload: Option<mpsc::UnboundedSender<()>>) -> ShutdownReason {
    use tokio::signal::unix::{signal, SignalKind};

    let (mut term, mut hup) = match (
        signal(SignalKind::terminate()),
        signal(SignalKind::hangup()),
    ) {
        (Ok(term), Ok(hup)) => (term, hup),
        (Err(e), _) | (_, Err(e)) => {
            tracing::warn!(error = %e, "Unix signal handlers unavailable, only Ctrl+C is handled");
            let _ = tokio::signal::ctrl_c().await;
            return ShutdownReason::Interrupt;
        }
    };

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => return ShutdownReason::Interrupt,
            _ = term.recv() => return ShutdownReason::Terminate,
            _ = hup.recv() => {
                tracing::info!("SIGHUP received, reloading API descriptors");
                if let Some(tx) = &reload {
                    let _ = tx.send(());
                }
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal(_reload: Option<mpsc::UnboundedSender<()>>) -> ShutdownReason {
    let _ = tokio::signal::ctrl_c().await;
    ShutdownReason::Interrupt
}
