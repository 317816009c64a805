//! Shutdown coordination for the enforcer.
//!
//! The trigger is latched: a task that starts waiting after shutdown began
//! (a reload that finished late, the server future built last) still
//! resolves immediately.

use std::fmt;

use tokio::sync::watch;

/// Why the process is stopping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// SIGINT or Ctrl+C.
    Interrupt,
    /// SIGTERM.
    Terminate,
    /// Stopped from inside the process.
    Requested,
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Interrupt => "interrupt",
            Self::Terminate => "terminate",
            Self::Requested => "requested",
        })
    }
}

#[derive(Debug)]
pub struct Shutdown {
    tx: watch::Sender<Option<ShutdownReason>>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx }
    }

    /// Start shutdown. Only the first reason is kept.
    pub fn trigger(&self, reason: ShutdownReason) {
        let first = self.tx.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(reason);
            true
        });
        if first {
            tracing::info!(reason = %reason, "Shutdown triggered");
        }
    }

    pub fn reason(&self) -> Option<ShutdownReason> {
        *self.tx.borrow()
    }

    pub fn is_triggered(&self) -> bool {
        self.reason().is_some()
    }

    /// Resolves with the reason once shutdown is triggered. Suitable for
    /// `axum::serve(..).with_graceful_shutdown`.
    pub fn wait(&self) -> impl std::future::Future<Output = ShutdownReason> + Send + 'static {
        let mut rx = self.tx.subscribe();
        async move {
            // A dropped coordinator can never trigger; treat it as requested
            let reason = rx.wait_for(Option::is_some).await.map(|reason| *reason);
            reason.ok().flatten().unwrap_or(ShutdownReason::Requested)
        }
    }

    /// Number of tasks currently waiting.
    pub fn waiters(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
