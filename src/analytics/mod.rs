//! Analytics emission.
//!
//! # Data Flow
//! ```text
//! DeployedApi::process
//!     → response assembler decides success / failure / suppressed
//!     → AnalyticsPublisher::handle_success | handle_failure
//!     → ChannelPublisher (unbounded mpsc, never blocks the request)
//!     → background consumer task (structured log line per event)
//! ```
//!
//! # Design Decisions
//! - Fire-and-forget: emission errors are logged and swallowed
//! - At most one event per request

use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::observability::metrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Success,
    Failure,
}

/// One analytics record for a finished request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsEvent {
    pub kind: EventKind,
    pub request_id: String,
    pub api_uuid: String,
    pub api_name: String,
    pub api_version: String,
    pub organization_id: String,
    pub method: String,
    pub path: String,
    pub status_code: u16,
    pub error_code: Option<String>,
    pub subject: Option<String>,
    pub application: Option<String>,
    pub throttle_policy: Option<String>,
    /// Unix time in milliseconds.
    pub timestamp_ms: u64,
}

impl AnalyticsEvent {
    pub fn now_ms() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }
}

#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("analytics consumer is gone")]
    ChannelClosed,
}

/// Sink for per-request analytics.
pub trait AnalyticsPublisher: Send + Sync + std::fmt::Debug {
    fn handle_success(&self, event: AnalyticsEvent) -> Result<(), AnalyticsError>;
    fn handle_failure(&self, event: AnalyticsEvent) -> Result<(), AnalyticsError>;
}

/// Publisher that hands events to a background consumer.
#[derive(Debug, Clone)]
pub struct ChannelPublisher {
    tx: mpsc::UnboundedSender<AnalyticsEvent>,
}

impl ChannelPublisher {
    /// Create a publisher and the receiver its events arrive on.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<AnalyticsEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Create a publisher whose events are logged by a spawned task.
    pub fn spawn() -> (Self, JoinHandle<()>) {
        let (publisher, rx) = Self::new();
        (publisher, tokio::spawn(log_events(rx)))
    }

    fn send(&self, event: AnalyticsEvent) -> Result<(), AnalyticsError> {
        self.tx.send(event).map_err(|_| {
            metrics::record_analytics_dropped();
            AnalyticsError::ChannelClosed
        })
    }
}

impl AnalyticsPublisher for ChannelPublisher {
    fn handle_success(&self, event: AnalyticsEvent) -> Result<(), AnalyticsError> {
        self.send(event)
    }

    fn handle_failure(&self, event: AnalyticsEvent) -> Result<(), AnalyticsError> {
        self.send(event)
    }
}

/// Publisher used when analytics is disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPublisher;

impl AnalyticsPublisher for NoopPublisher {
    fn handle_success(&self, _event: AnalyticsEvent) -> Result<(), AnalyticsError> {
        Ok(())
    }

    fn handle_failure(&self, _event: AnalyticsEvent) -> Result<(), AnalyticsError> {
        Ok(())
    }
}

/// Drain the channel until every publisher is dropped.
pub async fn log_events(mut rx: mpsc::UnboundedReceiver<AnalyticsEvent>) {
    while let Some(event) = rx.recv().await {
        match serde_json::to_string(&event) {
            Ok(line) => tracing::info!(target: "analytics", kind = ?event.kind, event = %line, "Analytics event"),
            Err(e) => tracing::warn!(error = %e, "Failed to serialize analytics event"),
        }
    }
    tracing::debug!("Analytics consumer stopped");
}
