//! API Enforcer
//!
//! The request-enforcement core of an API gateway, served over HTTP.
//!
//! # Architecture Overview
//!
//! ```text
//!                       ┌───────────────────────────────────────────────────────┐
//!                       │                     API ENFORCER                       │
//!                       │                                                        │
//!   Interception layer  │  ┌─────────┐    ┌──────────┐    ┌──────────────────┐   │
//!   POST /enforce ──────┼─▶│  http   │───▶│ registry │───▶│ resource router  │   │
//!                       │  │ server  │    │ (vhost + │    │ (REST template / │   │
//!                       │  └─────────┘    │base path)│    │ GraphQL op)      │   │
//!                       │                 └──────────┘    └────────┬─────────┘   │
//!                       │                                          ▼             │
//!                       │                ┌───────────────────────────────────┐   │
//!                       │                │ filter chain                      │   │
//!                       │                │ cors → auth → graphql analysis    │   │
//!                       │                └────────────────┬──────────────────┘   │
//!                       │                                 ▼                      │
//!   EnforcementDecision │  ┌─────────┐    ┌──────────────────┐   ┌───────────┐   │
//!   ◀───────────────────┼──│  http   │◀───│ response         │──▶│ analytics │   │
//!                       │  │ server  │    │ assembler        │   │ publisher │   │
//!                       │  └─────────┘    └──────────────────┘   └───────────┘   │
//!                       │                                                        │
//!                       │  config · descriptor watcher · logging · metrics       │
//!                       └───────────────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use api_enforcer::analytics::{AnalyticsPublisher, ChannelPublisher, NoopPublisher};
use api_enforcer::config::watcher::next_change;
use api_enforcer::config::{load_config, DescriptorWatcher, EnforcerConfig};
use api_enforcer::lifecycle::{spawn_signal_handler, Shutdown};
use api_enforcer::observability::{logging, metrics};
use api_enforcer::{Enforcer, HttpServer};

#[derive(Parser)]
#[command(name = "api-enforcer")]
#[command(about = "API gateway request enforcement service", long_about = None)]
struct Args {
    /// Path to the enforcer configuration file.
    #[arg(short, long, default_value = "enforcer.toml")]
    config: PathBuf,

    /// Override the API descriptor directory.
    #[arg(long)]
    apis: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = if args.config.exists() {
        load_config(&args.config)?
    } else {
        EnforcerConfig::default()
    };
    if let Some(dir) = args.apis {
        config.apis.directory = dir;
    }

    logging::init_logging(&config.observability);
    tracing::info!("api-enforcer v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        config = %args.config.display(),
        bind_address = %config.listener.bind_address,
        apis = %config.apis.directory.display(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics exporter");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let publisher: Arc<dyn AnalyticsPublisher> = if config.analytics.enabled {
        let (publisher, _consumer) = ChannelPublisher::spawn();
        Arc::new(publisher)
    } else {
        Arc::new(NoopPublisher)
    };

    let enforcer = Arc::new(Enforcer::from_config(&config, publisher)?);
    if let Err(e) = enforcer.reload() {
        tracing::warn!(error = %e, "No API descriptors loaded");
    }

    // Reloads come from the directory watcher and from SIGHUP
    let (reload_tx, mut reload_rx) = mpsc::unbounded_channel();
    let shutdown = Arc::new(Shutdown::new());
    spawn_signal_handler(shutdown.clone(), Some(reload_tx.clone()));

    let _watcher = if config.apis.watch {
        let (watcher, mut changes) = DescriptorWatcher::new(&config.apis.directory);
        match watcher.run() {
            Ok(handle) => {
                let forward = reload_tx.clone();
                tokio::spawn(async move {
                    while next_change(&mut changes).await {
                        if forward.send(()).is_err() {
                            break;
                        }
                    }
                });
                Some(handle)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Descriptor watcher unavailable, hot reload disabled");
                None
            }
        }
    } else {
        None
    };
    drop(reload_tx);

    let reloader = enforcer.clone();
    let stopping = shutdown.wait();
    tokio::spawn(async move {
        tokio::pin!(stopping);
        loop {
            tokio::select! {
                _ = &mut stopping => break,
                change = reload_rx.recv() => {
                    if change.is_none() {
                        break;
                    }
                    if let Err(e) = reloader.reload() {
                        tracing::error!(error = %e, "API descriptor reload failed");
                    }
                }
            }
        }
    });

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for enforcement requests");

    let server = HttpServer::new(enforcer, &config.listener);
    let stopped = shutdown.wait();
    server
        .run(listener, async move {
            let reason = stopped.await;
            tracing::info!(reason = %reason, "Draining in-flight requests");
        })
        .await?;

    tracing::info!(reason = ?shutdown.reason(), "Shutdown complete");
    Ok(())
}
