//! API descriptor directory watcher for hot reload.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

/// Quiet period before a burst of file events is treated as one change.
pub const DEBOUNCE: Duration = Duration::from_millis(250);

/// Monitors the descriptor directory and signals when it changes.
pub struct DescriptorWatcher {
    dir: PathBuf,
    change_tx: mpsc::UnboundedSender<()>,
}

impl DescriptorWatcher {
    /// Returns the watcher and a receiver of change notifications.
    pub fn new(dir: &Path) -> (Self, mpsc::UnboundedReceiver<()>) {
        let (change_tx, change_rx) = mpsc::unbounded_channel();
        (
            Self {
                dir: dir.to_path_buf(),
                change_tx,
            },
            change_rx,
        )
    }

    /// Start watching. The returned watcher must be kept alive.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.change_tx;

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if touches_descriptor(&event) {
                        tracing::debug!(paths = ?event.paths, "Descriptor change detected");
                        let _ = tx.send(());
                    }
                }
                Err(e) => tracing::error!("Watch error: {:?}", e),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&self.dir, RecursiveMode::NonRecursive)?;

        tracing::info!(dir = ?self.dir, "Descriptor watcher started");
        Ok(watcher)
    }
}

fn touches_descriptor(event: &Event) -> bool {
    let relevant = event.kind.is_create() || event.kind.is_modify() || event.kind.is_remove();
    relevant
        && event
            .paths
            .iter()
            .any(|p| p.extension().is_some_and(|ext| ext == "toml"))
}

/// Wait for the next change, then swallow the rest of its burst.
/// Returns `false` once the watcher is gone.
pub async fn next_change(rx: &mut mpsc::UnboundedReceiver<()>) -> bool {
    if rx.recv().await.is_none() {
        return false;
    }
    loop {
        tokio::time::sleep(DEBOUNCE).await;
        let mut drained = false;
        while rx.try_recv().is_ok() {
            drained = true;
        }
        if !drained {
            return true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, EventKind};

    #[test]
    fn test_only_toml_events_count() {
        let event = Event::new(EventKind::Create(CreateKind::File))
            .add_path(PathBuf::from("/apis/petstore.toml"));
        assert!(touches_descriptor(&event));

        let event = Event::new(EventKind::Create(CreateKind::File))
            .add_path(PathBuf::from("/apis/.petstore.toml.swp"));
        assert!(!touches_descriptor(&event));
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_collapses_to_one_change() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        for _ in 0..5 {
            tx.send(()).unwrap();
        }
        assert!(next_change(&mut rx).await);

        drop(tx);
        assert!(!next_change(&mut rx).await);
    }
}
