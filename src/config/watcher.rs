//! Snapshot file watcher feeding the reconciler.

use std::path::{Path, PathBuf};
use std::time::Duration;
use notify::{Watcher, RecursiveMode, Event, RecommendedWatcher, Config};
use tokio::sync::mpsc;
use crate::model::Snapshot;

/// Error type for reading a snapshot file.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotLoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Read and parse a JSON snapshot file.
pub fn load_snapshot(path: &Path) -> Result<Snapshot, SnapshotLoadError> {
    let content = std::fs::read_to_string(path)?;
    Ok(Snapshot::from_json(&content)?)
}

/// A watcher that monitors the snapshot file for changes.
pub struct SnapshotWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<Snapshot>,
}

impl SnapshotWatcher {
    /// Create a new SnapshotWatcher.
    ///
    /// Returns the watcher and a receiver for parsed snapshots.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<Snapshot>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();

        (Self {
            path: path.to_path_buf(),
            update_tx,
        }, update_rx)
    }

    /// Start watching the file in a background thread.
    ///
    /// The returned watcher must be kept alive for events to keep flowing.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.update_tx.clone();
        let path = self.path.clone();

        let mut watcher = RecommendedWatcher::new(move |res: notify::Result<Event>| {
            match res {
                Ok(event) => {
                    if event.kind.is_modify() || event.kind.is_create() {
                        match load_snapshot(&path) {
                            Ok(snapshot) => {
                                tracing::debug!(generation = snapshot.generation, "Snapshot file changed");
                                let _ = tx.send(snapshot);
                            }
                            Err(e) => {
                                tracing::error!(path = ?path, error = %e, "Failed to read snapshot, ignoring change");
                            }
                        }
                    }
                }
                Err(e) => tracing::error!("Watch error: {:?}", e),
            }
        }, Config::default().with_poll_interval(Duration::from_secs(2)))?;

        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Snapshot watcher started");
        Ok(watcher)
    }
}

/// Drain every queued snapshot and keep only the newest generation.
pub fn coalesce(first: Snapshot, rx: &mut mpsc::UnboundedReceiver<Snapshot>) -> Snapshot {
    let mut newest = first;
    let mut skipped = 0usize;
    while let Ok(next) = rx.try_recv() {
        if next.generation >= newest.generation {
            newest = next;
        }
        skipped += 1;
    }
    if skipped > 0 {
        tracing::debug!(skipped, generation = newest.generation, "Coalesced queued snapshots");
    }
    newest
}
