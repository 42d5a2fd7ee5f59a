//! Filesystem watcher: notify events bridged onto a tokio channel.
//!
//! The notify callback runs on notify's own thread, so it only forwards
//! paths through an unbounded channel; all filtering and debouncing happens
//! in the async [`Debouncer`] task.

use std::path::PathBuf;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use sensei_core::FileChange;

use crate::debounce::Debouncer;
use crate::{WatchConfig, WatchError};

pub struct ChangeWatcher {
    // Dropping the notify watcher stops event delivery
    _watcher: RecommendedWatcher,
    task: JoinHandle<()>,
}

impl ChangeWatcher {
    /// Start watching `config.root` recursively. Returns the handle and the
    /// stream of stabilized changes.
    pub fn spawn(config: WatchConfig) -> Result<(Self, mpsc::Receiver<FileChange>), WatchError> {
        let root = config.root.clone();
        let debouncer = Debouncer::new(config)?;

        let (raw_tx, raw_rx) = mpsc::unbounded_channel::<PathBuf>();
        let (out_tx, out_rx) = mpsc::channel(64);

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            match res {
                Ok(event) => {
                    if matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
                        for path in event.paths {
                            // Receiver gone means we are shutting down
                            let _ = raw_tx.send(path);
                        }
                    }
                }
                Err(err) => warn!(error = %err, "filesystem watch error"),
            }
        })?;
        watcher.watch(&root, RecursiveMode::Recursive)?;
        info!(root = %root.display(), "watching for file changes");

        let task = tokio::spawn(debouncer.run(raw_rx, out_tx));

        Ok((
            Self {
                _watcher: watcher,
                task,
            },
            out_rx,
        ))
    }

    /// Stop the debounce task. The notify watcher stops when `self` drops.
    pub fn shutdown(self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    // End to end through the real notify backend, so generous real-time
    // waits instead of a paused clock.
    #[tokio::test(flavor = "multi_thread")]
    async fn detects_real_file_writes() {
        let dir = tempfile::tempdir().unwrap();
        let config = WatchConfig {
            root: dir.path().to_path_buf(),
            debounce: Duration::from_millis(100),
            ..WatchConfig::default()
        };
        let (watcher, mut changes) = ChangeWatcher::spawn(config).unwrap();

        // Give the backend a moment to arm before writing
        tokio::time::sleep(Duration::from_millis(200)).await;
        std::fs::write(dir.path().join("hello.py"), "print('hello')").unwrap();

        let change = tokio::time::timeout(Duration::from_secs(5), changes.recv())
            .await
            .expect("no change within 5s")
            .expect("channel closed");
        assert_eq!(change.filename, "hello.py");
        assert_eq!(change.content, "print('hello')");

        watcher.shutdown();
    }
}
