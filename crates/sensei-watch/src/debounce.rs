//! Debounce loop: raw filesystem events in, stabilized [`FileChange`]s out.
//!
//! Each path gets its own deadline. A new modification while a path is
//! pending restarts that path's window (last write wins). On expiry the
//! file is read and content-hashed; changes whose digest equals the last
//! one sent for that path are dropped.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, warn};

use sensei_core::FileChange;

use crate::WatchConfig;

pub struct Debouncer {
    config: WatchConfig,
    ignore: Vec<glob::Pattern>,
    pending: HashMap<PathBuf, Instant>,
    last_sent: HashMap<PathBuf, [u8; 32]>,
}

impl Debouncer {
    pub fn new(config: WatchConfig) -> Result<Self, glob::PatternError> {
        let ignore = config
            .ignore_dirs
            .iter()
            .map(|p| glob::Pattern::new(p))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            config,
            ignore,
            pending: HashMap::new(),
            last_sent: HashMap::new(),
        })
    }

    fn accepts(&self, path: &Path) -> bool {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        let Some(ext) = ext else { return false };
        if !self.config.extensions.iter().any(|e| e == &ext) {
            return false;
        }
        !self.ignore.iter().any(|pattern| pattern.matches_path(path))
    }

    async fn stabilized(&mut self, path: &Path) -> Option<FileChange> {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(err) => {
                debug!(path = %path.display(), error = %err, "dropping unreadable file");
                return None;
            }
        };

        let digest: [u8; 32] = Sha256::digest(content.as_bytes()).into();
        if self.last_sent.get(path) == Some(&digest) {
            debug!(path = %path.display(), "content unchanged, dropping");
            return None;
        }
        self.last_sent.insert(path.to_path_buf(), digest);

        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Some(FileChange {
            filename,
            filepath: path.display().to_string(),
            content,
            observed_at: chrono::Utc::now(),
        })
    }

    /// Consume raw modified paths until the channel closes, emitting
    /// stabilized changes downstream.
    pub async fn run(
        mut self,
        mut raw: mpsc::UnboundedReceiver<PathBuf>,
        out: mpsc::Sender<FileChange>,
    ) {
        loop {
            let next_deadline = self.pending.values().min().copied();
            tokio::select! {
                event = raw.recv() => match event {
                    Some(path) => {
                        if self.accepts(&path) {
                            self.pending.insert(path, Instant::now() + self.config.debounce);
                        }
                    }
                    None => break,
                },
                () = sleep_until_or_forever(next_deadline) => {
                    let now = Instant::now();
                    let due: Vec<PathBuf> = self
                        .pending
                        .iter()
                        .filter(|(_, deadline)| **deadline <= now)
                        .map(|(path, _)| path.clone())
                        .collect();
                    for path in due {
                        self.pending.remove(&path);
                        if let Some(change) = self.stabilized(&path).await {
                            debug!(filename = %change.filename, "change stabilized");
                            if out.send(change).await.is_err() {
                                warn!("change consumer gone, stopping debounce loop");
                                return;
                            }
                        }
                    }
                }
            }
        }
    }
}

async fn sleep_until_or_forever(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn setup(
        dir: &Path,
        debounce: Duration,
    ) -> (mpsc::UnboundedSender<PathBuf>, mpsc::Receiver<FileChange>) {
        let config = WatchConfig {
            root: dir.to_path_buf(),
            debounce,
            ..WatchConfig::default()
        };
        let debouncer = Debouncer::new(config).unwrap();
        let (raw_tx, raw_rx) = mpsc::unbounded_channel();
        let (out_tx, out_rx) = mpsc::channel(16);
        tokio::spawn(debouncer.run(raw_rx, out_tx));
        (raw_tx, out_rx)
    }

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[tokio::test(start_paused = true)]
    async fn bursts_coalesce_into_one_change() {
        let dir = tempfile::tempdir().unwrap();
        let (raw, mut out) = setup(dir.path(), Duration::from_secs(2));
        let path = write(dir.path(), "a.py", "print('hi')");

        raw.send(path.clone()).unwrap();
        raw.send(path.clone()).unwrap();
        raw.send(path).unwrap();

        tokio::time::sleep(Duration::from_millis(2100)).await;
        let change = out.recv().await.unwrap();
        assert_eq!(change.filename, "a.py");
        assert_eq!(change.content, "print('hi')");
        assert!(out.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn new_write_restarts_the_window() {
        let dir = tempfile::tempdir().unwrap();
        let (raw, mut out) = setup(dir.path(), Duration::from_secs(2));
        let path = write(dir.path(), "a.py", "v1");

        raw.send(path.clone()).unwrap();
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(out.try_recv().is_err());

        write(dir.path(), "a.py", "v2");
        raw.send(path).unwrap();
        tokio::time::sleep(Duration::from_millis(1500)).await;
        // First window would have fired by now; the restart held it back
        assert!(out.try_recv().is_err());

        tokio::time::sleep(Duration::from_millis(600)).await;
        let change = out.recv().await.unwrap();
        assert_eq!(change.content, "v2");
    }

    #[tokio::test(start_paused = true)]
    async fn unmonitored_extension_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let (raw, mut out) = setup(dir.path(), Duration::from_secs(2));
        let path = write(dir.path(), "app.log", "log line");

        raw.send(path).unwrap();
        tokio::time::sleep(Duration::from_millis(2100)).await;
        assert!(out.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn ignored_directory_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("node_modules").join("pkg");
        std::fs::create_dir_all(&nested).unwrap();
        let (raw, mut out) = setup(dir.path(), Duration::from_secs(2));
        let path = write(&nested, "index.js", "module.exports = {}");

        raw.send(path).unwrap();
        tokio::time::sleep(Duration::from_millis(2100)).await;
        assert!(out.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn identical_content_is_suppressed() {
        let dir = tempfile::tempdir().unwrap();
        let (raw, mut out) = setup(dir.path(), Duration::from_secs(2));
        let path = write(dir.path(), "a.py", "same");

        raw.send(path.clone()).unwrap();
        tokio::time::sleep(Duration::from_millis(2100)).await;
        assert!(out.recv().await.is_some());

        // Touched again but content unchanged
        raw.send(path.clone()).unwrap();
        tokio::time::sleep(Duration::from_millis(2100)).await;
        assert!(out.try_recv().is_err());

        // Real edit goes through
        write(dir.path(), "a.py", "different");
        raw.send(path).unwrap();
        tokio::time::sleep(Duration::from_millis(2100)).await;
        let change = out.recv().await.unwrap();
        assert_eq!(change.content, "different");
    }

    #[tokio::test(start_paused = true)]
    async fn unreadable_file_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let (raw, mut out) = setup(dir.path(), Duration::from_secs(2));

        raw.send(dir.path().join("missing.py")).unwrap();
        tokio::time::sleep(Duration::from_millis(2100)).await;
        assert!(out.try_recv().is_err());
    }
}
