//! Local file watching for sensei.
//!
//! [`ChangeWatcher`] turns raw filesystem events into debounced, deduplicated
//! [`FileChange`](sensei_core::FileChange)s; [`StreamClient`] ships them to
//! the backend over WebSocket.

pub mod client;
pub mod debounce;
pub mod watcher;

use std::path::PathBuf;
use std::time::Duration;

pub use client::StreamClient;
pub use debounce::Debouncer;
pub use watcher::ChangeWatcher;

/// Quiet period before a modified file is considered stable.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_secs(2);

/// Extensions monitored when none are configured.
pub const DEFAULT_EXTENSIONS: &[&str] = &[
    "py", "js", "jsx", "ts", "tsx", "java", "cpp", "c", "h", "hpp", "go", "rs", "rb", "php",
    "html", "css", "scss", "sass", "json", "yaml", "yml", "toml", "sql", "md", "txt",
];

/// Directories skipped by default.
pub const DEFAULT_IGNORE_DIRS: &[&str] = &[
    "**/node_modules/**",
    "**/.git/**",
    "**/venv/**",
    "**/__pycache__/**",
    "**/dist/**",
    "**/build/**",
    "**/target/**",
];

#[derive(Clone, Debug)]
pub struct WatchConfig {
    pub root: PathBuf,
    pub extensions: Vec<String>,
    pub ignore_dirs: Vec<String>,
    pub debounce: Duration,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            extensions: DEFAULT_EXTENSIONS.iter().map(|s| (*s).to_string()).collect(),
            ignore_dirs: DEFAULT_IGNORE_DIRS.iter().map(|s| (*s).to_string()).collect(),
            debounce: DEFAULT_DEBOUNCE,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    #[error("filesystem watcher error: {0}")]
    Notify(#[from] notify::Error),
    #[error("invalid ignore pattern: {0}")]
    Pattern(#[from] glob::PatternError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_sane() {
        let config = WatchConfig::default();
        assert_eq!(config.debounce, Duration::from_secs(2));
        assert!(config.extensions.iter().any(|e| e == "py"));
        assert!(config.extensions.iter().any(|e| e == "rs"));
        assert!(config.ignore_dirs.iter().any(|p| p.contains("node_modules")));
    }
}
