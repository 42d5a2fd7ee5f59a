//! Telemetry for sensei: tracing setup plus an optional SQLite log sink.
//!
//! `init_telemetry` installs a fmt layer (pretty or JSON) driven by an
//! `EnvFilter`, and when configured, a second layer that persists warn+
//! events to a local SQLite database so they survive process restarts.

pub mod logging;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

pub use logging::{LogQuery, LogRecord, SqliteLogLayer, SqliteLogSink};

/// Telemetry configuration.
#[derive(Clone, Debug)]
pub struct TelemetryConfig {
    /// Base log level (e.g. "info", "debug").
    pub log_level: String,
    /// Per-module level overrides, e.g. ("sensei_llm", "debug").
    pub module_levels: HashMap<String, String>,
    /// Emit JSON lines instead of human-readable output.
    pub json_output: bool,
    /// Persist warn+ events to SQLite.
    pub log_to_sqlite: bool,
    /// Path for the log database. Defaults to `~/.sensei/logs.db`.
    pub log_db_path: Option<PathBuf>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            module_levels: HashMap::new(),
            json_output: false,
            log_to_sqlite: false,
            log_db_path: None,
        }
    }
}

impl TelemetryConfig {
    /// Build the filter directive string, e.g. "info,sensei_llm=debug".
    fn filter_string(&self) -> String {
        let mut directives = vec![self.log_level.clone()];
        for (module, level) in &self.module_levels {
            directives.push(format!("{module}={level}"));
        }
        directives.join(",")
    }

    fn resolved_db_path(&self) -> PathBuf {
        self.log_db_path
            .clone()
            .unwrap_or_else(|| dirs_fallback().join(".sensei").join("logs.db"))
    }
}

fn dirs_fallback() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

/// Guard returned by `init_telemetry`. Holds the SQLite sink (if any) so
/// callers can query persisted logs.
pub struct TelemetryGuard {
    sink: Option<Arc<SqliteLogSink>>,
}

impl TelemetryGuard {
    pub fn log_sink(&self) -> Option<Arc<SqliteLogSink>> {
        self.sink.clone()
    }
}

/// Initialize global tracing. `RUST_LOG` takes precedence over the config's
/// level settings when set.
pub fn init_telemetry(config: &TelemetryConfig) -> TelemetryGuard {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.filter_string()));

    let sink = if config.log_to_sqlite {
        match SqliteLogSink::new(&config.resolved_db_path()) {
            Ok(sink) => Some(Arc::new(sink)),
            Err(err) => {
                eprintln!("failed to open log database: {err}");
                None
            }
        }
    } else {
        None
    };

    let sqlite_layer = sink.clone().map(SqliteLogLayer::new);

    if config.json_output {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .with(sqlite_layer)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .with(sqlite_layer)
            .init();
    }

    TelemetryGuard { sink }
}
