use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::{Parser, Subcommand};
use secrecy::SecretString;
use tracing::{info, warn};

use sensei_core::{EmbeddingProvider, LlmProvider};
use sensei_llm::{AnalysisEngine, GeminiEmbedder, GeminiProvider, ReliableProvider};
use sensei_server::{AppState, ConnectionHub, ServerConfig};
use sensei_store::{Database, RateGovernor, SessionStore, DAILY_LIMIT};
use sensei_telemetry::{init_telemetry, TelemetryConfig};
use sensei_watch::{ChangeWatcher, StreamClient, WatchConfig};

#[derive(Parser)]
#[command(name = "sensei", version, about = "Real-time coding tutor backend")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the analysis server.
    Serve {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        #[arg(long, default_value_t = 8000)]
        port: u16,
        /// Database path. Defaults to ~/.sensei/sensei.db
        #[arg(long)]
        db: Option<PathBuf>,
        /// Gemini calls allowed per day.
        #[arg(long, default_value_t = DAILY_LIMIT)]
        daily_limit: u32,
        /// Log output format.
        #[arg(long, value_parser = ["plain", "json"], default_value = "plain")]
        log_format: String,
        /// Persist warn+ logs to SQLite alongside the database.
        #[arg(long)]
        log_db: bool,
    },
    /// Watch a directory and stream file saves to a server.
    Watch {
        /// Directory to watch.
        #[arg(long, default_value = ".")]
        dir: PathBuf,
        /// WebSocket endpoint of the server.
        #[arg(long, default_value = "ws://127.0.0.1:8000/ws/stream")]
        server: String,
        /// Quiet window before a save is forwarded.
        #[arg(long, default_value_t = 2)]
        debounce_secs: u64,
        /// Extra file extensions to watch (repeatable).
        #[arg(long = "ext")]
        extensions: Vec<String>,
        /// Extra glob patterns to ignore (repeatable).
        #[arg(long = "ignore")]
        ignores: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Serve {
            host,
            port,
            db,
            daily_limit,
            log_format,
            log_db,
        } => serve(host, port, db, daily_limit, &log_format, log_db).await,
        Command::Watch {
            dir,
            server,
            debounce_secs,
            extensions,
            ignores,
        } => watch(dir, server, debounce_secs, extensions, ignores).await,
    }
}

async fn serve(
    host: String,
    port: u16,
    db: Option<PathBuf>,
    daily_limit: u32,
    log_format: &str,
    log_db: bool,
) -> anyhow::Result<()> {
    let _guard = init_telemetry(&TelemetryConfig {
        json_output: log_format == "json",
        log_to_sqlite: log_db,
        ..Default::default()
    });

    let db_path = db.unwrap_or_else(|| home_dir().join(".sensei").join("sensei.db"));
    let db = Database::open(&db_path).context("opening database")?;
    info!(path = %db_path.display(), "database opened");

    let governor = Arc::new(RateGovernor::with_limit(db.clone(), daily_limit));

    let api_key = std::env::var("GEMINI_API_KEY").ok().filter(|k| !k.is_empty());
    let (provider, embedder): (Option<Arc<dyn LlmProvider>>, Option<Arc<dyn EmbeddingProvider>>) =
        match api_key {
            Some(key) => {
                let secret = SecretString::from(key);
                let gemini = Arc::new(GeminiProvider::new(secret.clone()));
                info!(model = gemini.model(), "Gemini provider configured");
                (
                    Some(Arc::new(ReliableProvider::new(gemini))),
                    Some(Arc::new(GeminiEmbedder::new(secret))),
                )
            }
            None => {
                warn!("GEMINI_API_KEY not set; running with fallback analysis only");
                (None, None)
            }
        };

    let store = Arc::new(SessionStore::new(db, embedder));
    let engine = Arc::new(AnalysisEngine::new(provider, governor.clone()));
    let hub = Arc::new(ConnectionHub::default());

    let state = AppState {
        engine,
        store,
        governor,
        hub,
        start_time: Instant::now(),
    };
    let config = ServerConfig { host, port };

    let handle = sensei_server::start(config, state)
        .await
        .context("starting server")?;
    info!(port = handle.port, "serving; press ctrl-c to stop");

    tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
    info!("shutting down");
    handle.shutdown().await;
    Ok(())
}

async fn watch(
    dir: PathBuf,
    server: String,
    debounce_secs: u64,
    extensions: Vec<String>,
    ignores: Vec<String>,
) -> anyhow::Result<()> {
    let _guard = init_telemetry(&TelemetryConfig::default());

    let mut config = WatchConfig {
        root: dir,
        debounce: Duration::from_secs(debounce_secs),
        ..Default::default()
    };
    config.extensions.extend(extensions);
    config.ignore_dirs.extend(ignores);

    let (watcher, changes) = ChangeWatcher::spawn(config).context("starting watcher")?;
    let client = StreamClient::new(server);

    tokio::select! {
        _ = client.run(changes) => {}
        result = tokio::signal::ctrl_c() => {
            result.context("waiting for ctrl-c")?;
            info!("shutting down");
        }
    }
    watcher.shutdown();
    Ok(())
}

fn home_dir() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}
