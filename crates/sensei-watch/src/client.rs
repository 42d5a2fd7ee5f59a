//! WebSocket client that ships stabilized changes to the backend.
//!
//! Reconnects with capped exponential backoff. A change that fails to send
//! is held and retried on the next connection instead of being dropped.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use sensei_core::{FileChange, ServerMessage};

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

pub struct StreamClient {
    server_url: String,
}

impl StreamClient {
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
        }
    }

    /// Forward changes until the upstream channel closes.
    pub async fn run(&self, mut changes: mpsc::Receiver<FileChange>) {
        let mut backoff = INITIAL_BACKOFF;
        let mut unsent: Option<FileChange> = None;

        loop {
            let mut ws = match connect_async(&self.server_url).await {
                Ok((ws, _)) => {
                    info!(url = %self.server_url, "connected to backend");
                    backoff = INITIAL_BACKOFF;
                    ws
                }
                Err(err) => {
                    warn!(error = %err, retry_in = ?backoff, "backend connection failed");
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                    continue;
                }
            };

            // Retry the change that was in flight when the last connection died
            if let Some(change) = unsent.take() {
                if let Err(err) = send_change(&mut ws, &change).await {
                    warn!(error = %err, "resend failed, reconnecting");
                    unsent = Some(change);
                    continue;
                }
            }

            loop {
                tokio::select! {
                    change = changes.recv() => match change {
                        Some(change) => {
                            if let Err(err) = send_change(&mut ws, &change).await {
                                warn!(error = %err, "send failed, reconnecting");
                                unsent = Some(change);
                                break;
                            }
                        }
                        None => {
                            info!("change stream closed, stopping client");
                            return;
                        }
                    },
                    incoming = ws.next() => match incoming {
                        Some(Ok(Message::Text(text))) => log_server_message(&text),
                        Some(Ok(_)) => {}
                        Some(Err(err)) => {
                            warn!(error = %err, "connection error, reconnecting");
                            break;
                        }
                        None => {
                            warn!("backend closed the connection, reconnecting");
                            break;
                        }
                    },
                }
            }
        }
    }
}

async fn send_change<S>(
    ws: &mut tokio_tungstenite::WebSocketStream<S>,
    change: &FileChange,
) -> Result<(), tokio_tungstenite::tungstenite::Error>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    let payload = serde_json::to_string(change)
        .map_err(|e| tokio_tungstenite::tungstenite::Error::Io(std::io::Error::other(e)))?;
    ws.send(Message::text(payload)).await?;
    info!(filename = %change.filename, bytes = change.content.len(), "change sent");
    Ok(())
}

fn log_server_message(text: &str) {
    match serde_json::from_str::<ServerMessage>(text) {
        Ok(ServerMessage::Connected { message, .. }) => info!(%message, "backend welcome"),
        Ok(ServerMessage::Received { filename, .. }) => debug!(%filename, "backend received file"),
        Ok(ServerMessage::Analysis { analysis, .. }) => info!(
            topics = analysis.topics.join(", "),
            difficulty = analysis.difficulty.as_str(),
            summary = %analysis.summary,
            "analysis"
        ),
        Ok(ServerMessage::Documentation { suggestions, .. }) => {
            info!(count = suggestions.len(), "documentation suggestions")
        }
        Ok(ServerMessage::Recommendations { recommendations, .. }) => {
            let titles: Vec<&str> = recommendations
                .iter()
                .take(3)
                .map(|r| r.title.as_str())
                .collect();
            info!(count = recommendations.len(), titles = titles.join("; "), "recommendations");
        }
        Ok(ServerMessage::Quiz { quiz, .. }) => {
            info!(questions = quiz.questions.len(), "quiz ready")
        }
        Ok(ServerMessage::Error { message, .. }) => warn!(%message, "backend error"),
        Err(err) => debug!(error = %err, "unrecognized server message"),
    }
}
