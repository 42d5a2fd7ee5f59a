//! Per-change analysis pipeline.
//!
//! Runs detached from the stream session that spawned it. Store failures
//! are the only hard errors; they are logged and turned into a best-effort
//! `error` broadcast. Engine operations never fail (they fall back).

use tracing::{error, info, warn};

use sensei_core::{ServerMessage, SessionId};
use sensei_store::StoreError;

use sensei_core::FileChange;

use crate::server::AppState;

/// Questions per streamed quiz.
const QUIZ_QUESTIONS: usize = 5;
/// Weak areas fed into the quiz.
const QUIZ_FOCUS: usize = 3;

pub async fn run(state: AppState, change: FileChange) {
    if let Err(err) = process(&state, &change).await {
        error!(error = %err, filename = %change.filename, "pipeline failed");
        state
            .hub
            .broadcast(&ServerMessage::error(format!("Analysis error: {err}")));
    }
}

async fn process(state: &AppState, change: &FileChange) -> Result<(), StoreError> {
    let analysis = state
        .engine
        .analyze(&change.content, &change.filename, &change.filepath)
        .await;

    let session_id = SessionId::new();
    state
        .store
        .store_session(&session_id, &change.content, &analysis)
        .await?;
    info!(session_id = %session_id, topics = analysis.topics.join(", "), "session stored");

    state
        .hub
        .broadcast(&ServerMessage::analysis(session_id.clone(), analysis.clone()));

    if analysis.needs_docs() {
        let docs = state
            .engine
            .doc_suggestions(&analysis.errors, &analysis.weak_areas, &analysis.topics)
            .await;
        if !docs.is_empty() {
            state.hub.broadcast(&ServerMessage::documentation(docs));
        }
    }

    if analysis.needs_recommendations() {
        let struggles = analysis.struggle_set();
        let recommendations = state
            .engine
            .recommend(&analysis.topics, &struggles, &analysis.summary)
            .await;
        for (index, rec) in recommendations.iter().enumerate() {
            if let Err(err) = state.store.store_recommendation(&session_id, index, rec) {
                warn!(error = %err, session_id = %session_id, index, "recommendation not stored");
            }
        }
        state
            .hub
            .broadcast(&ServerMessage::recommendations(recommendations));
    }

    if !analysis.weak_areas.is_empty() {
        let focus: Vec<String> = analysis.weak_areas.iter().take(QUIZ_FOCUS).cloned().collect();
        let quiz = state
            .engine
            .quiz(&focus, &analysis.summary, QUIZ_QUESTIONS)
            .await;
        if !quiz.questions.is_empty() {
            state.hub.broadcast(&ServerMessage::quiz(quiz, focus));
        }
    }

    Ok(())
}
