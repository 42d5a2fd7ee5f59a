//! HTTP API handlers.
//!
//! Only malformed input surfaces as an error status; analysis paths degrade
//! to fallbacks inside the engine and never fail a request.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use sensei_core::{Difficulty, Recommendation, ResourceType, SessionId};
use sensei_store::{SessionRecord, SessionStore, StoreError};

use crate::server::AppState;

// ─────────────────────────────────────────────────────────────────────────────
// Error plumbing
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct ApiError(StatusCode, String);

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self(StatusCode::BAD_REQUEST, message.into())
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        error!(error = %err, "storage failure");
        Self(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0, Json(json!({ "error": self.1 }))).into_response()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": state.start_time.elapsed().as_secs(),
        "connections": state.hub.count(),
    }))
}

#[derive(Deserialize)]
pub struct LimitParams {
    limit: Option<u32>,
}

pub async fn insights(
    State(state): State<AppState>,
    Query(params): Query<LimitParams>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let limit = params.limit.unwrap_or(10);
    let sessions = state.store.get_recent(limit)?;
    let stats = SessionStore::topic_stats(&sessions);
    Ok(Json(json!({
        "recent_sessions": sessions,
        "top_topics": stats.topics,
        "difficulty_distribution": stats.difficulty,
        "total_sessions": sessions.len(),
    })))
}

#[derive(Deserialize)]
pub struct SearchParams {
    q: String,
    limit: Option<usize>,
}

pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if params.q.trim().is_empty() {
        return Err(ApiError::bad_request("query must not be empty"));
    }
    let results = state
        .store
        .search_similar(&params.q, params.limit.unwrap_or(5))
        .await?;
    Ok(Json(json!({ "query": params.q, "results": results })))
}

pub async fn recommendations(
    State(state): State<AppState>,
    Query(params): Query<LimitParams>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let stored = state
        .store
        .recent_recommendations(params.limit.unwrap_or(10))?;
    Ok(Json(json!({ "recommendations": stored })))
}

pub async fn generate_recommendations(
    State(state): State<AppState>,
) -> Result<Json<Vec<Recommendation>>, ApiError> {
    let sessions = state.store.get_recent(10)?;
    if sessions.is_empty() {
        return Ok(Json(vec![Recommendation {
            title: "Start Learning!".to_string(),
            description: "Begin your learning journey by working on code projects. \
                          Activity is analyzed as you save files."
                .to_string(),
            reason: "No learning activity detected yet".to_string(),
            estimated_time: "ongoing".to_string(),
            difficulty: Difficulty::Beginner,
            resource_type: ResourceType::GettingStarted,
            topics: Vec::new(),
        }]));
    }

    let topics = unique_capped(sessions.iter().flat_map(|s| s.topics.iter()), 5);
    let struggles = unique_capped(
        sessions.iter().flat_map(|s| s.potential_struggles.iter()),
        10,
    );
    let summary = joined_summaries(&sessions);

    let recs = state.engine.recommend(&topics, &struggles, &summary).await;

    // Attach to the most recent session so they show up in stored listings
    let anchor = &sessions[0].id;
    for (index, rec) in recs.iter().enumerate() {
        state.store.store_recommendation(anchor, index, rec)?;
    }
    Ok(Json(recs))
}

#[derive(Default, Deserialize)]
pub struct QuizRequest {
    #[serde(default, deserialize_with = "topics_list")]
    topics: Option<Vec<String>>,
    session_id: Option<String>,
    num_questions: Option<usize>,
}

/// `topics` arrives either as a JSON list or as one comma-separated string.
fn topics_list<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        List(Vec<String>),
        Csv(String),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        None => None,
        Some(Raw::List(list)) => Some(list),
        Some(Raw::Csv(raw)) => Some(
            raw.split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_owned)
                .collect(),
        ),
    })
}

pub async fn generate_quiz(
    State(state): State<AppState>,
    body: Option<Json<QuizRequest>>,
) -> Result<Json<sensei_core::Quiz>, ApiError> {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    let num_questions = request.num_questions.unwrap_or(5);
    if !(1..=20).contains(&num_questions) {
        return Err(ApiError::bad_request("num_questions must be between 1 and 20"));
    }

    let (topics, summary) = if let Some(topics) =
        request.topics.filter(|topics| !topics.is_empty())
    {
        (topics, String::new())
    } else if let Some(raw_id) = request.session_id {
        let id = SessionId::from_raw(&raw_id);
        match state.store.get(&id) {
            Ok(record) => {
                let topics = if record.weak_areas.is_empty() {
                    record.topics
                } else {
                    record.weak_areas
                };
                (topics, record.summary)
            }
            Err(StoreError::NotFound(_)) => {
                return Ok(Json(sensei_core::Quiz::empty(format!(
                    "Session {raw_id} not found"
                ))));
            }
            Err(err) => return Err(err.into()),
        }
    } else {
        let sessions = state.store.get_recent(5)?;
        let topics = unique_capped(sessions.iter().flat_map(|s| s.topics.iter()), 5);
        (topics, joined_summaries(&sessions))
    };

    let quiz = state.engine.quiz(&topics, &summary, num_questions).await;
    Ok(Json(quiz))
}

pub async fn summary(
    State(state): State<AppState>,
    Path(period): Path<String>,
) -> Result<Json<sensei_core::PeriodSummary>, ApiError> {
    let window = match period.as_str() {
        "daily" => 10,
        "weekly" => 30,
        "monthly" => u32::MAX,
        other => {
            return Err(ApiError::bad_request(format!(
                "unknown period '{other}', expected daily, weekly or monthly"
            )));
        }
    };
    let sessions = state.store.get_recent(window)?;
    let summary = state.engine.summarize(&sessions, &period).await;
    Ok(Json(summary))
}

pub async fn rate_status(
    State(state): State<AppState>,
) -> Result<Json<sensei_store::RateStatus>, ApiError> {
    Ok(Json(state.governor.status()?))
}

pub async fn rate_reset(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.governor.reset()?;
    let status = state.governor.status()?;
    Ok(Json(json!({ "status": "ok", "rate": status })))
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn unique_capped<'a>(items: impl Iterator<Item = &'a String>, cap: usize) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for item in items {
        if !out.contains(item) {
            out.push(item.clone());
            if out.len() == cap {
                break;
            }
        }
    }
    out
}

fn joined_summaries(sessions: &[SessionRecord]) -> String {
    sessions
        .iter()
        .take(3)
        .map(|s| s.summary.as_str())
        .collect::<Vec<_>>()
        .join(". ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topics_of(body: &str) -> Option<Vec<String>> {
        serde_json::from_str::<QuizRequest>(body).unwrap().topics
    }

    #[test]
    fn quiz_topics_accepts_list() {
        assert_eq!(
            topics_of(r#"{"topics": ["Rust", "Ownership"]}"#),
            Some(vec!["Rust".to_string(), "Ownership".to_string()])
        );
    }

    #[test]
    fn quiz_topics_accepts_comma_separated_string() {
        assert_eq!(
            topics_of(r#"{"topics": "Python, Recursion , "}"#),
            Some(vec!["Python".to_string(), "Recursion".to_string()])
        );
    }

    #[test]
    fn quiz_topics_empty_string_is_empty_list() {
        assert_eq!(topics_of(r#"{"topics": ""}"#), Some(Vec::new()));
    }

    #[test]
    fn quiz_topics_absent_is_none() {
        assert_eq!(topics_of("{}"), None);
    }

    #[test]
    fn unique_capped_dedupes_in_order() {
        let items = ["Python", "Rust", "Python", "SQL"].map(String::from);
        assert_eq!(
            unique_capped(items.iter(), 2),
            vec!["Python".to_string(), "Rust".to_string()]
        );
    }
}
