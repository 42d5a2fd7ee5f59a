//! The analysis engine: five operations, each with a live path and a
//! deterministic fallback.
//!
//! Common shape: build the fallback first, gate the live call on the rate
//! governor, record a successful call against the daily budget, and degrade
//! through the parse tiers. No operation ever returns an error to its
//! caller; the worst case is the canned fallback.

use std::sync::Arc;

use serde::Deserialize;
use tracing::{info, instrument, warn};

use sensei_core::{
    Analysis, CodeIssue, Difficulty, DocSuggestion, LlmProvider, PeriodSummary, Quiz,
    QuizQuestion, Recommendation,
};
use sensei_store::{RateGovernor, SessionRecord};

use crate::{fallback, parse, prompts};

const NO_TOPICS_MESSAGE: &str =
    "No topics available. Upload a file or start coding to generate quizzes!";

pub struct AnalysisEngine {
    provider: Option<Arc<dyn LlmProvider>>,
    governor: Arc<RateGovernor>,
}

/// Model-supplied analysis fields; filename/filepath are attached locally.
#[derive(Deserialize)]
struct AnalysisDraft {
    topics: Vec<String>,
    difficulty: Difficulty,
    #[serde(default)]
    concepts: Vec<String>,
    #[serde(default)]
    potential_struggles: Vec<String>,
    summary: String,
    #[serde(default)]
    errors: Vec<CodeIssue>,
    #[serde(default)]
    weak_areas: Vec<String>,
}

impl AnalysisEngine {
    pub fn new(provider: Option<Arc<dyn LlmProvider>>, governor: Arc<RateGovernor>) -> Self {
        if provider.is_none() {
            warn!("no LLM provider configured, all analysis will use fallbacks");
        }
        Self { provider, governor }
    }

    pub fn has_provider(&self) -> bool {
        self.provider.is_some()
    }

    pub fn governor(&self) -> &Arc<RateGovernor> {
        &self.governor
    }

    /// Gate on the governor, run the provider, record on success.
    /// `None` means: use the fallback.
    async fn call(&self, prompt: &str) -> Option<String> {
        let provider = self.provider.as_ref()?;

        match self.governor.can_request() {
            Ok((true, _)) => {}
            Ok((false, message)) => {
                info!(%message, "daily budget spent, using fallback");
                return None;
            }
            Err(err) => {
                warn!(error = %err, "rate check failed, using fallback");
                return None;
            }
        }

        match provider.complete(prompt).await {
            Ok(text) => {
                if let Err(err) = self.governor.record() {
                    warn!(error = %err, "failed to record request against daily budget");
                }
                Some(text)
            }
            Err(err) if err.is_quota() => {
                warn!("provider reported quota exhaustion, using fallback");
                None
            }
            Err(err) => {
                warn!(kind = err.error_kind(), error = %err, "provider call failed, using fallback");
                None
            }
        }
    }

    #[instrument(skip_all, fields(filename))]
    pub async fn analyze(&self, code: &str, filename: &str, filepath: &str) -> Analysis {
        let prompt = prompts::analyze(code, filename, filepath);
        if let Some(text) = self.call(&prompt).await {
            if let Some(draft) = parse::parse_json::<AnalysisDraft>(&text) {
                return Analysis {
                    filename: filename.to_string(),
                    filepath: filepath.to_string(),
                    topics: draft.topics,
                    difficulty: draft.difficulty,
                    concepts: draft.concepts,
                    potential_struggles: draft.potential_struggles,
                    summary: draft.summary,
                    errors: draft.errors,
                    weak_areas: draft.weak_areas,
                };
            }
            warn!("analysis output did not parse, using fallback");
        }
        fallback::analysis(code, filename, filepath)
    }

    #[instrument(skip_all)]
    pub async fn recommend(
        &self,
        topics: &[String],
        struggles: &[String],
        summary: &str,
    ) -> Vec<Recommendation> {
        let prompt = prompts::recommend(topics, struggles, summary);
        if let Some(text) = self.call(&prompt).await {
            if let Some(recs) = parse::parse_json::<Vec<Recommendation>>(&text) {
                if !recs.is_empty() {
                    return recs;
                }
            }
            let scraped = parse::recommendations_from_lines(&text, topics);
            if !scraped.is_empty() {
                return scraped;
            }
            warn!("recommendation output did not parse, using fallback");
        }
        fallback::recommendations(topics)
    }

    #[instrument(skip_all, fields(period, sessions = sessions.len()))]
    pub async fn summarize(&self, sessions: &[SessionRecord], period: &str) -> PeriodSummary {
        if sessions.is_empty() {
            return PeriodSummary {
                period: period.to_string(),
                summary: "No learning activity in this period.".to_string(),
                topics_learned: Vec::new(),
                struggling_topics: Vec::new(),
                total_sessions: 0,
            };
        }

        let topics = unique(sessions.iter().flat_map(|s| s.topics.iter()));
        let struggles = unique(sessions.iter().flat_map(|s| s.potential_struggles.iter()));

        let prompt = prompts::summarize(period, sessions.len(), &topics, &struggles);
        if let Some(text) = self.call(&prompt).await {
            let text = text.trim();
            if !text.is_empty() {
                return PeriodSummary {
                    period: period.to_string(),
                    summary: text.to_string(),
                    topics_learned: topics.into_iter().take(10).collect(),
                    struggling_topics: struggles.into_iter().take(5).collect(),
                    total_sessions: sessions.len(),
                };
            }
        }
        fallback::summary(period, sessions.len(), &topics, &struggles)
    }

    #[instrument(skip_all, fields(topics = topics.len(), num_questions))]
    pub async fn quiz(&self, topics: &[String], summary: &str, num_questions: usize) -> Quiz {
        if topics.is_empty() {
            return Quiz::empty(NO_TOPICS_MESSAGE);
        }
        let num_questions = num_questions.clamp(1, 20);

        let prompt = prompts::quiz(topics, summary, num_questions);
        if let Some(text) = self.call(&prompt).await {
            if let Some(quiz) = parse::parse_json::<Quiz>(&text) {
                if !quiz.questions.is_empty() {
                    return quiz;
                }
            }
            if let Some(questions) = parse::parse_json::<Vec<QuizQuestion>>(&text) {
                if !questions.is_empty() {
                    return Quiz { questions, message: None };
                }
            }
            warn!("quiz output did not parse, using fallback");
        }
        fallback::quiz(topics, num_questions)
    }

    #[instrument(skip_all, fields(errors = errors.len(), weak_areas = weak_areas.len()))]
    pub async fn doc_suggestions(
        &self,
        errors: &[CodeIssue],
        weak_areas: &[String],
        topics: &[String],
    ) -> Vec<DocSuggestion> {
        if errors.is_empty() && weak_areas.is_empty() {
            return Vec::new();
        }

        let error_descriptions: Vec<String> =
            errors.iter().map(|e| e.description.clone()).collect();
        let prompt = prompts::doc_suggestions(&error_descriptions, weak_areas, topics);
        if let Some(text) = self.call(&prompt).await {
            if let Some(docs) = parse::parse_json::<Vec<DocSuggestion>>(&text) {
                if !docs.is_empty() {
                    return docs;
                }
            }
            warn!("documentation output did not parse, using fallback");
        }

        // When only errors are present, key the table off their descriptions
        if weak_areas.is_empty() {
            fallback::doc_suggestions(&error_descriptions, topics)
        } else {
            fallback::doc_suggestions(weak_areas, topics)
        }
    }
}

fn unique<'a>(items: impl Iterator<Item = &'a String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for item in items {
        if !out.contains(item) {
            out.push(item.clone());
        }
    }
    out
}
