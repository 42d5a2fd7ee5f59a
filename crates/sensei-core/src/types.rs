use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stabilized file modification, produced by the watcher and consumed
/// once by the stream session. Never persisted.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FileChange {
    pub filename: String,
    pub filepath: String,
    pub content: String,
    #[serde(default = "Utc::now")]
    pub observed_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Beginner => "beginner",
            Self::Intermediate => "intermediate",
            Self::Advanced => "advanced",
        }
    }
}

impl std::str::FromStr for Difficulty {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "beginner" => Ok(Self::Beginner),
            "intermediate" => Ok(Self::Intermediate),
            "advanced" => Ok(Self::Advanced),
            other => Err(format!("unknown difficulty: {other}")),
        }
    }
}

/// A problem the model spotted in the analyzed code.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CodeIssue {
    #[serde(rename = "type")]
    pub issue_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub description: String,
    #[serde(default = "default_severity")]
    pub severity: String,
}

fn default_severity() -> String {
    "warning".to_owned()
}

/// The result of analyzing one file change. Every field is always
/// populated, in live and fallback mode alike (empty lists where unknown).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Analysis {
    pub filename: String,
    pub filepath: String,
    pub topics: Vec<String>,
    pub difficulty: Difficulty,
    #[serde(default)]
    pub concepts: Vec<String>,
    #[serde(default)]
    pub potential_struggles: Vec<String>,
    pub summary: String,
    #[serde(default)]
    pub errors: Vec<CodeIssue>,
    #[serde(default)]
    pub weak_areas: Vec<String>,
}

impl Analysis {
    /// Whether the pipeline should fetch documentation pointers.
    pub fn needs_docs(&self) -> bool {
        !self.errors.is_empty() || !self.weak_areas.is_empty()
    }

    /// Whether the pipeline should generate recommendations.
    pub fn needs_recommendations(&self) -> bool {
        !self.potential_struggles.is_empty() || !self.weak_areas.is_empty()
    }

    /// Struggles and weak areas merged, duplicates removed, order kept.
    pub fn struggle_set(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for s in self.potential_struggles.iter().chain(self.weak_areas.iter()) {
            if !out.contains(s) {
                out.push(s.clone());
            }
        }
        out
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceType {
    Video,
    Article,
    Documentation,
    Tutorial,
    Practice,
    GettingStarted,
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Article => "article",
            Self::Documentation => "documentation",
            Self::Tutorial => "tutorial",
            Self::Practice => "practice",
            Self::GettingStarted => "getting-started",
        }
    }
}

impl std::str::FromStr for ResourceType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "video" => Ok(Self::Video),
            "article" => Ok(Self::Article),
            "documentation" => Ok(Self::Documentation),
            "tutorial" => Ok(Self::Tutorial),
            "practice" => Ok(Self::Practice),
            "getting-started" => Ok(Self::GettingStarted),
            other => Err(format!("unknown resource type: {other}")),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Recommendation {
    pub title: String,
    pub description: String,
    pub reason: String,
    pub estimated_time: String,
    pub difficulty: Difficulty,
    pub resource_type: ResourceType,
    #[serde(default)]
    pub topics: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub question: String,
    /// Keyed choices, "A" through "D".
    pub options: BTreeMap<String, String>,
    pub correct_answer: String,
    pub explanation: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Quiz {
    pub questions: Vec<QuizQuestion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Quiz {
    pub fn empty(message: impl Into<String>) -> Self {
        Self {
            questions: Vec::new(),
            message: Some(message.into()),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DocSuggestion {
    pub title: String,
    pub url: String,
    pub description: String,
    pub focus_area: String,
    pub difficulty: Difficulty,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PeriodSummary {
    pub period: String,
    pub summary: String,
    pub topics_learned: Vec<String>,
    pub struggling_topics: Vec<String>,
    pub total_sessions: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analysis(struggles: &[&str], weak: &[&str], errors: usize) -> Analysis {
        Analysis {
            filename: "a.py".into(),
            filepath: "/x/a.py".into(),
            topics: vec!["Python".into()],
            difficulty: Difficulty::Intermediate,
            concepts: vec![],
            potential_struggles: struggles.iter().map(|s| s.to_string()).collect(),
            summary: "test".into(),
            errors: (0..errors)
                .map(|i| CodeIssue {
                    issue_type: "logic".into(),
                    location: None,
                    description: format!("issue {i}"),
                    severity: "warning".into(),
                })
                .collect(),
            weak_areas: weak.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn clean_analysis_triggers_nothing() {
        let a = analysis(&[], &[], 0);
        assert!(!a.needs_docs());
        assert!(!a.needs_recommendations());
    }

    #[test]
    fn errors_trigger_docs_only() {
        let a = analysis(&[], &[], 1);
        assert!(a.needs_docs());
        assert!(!a.needs_recommendations());
    }

    #[test]
    fn struggles_trigger_recommendations_only() {
        let a = analysis(&["recursion"], &[], 0);
        assert!(!a.needs_docs());
        assert!(a.needs_recommendations());
    }

    #[test]
    fn weak_areas_trigger_both() {
        let a = analysis(&[], &["lifetimes"], 0);
        assert!(a.needs_docs());
        assert!(a.needs_recommendations());
    }

    #[test]
    fn struggle_set_dedupes_preserving_order() {
        let a = analysis(&["loops", "recursion"], &["recursion", "borrowing"], 0);
        assert_eq!(a.struggle_set(), vec!["loops", "recursion", "borrowing"]);
    }

    #[test]
    fn difficulty_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&Difficulty::Intermediate).unwrap(),
            "\"intermediate\""
        );
        let d: Difficulty = serde_json::from_str("\"advanced\"").unwrap();
        assert_eq!(d, Difficulty::Advanced);
    }

    #[test]
    fn resource_type_kebab_case() {
        assert_eq!(
            serde_json::to_string(&ResourceType::GettingStarted).unwrap(),
            "\"getting-started\""
        );
    }

    #[test]
    fn analysis_tolerates_missing_optional_fields() {
        let json = r#"{
            "filename": "a.rs",
            "filepath": "/a.rs",
            "topics": ["Rust"],
            "difficulty": "beginner",
            "summary": "short"
        }"#;
        let a: Analysis = serde_json::from_str(json).unwrap();
        assert!(a.concepts.is_empty());
        assert!(a.errors.is_empty());
        assert!(a.weak_areas.is_empty());
    }

    #[test]
    fn quiz_empty_carries_message() {
        let q = Quiz::empty("no topics yet");
        assert!(q.questions.is_empty());
        assert_eq!(q.message.as_deref(), Some("no topics yet"));
    }
}
