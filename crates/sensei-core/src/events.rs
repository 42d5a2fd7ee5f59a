use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{ClientId, SessionId};
use crate::types::{Analysis, DocSuggestion, Quiz, Recommendation};

/// Messages pushed to streaming clients. Every variant carries a UTC
/// timestamp; the `type` tag is the wire-level discriminator.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "connected")]
    Connected {
        client_id: ClientId,
        message: String,
        timestamp: DateTime<Utc>,
    },

    #[serde(rename = "received")]
    Received {
        filename: String,
        timestamp: DateTime<Utc>,
    },

    #[serde(rename = "analysis")]
    Analysis {
        session_id: SessionId,
        analysis: Analysis,
        timestamp: DateTime<Utc>,
    },

    #[serde(rename = "documentation")]
    Documentation {
        suggestions: Vec<DocSuggestion>,
        timestamp: DateTime<Utc>,
    },

    #[serde(rename = "recommendations")]
    Recommendations {
        recommendations: Vec<Recommendation>,
        timestamp: DateTime<Utc>,
    },

    #[serde(rename = "quiz")]
    Quiz {
        quiz: Quiz,
        focus_areas: Vec<String>,
        timestamp: DateTime<Utc>,
    },

    #[serde(rename = "error")]
    Error {
        message: String,
        timestamp: DateTime<Utc>,
    },
}

impl ServerMessage {
    pub fn connected(client_id: ClientId) -> Self {
        Self::Connected {
            client_id,
            message: "Connected to sensei backend".to_owned(),
            timestamp: Utc::now(),
        }
    }

    pub fn received(filename: impl Into<String>) -> Self {
        Self::Received {
            filename: filename.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn analysis(session_id: SessionId, analysis: Analysis) -> Self {
        Self::Analysis {
            session_id,
            analysis,
            timestamp: Utc::now(),
        }
    }

    pub fn documentation(suggestions: Vec<DocSuggestion>) -> Self {
        Self::Documentation {
            suggestions,
            timestamp: Utc::now(),
        }
    }

    pub fn recommendations(recommendations: Vec<Recommendation>) -> Self {
        Self::Recommendations {
            recommendations,
            timestamp: Utc::now(),
        }
    }

    pub fn quiz(quiz: Quiz, focus_areas: Vec<String>) -> Self {
        Self::Quiz {
            quiz,
            focus_areas,
            timestamp: Utc::now(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn message_type(&self) -> &'static str {
        match self {
            Self::Connected { .. } => "connected",
            Self::Received { .. } => "received",
            Self::Analysis { .. } => "analysis",
            Self::Documentation { .. } => "documentation",
            Self::Recommendations { .. } => "recommendations",
            Self::Quiz { .. } => "quiz",
            Self::Error { .. } => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Difficulty;

    #[test]
    fn type_tag_on_wire() {
        let msg = ServerMessage::received("a.py");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "received");
        assert_eq!(json["filename"], "a.py");
        assert!(json["timestamp"].is_string());
    }

    #[test]
    fn message_type_matches_tag() {
        let msgs = vec![
            ServerMessage::connected(ClientId::new()),
            ServerMessage::received("x"),
            ServerMessage::error("boom"),
        ];
        for msg in &msgs {
            let json = serde_json::to_value(msg).unwrap();
            assert_eq!(json["type"], msg.message_type());
        }
    }

    #[test]
    fn analysis_message_roundtrip() {
        let msg = ServerMessage::analysis(
            SessionId::new(),
            Analysis {
                filename: "a.py".into(),
                filepath: "/x/a.py".into(),
                topics: vec!["Python".into()],
                difficulty: Difficulty::Intermediate,
                concepts: vec![],
                potential_struggles: vec![],
                summary: "s".into(),
                errors: vec![],
                weak_areas: vec![],
            },
        );
        let json = serde_json::to_string(&msg).unwrap();
        let parsed: ServerMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.message_type(), "analysis");
    }

    #[test]
    fn quiz_message_carries_focus_areas() {
        let msg = ServerMessage::quiz(Quiz::default(), vec!["ownership".into()]);
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["focus_areas"][0], "ownership");
    }
}
