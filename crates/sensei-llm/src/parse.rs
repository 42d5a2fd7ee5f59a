//! Degrading parse tiers for model output.
//!
//! Tier 1 is strict JSON after code-fence stripping. Tier 2 (recommendations
//! only) scrapes "Title - description" list lines. Callers supply tier 3,
//! the canned fallback.

use regex::Regex;
use sensei_core::{Difficulty, Recommendation, ResourceType};
use serde::de::DeserializeOwned;
use std::sync::OnceLock;

/// Strip a leading/trailing markdown code fence, if present.
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the language tag on the opening fence line
    let rest = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Strict JSON parse after fence stripping. `None` on any failure.
pub fn parse_json<T: DeserializeOwned>(text: &str) -> Option<T> {
    serde_json::from_str(strip_code_fences(text)).ok()
}

fn list_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*(?:\d+[.)]|[-*])\s+(.+?)\s+[-–:]\s+(.+)$").unwrap()
    })
}

/// Heuristic tier: scrape "1. Title - description" style lines into
/// recommendations, capped at 5. Empty when nothing matches.
pub fn recommendations_from_lines(content: &str, topics: &[String]) -> Vec<Recommendation> {
    let mut out = Vec::new();
    for line in content.lines() {
        if out.len() >= 5 {
            break;
        }
        if let Some(caps) = list_line_re().captures(line) {
            out.push(Recommendation {
                title: caps[1].trim().to_string(),
                description: caps[2].trim().to_string(),
                reason: "Based on your recent learning activity".to_string(),
                estimated_time: "15-30 min".to_string(),
                difficulty: Difficulty::Intermediate,
                resource_type: ResourceType::Tutorial,
                topics: topics.iter().take(3).cloned().collect(),
            });
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use sensei_core::Quiz;

    #[test]
    fn strips_fenced_json() {
        let text = "```json\n{\"questions\": []}\n```";
        assert_eq!(strip_code_fences(text), "{\"questions\": []}");
    }

    #[test]
    fn leaves_bare_json_alone() {
        assert_eq!(strip_code_fences("  {\"a\": 1} "), "{\"a\": 1}");
    }

    #[test]
    fn parses_fenced_quiz() {
        let text = "```json\n{\"questions\": []}\n```";
        let quiz: Quiz = parse_json(text).unwrap();
        assert!(quiz.questions.is_empty());
    }

    #[test]
    fn parse_json_rejects_prose() {
        let parsed: Option<Quiz> = parse_json("Here are some questions for you!");
        assert!(parsed.is_none());
    }

    #[test]
    fn scrapes_numbered_list_lines() {
        let content = "Here are my picks:\n\
            1. Rust Book Chapter 4 - ownership and borrowing, explained slowly\n\
            2. Rustlings - bite-sized exercises\n\
            Some closing remark.";
        let recs = recommendations_from_lines(content, &["Rust".into()]);
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].title, "Rust Book Chapter 4");
        assert_eq!(recs[1].description, "bite-sized exercises");
        assert_eq!(recs[0].topics, vec!["Rust"]);
    }

    #[test]
    fn scrape_caps_at_five() {
        let content = (1..=8)
            .map(|i| format!("{i}. Title {i} - description {i}"))
            .collect::<Vec<_>>()
            .join("\n");
        let recs = recommendations_from_lines(&content, &[]);
        assert_eq!(recs.len(), 5);
    }

    #[test]
    fn scrape_ignores_plain_prose() {
        let recs = recommendations_from_lines("no list here, just words", &[]);
        assert!(recs.is_empty());
    }
}
