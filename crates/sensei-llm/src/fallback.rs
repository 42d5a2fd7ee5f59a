//! Deterministic offline fallbacks.
//!
//! Every engine operation terminates here when there is no provider, the
//! daily quota is spent, or the model's output cannot be parsed. The
//! outputs are intentionally plain but always well-formed.

use std::collections::BTreeMap;

use sensei_core::{
    Analysis, Difficulty, DocSuggestion, PeriodSummary, Quiz, QuizQuestion, Recommendation,
    ResourceType,
};

/// Map a filename extension to starter topics.
pub fn topics_for(filename: &str) -> Vec<String> {
    let ext = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    let topics: &[&str] = match ext.as_str() {
        "py" => &["Python", "Programming"],
        "js" => &["JavaScript", "Web Development"],
        "jsx" => &["React", "JavaScript", "Frontend"],
        "ts" => &["TypeScript", "Programming"],
        "tsx" => &["React", "TypeScript", "Frontend"],
        "java" => &["Java", "Programming"],
        "c" | "cpp" | "h" | "hpp" => &["C++", "Programming"],
        "go" => &["Go", "Programming"],
        "rs" => &["Rust", "Programming"],
        "html" => &["HTML", "Web Development"],
        "css" => &["CSS", "Styling"],
        "sql" => &["SQL", "Database"],
        _ => &["Programming"],
    };
    topics.iter().map(|t| (*t).to_string()).collect()
}

pub fn analysis(content: &str, filename: &str, filepath: &str) -> Analysis {
    Analysis {
        filename: filename.to_string(),
        filepath: filepath.to_string(),
        topics: topics_for(filename),
        difficulty: Difficulty::Intermediate,
        concepts: vec!["Code structure".to_string(), "Syntax".to_string()],
        potential_struggles: Vec::new(),
        summary: format!("Working on {filename} - {} characters of code", content.len()),
        errors: Vec::new(),
        weak_areas: Vec::new(),
    }
}

/// Fixed set of five recommendations spanning several resource types,
/// anchored on the learner's first topic.
pub fn recommendations(topics: &[String]) -> Vec<Recommendation> {
    let topic = topics.first().map_or("programming", String::as_str);
    let topic_list: Vec<String> = topics.iter().take(3).cloned().collect();
    let rec = |title: String,
               description: &str,
               reason: &str,
               estimated_time: &str,
               difficulty: Difficulty,
               resource_type: ResourceType| Recommendation {
        title,
        description: description.to_string(),
        reason: reason.to_string(),
        estimated_time: estimated_time.to_string(),
        difficulty,
        resource_type,
        topics: topic_list.clone(),
    };
    vec![
        rec(
            format!("Official {topic} documentation"),
            "Read the reference material for the constructs you used today",
            "Primary sources answer the questions tutorials skip",
            "30-45 min",
            Difficulty::Intermediate,
            ResourceType::Documentation,
        ),
        rec(
            format!("Hands-on {topic} exercises"),
            "Small drills that target one concept at a time",
            "Deliberate practice cements what you just wrote",
            "15-30 min",
            Difficulty::Beginner,
            ResourceType::Practice,
        ),
        rec(
            format!("{topic} crash course video"),
            "A guided walkthrough of the fundamentals",
            "Seeing someone else's workflow surfaces habits you can steal",
            "1 hour",
            Difficulty::Beginner,
            ResourceType::Video,
        ),
        rec(
            format!("Build a small {topic} project"),
            "Apply today's concepts to something end to end",
            "Projects expose the gaps that exercises hide",
            "2-4 hours",
            Difficulty::Intermediate,
            ResourceType::Tutorial,
        ),
        rec(
            format!("Deep-dive article on {topic} internals"),
            "How the pieces you used actually work under the hood",
            "Understanding the machinery makes debugging faster",
            "20-30 min",
            Difficulty::Advanced,
            ResourceType::Article,
        ),
    ]
}

/// Deterministic quiz cycling through the given topics.
pub fn quiz(topics: &[String], num_questions: usize) -> Quiz {
    let questions = (0..num_questions)
        .filter_map(|i| topics.get(i % topics.len().max(1)).map(|t| (i, t)))
        .map(|(i, topic)| {
            let mut options = BTreeMap::new();
            options.insert("A".to_string(), format!("Practice {topic} fundamentals daily"));
            options.insert("B".to_string(), "Memorize syntax without writing code".to_string());
            options.insert("C".to_string(), "Skip the basics and copy examples".to_string());
            options.insert("D".to_string(), "Avoid reading error messages".to_string());
            QuizQuestion {
                question: format!(
                    "Question {}: Which habit builds lasting {topic} skill?",
                    i + 1
                ),
                options,
                correct_answer: "A".to_string(),
                explanation: format!(
                    "Regular hands-on practice is the most reliable way to internalize {topic}."
                ),
            }
        })
        .collect();
    Quiz {
        questions,
        message: None,
    }
}

/// Curated documentation table keyed by topic keywords.
const DOC_TABLE: &[(&str, &str, &str)] = &[
    ("python", "Python Documentation", "https://docs.python.org/3/"),
    ("rust", "The Rust Book", "https://doc.rust-lang.org/book/"),
    ("javascript", "MDN JavaScript Guide", "https://developer.mozilla.org/en-US/docs/Web/JavaScript/Guide"),
    ("typescript", "TypeScript Handbook", "https://www.typescriptlang.org/docs/handbook/intro.html"),
    ("react", "React Documentation", "https://react.dev/learn"),
    ("go", "Go Documentation", "https://go.dev/doc/"),
    ("java", "Java Tutorials", "https://docs.oracle.com/javase/tutorial/"),
    ("c++", "C++ Reference", "https://en.cppreference.com/w/"),
    ("html", "MDN HTML Reference", "https://developer.mozilla.org/en-US/docs/Web/HTML"),
    ("css", "MDN CSS Reference", "https://developer.mozilla.org/en-US/docs/Web/CSS"),
    ("sql", "SQL Tutorial", "https://www.w3schools.com/sql/"),
];

fn doc_for(keyword: &str) -> Option<(&'static str, &'static str)> {
    let lower = keyword.to_ascii_lowercase();
    DOC_TABLE
        .iter()
        .find(|(key, _, _)| lower.contains(key))
        .map(|(_, title, url)| (*title, *url))
}

/// Map each weak area to a documentation pointer. Areas that match no
/// topic keyword fall back to a general resource.
pub fn doc_suggestions(weak_areas: &[String], topics: &[String]) -> Vec<DocSuggestion> {
    weak_areas
        .iter()
        .map(|area| {
            let matched = doc_for(area).or_else(|| topics.iter().find_map(|t| doc_for(t)));
            let (title, url) = matched.unwrap_or((
                "MDN Learn Web Development",
                "https://developer.mozilla.org/en-US/docs/Learn",
            ));
            DocSuggestion {
                title: title.to_string(),
                url: url.to_string(),
                description: format!("Reference material covering {area}"),
                focus_area: area.clone(),
                difficulty: Difficulty::Intermediate,
            }
        })
        .collect()
}

/// Local aggregation when the model is unavailable.
pub fn summary(
    period: &str,
    session_count: usize,
    topics: &[String],
    struggles: &[String],
) -> PeriodSummary {
    let shown: Vec<&str> = topics.iter().take(3).map(String::as_str).collect();
    PeriodSummary {
        period: period.to_string(),
        summary: format!(
            "Completed {session_count} learning sessions covering {}.",
            shown.join(", ")
        ),
        topics_learned: topics.to_vec(),
        struggling_topics: struggles.to_vec(),
        total_sessions: session_count,
    }
}
