//! Prompt templates for the analysis engine.
//!
//! Every prompt asks for strict JSON so the first parse tier can succeed.
//! The model does not always comply, which is why `parse` has fallbacks.

pub fn analyze(code: &str, filename: &str, filepath: &str) -> String {
    format!(
        "You are an expert programming tutor and learning analyst. \
Analyze the provided code and identify what the learner is studying.\n\n\
Filename: {filename}\nPath: {filepath}\n\nCode:\n```\n{code}\n```\n\n\
Respond with ONLY a JSON object, no prose, with these fields:\n\
{{\n\
  \"topics\": [\"...\"],\n\
  \"difficulty\": \"beginner|intermediate|advanced\",\n\
  \"concepts\": [\"...\"],\n\
  \"potential_struggles\": [\"...\"],\n\
  \"summary\": \"one or two sentences\",\n\
  \"errors\": [{{\"type\": \"...\", \"location\": \"...\", \"description\": \"...\", \"severity\": \"warning|error\"}}],\n\
  \"weak_areas\": [\"...\"]\n\
}}\n\
Be encouraging and specific. Focus on the learning journey."
    )
}

pub fn recommend(topics: &[String], struggles: &[String], summary: &str) -> String {
    format!(
        "Based on a learner's recent activity:\n\n\
Topics: {}\nPotential Struggles: {}\nRecent Work: {}\n\n\
Generate 4 to 6 specific, actionable learning recommendations spanning at \
least two resource types. Respond with ONLY a JSON array of objects:\n\
[{{\"title\": \"...\", \"description\": \"...\", \"reason\": \"...\", \
\"estimated_time\": \"...\", \"difficulty\": \"beginner|intermediate|advanced\", \
\"resource_type\": \"tutorial|documentation|video|article|practice|getting-started\", \
\"topics\": [\"...\"]}}]",
        topics.join(", "),
        struggles.join(", "),
        summary,
    )
}

pub fn summarize(period: &str, session_count: usize, topics: &[String], struggles: &[String]) -> String {
    format!(
        "Generate a {period} learning summary for a student.\n\n\
Number of sessions: {session_count}\n\
Topics covered: {}\n\
Areas of difficulty: {}\n\n\
Create an encouraging, specific summary that highlights progress, names the \
main focus areas, points out what needs attention, and offers next steps. \
Keep it concise (3-4 sentences). Respond with the summary text only.",
        topics.join(", "),
        struggles.join(", "),
    )
}

pub fn quiz(topics: &[String], summary: &str, num_questions: usize) -> String {
    format!(
        "Create a quiz of {num_questions} multiple-choice questions testing \
understanding of: {}.\nContext about recent work: {}\n\n\
Respond with ONLY a JSON object:\n\
{{\"questions\": [{{\"question\": \"...\", \
\"options\": {{\"A\": \"...\", \"B\": \"...\", \"C\": \"...\", \"D\": \"...\"}}, \
\"correct_answer\": \"A\", \"explanation\": \"...\"}}]}}",
        topics.join(", "),
        summary,
    )
}

pub fn doc_suggestions(error_descriptions: &[String], weak_areas: &[String], topics: &[String]) -> String {
    format!(
        "A learner hit these problems while coding:\n\n\
Errors: {}\nWeak areas: {}\nTopics: {}\n\n\
Suggest official documentation pages that address each problem. Respond with \
ONLY a JSON array:\n\
[{{\"title\": \"...\", \"url\": \"https://...\", \"description\": \"...\", \
\"focus_area\": \"...\", \"difficulty\": \"beginner|intermediate|advanced\"}}]",
        error_descriptions.join("; "),
        weak_areas.join(", "),
        topics.join(", "),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn analyze_embeds_code_and_names() {
        let p = analyze("print('hi')", "a.py", "/tmp/a.py");
        assert!(p.contains("print('hi')"));
        assert!(p.contains("Filename: a.py"));
        assert!(p.contains("\"weak_areas\""));
    }

    #[test]
    fn quiz_states_question_count() {
        let p = quiz(&["Rust".into()], "ownership drills", 5);
        assert!(p.contains("5 multiple-choice questions"));
        assert!(p.contains("Rust"));
    }
}
