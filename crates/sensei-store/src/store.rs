use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use sensei_core::ids::SessionId;
use sensei_core::provider::EmbeddingProvider;
use sensei_core::types::{Analysis, Recommendation};

use crate::database::Database;
use crate::error::StoreError;
use crate::sessions::{EmbeddedSession, SessionRecord, SessionRepo, StoredRecommendation};

/// Summary length in similarity listings.
const SUMMARY_CHARS: usize = 200;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SimilarSession {
    pub id: SessionId,
    pub topics: Vec<String>,
    pub summary: String,
    pub similarity: f32,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TopicStats {
    pub topics: BTreeMap<String, u32>,
    pub difficulty: BTreeMap<String, u32>,
}

/// Vector-index wrapper over the session repo.
///
/// Without an embedding provider the store runs degraded: records are still
/// written for recency queries, but no vectors are computed and similarity
/// search returns empty. Embedding failures degrade the same way instead of
/// failing the pipeline.
pub struct SessionStore {
    repo: SessionRepo,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
}

impl SessionStore {
    pub fn new(db: Database, embedder: Option<Arc<dyn EmbeddingProvider>>) -> Self {
        if embedder.is_none() {
            warn!("no embedding provider configured; similarity search disabled");
        }
        Self {
            repo: SessionRepo::new(db),
            embedder,
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.embedder.is_none()
    }

    pub async fn store_session(
        &self,
        id: &SessionId,
        content: &str,
        analysis: &Analysis,
    ) -> Result<SessionRecord, StoreError> {
        let embedding = match &self.embedder {
            Some(embedder) => match embedder.embed(content).await {
                Ok(vector) => Some(vector),
                Err(e) => {
                    warn!(error = %e, session_id = %id, "embedding failed; storing without vector");
                    None
                }
            },
            None => None,
        };

        self.repo.insert(id, content, analysis, embedding.as_deref())
    }

    pub fn store_recommendation(
        &self,
        session_id: &SessionId,
        index: usize,
        rec: &Recommendation,
    ) -> Result<String, StoreError> {
        self.repo.insert_recommendation(session_id, index, rec)
    }

    pub fn get(&self, id: &SessionId) -> Result<SessionRecord, StoreError> {
        self.repo.get(id)
    }

    pub fn get_recent(&self, limit: u32) -> Result<Vec<SessionRecord>, StoreError> {
        self.repo.recent(limit)
    }

    pub fn recent_recommendations(
        &self,
        limit: u32,
    ) -> Result<Vec<StoredRecommendation>, StoreError> {
        self.repo.recent_recommendations(limit)
    }

    /// Nearest stored sessions by cosine similarity, descending.
    /// Similarity is 1 − cosine distance, clamped into [0, 1].
    pub async fn search_similar(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SimilarSession>, StoreError> {
        let Some(embedder) = &self.embedder else {
            return Ok(Vec::new());
        };

        let query_vector = match embedder.embed(query).await {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "query embedding failed; returning no results");
                return Ok(Vec::new());
            }
        };

        let mut scored: Vec<(EmbeddedSession, f32)> = self
            .repo
            .embedded_sessions()?
            .into_iter()
            .map(|session| {
                let sim = cosine_similarity(&query_vector, &session.embedding).clamp(0.0, 1.0);
                (session, sim)
            })
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);

        debug!(results = scored.len(), "similarity search complete");

        Ok(scored
            .into_iter()
            .map(|(session, similarity)| SimilarSession {
                id: session.id,
                topics: session.topics,
                summary: session.summary.chars().take(SUMMARY_CHARS).collect(),
                similarity,
            })
            .collect())
    }

    /// Aggregate topic and difficulty counts over a set of records.
    pub fn topic_stats(records: &[SessionRecord]) -> TopicStats {
        let mut stats = TopicStats::default();
        for record in records {
            for topic in &record.topics {
                *stats.topics.entry(topic.clone()).or_insert(0) += 1;
            }
            *stats
                .difficulty
                .entry(record.difficulty.as_str().to_owned())
                .or_insert(0) += 1;
        }
        stats
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use sensei_core::errors::SenseiError;
    use sensei_core::types::Difficulty;

    /// Embeds onto a fixed axis per keyword so tests control similarity.
    struct KeywordEmbedder;

    #[async_trait]
    impl EmbeddingProvider for KeywordEmbedder {
        fn dimensions(&self) -> usize {
            3
        }

        async fn embed(&self, text: &str) -> Result<Vec<f32>, SenseiError> {
            let mut v = vec![0.0, 0.0, 0.0];
            if text.contains("python") {
                v[0] = 1.0;
            }
            if text.contains("rust") {
                v[1] = 1.0;
            }
            if text.contains("sql") {
                v[2] = 1.0;
            }
            Ok(v)
        }
    }

    fn analysis(filename: &str, topics: &[&str]) -> Analysis {
        Analysis {
            filename: filename.to_owned(),
            filepath: format!("/src/{filename}"),
            topics: topics.iter().map(|t| t.to_string()).collect(),
            difficulty: Difficulty::Intermediate,
            concepts: vec![],
            potential_struggles: vec![],
            summary: format!("Working on {filename}"),
            errors: vec![],
            weak_areas: vec![],
        }
    }

    #[test]
    fn cosine_identical_is_one() {
        let sim = cosine_similarity(&[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0]);
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_orthogonal_is_zero() {
        let sim = cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]);
        assert!(sim.abs() < 1e-6);
    }

    #[test]
    fn cosine_mismatched_lengths_is_zero() {
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }

    #[tokio::test]
    async fn degraded_store_persists_but_finds_nothing() {
        let store = SessionStore::new(Database::in_memory().unwrap(), None);
        assert!(store.is_degraded());

        let id = SessionId::new();
        store
            .store_session(&id, "python code", &analysis("a.py", &["Python"]))
            .await
            .unwrap();

        // Record is still there for recency queries
        assert_eq!(store.get_recent(10).unwrap().len(), 1);
        // But similarity search is a no-op
        assert!(store.search_similar("python", 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn search_ranks_by_similarity() {
        let store = SessionStore::new(
            Database::in_memory().unwrap(),
            Some(Arc::new(KeywordEmbedder)),
        );

        let py = SessionId::new();
        let rs = SessionId::new();
        store
            .store_session(&py, "python code here", &analysis("a.py", &["Python"]))
            .await
            .unwrap();
        store
            .store_session(&rs, "rust code here", &analysis("b.rs", &["Rust"]))
            .await
            .unwrap();

        let results = store.search_similar("some python snippet", 5).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, py);
        assert!(results[0].similarity > results[1].similarity);
        assert!((results[0].similarity - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn search_respects_limit() {
        let store = SessionStore::new(
            Database::in_memory().unwrap(),
            Some(Arc::new(KeywordEmbedder)),
        );
        for i in 0..4 {
            let id = SessionId::new();
            store
                .store_session(&id, "python", &analysis(&format!("f{i}.py"), &["Python"]))
                .await
                .unwrap();
        }
        let results = store.search_similar("python", 2).await.unwrap();
        assert_eq!(results.len(), 2);
    }

    #[tokio::test]
    async fn search_tolerates_evicted_rows() {
        let db = Database::in_memory().unwrap();
        let store = SessionStore::new(db.clone(), Some(Arc::new(KeywordEmbedder)));

        let kept = SessionId::new();
        let evicted = SessionId::new();
        store
            .store_session(&kept, "python code", &analysis("a.py", &["Python"]))
            .await
            .unwrap();
        store
            .store_session(&evicted, "python too", &analysis("b.py", &["Python"]))
            .await
            .unwrap();

        // Retention eviction between scoring and result assembly must not
        // surface as an error; search reads each row exactly once.
        db.with_conn(|conn| {
            conn.execute("DELETE FROM sessions WHERE id = ?1", [evicted.as_str()])?;
            Ok(())
        })
        .unwrap();

        let results = store.search_similar("python", 5).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, kept);
    }

    #[test]
    fn topic_stats_aggregates() {
        let records = vec![
            SessionRecord {
                id: SessionId::new(),
                filename: "a.py".into(),
                filepath: "/a.py".into(),
                preview: String::new(),
                topics: vec!["Python".into(), "Programming".into()],
                difficulty: Difficulty::Intermediate,
                concepts: vec![],
                potential_struggles: vec![],
                summary: String::new(),
                errors_count: 0,
                weak_areas: vec![],
                embedding: None,
                created_at: String::new(),
            },
            SessionRecord {
                id: SessionId::new(),
                filename: "b.py".into(),
                filepath: "/b.py".into(),
                preview: String::new(),
                topics: vec!["Python".into()],
                difficulty: Difficulty::Beginner,
                concepts: vec![],
                potential_struggles: vec![],
                summary: String::new(),
                errors_count: 0,
                weak_areas: vec![],
                embedding: None,
                created_at: String::new(),
            },
        ];

        let stats = SessionStore::topic_stats(&records);
        assert_eq!(stats.topics["Python"], 2);
        assert_eq!(stats.topics["Programming"], 1);
        assert_eq!(stats.difficulty["intermediate"], 1);
        assert_eq!(stats.difficulty["beginner"], 1);
    }
}
