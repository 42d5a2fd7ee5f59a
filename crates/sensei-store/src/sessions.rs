use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use sensei_core::ids::SessionId;
use sensei_core::types::{Analysis, Difficulty, Recommendation, ResourceType};

use crate::database::Database;
use crate::error::StoreError;
use crate::row_helpers;

/// Sessions beyond this cap are evicted oldest-first on insert to bound
/// index growth.
pub const MAX_SESSIONS: u32 = 1000;

/// Content preview stored per session.
const PREVIEW_CHARS: usize = 1000;

/// One persisted analyzed file-change. Immutable after insert.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: SessionId,
    pub filename: String,
    pub filepath: String,
    pub preview: String,
    pub topics: Vec<String>,
    pub difficulty: Difficulty,
    pub concepts: Vec<String>,
    pub potential_struggles: Vec<String>,
    pub summary: String,
    pub errors_count: u32,
    pub weak_areas: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    pub created_at: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoredRecommendation {
    pub id: String,
    pub session_id: SessionId,
    #[serde(flatten)]
    pub recommendation: Recommendation,
    pub created_at: String,
}

pub struct SessionRepo {
    db: Database,
}

impl SessionRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Insert one session record, evicting oldest rows beyond the cap.
    #[instrument(skip(self, content, analysis), fields(session_id = %id))]
    pub fn insert(
        &self,
        id: &SessionId,
        content: &str,
        analysis: &Analysis,
        embedding: Option<&[f32]>,
    ) -> Result<SessionRecord, StoreError> {
        let now = Utc::now().to_rfc3339();
        let preview: String = content.chars().take(PREVIEW_CHARS).collect();
        let embedding_json = embedding.map(serde_json::to_string).transpose()?;

        let record = SessionRecord {
            id: id.clone(),
            filename: analysis.filename.clone(),
            filepath: analysis.filepath.clone(),
            preview: preview.clone(),
            topics: analysis.topics.clone(),
            difficulty: analysis.difficulty,
            concepts: analysis.concepts.clone(),
            potential_struggles: analysis.potential_struggles.clone(),
            summary: analysis.summary.clone(),
            errors_count: analysis.errors.len() as u32,
            weak_areas: analysis.weak_areas.clone(),
            embedding: embedding.map(|e| e.to_vec()),
            created_at: now.clone(),
        };

        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO sessions (id, filename, filepath, preview, topics, difficulty,
                                       concepts, potential_struggles, summary, errors_count,
                                       weak_areas, embedding, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                rusqlite::params![
                    id.as_str(),
                    analysis.filename,
                    analysis.filepath,
                    preview,
                    serde_json::to_string(&analysis.topics)?,
                    analysis.difficulty.as_str(),
                    serde_json::to_string(&analysis.concepts)?,
                    serde_json::to_string(&analysis.potential_struggles)?,
                    analysis.summary,
                    analysis.errors.len() as u32,
                    serde_json::to_string(&analysis.weak_areas)?,
                    embedding_json,
                    now,
                ],
            )?;

            conn.execute(
                "DELETE FROM sessions WHERE id IN (
                     SELECT id FROM sessions ORDER BY created_at DESC, id DESC
                     LIMIT -1 OFFSET ?1
                 )",
                [MAX_SESSIONS],
            )?;

            Ok(record)
        })
    }

    #[instrument(skip(self), fields(session_id = %id))]
    pub fn get(&self, id: &SessionId) -> Result<SessionRecord, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(SELECT_SESSION)?;
            let mut rows = stmt.query(rusqlite::params![Some(id.as_str()), u32::MAX])?;
            match rows.next()? {
                Some(row) => row_to_record(row),
                None => Err(StoreError::NotFound(format!("session {id}"))),
            }
        })
    }

    /// Most-recent-first listing.
    pub fn recent(&self, limit: u32) -> Result<Vec<SessionRecord>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(SELECT_SESSION)?;
            let mut rows = stmt.query(rusqlite::params![None::<&str>, limit])?;
            let mut results = Vec::new();
            while let Some(row) = rows.next()? {
                results.push(row_to_record(row)?);
            }
            Ok(results)
        })
    }

    pub fn count(&self) -> Result<u32, StoreError> {
        self.db.with_conn(|conn| {
            conn.query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))
                .map_err(StoreError::from)
        })
    }

    pub fn insert_recommendation(
        &self,
        session_id: &SessionId,
        index: usize,
        rec: &Recommendation,
    ) -> Result<String, StoreError> {
        let id = session_id.rec_id(index);
        let now = Utc::now().to_rfc3339();
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO recommendations
                     (id, session_id, title, description, reason, estimated_time,
                      difficulty, resource_type, topics, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                rusqlite::params![
                    id,
                    session_id.as_str(),
                    rec.title,
                    rec.description,
                    rec.reason,
                    rec.estimated_time,
                    rec.difficulty.as_str(),
                    rec.resource_type.as_str(),
                    serde_json::to_string(&rec.topics)?,
                    now,
                ],
            )?;
            Ok(())
        })?;
        Ok(id)
    }

    pub fn recent_recommendations(
        &self,
        limit: u32,
    ) -> Result<Vec<StoredRecommendation>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, session_id, title, description, reason, estimated_time,
                        difficulty, resource_type, topics, created_at
                 FROM recommendations ORDER BY created_at DESC, id DESC LIMIT ?1",
            )?;
            let mut rows = stmt.query([limit])?;
            let mut results = Vec::new();
            while let Some(row) = rows.next()? {
                results.push(row_to_recommendation(row)?);
            }
            Ok(results)
        })
    }

    /// All embedded sessions in one query, for similarity search. Fetching
    /// the display fields alongside the vectors means a row evicted by the
    /// retention cap mid-search can never surface as a missing-row error.
    pub fn embedded_sessions(&self) -> Result<Vec<EmbeddedSession>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, topics, summary, embedding FROM sessions
                 WHERE embedding IS NOT NULL",
            )?;
            let mut rows = stmt.query([])?;
            let mut results = Vec::new();
            while let Some(row) = rows.next()? {
                let id: String = row_helpers::get(row, 0, "sessions", "id")?;
                let topics: String = row_helpers::get(row, 1, "sessions", "topics")?;
                let raw: String = row_helpers::get(row, 3, "sessions", "embedding")?;
                let embedding: Vec<f32> =
                    serde_json::from_str(&raw).map_err(|e| StoreError::CorruptRow {
                        table: "sessions",
                        column: "embedding",
                        detail: e.to_string(),
                    })?;
                results.push(EmbeddedSession {
                    id: SessionId::from_raw(id),
                    topics: row_helpers::parse_string_list(&topics, "sessions", "topics")?,
                    summary: row_helpers::get(row, 2, "sessions", "summary")?,
                    embedding,
                });
            }
            Ok(results)
        })
    }
}

/// Projection of a session row used by similarity search.
#[derive(Clone, Debug)]
pub struct EmbeddedSession {
    pub id: SessionId,
    pub topics: Vec<String>,
    pub summary: String,
    pub embedding: Vec<f32>,
}

const SELECT_SESSION: &str =
    "SELECT id, filename, filepath, preview, topics, difficulty, concepts,
            potential_struggles, summary, errors_count, weak_areas, embedding, created_at
     FROM sessions
     WHERE (?1 IS NULL OR id = ?1)
     ORDER BY created_at DESC, id DESC LIMIT ?2";

fn row_to_record(row: &rusqlite::Row<'_>) -> Result<SessionRecord, StoreError> {
    let topics: String = row_helpers::get(row, 4, "sessions", "topics")?;
    let difficulty: String = row_helpers::get(row, 5, "sessions", "difficulty")?;
    let concepts: String = row_helpers::get(row, 6, "sessions", "concepts")?;
    let struggles: String = row_helpers::get(row, 7, "sessions", "potential_struggles")?;
    let weak_areas: String = row_helpers::get(row, 10, "sessions", "weak_areas")?;
    let embedding: Option<String> = row_helpers::get_opt(row, 11, "sessions", "embedding")?;

    Ok(SessionRecord {
        id: SessionId::from_raw(row_helpers::get::<String>(row, 0, "sessions", "id")?),
        filename: row_helpers::get(row, 1, "sessions", "filename")?,
        filepath: row_helpers::get(row, 2, "sessions", "filepath")?,
        preview: row_helpers::get(row, 3, "sessions", "preview")?,
        topics: row_helpers::parse_string_list(&topics, "sessions", "topics")?,
        difficulty: row_helpers::parse_enum(&difficulty, "sessions", "difficulty")?,
        concepts: row_helpers::parse_string_list(&concepts, "sessions", "concepts")?,
        potential_struggles: row_helpers::parse_string_list(
            &struggles,
            "sessions",
            "potential_struggles",
        )?,
        summary: row_helpers::get(row, 8, "sessions", "summary")?,
        errors_count: row_helpers::get(row, 9, "sessions", "errors_count")?,
        weak_areas: row_helpers::parse_string_list(&weak_areas, "sessions", "weak_areas")?,
        embedding: embedding
            .map(|raw| {
                serde_json::from_str(&raw).map_err(|e| StoreError::CorruptRow {
                    table: "sessions",
                    column: "embedding",
                    detail: e.to_string(),
                })
            })
            .transpose()?,
        created_at: row_helpers::get(row, 12, "sessions", "created_at")?,
    })
}

fn row_to_recommendation(row: &rusqlite::Row<'_>) -> Result<StoredRecommendation, StoreError> {
    let difficulty: String = row_helpers::get(row, 6, "recommendations", "difficulty")?;
    let resource_type: String = row_helpers::get(row, 7, "recommendations", "resource_type")?;
    let topics: String = row_helpers::get(row, 8, "recommendations", "topics")?;

    Ok(StoredRecommendation {
        id: row_helpers::get(row, 0, "recommendations", "id")?,
        session_id: SessionId::from_raw(row_helpers::get::<String>(
            row,
            1,
            "recommendations",
            "session_id",
        )?),
        recommendation: Recommendation {
            title: row_helpers::get(row, 2, "recommendations", "title")?,
            description: row_helpers::get(row, 3, "recommendations", "description")?,
            reason: row_helpers::get(row, 4, "recommendations", "reason")?,
            estimated_time: row_helpers::get(row, 5, "recommendations", "estimated_time")?,
            difficulty: row_helpers::parse_enum(&difficulty, "recommendations", "difficulty")?,
            resource_type: row_helpers::parse_enum(&resource_type, "recommendations", "resource_type")?,
            topics: row_helpers::parse_string_list(&topics, "recommendations", "topics")?,
        },
        created_at: row_helpers::get(row, 9, "recommendations", "created_at")?,
    })
}
