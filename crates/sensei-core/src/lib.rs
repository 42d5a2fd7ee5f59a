pub mod errors;
pub mod events;
pub mod ids;
pub mod provider;
pub mod types;

pub use errors::SenseiError;
pub use events::ServerMessage;
pub use ids::{ClientId, SessionId};
pub use provider::{EmbeddingProvider, LlmProvider};
pub use types::{
    Analysis, CodeIssue, Difficulty, DocSuggestion, FileChange, PeriodSummary, Quiz, QuizQuestion,
    Recommendation, ResourceType,
};
