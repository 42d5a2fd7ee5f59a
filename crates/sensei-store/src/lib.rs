pub mod database;
pub mod error;
pub mod rate;
pub mod row_helpers;
pub mod schema;
pub mod sessions;
pub mod store;

pub use database::Database;
pub use error::StoreError;
pub use rate::{RateGovernor, RateStatus, DAILY_LIMIT};
pub use sessions::{EmbeddedSession, SessionRecord, SessionRepo, StoredRecommendation, MAX_SESSIONS};
pub use store::{SessionStore, SimilarSession, TopicStats};
