use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::database::Database;
use crate::error::StoreError;

/// Daily cap on outbound model calls. Deliberately below the provider's
/// published free-tier ceiling to leave headroom for manual testing.
pub const DAILY_LIMIT: u32 = 45;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RateStatus {
    pub count: u32,
    pub limit: u32,
    pub remaining: u32,
    pub day: NaiveDate,
    pub can_request: bool,
}

/// Calendar-day call counter persisted in the `rate_state` table.
///
/// The counter rolls over to 0 the first time any operation runs on a new
/// UTC day. Every mutation is a read-modify-write under the database mutex,
/// so concurrent pipelines cannot lose updates. Callers must check
/// `can_request` before a model call and `record` only after it verifiably
/// succeeds; `undo` compensates a recorded call that later failed.
pub struct RateGovernor {
    db: Database,
    limit: u32,
}

impl RateGovernor {
    pub fn new(db: Database) -> Self {
        Self::with_limit(db, DAILY_LIMIT)
    }

    pub fn with_limit(db: Database, limit: u32) -> Self {
        Self { db, limit }
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Whether another model call is allowed today, with a human-readable
    /// explanation either way.
    pub fn can_request(&self) -> Result<(bool, String), StoreError> {
        let limit = self.limit;
        self.db.with_conn(|conn| {
            let (_, count) = load_rolled(conn)?;
            if count >= limit {
                Ok((
                    false,
                    format!("Daily limit reached ({count}/{limit}). Resets at midnight UTC."),
                ))
            } else {
                Ok((true, format!("{} requests remaining today", limit - count)))
            }
        })
    }

    /// Count one successful model call. Called only after the call
    /// verifiably succeeded, never before.
    #[instrument(skip(self))]
    pub fn record(&self) -> Result<(), StoreError> {
        let limit = self.limit;
        self.db.with_conn(|conn| {
            let (day, count) = load_rolled(conn)?;
            let count = count + 1;
            persist(conn, day, count)?;
            if count >= limit {
                warn!(count, limit, "daily model-call quota exhausted");
            }
            Ok(())
        })
    }

    /// Compensate a recorded call that turned out to have failed.
    #[instrument(skip(self))]
    pub fn undo(&self) -> Result<(), StoreError> {
        self.db.with_conn(|conn| {
            let (day, count) = load_rolled(conn)?;
            if count > 0 {
                persist(conn, day, count - 1)?;
            }
            Ok(())
        })
    }

    /// Manual override: zero the counter for today.
    pub fn reset(&self) -> Result<(), StoreError> {
        self.db.with_conn(|conn| {
            persist(conn, Utc::now().date_naive(), 0)?;
            info!("rate counter manually reset");
            Ok(())
        })
    }

    pub fn status(&self) -> Result<RateStatus, StoreError> {
        let limit = self.limit;
        self.db.with_conn(|conn| {
            let (day, count) = load_rolled(conn)?;
            Ok(RateStatus {
                count,
                limit,
                remaining: limit.saturating_sub(count),
                day,
                can_request: count < limit,
            })
        })
    }
}

/// Read the persisted state, resetting the count if the stored day is not
/// today. Inserts the initial row on first use.
fn load_rolled(conn: &rusqlite::Connection) -> Result<(NaiveDate, u32), StoreError> {
    let today = Utc::now().date_naive();
    let row: Option<(String, u32)> = conn
        .query_row("SELECT day, count FROM rate_state WHERE id = 0", [], |row| {
            Ok((row.get(0)?, row.get(1)?))
        })
        .map(Some)
        .or_else(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(StoreError::from(other)),
        })?;

    match row {
        Some((day_str, count)) => {
            let stored_day = day_str.parse::<NaiveDate>().map_err(|e| StoreError::CorruptRow {
                table: "rate_state",
                column: "day",
                detail: e.to_string(),
            })?;
            if stored_day == today {
                Ok((today, count))
            } else {
                persist(conn, today, 0)?;
                info!(%stored_day, %today, "rate counter rolled over to new day");
                Ok((today, 0))
            }
        }
        None => {
            persist(conn, today, 0)?;
            Ok((today, 0))
        }
    }
}

fn persist(conn: &rusqlite::Connection, day: NaiveDate, count: u32) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO rate_state (id, day, count) VALUES (0, ?1, ?2)
         ON CONFLICT(id) DO UPDATE SET day = ?1, count = ?2",
        rusqlite::params![day.to_string(), count],
    )?;
    Ok(())
}
