//! Durable storage for user progress and the session log.
//!
//! Two interchangeable backends implement [`ProgressStore`]:
//! - [`JsonProgressStore`]: one JSON file per record under the data directory.
//! - [`sqlite::SqliteProgressStore`]: a WAL-mode SQLite database.
//!
//! Progress writes are compare-and-set on a per-user revision counter so
//! that two server tasks finishing sessions for the same user cannot lose
//! each other's update.

mod json_progress_store;
mod json_store;
pub mod sqlite;
#[cfg(test)]
pub(crate) mod testing;
mod traits;

pub use json_progress_store::JsonProgressStore;
pub(crate) use json_store::{JsonStore, Storable};
pub use traits::ProgressStore;

use quiz::UserProgress;
use std::time::{SystemTime, UNIX_EPOCH};

/// Errors from the persistence layer.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("SQLite error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("Migration error: {0}")]
    Migration(String),
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// A progress record together with the revision it was read at.
///
/// Revision `0` is never stored; it stands for "no record yet" when passed
/// back to [`ProgressStore::put_progress`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredProgress {
    pub progress: UserProgress,
    pub revision: u64,
}

impl StoredProgress {
    /// The state of a user who has never completed anything.
    pub fn empty() -> Self {
        Self {
            progress: UserProgress::default(),
            revision: 0,
        }
    }
}

/// Get the current unix timestamp in seconds.
pub fn now_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
