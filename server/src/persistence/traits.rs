//! Async store trait for the persistence layer.
//!
//! Methods return `impl Future + Send` rather than using `async fn` so that
//! the futures are guaranteed `Send`, which tonic's `#[async_trait]` and
//! `tokio::spawn` require. Implementations may still write `async fn`.

use super::{PersistenceError, StoredProgress};
use quiz::{LevelId, SessionRecord, UserProgress};
use std::future::Future;

/// Storage for per-user progress and the append-only session log.
pub trait ProgressStore: Send + Sync + 'static {
    /// Current progress for `user_id`, or `None` if nothing was ever stored.
    fn get_progress(
        &self,
        user_id: &str,
    ) -> impl Future<Output = Result<Option<StoredProgress>, PersistenceError>> + Send;

    /// Write `progress` only if the stored revision still equals
    /// `expected_revision` (`0` meaning "no record"). Returns `false` when
    /// another writer got there first; the stored revision then advances by
    /// one on success.
    fn put_progress(
        &self,
        user_id: &str,
        progress: &UserProgress,
        expected_revision: u64,
    ) -> impl Future<Output = Result<bool, PersistenceError>> + Send;

    /// Append a finished session. Appending a `session_id` that is already
    /// present is a no-op.
    fn append_session(
        &self,
        record: &SessionRecord,
    ) -> impl Future<Output = Result<(), PersistenceError>> + Send;

    /// Every recorded session for one user and level, oldest first.
    fn list_sessions(
        &self,
        user_id: &str,
        level_id: LevelId,
    ) -> impl Future<Output = Result<Vec<SessionRecord>, PersistenceError>> + Send;
}
