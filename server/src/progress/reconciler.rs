//! Merging finished sessions into stored progress.
//!
//! The session log is the source of truth. A reconcile appends the record
//! first, then re-derives the user's progress from the log and writes it
//! with a compare-and-set on the stored revision. Losing the race means
//! another writer landed first; the loop re-reads and recomputes from that
//! fresh base instead of reusing anything it computed before.

use std::collections::{BTreeMap, BTreeSet};

use quiz::{best_score, derive_progress, total_for, LevelId, SessionRecord, UserProgress};

use super::ProgressService;
use crate::persistence::{PersistenceError, ProgressStore, StoredProgress};

/// Attempts at the compare-and-set before giving up.
pub const MAX_CAS_ATTEMPTS: u32 = 8;

#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("Failed to record session: {0}")]
    AppendFailed(#[source] PersistenceError),
    #[error("Failed to update progress: {0}")]
    ProgressFailed(#[source] PersistenceError),
    #[error("Progress update lost {0} consecutive races")]
    Contended(u32),
}

impl ReconcileError {
    /// Whether the session record reached the log before the failure.
    pub fn session_durable(&self) -> bool {
        !matches!(self, Self::AppendFailed(_))
    }
}

impl<S: ProgressStore> ProgressService<S> {
    /// Record `record` and fold it into the user's progress.
    ///
    /// Safe to replay: the append is keyed by session id and the progress is
    /// recomputed from the log, so running this twice changes nothing.
    pub async fn reconcile(&self, record: &SessionRecord) -> Result<UserProgress, ReconcileError> {
        let lock = self.locks.lock_for(&record.user_id, record.level_id);
        let _serialized = lock.lock().await;

        self.store
            .append_session(record)
            .await
            .map_err(ReconcileError::AppendFailed)?;

        let user_id = record.user_id.as_str();
        for attempt in 1..=MAX_CAS_ATTEMPTS {
            let base = self.read_base(user_id).await?;

            let mut completed = base.progress.completed_levels.clone();
            if record.completed {
                completed.insert(record.level_id);
            }
            let bests = self
                .bests_for(user_id, &completed)
                .await
                .map_err(ReconcileError::ProgressFailed)?;
            let next = UserProgress {
                total_score: total_for(&completed, &bests),
                completed_levels: completed,
            };

            if self.write_if_changed(user_id, &base, &next).await? {
                tracing::info!(
                    user_id,
                    level_id = record.level_id,
                    session_id = %record.session_id,
                    score = record.score,
                    total_score = next.total_score,
                    attempt,
                    "Session reconciled"
                );
                return Ok(next);
            }
            tracing::debug!(user_id, attempt, "Progress revision moved, recomputing");
        }

        tracing::warn!(user_id, level_id = record.level_id, "Gave up on contended progress update");
        Err(ReconcileError::Contended(MAX_CAS_ATTEMPTS))
    }

    /// Throw away the cached aggregate and rebuild it from every session
    /// the user has on record for a catalog level.
    ///
    /// Takes no level locks. The log is rescanned after every base read, so
    /// a reconcile that lands in between either shows up in the scan or
    /// bumps the revision and forces another pass.
    pub async fn rebuild(&self, user_id: &str) -> Result<UserProgress, ReconcileError> {
        for attempt in 1..=MAX_CAS_ATTEMPTS {
            let base = self.read_base(user_id).await?;

            let mut log = Vec::new();
            for level in self.catalog.all_levels() {
                let sessions = self
                    .store
                    .list_sessions(user_id, level.id)
                    .await
                    .map_err(ReconcileError::ProgressFailed)?;
                log.extend(sessions);
            }
            let derived = derive_progress(&log);

            if self.write_if_changed(user_id, &base, &derived).await? {
                tracing::info!(
                    user_id,
                    sessions = log.len(),
                    completed = derived.completed_levels.len(),
                    total_score = derived.total_score,
                    attempt,
                    "Progress rebuilt from session log"
                );
                return Ok(derived);
            }
            tracing::debug!(user_id, attempt, "Progress revision moved during rebuild, rescanning");
        }

        tracing::warn!(user_id, "Gave up on contended progress rebuild");
        Err(ReconcileError::Contended(MAX_CAS_ATTEMPTS))
    }

    async fn read_base(&self, user_id: &str) -> Result<StoredProgress, ReconcileError> {
        Ok(self
            .store
            .get_progress(user_id)
            .await
            .map_err(ReconcileError::ProgressFailed)?
            .unwrap_or_else(StoredProgress::empty))
    }

    /// Returns `true` if `next` is now the stored state, either because it
    /// already was or because the compare-and-set landed.
    async fn write_if_changed(
        &self,
        user_id: &str,
        base: &StoredProgress,
        next: &UserProgress,
    ) -> Result<bool, ReconcileError> {
        if base.revision > 0 && base.progress == *next {
            return Ok(true);
        }
        self.store
            .put_progress(user_id, next, base.revision)
            .await
            .map_err(ReconcileError::ProgressFailed)
    }

    pub(crate) async fn bests_for(
        &self,
        user_id: &str,
        levels: &BTreeSet<LevelId>,
    ) -> Result<BTreeMap<LevelId, u32>, PersistenceError> {
        let mut bests = BTreeMap::new();
        for &level_id in levels {
            let sessions = self.store.list_sessions(user_id, level_id).await?;
            if let Some(best) = best_score(&sessions) {
                bests.insert(level_id, best);
            }
        }
        Ok(bests)
    }
}
