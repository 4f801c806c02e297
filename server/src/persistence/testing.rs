//! Store doubles for tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;

use quiz::{LevelId, SessionRecord, UserProgress};

use super::{PersistenceError, ProgressStore, StoredProgress};

/// Process-local store with the same semantics as the real backends.
#[derive(Default)]
pub struct MemoryStore {
    progress: Mutex<HashMap<String, StoredProgress>>,
    sessions: Mutex<Vec<SessionRecord>>,
}

impl MemoryStore {
    pub fn session_count(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }
}

impl ProgressStore for MemoryStore {
    async fn get_progress(&self, user_id: &str) -> Result<Option<StoredProgress>, PersistenceError> {
        Ok(self.progress.lock().unwrap().get(user_id).cloned())
    }

    async fn put_progress(
        &self,
        user_id: &str,
        progress: &UserProgress,
        expected_revision: u64,
    ) -> Result<bool, PersistenceError> {
        let mut map = self.progress.lock().unwrap();
        let current = map.get(user_id).map(|p| p.revision).unwrap_or(0);
        if current != expected_revision {
            return Ok(false);
        }
        map.insert(
            user_id.to_string(),
            StoredProgress {
                progress: progress.clone(),
                revision: expected_revision + 1,
            },
        );
        Ok(true)
    }

    async fn append_session(&self, record: &SessionRecord) -> Result<(), PersistenceError> {
        let mut sessions = self.sessions.lock().unwrap();
        if !sessions.iter().any(|s| s.session_id == record.session_id) {
            sessions.push(record.clone());
        }
        Ok(())
    }

    async fn list_sessions(
        &self,
        user_id: &str,
        level_id: LevelId,
    ) -> Result<Vec<SessionRecord>, PersistenceError> {
        Ok(self
            .sessions
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.user_id == user_id && s.level_id == level_id)
            .cloned()
            .collect())
    }
}

/// Wraps a store and fails selected operations on demand.
pub struct FaultyStore<S> {
    inner: S,
    pub fail_reads: AtomicBool,
    pub fail_appends: AtomicBool,
    pub fail_puts: AtomicBool,
    /// Number of upcoming `put_progress` calls to report as lost races.
    pub conflicts: AtomicU32,
}

impl<S> FaultyStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            fail_reads: AtomicBool::new(false),
            fail_appends: AtomicBool::new(false),
            fail_puts: AtomicBool::new(false),
            conflicts: AtomicU32::new(0),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Turn every fault off.
    pub fn heal(&self) {
        self.fail_reads.store(false, Ordering::SeqCst);
        self.fail_appends.store(false, Ordering::SeqCst);
        self.fail_puts.store(false, Ordering::SeqCst);
        self.conflicts.store(0, Ordering::SeqCst);
    }
}

fn injected(op: &str) -> PersistenceError {
    PersistenceError::Unavailable(format!("injected {op} failure"))
}

impl<S: ProgressStore> ProgressStore for FaultyStore<S> {
    async fn get_progress(&self, user_id: &str) -> Result<Option<StoredProgress>, PersistenceError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(injected("read"));
        }
        self.inner.get_progress(user_id).await
    }

    async fn put_progress(
        &self,
        user_id: &str,
        progress: &UserProgress,
        expected_revision: u64,
    ) -> Result<bool, PersistenceError> {
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(injected("write"));
        }
        let pending = self.conflicts.load(Ordering::SeqCst);
        if pending > 0 {
            self.conflicts.store(pending - 1, Ordering::SeqCst);
            return Ok(false);
        }
        self.inner.put_progress(user_id, progress, expected_revision).await
    }

    async fn append_session(&self, record: &SessionRecord) -> Result<(), PersistenceError> {
        if self.fail_appends.load(Ordering::SeqCst) {
            return Err(injected("append"));
        }
        self.inner.append_session(record).await
    }

    async fn list_sessions(
        &self,
        user_id: &str,
        level_id: LevelId,
    ) -> Result<Vec<SessionRecord>, PersistenceError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(injected("read"));
        }
        self.inner.list_sessions(user_id, level_id).await
    }
}
