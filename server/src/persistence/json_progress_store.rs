//! File-backed [`ProgressStore`].
//!
//! Layout under the data directory:
//!
//! ```text
//! progress/<user>.json            one ProgressFile per user
//! sessions/<user>/<session>.json  one SessionRecord per finished session
//! ```
//!
//! User and session ids are escaped into file-name-safe stems.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use quiz::{LevelId, SessionRecord, UserProgress};

use super::{JsonStore, PersistenceError, ProgressStore, Storable, StoredProgress};

/// On-disk progress record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct ProgressFile {
    pub user_id: String,
    pub completed_levels: BTreeSet<LevelId>,
    pub total_score: u32,
    pub revision: u64,
}

impl Storable for ProgressFile {
    fn id(&self) -> String {
        file_stem(&self.user_id)
    }
}

impl Storable for SessionRecord {
    fn id(&self) -> String {
        file_stem(&self.session_id)
    }
}

impl From<ProgressFile> for StoredProgress {
    fn from(file: ProgressFile) -> Self {
        StoredProgress {
            progress: UserProgress {
                completed_levels: file.completed_levels,
                total_score: file.total_score,
            },
            revision: file.revision,
        }
    }
}

pub struct JsonProgressStore {
    root: PathBuf,
    progress: JsonStore<ProgressFile>,
    /// Serializes read-compare-write on progress files within this process.
    write_lock: Mutex<()>,
}

impl JsonProgressStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            progress: JsonStore::new(root.join("progress")),
            root,
            write_lock: Mutex::new(()),
        }
    }

    fn sessions_for(&self, user_id: &str) -> JsonStore<SessionRecord> {
        JsonStore::new(self.root.join("sessions").join(file_stem(user_id)))
    }

    fn sessions_dir(&self) -> PathBuf {
        self.root.join("sessions")
    }

    pub(crate) fn root(&self) -> &Path {
        &self.root
    }

    /// Every progress record on disk, for the one-time SQLite import.
    pub(crate) fn load_all_progress(&self) -> Result<Vec<ProgressFile>, PersistenceError> {
        self.progress.load_all()
    }

    /// Every session record on disk, across all users.
    pub(crate) fn load_all_sessions(&self) -> Result<Vec<SessionRecord>, PersistenceError> {
        let dir = self.sessions_dir();
        if !dir.exists() {
            return Ok(vec![]);
        }
        let mut all = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.is_dir() {
                all.extend(JsonStore::<SessionRecord>::new(path).load_all()?);
            }
        }
        Ok(all)
    }
}

impl ProgressStore for JsonProgressStore {
    async fn get_progress(&self, user_id: &str) -> Result<Option<StoredProgress>, PersistenceError> {
        let file = self.progress.load(&file_stem(user_id))?;
        Ok(file.map(StoredProgress::from))
    }

    async fn put_progress(
        &self,
        user_id: &str,
        progress: &UserProgress,
        expected_revision: u64,
    ) -> Result<bool, PersistenceError> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| PersistenceError::Unavailable("progress write lock poisoned".into()))?;

        let current = self
            .progress
            .load(&file_stem(user_id))?
            .map(|f| f.revision)
            .unwrap_or(0);
        if current != expected_revision {
            return Ok(false);
        }

        self.progress.save(&ProgressFile {
            user_id: user_id.to_string(),
            completed_levels: progress.completed_levels.clone(),
            total_score: progress.total_score,
            revision: expected_revision + 1,
        })?;
        Ok(true)
    }

    async fn append_session(&self, record: &SessionRecord) -> Result<(), PersistenceError> {
        let store = self.sessions_for(&record.user_id);
        if store.exists(&record.id()) {
            tracing::debug!(session_id = %record.session_id, "Session already recorded");
            return Ok(());
        }
        store.save(record)
    }

    async fn list_sessions(
        &self,
        user_id: &str,
        level_id: LevelId,
    ) -> Result<Vec<SessionRecord>, PersistenceError> {
        let mut sessions: Vec<SessionRecord> = self
            .sessions_for(user_id)
            .load_all()?
            .into_iter()
            .filter(|s| s.user_id == user_id && s.level_id == level_id)
            .collect();
        sessions.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.session_id.cmp(&b.session_id))
        });
        Ok(sessions)
    }
}

/// Escape an id into a file stem. ASCII alphanumerics and `-` pass through;
/// every other byte becomes `_xx` so distinct ids never collide.
fn file_stem(id: &str) -> String {
    let mut out = String::with_capacity(id.len());
    for b in id.bytes() {
        if b.is_ascii_alphanumeric() || b == b'-' {
            out.push(b as char);
        } else {
            out.push_str(&format!("_{:02x}", b));
        }
    }
    out
}
