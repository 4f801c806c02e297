use quiz::{SessionRecord, UserProgress};

use super::snapshot::SessionSnapshot;

/// Events broadcast from the session actor to all subscribers.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Full state snapshot after any mutation.
    StateChanged(SessionSnapshot),
    /// The attempt completed and produced a record.
    Completed(CompletionEvent),
    /// Error notification.
    Error(String),
}

#[derive(Debug, Clone)]
pub struct CompletionEvent {
    pub record: SessionRecord,
    /// `None` while the record is not yet saved.
    pub progress: Option<UserProgress>,
}
