use quiz::{AttemptPhase, LevelId};

/// Complete, immutable snapshot of session state.
/// Sent to clients on every state change and on subscribe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub user_id: String,
    pub level_id: LevelId,
    pub phase: AttemptPhase,
    pub score: u32,
    pub max_score: u32,
    /// Per question: `None` until answered, then whether it was correct.
    pub grades: Vec<Option<bool>>,
    pub remaining_ms: u64,
    /// Whether the completion has been recorded and folded into progress.
    pub persisted: bool,
}
