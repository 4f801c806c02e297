use crate::attempt::AttemptPhase;
use crate::types::{Difficulty, LevelId};

/// Rule violations. None of these are transient; retrying the same call
/// yields the same error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QuizError {
    #[error("Level not found: {0}")]
    LevelNotFound(LevelId),
    #[error("Level {level} is locked until every {requires} level is complete")]
    LevelLocked { level: LevelId, requires: Difficulty },
    #[error("Question index {index} out of range (level has {count} questions)")]
    OutOfRange { index: usize, count: usize },
    #[error("Attempt is not running (phase: {0})")]
    NotRunning(AttemptPhase),
    #[error("{remaining} question(s) still unanswered")]
    Unanswered { remaining: usize },
}
