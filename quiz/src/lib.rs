//! Level progression and scoring rules for the quiz arena.
//!
//! Everything in this crate is synchronous and free of I/O: the catalog is
//! handed in already parsed, attempts are driven by the caller, and progress
//! is derived from whatever session log the caller supplies.

pub mod attempt;
pub mod catalog;
pub mod error;
pub mod level;
pub mod progress;
pub mod types;
pub mod unlock;

pub use attempt::{Attempt, AttemptPhase, CompletionReason};
pub use catalog::{Catalog, CatalogError};
pub use error::QuizError;
pub use level::{Answer, AnswerKey, Level, Question};
pub use progress::{
    best_score, best_scores, derive_progress, total_for, SessionRecord, UserProgress,
};
pub use types::{Difficulty, GameType, LevelId};
pub use unlock::{is_difficulty_complete, is_level_unlocked, is_tier_unlocked, unlocked_levels};
