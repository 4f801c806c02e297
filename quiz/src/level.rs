use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::types::{Difficulty, GameType, LevelId};

/// One playable level. Immutable once the catalog is loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Level {
    pub id: LevelId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub difficulty: Difficulty,
    pub game_type: GameType,
    pub points_per_question: u32,
    pub time_limit_secs: u32,
    pub questions: Vec<Question>,
}

/// A question is identified by its position within the level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub prompt: String,
    pub answer: AnswerKey,
}

/// Answer-validation data. The variant must agree with the level's game type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnswerKey {
    Choice {
        options: Vec<String>,
        correct: usize,
    },
    Match {
        left: Vec<String>,
        right: Vec<String>,
        /// `(left index, right index)` for every left item.
        pairs: Vec<(usize, usize)>,
    },
    FillBlank {
        accepted: Vec<String>,
    },
}

/// An answer as submitted by the player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    Choice(usize),
    Pairs(Vec<(usize, usize)>),
    Text(String),
}

impl Level {
    /// `questions × points_per_question`. Catalog validation rejects levels
    /// where this overflows, so the saturation never kicks in for a loaded level.
    pub fn max_score(&self) -> u32 {
        self.checked_max_score().unwrap_or(u32::MAX)
    }

    pub(crate) fn checked_max_score(&self) -> Option<u32> {
        u32::try_from(self.questions.len())
            .ok()?
            .checked_mul(self.points_per_question)
    }

    pub fn question_count(&self) -> usize {
        self.questions.len()
    }

    pub fn question(&self, index: usize) -> Option<&Question> {
        self.questions.get(index)
    }

    pub fn time_limit(&self) -> Duration {
        Duration::from_secs(u64::from(self.time_limit_secs))
    }
}

impl AnswerKey {
    /// The game type this key can validate.
    pub fn game_type(&self) -> GameType {
        match self {
            Self::Choice { .. } => GameType::Quiz,
            Self::Match { .. } => GameType::Match,
            Self::FillBlank { .. } => GameType::FillBlank,
        }
    }

    /// Grade a submission. A submission of the wrong shape is simply incorrect.
    pub fn accepts(&self, answer: &Answer) -> bool {
        match (self, answer) {
            (Self::Choice { correct, .. }, Answer::Choice(picked)) => picked == correct,
            (Self::Match { pairs, .. }, Answer::Pairs(submitted)) => {
                let mut expected = pairs.clone();
                let mut given = submitted.clone();
                expected.sort_unstable();
                given.sort_unstable();
                given.dedup();
                expected == given
            }
            (Self::FillBlank { accepted }, Answer::Text(text)) => {
                let text = normalize_text(text);
                !text.is_empty() && accepted.iter().any(|a| normalize_text(a) == text)
            }
            _ => false,
        }
    }
}

/// Trim, collapse inner whitespace and lowercase.
fn normalize_text(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
