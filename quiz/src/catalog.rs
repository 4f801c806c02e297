//! The level catalog: every level the arena offers, in display order.
//!
//! A catalog is validated once when it is built. Anything malformed is a
//! [`CatalogError`], which callers treat as fatal at startup; after that the
//! catalog is read-only and can be shared freely behind an `Arc`.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::level::{AnswerKey, Level};
use crate::types::{Difficulty, LevelId};

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Catalog parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Duplicate level id {0}")]
    DuplicateLevel(LevelId),
    #[error("Level {0} has no questions")]
    EmptyLevel(LevelId),
    #[error("Level {0} awards zero points per question")]
    ZeroPoints(LevelId),
    #[error("Level {0} has a zero time limit")]
    ZeroTimeLimit(LevelId),
    #[error("Level {0} pushes the maximum score past {max}", max = u32::MAX)]
    ScoreOverflow(LevelId),
    #[error("Level {level} question {index}: answer data does not fit game type {expected}")]
    AnswerShape {
        level: LevelId,
        index: usize,
        expected: crate::types::GameType,
    },
    #[error("Level {level} question {index}: {reason}")]
    InvalidAnswerKey {
        level: LevelId,
        index: usize,
        reason: String,
    },
}

/// On-disk shape of a catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CatalogFile {
    version: u32,
    levels: Vec<Level>,
}

/// Immutable, validated set of levels.
#[derive(Debug, Clone)]
pub struct Catalog {
    version: u32,
    levels: Vec<Arc<Level>>,
    by_id: HashMap<LevelId, usize>,
}

impl Catalog {
    /// Build a catalog, validating every level and question.
    pub fn new(version: u32, levels: Vec<Level>) -> Result<Self, CatalogError> {
        let mut by_id = HashMap::with_capacity(levels.len());
        let mut total: u32 = 0;
        for (pos, level) in levels.iter().enumerate() {
            validate_level(level)?;
            if by_id.insert(level.id, pos).is_some() {
                return Err(CatalogError::DuplicateLevel(level.id));
            }
            total = level
                .checked_max_score()
                .and_then(|score| total.checked_add(score))
                .ok_or(CatalogError::ScoreOverflow(level.id))?;
        }
        Ok(Self {
            version,
            levels: levels.into_iter().map(Arc::new).collect(),
            by_id,
        })
    }

    /// Parse and validate a JSON catalog document.
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = serde_json::from_str(json)?;
        Self::new(file.version, file.levels)
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    /// Every level in catalog order.
    pub fn all_levels(&self) -> &[Arc<Level>] {
        &self.levels
    }

    /// Levels of one tier, preserving catalog order.
    pub fn levels_by_difficulty(&self, tier: Difficulty) -> impl Iterator<Item = &Arc<Level>> {
        self.levels.iter().filter(move |l| l.difficulty == tier)
    }

    pub fn level(&self, id: LevelId) -> Option<&Arc<Level>> {
        self.by_id.get(&id).map(|&pos| &self.levels[pos])
    }

    pub fn contains(&self, id: LevelId) -> bool {
        self.by_id.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Sum of every level's max score. Fits in a `u32` for any catalog that
    /// passed [`Catalog::new`].
    pub fn max_score(&self) -> u32 {
        self.levels
            .iter()
            .fold(0u32, |acc, l| acc.saturating_add(l.max_score()))
    }
}

fn validate_level(level: &Level) -> Result<(), CatalogError> {
    if level.questions.is_empty() {
        return Err(CatalogError::EmptyLevel(level.id));
    }
    if level.points_per_question == 0 {
        return Err(CatalogError::ZeroPoints(level.id));
    }
    if level.time_limit_secs == 0 {
        return Err(CatalogError::ZeroTimeLimit(level.id));
    }

    for (index, question) in level.questions.iter().enumerate() {
        if question.answer.game_type() != level.game_type {
            return Err(CatalogError::AnswerShape {
                level: level.id,
                index,
                expected: level.game_type,
            });
        }
        let invalid = |reason: &str| CatalogError::InvalidAnswerKey {
            level: level.id,
            index,
            reason: reason.to_string(),
        };
        match &question.answer {
            AnswerKey::Choice { options, correct } => {
                if *correct >= options.len() {
                    return Err(invalid("correct option is out of range"));
                }
            }
            AnswerKey::Match { left, right, pairs } => {
                if left.is_empty() || left.len() != right.len() || pairs.len() != left.len() {
                    return Err(invalid("match sides and pairs must have equal, non-zero length"));
                }
                let lefts: HashSet<usize> = pairs.iter().map(|p| p.0).collect();
                let rights: HashSet<usize> = pairs.iter().map(|p| p.1).collect();
                let in_range = pairs.iter().all(|&(l, r)| l < left.len() && r < right.len());
                if !in_range || lefts.len() != left.len() || rights.len() != right.len() {
                    return Err(invalid("match pairs must be a one-to-one pairing"));
                }
            }
            AnswerKey::FillBlank { accepted } => {
                if accepted.iter().all(|a| a.trim().is_empty()) {
                    return Err(invalid("no accepted answers"));
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::level::Question;
    use crate::types::GameType;

    pub fn choice_level(id: LevelId, difficulty: Difficulty, questions: usize) -> Level {
        Level {
            id,
            title: format!("Level {id}"),
            description: String::new(),
            difficulty,
            game_type: GameType::Quiz,
            points_per_question: 10,
            time_limit_secs: 60,
            questions: (0..questions)
                .map(|i| Question {
                    prompt: format!("Question {i}"),
                    answer: AnswerKey::Choice {
                        options: vec!["a".into(), "b".into(), "c".into()],
                        correct: i % 3,
                    },
                })
                .collect(),
        }
    }

    /// Two easy, two medium, one hard level.
    pub fn sample_catalog() -> Catalog {
        Catalog::new(
            1,
            vec![
                choice_level(1, Difficulty::Easy, 2),
                choice_level(2, Difficulty::Easy, 3),
                choice_level(3, Difficulty::Medium, 2),
                choice_level(5, Difficulty::Medium, 2),
                choice_level(8, Difficulty::Hard, 4),
            ],
        )
        .unwrap()
    }
}
