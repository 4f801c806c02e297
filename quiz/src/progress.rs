//! Progress records and their derivation from the session log.
//!
//! The session log is the source of truth. A [`UserProgress`] is a cache of
//! what [`derive_progress`] would compute from it: the set of completed
//! levels and the sum of their best scores.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::types::LevelId;

/// Per-user aggregate. `total_score` is the sum of per-level best scores
/// over `completed_levels`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProgress {
    pub completed_levels: BTreeSet<LevelId>,
    pub total_score: u32,
}

/// One finished attempt. Append-only; identified by `session_id` so that
/// recording it twice is harmless.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: String,
    pub user_id: String,
    pub level_id: LevelId,
    pub score: u32,
    pub completed: bool,
    /// Unix timestamp, seconds.
    pub created_at: u64,
}

impl UserProgress {
    /// Progress after `level_id` completes, with the total recomputed from
    /// `bests` rather than adjusted by delta.
    pub fn with_completion(&self, level_id: LevelId, bests: &BTreeMap<LevelId, u32>) -> Self {
        let mut completed_levels = self.completed_levels.clone();
        completed_levels.insert(level_id);
        let total_score = total_for(&completed_levels, bests);
        Self {
            completed_levels,
            total_score,
        }
    }

    pub fn is_completed(&self, level_id: LevelId) -> bool {
        self.completed_levels.contains(&level_id)
    }
}

/// Best score among completed sessions, or `None` if there are none.
pub fn best_score<'a>(sessions: impl IntoIterator<Item = &'a SessionRecord>) -> Option<u32> {
    sessions
        .into_iter()
        .filter(|s| s.completed)
        .map(|s| s.score)
        .max()
}

/// Best score per level among completed sessions.
pub fn best_scores<'a>(
    sessions: impl IntoIterator<Item = &'a SessionRecord>,
) -> BTreeMap<LevelId, u32> {
    let mut bests = BTreeMap::new();
    for session in sessions.into_iter().filter(|s| s.completed) {
        let best = bests.entry(session.level_id).or_insert(session.score);
        if session.score > *best {
            *best = session.score;
        }
    }
    bests
}

/// Sum of `bests` over `completed`. Levels without a recorded best add zero.
pub fn total_for(completed: &BTreeSet<LevelId>, bests: &BTreeMap<LevelId, u32>) -> u32 {
    completed
        .iter()
        .filter_map(|id| bests.get(id))
        .sum()
}

/// Rebuild progress from scratch out of a session log.
pub fn derive_progress<'a>(sessions: impl IntoIterator<Item = &'a SessionRecord>) -> UserProgress {
    let bests = best_scores(sessions);
    let completed_levels: BTreeSet<LevelId> = bests.keys().copied().collect();
    let total_score = total_for(&completed_levels, &bests);
    UserProgress {
        completed_levels,
        total_score,
    }
}
