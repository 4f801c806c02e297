//! What the level-select screen needs: per-level lock state and best
//! score, per-tier summaries, and the overall totals.

use std::collections::BTreeMap;

use quiz::{is_tier_unlocked, Catalog, Difficulty, LevelId, UserProgress};

use super::ProgressService;
use crate::persistence::{PersistenceError, ProgressStore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelState {
    pub level_id: LevelId,
    pub unlocked: bool,
    pub completed: bool,
    /// Best completed score on record, `None` if never completed.
    pub best_score: Option<u32>,
    pub max_score: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierSummary {
    pub difficulty: Difficulty,
    pub completed: usize,
    pub total: usize,
    pub unlocked: bool,
    pub requires: Option<Difficulty>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnlockState {
    pub user_id: String,
    pub levels: Vec<LevelState>,
    pub tiers: Vec<TierSummary>,
    pub total_score: u32,
    pub max_score: u32,
    pub completed_count: usize,
    pub level_count: usize,
}

impl UnlockState {
    pub fn build(
        catalog: &Catalog,
        user_id: &str,
        progress: &UserProgress,
        bests: &BTreeMap<LevelId, u32>,
    ) -> Self {
        let completed = &progress.completed_levels;

        let levels = catalog
            .all_levels()
            .iter()
            .map(|level| LevelState {
                level_id: level.id,
                unlocked: is_tier_unlocked(catalog, level.difficulty, completed),
                completed: completed.contains(&level.id),
                best_score: bests.get(&level.id).copied(),
                max_score: level.max_score(),
            })
            .collect::<Vec<_>>();

        let tiers = Difficulty::ALL
            .into_iter()
            .map(|tier| {
                let in_tier: Vec<LevelId> = catalog.levels_by_difficulty(tier).map(|l| l.id).collect();
                TierSummary {
                    difficulty: tier,
                    completed: in_tier.iter().filter(|id| completed.contains(id)).count(),
                    total: in_tier.len(),
                    unlocked: is_tier_unlocked(catalog, tier, completed),
                    requires: tier.prerequisite(),
                }
            })
            .collect();

        Self {
            user_id: user_id.to_string(),
            completed_count: levels.iter().filter(|l| l.completed).count(),
            level_count: levels.len(),
            levels,
            tiers,
            total_score: progress.total_score,
            max_score: catalog.max_score(),
        }
    }

    pub fn get(&self, level_id: LevelId) -> Option<&LevelState> {
        self.levels.iter().find(|l| l.level_id == level_id)
    }
}

impl<S: ProgressStore> ProgressService<S> {
    /// Stored progress, or the empty default for a user with none.
    pub async fn load_progress(&self, user_id: &str) -> Result<UserProgress, PersistenceError> {
        Ok(self
            .store
            .get_progress(user_id)
            .await?
            .map(|stored| stored.progress)
            .unwrap_or_default())
    }

    /// Best scores come straight from the session log on every call.
    pub async fn unlock_state(&self, user_id: &str) -> Result<UnlockState, PersistenceError> {
        let progress = self.load_progress(user_id).await?;
        let mut bests = BTreeMap::new();
        for level in self.catalog.all_levels() {
            let sessions = self.store.list_sessions(user_id, level.id).await?;
            if let Some(best) = quiz::best_score(&sessions) {
                bests.insert(level.id, best);
            }
        }
        Ok(UnlockState::build(&self.catalog, user_id, &progress, &bests))
    }
}
