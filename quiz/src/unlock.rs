//! Tier gate: easy is always open, each later tier opens once every level
//! of the tier before it is complete. There is no per-level ordering inside
//! a tier.

use std::collections::BTreeSet;

use crate::catalog::Catalog;
use crate::error::QuizError;
use crate::types::{Difficulty, LevelId};

/// True iff every level of `tier` is in `completed`. Vacuously true when the
/// catalog has no levels of that tier.
pub fn is_difficulty_complete(
    catalog: &Catalog,
    tier: Difficulty,
    completed: &BTreeSet<LevelId>,
) -> bool {
    catalog
        .levels_by_difficulty(tier)
        .all(|level| completed.contains(&level.id))
}

/// Whether levels of `tier` are currently playable.
pub fn is_tier_unlocked(catalog: &Catalog, tier: Difficulty, completed: &BTreeSet<LevelId>) -> bool {
    match tier.prerequisite() {
        None => true,
        Some(required) => is_difficulty_complete(catalog, required, completed),
    }
}

pub fn is_level_unlocked(
    catalog: &Catalog,
    level_id: LevelId,
    completed: &BTreeSet<LevelId>,
) -> Result<bool, QuizError> {
    let level = catalog
        .level(level_id)
        .ok_or(QuizError::LevelNotFound(level_id))?;
    Ok(is_tier_unlocked(catalog, level.difficulty, completed))
}

/// Ids of every playable level, in catalog order.
pub fn unlocked_levels(catalog: &Catalog, completed: &BTreeSet<LevelId>) -> Vec<LevelId> {
    let open: Vec<Difficulty> = Difficulty::ALL
        .into_iter()
        .filter(|&tier| is_tier_unlocked(catalog, tier, completed))
        .collect();
    catalog
        .all_levels()
        .iter()
        .filter(|level| open.contains(&level.difficulty))
        .map(|level| level.id)
        .collect()
}
