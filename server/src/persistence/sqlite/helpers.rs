//! Encode/decode helpers between domain values and SQLite columns.

use std::collections::BTreeSet;

use quiz::LevelId;

use crate::persistence::PersistenceError;

/// Completed-level sets are stored as a sorted JSON array in a `TEXT` column.
pub fn encode_level_set(levels: &BTreeSet<LevelId>) -> Result<String, PersistenceError> {
    Ok(serde_json::to_string(levels)?)
}

pub fn decode_level_set(text: &str) -> Result<BTreeSet<LevelId>, PersistenceError> {
    Ok(serde_json::from_str(text)?)
}

/// SQLite integers are `i64`; scores and revisions never approach the limit.
pub fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

pub fn from_i64(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}
