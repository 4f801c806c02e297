use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use quiz::LevelId;

type Key = (String, LevelId);

/// One async mutex per (user, level), created on demand.
///
/// Entries nobody holds are pruned on the next lookup.
#[derive(Default)]
pub(crate) struct KeyedLocks {
    inner: Mutex<HashMap<Key, Arc<tokio::sync::Mutex<()>>>>,
}

impl KeyedLocks {
    pub fn lock_for(&self, user_id: &str, level_id: LevelId) -> Arc<tokio::sync::Mutex<()>> {
        let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        map.retain(|_, lock| Arc::strong_count(lock) > 1);
        map.entry((user_id.to_string(), level_id))
            .or_default()
            .clone()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}
