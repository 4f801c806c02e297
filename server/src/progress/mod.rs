//! Score reconciliation, the unlock view, and the retry worker for
//! completions that could not be saved.

mod locks;
mod reconciler;
mod retry;
mod view;

use std::sync::Arc;

use quiz::Catalog;

use locks::KeyedLocks;
pub use reconciler::ReconcileError;
pub use retry::{run_retry_worker, RetryJob, RetryOutcome, RetryPolicy};
pub use view::{LevelState, TierSummary, UnlockState};

/// Reads and writes user progress against a [`ProgressStore`].
///
/// [`ProgressStore`]: crate::persistence::ProgressStore
pub struct ProgressService<S> {
    catalog: Arc<Catalog>,
    store: Arc<S>,
    locks: KeyedLocks,
}

impl<S> ProgressService<S> {
    pub fn new(catalog: Arc<Catalog>, store: Arc<S>) -> Self {
        Self {
            catalog,
            store,
            locks: KeyedLocks::default(),
        }
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }
}
