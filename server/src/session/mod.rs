pub mod actor;
pub mod commands;
pub mod events;
pub mod handle;
pub mod snapshot;
pub mod state;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use quiz::{is_level_unlocked, Answer, Catalog, LevelId, QuizError};
use tokio::sync::{broadcast, mpsc, RwLock};
use uuid::Uuid;

use crate::persistence::ProgressStore;
use crate::progress::{ProgressService, RetryJob};
use actor::{run_session_actor, ActorContext};
pub use commands::{FinishOutcome, SessionError, SubmitOutcome};
pub use events::{CompletionEvent, SessionEvent};
pub use handle::SessionHandle;
pub use snapshot::SessionSnapshot;
use state::SessionState;

/// Manages all live sessions. Spawns an actor task per session.
pub struct SessionManager<S> {
    sessions: RwLock<HashMap<String, SessionHandle>>,
    progress: Arc<ProgressService<S>>,
    retry_tx: mpsc::Sender<RetryJob>,
    linger: Duration,
}

impl<S: ProgressStore> SessionManager<S> {
    pub fn new(
        progress: Arc<ProgressService<S>>,
        retry_tx: mpsc::Sender<RetryJob>,
        linger: Duration,
    ) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            progress,
            retry_tx,
            linger,
        }
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        self.progress.catalog()
    }

    pub fn progress(&self) -> &Arc<ProgressService<S>> {
        &self.progress
    }

    /// Start a timed attempt. Nothing is written to the store until the
    /// attempt completes.
    pub async fn start_session(
        &self,
        user_id: &str,
        level_id: LevelId,
    ) -> Result<SessionSnapshot, SessionError> {
        let catalog = self.catalog();
        let level = catalog
            .level(level_id)
            .cloned()
            .ok_or(QuizError::LevelNotFound(level_id))?;

        let progress = self
            .progress
            .load_progress(user_id)
            .await
            .map_err(|e| SessionError::StoreUnavailable(e.to_string()))?;
        if !is_level_unlocked(catalog, level_id, &progress.completed_levels)? {
            return Err(QuizError::LevelLocked {
                level: level_id,
                requires: level.difficulty.prerequisite().unwrap_or(level.difficulty),
            }
            .into());
        }

        let session_id = Uuid::new_v4().to_string();
        let state = SessionState::start(session_id.clone(), user_id.to_string(), level)?;
        let snapshot = state.snapshot();

        let (cmd_tx, cmd_rx) = mpsc::channel(32);
        let (event_tx, _) = broadcast::channel(64);
        let ctx = ActorContext {
            progress: self.progress.clone(),
            retry_tx: self.retry_tx.clone(),
            event_tx,
            linger: self.linger,
        };
        tokio::spawn(run_session_actor(state, cmd_rx, ctx));

        let handle = SessionHandle::new(session_id.clone(), cmd_tx);
        {
            let mut sessions = self.sessions.write().await;
            // Actors that lingered out are only noticed here or on lookup.
            sessions.retain(|_, h| !h.is_closed());
            sessions.insert(session_id, handle);
        }

        tracing::info!(session_id = %snapshot.session_id, user_id, level_id, "Session started");
        Ok(snapshot)
    }

    pub async fn get_handle(&self, session_id: &str) -> Result<SessionHandle, SessionError> {
        let handle = self.sessions.read().await.get(session_id).cloned();
        match handle {
            Some(handle) if !handle.is_closed() => Ok(handle),
            Some(_) => {
                self.sessions.write().await.remove(session_id);
                Err(SessionError::SessionNotFound(session_id.to_string()))
            }
            None => Err(SessionError::SessionNotFound(session_id.to_string())),
        }
    }

    pub async fn submit_answer(
        &self,
        session_id: &str,
        index: usize,
        answer: Answer,
    ) -> Result<SubmitOutcome, SessionError> {
        self.get_handle(session_id)
            .await?
            .submit_answer(index, answer)
            .await
    }

    pub async fn finish_session(&self, session_id: &str) -> Result<FinishOutcome, SessionError> {
        self.get_handle(session_id).await?.finish().await
    }

    /// Leave a session. A running attempt is discarded without a trace; a
    /// completed one is simply closed.
    pub async fn abandon_session(&self, session_id: &str) -> Result<(), SessionError> {
        let handle = self.get_handle(session_id).await?;
        let result = handle.abandon().await;
        self.sessions.write().await.remove(session_id);
        result
    }

    pub async fn get_session(&self, session_id: &str) -> Result<SessionSnapshot, SessionError> {
        self.get_handle(session_id).await?.get_snapshot().await
    }

    /// Stop every actor without touching its attempt. Used on shutdown;
    /// returns how many were still live.
    pub async fn close_all(&self) -> usize {
        let handles: Vec<SessionHandle> = self
            .sessions
            .write()
            .await
            .drain()
            .map(|(_, handle)| handle)
            .collect();
        let mut closed = 0;
        for handle in handles.iter().filter(|h| !h.is_closed()) {
            handle.shutdown().await;
            closed += 1;
        }
        closed
    }

    /// Entries in the session map, closed or not.
    #[cfg(test)]
    pub(crate) async fn tracked_sessions(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::testing::{FaultyStore, MemoryStore};
    use crate::progress::{run_retry_worker, RetryPolicy};
    use crate::test_support::sample_catalog;
    use quiz::{AttemptPhase, CompletionReason, Difficulty};
    use std::collections::BTreeSet;
    use std::sync::atomic::Ordering;

    const LINGER: Duration = Duration::from_secs(600);

    type Store = FaultyStore<MemoryStore>;

    struct Harness {
        manager: Arc<SessionManager<Store>>,
        store: Arc<Store>,
        retry_rx: mpsc::Receiver<RetryJob>,
    }

    fn harness() -> Harness {
        let store = Arc::new(FaultyStore::new(MemoryStore::default()));
        let progress = Arc::new(ProgressService::new(sample_catalog(), store.clone()));
        let (retry_tx, retry_rx) = mpsc::channel(8);
        Harness {
            manager: Arc::new(SessionManager::new(progress, retry_tx, LINGER)),
            store,
            retry_rx,
        }
    }

    /// Complete level 1 with full marks so medium opens.
    async fn clear_easy(manager: &SessionManager<Store>, user: &str) {
        let snap = manager.start_session(user, 1).await.unwrap();
        manager.submit_answer(&snap.session_id, 0, Answer::Choice(0)).await.unwrap();
        manager.submit_answer(&snap.session_id, 1, Answer::Choice(1)).await.unwrap();
        manager.finish_session(&snap.session_id).await.unwrap();
    }

    #[tokio::test]
    async fn unknown_level_is_not_found() {
        let h = harness();
        let err = h.manager.start_session("u", 42).await.unwrap_err();
        assert!(matches!(err, SessionError::Quiz(QuizError::LevelNotFound(42))));
    }

    #[tokio::test]
    async fn locked_level_cannot_start() {
        let h = harness();
        let err = h.manager.start_session("u", 2).await.unwrap_err();
        assert!(matches!(
            err,
            SessionError::Quiz(QuizError::LevelLocked {
                level: 2,
                requires: Difficulty::Easy
            })
        ));
        assert_eq!(h.manager.tracked_sessions().await, 0);
    }

    #[tokio::test]
    async fn start_gate_agrees_with_the_unlock_rule() {
        let h = harness();
        clear_easy(&h.manager, "u").await;
        let completed = h.manager.progress().load_progress("u").await.unwrap().completed_levels;

        let catalog = h.manager.catalog().clone();
        for level in catalog.all_levels() {
            let open = is_level_unlocked(&catalog, level.id, &completed).unwrap();
            let started = h.manager.start_session("u", level.id).await;
            assert_eq!(started.is_ok(), open, "level {}", level.id);
            if !open {
                assert!(matches!(
                    started,
                    Err(SessionError::Quiz(QuizError::LevelLocked {
                        requires: Difficulty::Medium,
                        ..
                    }))
                ));
            }
        }
    }

    #[tokio::test]
    async fn start_does_not_touch_the_store() {
        let h = harness();
        let snap = h.manager.start_session("u", 1).await.unwrap();
        assert_eq!(snap.phase, AttemptPhase::Running);
        assert_eq!(snap.score, 0);
        assert_eq!(snap.max_score, 20);
        assert_eq!(snap.grades, vec![None, None]);
        assert_eq!(h.store.inner().session_count(), 0);
    }

    #[tokio::test]
    async fn store_outage_blocks_start() {
        let h = harness();
        h.store.fail_reads.store(true, Ordering::SeqCst);
        let err = h.manager.start_session("u", 1).await.unwrap_err();
        assert!(matches!(err, SessionError::StoreUnavailable(_)));
    }

    #[tokio::test]
    async fn perfect_easy_run_unlocks_medium() {
        let h = harness();
        let snap = h.manager.start_session("u", 1).await.unwrap();
        let id = snap.session_id;

        let first = h.manager.submit_answer(&id, 0, Answer::Choice(0)).await.unwrap();
        assert!(first.correct);
        assert_eq!(first.snapshot.score, 10);
        h.manager.submit_answer(&id, 1, Answer::Choice(1)).await.unwrap();

        let outcome = h.manager.finish_session(&id).await.unwrap();
        assert_eq!(outcome.record.score, 20);
        assert!(outcome.record.completed);
        assert_eq!(outcome.progress.completed_levels, BTreeSet::from([1]));
        assert_eq!(outcome.progress.total_score, 20);
        assert_eq!(
            outcome.snapshot.phase,
            AttemptPhase::Completed(CompletionReason::Finished)
        );
        assert!(outcome.snapshot.persisted);

        // Medium is now open.
        assert!(h.manager.start_session("u", 2).await.is_ok());
    }

    #[tokio::test]
    async fn resubmission_overwrites_the_grade() {
        let h = harness();
        let id = h.manager.start_session("u", 1).await.unwrap().session_id;
        h.manager.submit_answer(&id, 0, Answer::Choice(0)).await.unwrap();
        let again = h.manager.submit_answer(&id, 0, Answer::Choice(2)).await.unwrap();
        assert!(!again.correct);
        assert_eq!(again.snapshot.score, 0);
        assert_eq!(again.snapshot.grades, vec![Some(false), None]);
    }

    #[tokio::test]
    async fn bad_index_and_wrong_shape() {
        let h = harness();
        let id = h.manager.start_session("u", 1).await.unwrap().session_id;
        let err = h
            .manager
            .submit_answer(&id, 5, Answer::Choice(0))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SessionError::Quiz(QuizError::OutOfRange { index: 5, count: 2 })
        ));

        let wrong = h
            .manager
            .submit_answer(&id, 0, Answer::Text("a".into()))
            .await
            .unwrap();
        assert!(!wrong.correct);
    }

    #[tokio::test]
    async fn finish_requires_every_answer() {
        let h = harness();
        let id = h.manager.start_session("u", 1).await.unwrap().session_id;
        h.manager.submit_answer(&id, 0, Answer::Choice(0)).await.unwrap();
        let err = h.manager.finish_session(&id).await.unwrap_err();
        assert!(matches!(
            err,
            SessionError::Quiz(QuizError::Unanswered { remaining: 1 })
        ));
        // Still running.
        assert_eq!(h.manager.get_session(&id).await.unwrap().phase, AttemptPhase::Running);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_completes_with_partial_score() {
        let h = harness();
        let id = h.manager.start_session("u", 1).await.unwrap().session_id;
        h.manager.submit_answer(&id, 0, Answer::Choice(0)).await.unwrap();

        tokio::time::sleep(Duration::from_secs(61)).await;

        let snap = h.manager.get_session(&id).await.unwrap();
        assert_eq!(snap.phase, AttemptPhase::Completed(CompletionReason::TimedOut));
        assert_eq!(snap.score, 10);
        assert_eq!(snap.remaining_ms, 0);
        assert!(snap.persisted);

        let progress = h.manager.progress().load_progress("u").await.unwrap();
        assert_eq!(progress.total_score, 10);
        assert_eq!(h.store.inner().session_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_with_no_answers_still_counts() {
        let h = harness();
        let id = h.manager.start_session("u", 1).await.unwrap().session_id;
        tokio::time::sleep(Duration::from_secs(60)).await;
        let snap = h.manager.get_session(&id).await.unwrap();
        assert_eq!(snap.phase, AttemptPhase::Completed(CompletionReason::TimedOut));
        assert_eq!(snap.score, 0);
        let progress = h.manager.progress().load_progress("u").await.unwrap();
        assert!(progress.completed_levels.contains(&1));
    }

    #[tokio::test(start_paused = true)]
    async fn late_answer_is_rejected() {
        let h = harness();
        let id = h.manager.start_session("u", 1).await.unwrap().session_id;
        tokio::time::sleep(Duration::from_secs(75)).await;
        let err = h
            .manager
            .submit_answer(&id, 0, Answer::Choice(0))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SessionError::Quiz(QuizError::NotRunning(AttemptPhase::Completed(
                CompletionReason::TimedOut
            )))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn timer_fires_exactly_once() {
        let h = harness();
        let handle = {
            let id = h.manager.start_session("u", 1).await.unwrap().session_id;
            h.manager.get_handle(&id).await.unwrap()
        };
        let (_, mut events) = handle.subscribe().await.unwrap();

        tokio::time::sleep(Duration::from_secs(120)).await;
        let mut completions = 0;
        while let Ok(event) = events.try_recv() {
            if matches!(event, SessionEvent::Completed(_)) {
                completions += 1;
            }
        }
        assert_eq!(completions, 1);
        assert_eq!(h.store.inner().session_count(), 1);
    }

    #[tokio::test]
    async fn abandon_leaves_no_trace() {
        let h = harness();
        let id = h.manager.start_session("u", 1).await.unwrap().session_id;
        h.manager.submit_answer(&id, 0, Answer::Choice(0)).await.unwrap();

        h.manager.abandon_session(&id).await.unwrap();

        assert_eq!(h.store.inner().session_count(), 0);
        assert!(h.store.inner().get_progress("u").await.unwrap().is_none());
        assert!(matches!(
            h.manager.get_session(&id).await,
            Err(SessionError::SessionNotFound(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn abandon_cancels_the_timer() {
        let h = harness();
        let id = h.manager.start_session("u", 1).await.unwrap().session_id;
        h.manager.abandon_session(&id).await.unwrap();
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(h.store.inner().session_count(), 0);
    }

    #[tokio::test]
    async fn completed_session_can_be_closed_but_not_refinished() {
        let h = harness();
        clear_easy(&h.manager, "u").await;

        let id = h.manager.start_session("u", 1).await.unwrap().session_id;
        h.manager.submit_answer(&id, 0, Answer::Choice(0)).await.unwrap();
        h.manager.submit_answer(&id, 1, Answer::Choice(0)).await.unwrap();
        h.manager.finish_session(&id).await.unwrap();

        let err = h.manager.finish_session(&id).await.unwrap_err();
        assert!(matches!(err, SessionError::Quiz(QuizError::NotRunning(_))));
        assert!(h.manager.submit_answer(&id, 0, Answer::Choice(0)).await.is_err());

        h.manager.abandon_session(&id).await.unwrap();
        // The lower score did not replace the earlier best.
        let progress = h.manager.progress().load_progress("u").await.unwrap();
        assert_eq!(progress.total_score, 20);
    }

    #[tokio::test]
    async fn two_tabs_on_the_same_level_are_both_recorded() {
        let h = harness();
        let a = h.manager.start_session("u", 1).await.unwrap().session_id;
        let b = h.manager.start_session("u", 1).await.unwrap().session_id;
        assert_ne!(a, b);

        for (id, second) in [(&a, 1), (&b, 0)] {
            h.manager.submit_answer(id, 0, Answer::Choice(0)).await.unwrap();
            h.manager.submit_answer(id, 1, Answer::Choice(second)).await.unwrap();
        }
        let (ra, rb) = tokio::join!(h.manager.finish_session(&a), h.manager.finish_session(&b));
        ra.unwrap();
        rb.unwrap();

        assert_eq!(h.store.inner().session_count(), 2);
        let progress = h.manager.progress().load_progress("u").await.unwrap();
        assert_eq!(progress.total_score, 20);
    }

    #[tokio::test]
    async fn failed_save_is_reported_and_queued() {
        let mut h = harness();
        let id = h.manager.start_session("u", 1).await.unwrap().session_id;
        h.manager.submit_answer(&id, 0, Answer::Choice(0)).await.unwrap();
        h.manager.submit_answer(&id, 1, Answer::Choice(1)).await.unwrap();

        h.store.fail_appends.store(true, Ordering::SeqCst);
        let err = h.manager.finish_session(&id).await.unwrap_err();
        assert!(matches!(err, SessionError::StoreUnavailable(_)));

        let snap = h.manager.get_session(&id).await.unwrap();
        assert_eq!(snap.phase, AttemptPhase::Completed(CompletionReason::Finished));
        assert!(!snap.persisted);

        let job = h.retry_rx.try_recv().unwrap();
        assert_eq!(job.record.session_id, id);
        assert_eq!(job.record.score, 20);

        // The caller retries once the store is back, with the same record.
        h.store.heal();
        let outcome = h.manager.finish_session(&id).await.unwrap();
        assert_eq!(outcome.record, job.record);
        assert!(outcome.snapshot.persisted);
        assert_eq!(h.store.inner().session_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn background_retry_saves_a_timed_out_session() {
        let Harness {
            manager,
            store,
            retry_rx,
        } = harness();
        let policy = RetryPolicy {
            max_retries: 5,
            base_backoff: Duration::from_millis(500),
        };
        tokio::spawn(run_retry_worker(manager.progress().clone(), retry_rx, policy));

        let id = manager.start_session("u", 1).await.unwrap().session_id;
        let handle = manager.get_handle(&id).await.unwrap();
        let (_, mut events) = handle.subscribe().await.unwrap();
        manager.submit_answer(&id, 0, Answer::Choice(0)).await.unwrap();

        store.fail_puts.store(true, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(61)).await;

        // Expiry happened while the store was down.
        let mut unsaved = false;
        while let Ok(event) = events.try_recv() {
            if let SessionEvent::Completed(c) = event {
                unsaved |= c.progress.is_none();
            }
        }
        assert!(unsaved);
        assert!(!manager.get_session(&id).await.unwrap().persisted);

        store.heal();
        let saved = loop {
            match events.recv().await.unwrap() {
                SessionEvent::Completed(c) if c.progress.is_some() => break c,
                _ => continue,
            }
        };
        assert_eq!(saved.progress.unwrap().total_score, 10);
        assert!(manager.get_session(&id).await.unwrap().persisted);
    }

    #[tokio::test(start_paused = true)]
    async fn finished_sessions_are_dropped_after_lingering() {
        let h = harness();
        let id = h.manager.start_session("u", 1).await.unwrap().session_id;
        h.manager.submit_answer(&id, 0, Answer::Choice(0)).await.unwrap();
        h.manager.submit_answer(&id, 1, Answer::Choice(1)).await.unwrap();
        h.manager.finish_session(&id).await.unwrap();

        tokio::time::sleep(LINGER + Duration::from_secs(1)).await;
        assert!(matches!(
            h.manager.get_session(&id).await,
            Err(SessionError::SessionNotFound(_))
        ));
        assert_eq!(h.manager.tracked_sessions().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn lingered_out_sessions_are_pruned_on_start() {
        let h = harness();
        for _ in 0..50 {
            h.manager.start_session("u", 1).await.unwrap();
        }
        assert_eq!(h.manager.tracked_sessions().await, 50);

        // Every attempt times out, saves and lingers out without being looked up.
        tokio::time::sleep(Duration::from_secs(60) + LINGER + Duration::from_secs(1)).await;
        assert_eq!(h.store.inner().session_count(), 50);

        h.manager.start_session("u", 1).await.unwrap();
        assert_eq!(h.manager.tracked_sessions().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_keep_the_session_until_the_player_saves_it() {
        let Harness {
            manager,
            store,
            retry_rx,
        } = harness();
        let policy = RetryPolicy {
            max_retries: 2,
            base_backoff: Duration::from_millis(100),
        };
        tokio::spawn(run_retry_worker(manager.progress().clone(), retry_rx, policy));

        let id = manager.start_session("u", 1).await.unwrap().session_id;
        let handle = manager.get_handle(&id).await.unwrap();
        let (_, mut events) = handle.subscribe().await.unwrap();
        manager.submit_answer(&id, 0, Answer::Choice(0)).await.unwrap();
        manager.submit_answer(&id, 1, Answer::Choice(1)).await.unwrap();

        store.fail_appends.store(true, Ordering::SeqCst);
        assert!(manager.finish_session(&id).await.is_err());

        // The retries run out well inside the linger window; the session
        // must outlive it anyway.
        tokio::time::sleep(LINGER + Duration::from_secs(60)).await;
        let mut gave_up = false;
        while let Ok(event) = events.try_recv() {
            if let SessionEvent::Error(message) = event {
                gave_up |= message.contains("Finish the session again");
            }
        }
        assert!(gave_up);
        let snap = manager.get_session(&id).await.unwrap();
        assert!(!snap.persisted);
        assert_eq!(store.inner().session_count(), 0);

        store.heal();
        let outcome = manager.finish_session(&id).await.unwrap();
        assert!(outcome.snapshot.persisted);
        assert_eq!(outcome.record.score, 20);
        assert_eq!(store.inner().session_count(), 1);
    }

    #[tokio::test]
    async fn close_all_stops_every_actor() {
        let h = harness();
        let a = h.manager.start_session("u", 1).await.unwrap().session_id;
        let b = h.manager.start_session("v", 1).await.unwrap().session_id;
        let handle = h.manager.get_handle(&a).await.unwrap();

        assert_eq!(h.manager.close_all().await, 2);
        assert!(handle.get_snapshot().await.is_err());
        assert!(matches!(
            h.manager.get_session(&b).await,
            Err(SessionError::SessionNotFound(_))
        ));
        assert_eq!(h.manager.tracked_sessions().await, 0);
        // Nothing was recorded for the cut-off attempts.
        assert_eq!(h.store.inner().session_count(), 0);
    }
}
