use std::sync::Arc;
use std::time::Duration;

use quiz::{Answer, Attempt, AttemptPhase, Level, LevelId, QuizError, SessionRecord, UserProgress};
use tokio::sync::oneshot;
use tokio::time::Instant;

use super::snapshot::SessionSnapshot;
use crate::persistence::now_timestamp;
use crate::progress::RetryOutcome;

/// Everything one session actor owns.
pub(crate) struct SessionState {
    pub session_id: String,
    pub user_id: String,
    pub attempt: Attempt,
    pub deadline: Instant,
    pub completed_at: Option<Instant>,
    /// Built once, on completion; reused verbatim by every save attempt.
    pub record: Option<SessionRecord>,
    pub progress: Option<UserProgress>,
    pub persisted: bool,
    pending_save: Option<oneshot::Receiver<RetryOutcome>>,
}

impl SessionState {
    /// A running attempt whose clock starts now.
    pub fn start(session_id: String, user_id: String, level: Arc<Level>) -> Result<Self, QuizError> {
        let mut attempt = Attempt::new(level);
        attempt.start()?;
        let deadline = Instant::now() + attempt.time_limit();
        Ok(Self {
            session_id,
            user_id,
            attempt,
            deadline,
            completed_at: None,
            record: None,
            progress: None,
            persisted: false,
            pending_save: None,
        })
    }

    pub fn level_id(&self) -> LevelId {
        self.attempt.level().id
    }

    pub fn phase(&self) -> AttemptPhase {
        self.attempt.phase()
    }

    pub fn is_running(&self) -> bool {
        self.phase() == AttemptPhase::Running
    }

    pub fn is_terminal(&self) -> bool {
        self.phase().is_terminal()
    }

    /// Expiry is inclusive of the deadline itself.
    pub fn deadline_passed(&self) -> bool {
        Instant::now() >= self.deadline
    }

    pub fn remaining(&self) -> Duration {
        if self.is_running() {
            self.deadline.saturating_duration_since(Instant::now())
        } else {
            Duration::ZERO
        }
    }

    /// When a finished session may be dropped from memory.
    pub fn linger_until(&self, linger: Duration) -> Instant {
        self.completed_at.unwrap_or(self.deadline) + linger
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.session_id.clone(),
            user_id: self.user_id.clone(),
            level_id: self.level_id(),
            phase: self.phase(),
            score: self.attempt.score(),
            max_score: self.attempt.level().max_score(),
            grades: self.attempt.grades().to_vec(),
            remaining_ms: self.remaining().as_millis() as u64,
            persisted: self.persisted,
        }
    }

    pub fn submit(&mut self, index: usize, answer: &Answer) -> Result<bool, QuizError> {
        self.attempt.submit(index, answer)
    }

    /// Player-driven completion. Fails while questions remain ungraded.
    pub fn finish(&mut self) -> Result<SessionRecord, QuizError> {
        self.attempt.finish()?;
        Ok(self.seal())
    }

    /// Time-driven completion, keeping whatever was graded.
    pub fn expire(&mut self) -> Result<SessionRecord, QuizError> {
        self.attempt.expire()?;
        Ok(self.seal())
    }

    pub fn abandon(&mut self) -> Result<(), QuizError> {
        self.attempt.abandon()
    }

    fn seal(&mut self) -> SessionRecord {
        self.completed_at = Some(Instant::now());
        let record = SessionRecord {
            session_id: self.session_id.clone(),
            user_id: self.user_id.clone(),
            level_id: self.level_id(),
            score: self.attempt.score(),
            completed: true,
            created_at: now_timestamp(),
        };
        self.record = Some(record.clone());
        record
    }

    pub fn mark_saved(&mut self, progress: UserProgress) {
        self.persisted = true;
        self.progress = Some(progress);
        self.pending_save = None;
    }

    pub fn has_pending_save(&self) -> bool {
        self.pending_save.is_some()
    }

    pub fn await_retry(&mut self, rx: oneshot::Receiver<RetryOutcome>) {
        self.pending_save = Some(rx);
    }

    /// Resolves when the retry worker is done with this session, with the
    /// saved progress or the reason it gave up. Never resolves when nothing
    /// is pending.
    pub async fn next_retry_outcome(&mut self) -> Result<UserProgress, String> {
        match self.pending_save.as_mut() {
            Some(rx) => {
                let outcome = match rx.await {
                    Ok(Ok(progress)) => Ok(progress),
                    Ok(Err(e)) => Err(e.to_string()),
                    Err(_) => Err("retry worker stopped".to_string()),
                };
                self.pending_save = None;
                outcome
            }
            None => std::future::pending().await,
        }
    }

    /// A finished session may leave memory only once its result is saved.
    /// Sessions that ended without a record have nothing to lose.
    pub fn may_close(&self) -> bool {
        self.record.is_none() || self.persisted
    }
}
