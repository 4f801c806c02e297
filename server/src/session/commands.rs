use quiz::{Answer, QuizError, SessionRecord, UserProgress};
use tokio::sync::{broadcast, oneshot};

use super::events::SessionEvent;
use super::snapshot::SessionSnapshot;

#[derive(Debug, Clone, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Quiz(#[from] QuizError),
    #[error("Session not found: {0}")]
    SessionNotFound(String),
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Clone)]
pub struct SubmitOutcome {
    pub snapshot: SessionSnapshot,
    pub correct: bool,
}

/// Result of a completed, saved session.
#[derive(Debug, Clone)]
pub struct FinishOutcome {
    pub snapshot: SessionSnapshot,
    pub record: SessionRecord,
    pub progress: UserProgress,
}

/// Commands sent to the session actor. Each embeds a oneshot for the reply.
/// Expiry is not a command; the actor schedules it itself.
pub enum SessionCommand {
    SubmitAnswer {
        index: usize,
        answer: Answer,
        reply: oneshot::Sender<Result<SubmitOutcome, SessionError>>,
    },
    Finish {
        reply: oneshot::Sender<Result<FinishOutcome, SessionError>>,
    },
    Abandon {
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    GetSnapshot {
        reply: oneshot::Sender<SessionSnapshot>,
    },
    Subscribe {
        reply: oneshot::Sender<(SessionSnapshot, broadcast::Receiver<SessionEvent>)>,
    },
    Shutdown,
}
