use std::sync::Arc;
use std::time::Duration;

use quiz::{AttemptPhase, SessionRecord};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time;
use tracing::Instrument;

use super::commands::{FinishOutcome, SessionCommand, SessionError, SubmitOutcome};
use super::events::{CompletionEvent, SessionEvent};
use super::state::SessionState;
use crate::persistence::ProgressStore;
use crate::progress::{ProgressService, RetryJob};

/// What an actor needs besides its own state.
pub(crate) struct ActorContext<S> {
    pub progress: Arc<ProgressService<S>>,
    pub retry_tx: mpsc::Sender<RetryJob>,
    pub event_tx: broadcast::Sender<SessionEvent>,
    /// How long a finished session stays queryable.
    pub linger: Duration,
}

enum Flow {
    Continue,
    Exit,
}

/// The main session actor loop.
/// Owns all mutable state. Processes commands, the expiry timer and
/// retry results sequentially.
pub(crate) async fn run_session_actor<S: ProgressStore>(
    state: SessionState,
    cmd_rx: mpsc::Receiver<SessionCommand>,
    ctx: ActorContext<S>,
) {
    let span = tracing::info_span!(
        "session",
        id = %state.session_id,
        user = %state.user_id,
        level = state.level_id()
    );
    run_session_actor_inner(state, cmd_rx, ctx).instrument(span).await;
}

async fn run_session_actor_inner<S: ProgressStore>(
    mut state: SessionState,
    mut cmd_rx: mpsc::Receiver<SessionCommand>,
    ctx: ActorContext<S>,
) {
    tracing::info!(limit_secs = state.attempt.time_limit().as_secs(), "Session actor started");

    loop {
        let deadline = state.deadline;
        let running = state.is_running();
        let linger_until = state.linger_until(ctx.linger);
        let closable = state.is_terminal() && state.may_close();

        tokio::select! {
            biased;

            _ = time::sleep_until(deadline), if running => {
                expire(&mut state, &ctx).await;
            }

            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(SessionCommand::Shutdown) | None => {
                        tracing::info!("Session actor shutting down");
                        break;
                    }
                    Some(cmd) => {
                        if let Flow::Exit = handle_command(&mut state, cmd, &ctx).await {
                            break;
                        }
                    }
                }
            }

            outcome = state.next_retry_outcome() => match outcome {
                Ok(saved) => {
                    tracing::info!(total_score = saved.total_score, "Background save succeeded");
                    state.mark_saved(saved.clone());
                    if let Some(record) = state.record.clone() {
                        let _ = ctx.event_tx.send(SessionEvent::StateChanged(state.snapshot()));
                        let _ = ctx.event_tx.send(SessionEvent::Completed(CompletionEvent {
                            record,
                            progress: Some(saved),
                        }));
                    }
                }
                Err(reason) => {
                    // The actor stays up holding the sealed record until a
                    // finish from the player gets it saved.
                    tracing::error!(%reason, "Background save gave up, keeping session open");
                    let _ = ctx.event_tx.send(SessionEvent::Error(
                        "Your progress could not be saved. Finish the session again to retry".into(),
                    ));
                }
            },

            // Unsaved results keep the actor alive past the linger window.
            _ = time::sleep_until(linger_until), if closable => {
                tracing::info!("Finished session idle, closing");
                break;
            }
        }
    }

    tracing::info!(phase = %state.phase(), persisted = state.persisted, "Session actor exited");
}

async fn handle_command<S: ProgressStore>(
    state: &mut SessionState,
    cmd: SessionCommand,
    ctx: &ActorContext<S>,
) -> Flow {
    match cmd {
        SessionCommand::SubmitAnswer {
            index,
            answer,
            reply,
        } => {
            // An answer racing the timer loses.
            if state.is_running() && state.deadline_passed() {
                expire(state, ctx).await;
            }
            let result = state.submit(index, &answer).map(|correct| {
                let snapshot = state.snapshot();
                let _ = ctx.event_tx.send(SessionEvent::StateChanged(snapshot.clone()));
                SubmitOutcome { snapshot, correct }
            });
            if let Err(ref e) = result {
                tracing::debug!(index, "Answer rejected: {}", e);
            }
            let _ = reply.send(result.map_err(SessionError::from));
            Flow::Continue
        }
        SessionCommand::Finish { reply } => {
            let result = finish(state, ctx).await;
            let _ = reply.send(result);
            Flow::Continue
        }
        SessionCommand::Abandon { reply } => match state.phase() {
            AttemptPhase::Running | AttemptPhase::NotStarted => {
                let result = state.abandon().map_err(SessionError::from);
                if result.is_ok() {
                    tracing::info!(score = state.attempt.score(), "Session abandoned, nothing recorded");
                    let _ = ctx.event_tx.send(SessionEvent::StateChanged(state.snapshot()));
                }
                let _ = reply.send(result);
                Flow::Exit
            }
            AttemptPhase::Completed(_) => {
                tracing::info!("Completed session closed by client");
                let _ = reply.send(Ok(()));
                Flow::Exit
            }
            phase @ AttemptPhase::Abandoned => {
                let _ = reply.send(Err(quiz::QuizError::NotRunning(phase).into()));
                Flow::Exit
            }
        },
        SessionCommand::GetSnapshot { reply } => {
            if state.is_running() && state.deadline_passed() {
                expire(state, ctx).await;
            }
            let _ = reply.send(state.snapshot());
            Flow::Continue
        }
        SessionCommand::Subscribe { reply } => {
            let snapshot = state.snapshot();
            let rx = ctx.event_tx.subscribe();
            let _ = reply.send((snapshot, rx));
            Flow::Continue
        }
        SessionCommand::Shutdown => Flow::Exit,
    }
}

async fn finish<S: ProgressStore>(
    state: &mut SessionState,
    ctx: &ActorContext<S>,
) -> Result<FinishOutcome, SessionError> {
    if state.is_running() && state.deadline_passed() {
        expire(state, ctx).await;
    }
    match state.phase() {
        AttemptPhase::Running => {
            let record = state.finish()?;
            tracing::info!(score = record.score, "Session finished by player");
            save(state, ctx, record).await
        }
        // The caller's retry of a completion whose save failed.
        AttemptPhase::Completed(_) if !state.persisted => match state.record.clone() {
            Some(record) => save(state, ctx, record).await,
            None => Err(SessionError::Internal("Completed session has no record".into())),
        },
        phase => Err(quiz::QuizError::NotRunning(phase).into()),
    }
}

/// Expiry fires at most once: afterwards the attempt is no longer running.
async fn expire<S: ProgressStore>(state: &mut SessionState, ctx: &ActorContext<S>) {
    match state.expire() {
        Ok(record) => {
            tracing::info!(
                score = record.score,
                graded = state.attempt.graded_count(),
                "Session timed out"
            );
            // Nobody is waiting on a reply; failures are surfaced through events.
            let _ = save(state, ctx, record).await;
        }
        Err(e) => tracing::debug!("Expiry ignored: {}", e),
    }
}

/// Reconcile a completed session. On failure the record goes to the retry
/// worker and subscribers are told it is not saved yet.
async fn save<S: ProgressStore>(
    state: &mut SessionState,
    ctx: &ActorContext<S>,
    record: SessionRecord,
) -> Result<FinishOutcome, SessionError> {
    let _ = ctx.event_tx.send(SessionEvent::StateChanged(state.snapshot()));

    match ctx.progress.reconcile(&record).await {
        Ok(progress) => {
            state.mark_saved(progress.clone());
            let snapshot = state.snapshot();
            let _ = ctx.event_tx.send(SessionEvent::StateChanged(snapshot.clone()));
            let _ = ctx.event_tx.send(SessionEvent::Completed(CompletionEvent {
                record: record.clone(),
                progress: Some(progress.clone()),
            }));
            Ok(FinishOutcome {
                snapshot,
                record,
                progress,
            })
        }
        Err(e) => {
            tracing::warn!(durable = e.session_durable(), "Could not save session: {}", e);
            if !state.has_pending_save() {
                let (tx, rx) = oneshot::channel();
                let job = RetryJob {
                    record: record.clone(),
                    reply: Some(tx),
                };
                if ctx.retry_tx.send(job).await.is_ok() {
                    state.await_retry(rx);
                } else {
                    tracing::error!(session_id = %record.session_id, "Retry worker is gone");
                }
            }
            let _ = ctx.event_tx.send(SessionEvent::Completed(CompletionEvent {
                record,
                progress: None,
            }));
            let _ = ctx.event_tx.send(SessionEvent::Error(
                "Your progress may not be saved yet; retrying in the background".into(),
            ));
            Err(SessionError::StoreUnavailable(e.to_string()))
        }
    }
}
