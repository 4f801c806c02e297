//! Background retries for completions that could not be saved.
//!
//! A session whose reconcile failed is handed here with its record. Each job
//! runs on its own task and re-runs the whole reconcile from freshly read
//! state, backing off exponentially between attempts. The session actor
//! waiting on the reply hears the outcome either way: the saved progress,
//! or the last error once the retries are used up.

use std::sync::Arc;
use std::time::Duration;

use quiz::{SessionRecord, UserProgress};
use tokio::sync::{mpsc, oneshot};

use super::{ProgressService, ReconcileError};
use crate::persistence::ProgressStore;

const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// What a retried save ended with.
pub type RetryOutcome = Result<UserProgress, ReconcileError>;

pub struct RetryJob {
    pub record: SessionRecord,
    pub reply: Option<oneshot::Sender<RetryOutcome>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_backoff: Duration,
}

impl RetryPolicy {
    /// Delay before retry number `retry` (zero-based): `base * 2^retry`,
    /// capped at one minute.
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry).unwrap_or(u32::MAX);
        self.base_backoff.saturating_mul(factor).min(MAX_BACKOFF)
    }
}

/// Long-lived worker. Spawns a task per job so one long backoff never holds
/// up another user's save, and exits once every sender is gone.
pub async fn run_retry_worker<S: ProgressStore>(
    progress: Arc<ProgressService<S>>,
    mut job_rx: mpsc::Receiver<RetryJob>,
    policy: RetryPolicy,
) {
    tracing::info!(
        max_retries = policy.max_retries,
        base_backoff_ms = policy.base_backoff.as_millis() as u64,
        "Retry worker started"
    );

    while let Some(job) = job_rx.recv().await {
        let progress = progress.clone();
        tokio::spawn(async move { retry_job(progress.as_ref(), job, policy).await });
    }

    tracing::info!("Retry channel closed, worker exiting");
}

async fn retry_job<S: ProgressStore>(progress: &ProgressService<S>, job: RetryJob, policy: RetryPolicy) {
    let record = &job.record;
    tracing::info!(session_id = %record.session_id, user_id = %record.user_id, "Retrying unsaved session");

    let mut last_error = None;
    for retry in 0..policy.max_retries {
        tokio::time::sleep(policy.backoff(retry)).await;
        match progress.reconcile(record).await {
            Ok(saved) => {
                tracing::info!(
                    session_id = %record.session_id,
                    retry,
                    total_score = saved.total_score,
                    "Unsaved session recovered"
                );
                if let Some(reply) = job.reply {
                    let _ = reply.send(Ok(saved));
                }
                return;
            }
            Err(e) => {
                tracing::warn!(session_id = %record.session_id, retry, "Retry failed: {}", e);
                last_error = Some(e);
            }
        }
    }

    tracing::error!(
        session_id = %record.session_id,
        user_id = %record.user_id,
        level_id = record.level_id,
        score = record.score,
        created_at = record.created_at,
        durable = last_error.as_ref().is_some_and(ReconcileError::session_durable),
        "Giving up on unsaved session"
    );
    // With no attempts made there is no error to report; dropping the
    // sender tells the waiter the same thing.
    if let (Some(reply), Some(e)) = (job.reply, last_error) {
        let _ = reply.send(Err(e));
    }
}
