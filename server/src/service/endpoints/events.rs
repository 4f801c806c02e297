//! Event streaming endpoint

use crate::persistence::ProgressStore;
use crate::service::converters::{convert_session_event_to_proto, convert_snapshot_to_proto};
use crate::service::parsers::parse_session_id;
use crate::session::SessionManager;
use quiz::AttemptPhase;
use quiz_proto::*;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_stream::Stream;
use tonic::{Request, Response, Status};

pub type SessionEventStream = Pin<Box<dyn Stream<Item = Result<SessionStreamEvent, Status>> + Send>>;

/// Abandons a still-running session when its event stream is dropped.
///
/// A client navigating away drops the stream; tonic drops the stream
/// future, which drops this guard. Completed sessions are left alone so
/// their result stays queryable.
struct CleanupGuard<S: ProgressStore> {
    session_manager: Arc<SessionManager<S>>,
    session_id: String,
}

impl<S: ProgressStore> Drop for CleanupGuard<S> {
    fn drop(&mut self) {
        let session_manager = self.session_manager.clone();
        let session_id = std::mem::take(&mut self.session_id);
        tracing::info!(session_id = %session_id, "Event stream dropped");
        tokio::spawn(async move {
            let running = matches!(
                session_manager.get_session(&session_id).await,
                Ok(snapshot) if snapshot.phase == AttemptPhase::Running
            );
            if !running {
                return;
            }
            match session_manager.abandon_session(&session_id).await {
                Ok(()) => {
                    tracing::info!(session_id = %session_id, "Session abandoned after client left")
                }
                Err(e) => {
                    tracing::debug!(session_id = %session_id, error = %e, "Session already gone")
                }
            }
        });
    }
}

pub struct EventsEndpoints<S> {
    session_manager: Arc<SessionManager<S>>,
}

impl<S: ProgressStore> EventsEndpoints<S> {
    pub fn new(session_manager: Arc<SessionManager<S>>) -> Self {
        Self { session_manager }
    }

    pub async fn stream_session_events(
        &self,
        request: Request<StreamEventsRequest>,
    ) -> Result<Response<SessionEventStream>, Status> {
        let req = request.into_inner();
        let session_id = parse_session_id(&req.session_id)?.to_string();
        tracing::info!(session_id = %session_id, "RPC stream_session_events");

        let handle = self.session_manager.get_handle(&session_id).await?;

        // Current state first, then incremental updates.
        let (initial_snapshot, mut event_rx) = handle.subscribe().await?;

        let session_manager = self.session_manager.clone();
        let stream = async_stream::stream! {
            let _guard = CleanupGuard {
                session_manager,
                session_id: session_id.clone(),
            };

            yield Ok(SessionStreamEvent {
                session_id: session_id.clone(),
                event: Some(session_stream_event::Event::StateChanged(
                    convert_snapshot_to_proto(initial_snapshot),
                )),
            });

            loop {
                match event_rx.recv().await {
                    Ok(event) => {
                        yield Ok(convert_session_event_to_proto(event, &session_id));
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(session_id = %session_id, skipped, "Client lagged, resyncing");
                        match handle.get_snapshot().await {
                            Ok(snapshot) => yield Ok(SessionStreamEvent {
                                session_id: session_id.clone(),
                                event: Some(session_stream_event::Event::StateChanged(
                                    convert_snapshot_to_proto(snapshot),
                                )),
                            }),
                            Err(_) => break,
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        tracing::info!(session_id = %session_id, "Event stream closed");
                        break;
                    }
                }
            }
        };

        Ok(Response::new(Box::pin(stream)))
    }
}
