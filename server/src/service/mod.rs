//! gRPC service implementation with modular organization
//!
//! This module contains the QuizService gRPC implementation split into:
//! - converters: Domain model → Proto conversions (and error → status)
//! - parsers: Proto → Domain model parsing
//! - endpoints: Handlers grouped by concern

mod converters;
mod endpoints;
mod parsers;

use crate::persistence::ProgressStore;
use crate::progress::ProgressService;
use crate::session::SessionManager;
use endpoints::events::SessionEventStream;
use endpoints::{CatalogEndpoints, EventsEndpoints, ProgressEndpoints, SessionEndpoints};
use quiz_proto::quiz_service_server::QuizService;
use quiz_proto::*;
use std::sync::Arc;
use tonic::{Request, Response, Status};

/// Implementation of the QuizService gRPC service
pub struct QuizServiceImpl<S> {
    catalog: CatalogEndpoints,
    progress: ProgressEndpoints<S>,
    session: SessionEndpoints<S>,
    events: EventsEndpoints<S>,
}

impl<S: ProgressStore> QuizServiceImpl<S> {
    pub fn new(progress: Arc<ProgressService<S>>, session_manager: Arc<SessionManager<S>>) -> Self {
        Self {
            catalog: CatalogEndpoints::new(progress.catalog().clone()),
            progress: ProgressEndpoints::new(progress),
            session: SessionEndpoints::new(session_manager.clone()),
            events: EventsEndpoints::new(session_manager),
        }
    }
}

#[tonic::async_trait]
impl<S: ProgressStore> QuizService for QuizServiceImpl<S> {
    // Catalog
    async fn get_catalog(
        &self,
        request: Request<GetCatalogRequest>,
    ) -> Result<Response<CatalogResponse>, Status> {
        self.catalog.get_catalog(request).await
    }

    // Progress
    async fn get_unlock_state(
        &self,
        request: Request<GetUnlockStateRequest>,
    ) -> Result<Response<UnlockStateResponse>, Status> {
        self.progress.get_unlock_state(request).await
    }

    async fn rebuild_progress(
        &self,
        request: Request<RebuildProgressRequest>,
    ) -> Result<Response<ProgressInfo>, Status> {
        self.progress.rebuild_progress(request).await
    }

    // Session lifecycle
    async fn start_session(
        &self,
        request: Request<StartSessionRequest>,
    ) -> Result<Response<SessionSnapshot>, Status> {
        self.session.start_session(request).await
    }

    async fn submit_answer(
        &self,
        request: Request<SubmitAnswerRequest>,
    ) -> Result<Response<SubmitAnswerResponse>, Status> {
        self.session.submit_answer(request).await
    }

    async fn finish_session(
        &self,
        request: Request<FinishSessionRequest>,
    ) -> Result<Response<FinishSessionResponse>, Status> {
        self.session.finish_session(request).await
    }

    async fn abandon_session(
        &self,
        request: Request<AbandonSessionRequest>,
    ) -> Result<Response<Empty>, Status> {
        self.session.abandon_session(request).await
    }

    async fn get_session(
        &self,
        request: Request<GetSessionRequest>,
    ) -> Result<Response<SessionSnapshot>, Status> {
        self.session.get_session(request).await
    }

    // Events
    type StreamSessionEventsStream = SessionEventStream;

    async fn stream_session_events(
        &self,
        request: Request<StreamEventsRequest>,
    ) -> Result<Response<Self::StreamSessionEventsStream>, Status> {
        self.events.stream_session_events(request).await
    }
}
