//! Session lifecycle endpoints

use crate::persistence::ProgressStore;
use crate::service::converters::{
    convert_progress_to_proto, convert_record_to_proto, convert_snapshot_to_proto,
};
use crate::service::parsers::{parse_answer, parse_session_id, parse_user_id};
use crate::session::SessionManager;
use quiz_proto::*;
use std::sync::Arc;
use tonic::{Request, Response, Status};

pub struct SessionEndpoints<S> {
    session_manager: Arc<SessionManager<S>>,
}

impl<S: ProgressStore> SessionEndpoints<S> {
    pub fn new(session_manager: Arc<SessionManager<S>>) -> Self {
        Self { session_manager }
    }

    pub async fn start_session(
        &self,
        request: Request<StartSessionRequest>,
    ) -> Result<Response<quiz_proto::SessionSnapshot>, Status> {
        let req = request.into_inner();
        let user_id = parse_user_id(&req.user_id)?;
        tracing::info!(user_id, level_id = req.level_id, "RPC start_session");

        let snapshot = self
            .session_manager
            .start_session(user_id, req.level_id)
            .await?;

        Ok(Response::new(convert_snapshot_to_proto(snapshot)))
    }

    pub async fn submit_answer(
        &self,
        request: Request<SubmitAnswerRequest>,
    ) -> Result<Response<SubmitAnswerResponse>, Status> {
        let req = request.into_inner();
        let session_id = parse_session_id(&req.session_id)?;
        tracing::debug!(session_id, index = req.question_index, "RPC submit_answer");
        let answer = parse_answer(req.answer)?;

        let outcome = self
            .session_manager
            .submit_answer(session_id, req.question_index as usize, answer)
            .await?;

        Ok(Response::new(SubmitAnswerResponse {
            snapshot: Some(convert_snapshot_to_proto(outcome.snapshot)),
            correct: outcome.correct,
        }))
    }

    pub async fn finish_session(
        &self,
        request: Request<FinishSessionRequest>,
    ) -> Result<Response<FinishSessionResponse>, Status> {
        let req = request.into_inner();
        let session_id = parse_session_id(&req.session_id)?;
        tracing::info!(session_id, "RPC finish_session");

        let outcome = self.session_manager.finish_session(session_id).await?;

        Ok(Response::new(FinishSessionResponse {
            record: Some(convert_record_to_proto(&outcome.record)),
            progress: Some(convert_progress_to_proto(&outcome.progress)),
            snapshot: Some(convert_snapshot_to_proto(outcome.snapshot)),
        }))
    }

    pub async fn abandon_session(
        &self,
        request: Request<AbandonSessionRequest>,
    ) -> Result<Response<Empty>, Status> {
        let req = request.into_inner();
        let session_id = parse_session_id(&req.session_id)?;
        tracing::info!(session_id, "RPC abandon_session");

        self.session_manager.abandon_session(session_id).await?;

        Ok(Response::new(Empty {}))
    }

    pub async fn get_session(
        &self,
        request: Request<GetSessionRequest>,
    ) -> Result<Response<quiz_proto::SessionSnapshot>, Status> {
        let req = request.into_inner();
        let session_id = parse_session_id(&req.session_id)?;
        tracing::debug!(session_id, "RPC get_session");

        let snapshot = self.session_manager.get_session(session_id).await?;

        Ok(Response::new(convert_snapshot_to_proto(snapshot)))
    }
}
