//! Unlock state and progress repair endpoints

use crate::persistence::ProgressStore;
use crate::progress::ProgressService;
use crate::service::converters::{convert_progress_to_proto, convert_unlock_state_to_proto};
use crate::service::parsers::parse_user_id;
use quiz_proto::*;
use std::sync::Arc;
use tonic::{Request, Response, Status};

pub struct ProgressEndpoints<S> {
    progress: Arc<ProgressService<S>>,
}

impl<S: ProgressStore> ProgressEndpoints<S> {
    pub fn new(progress: Arc<ProgressService<S>>) -> Self {
        Self { progress }
    }

    pub async fn get_unlock_state(
        &self,
        request: Request<GetUnlockStateRequest>,
    ) -> Result<Response<UnlockStateResponse>, Status> {
        let req = request.into_inner();
        let user_id = parse_user_id(&req.user_id)?;
        tracing::debug!(user_id, "RPC get_unlock_state");

        let state = self.progress.unlock_state(user_id).await.map_err(|e| {
            tracing::warn!(user_id, "Unlock state unavailable: {}", e);
            Status::unavailable(e.to_string())
        })?;

        Ok(Response::new(convert_unlock_state_to_proto(&state)))
    }

    pub async fn rebuild_progress(
        &self,
        request: Request<RebuildProgressRequest>,
    ) -> Result<Response<ProgressInfo>, Status> {
        let req = request.into_inner();
        let user_id = parse_user_id(&req.user_id)?;
        tracing::info!(user_id, "RPC rebuild_progress");

        let progress = self.progress.rebuild(user_id).await.map_err(|e| {
            tracing::warn!(user_id, "Rebuild failed: {}", e);
            Status::unavailable(e.to_string())
        })?;

        Ok(Response::new(convert_progress_to_proto(&progress)))
    }
}
