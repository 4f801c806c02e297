//! Conversion functions from domain types to protobuf types

use crate::progress::{LevelState, TierSummary, UnlockState};
use crate::session::{CompletionEvent, SessionError, SessionEvent, SessionSnapshot};
use quiz::{
    AnswerKey, AttemptPhase, Catalog, CompletionReason, Difficulty, GameType, Level, Question,
    QuizError, SessionRecord, UserProgress,
};
use quiz_proto::*;
use tonic::Status;

pub fn convert_difficulty_to_proto(difficulty: Difficulty) -> quiz_proto::Difficulty {
    match difficulty {
        Difficulty::Easy => quiz_proto::Difficulty::Easy,
        Difficulty::Medium => quiz_proto::Difficulty::Medium,
        Difficulty::Hard => quiz_proto::Difficulty::Hard,
    }
}

pub fn convert_game_type_to_proto(game_type: GameType) -> quiz_proto::GameType {
    match game_type {
        GameType::Quiz => quiz_proto::GameType::Quiz,
        GameType::Match => quiz_proto::GameType::Match,
        GameType::FillBlank => quiz_proto::GameType::FillBlank,
    }
}

/// What the player sees of a question. Correct options, match keys and
/// accepted answers stay on the server.
pub fn convert_question_to_view(index: usize, question: &Question) -> QuestionView {
    let mut view = QuestionView {
        index: index as u32,
        prompt: question.prompt.clone(),
        ..Default::default()
    };
    match &question.answer {
        AnswerKey::Choice { options, .. } => view.options = options.clone(),
        AnswerKey::Match { left, right, .. } => {
            view.left_items = left.clone();
            view.right_items = right.clone();
        }
        AnswerKey::FillBlank { .. } => {}
    }
    view
}

pub fn convert_level_to_proto(level: &Level) -> LevelInfo {
    LevelInfo {
        id: level.id,
        title: level.title.clone(),
        description: level.description.clone(),
        difficulty: convert_difficulty_to_proto(level.difficulty) as i32,
        game_type: convert_game_type_to_proto(level.game_type) as i32,
        points_per_question: level.points_per_question,
        time_limit_secs: level.time_limit_secs,
        max_score: level.max_score(),
        questions: level
            .questions
            .iter()
            .enumerate()
            .map(|(i, q)| convert_question_to_view(i, q))
            .collect(),
    }
}

pub fn convert_catalog_to_proto(catalog: &Catalog) -> CatalogResponse {
    CatalogResponse {
        version: catalog.version(),
        levels: catalog
            .all_levels()
            .iter()
            .map(|level| convert_level_to_proto(level))
            .collect(),
        max_score: catalog.max_score(),
    }
}

pub fn convert_progress_to_proto(progress: &UserProgress) -> ProgressInfo {
    ProgressInfo {
        completed_levels: progress.completed_levels.iter().copied().collect(),
        total_score: progress.total_score,
    }
}

fn convert_level_state_to_proto(state: &LevelState) -> quiz_proto::LevelState {
    quiz_proto::LevelState {
        level_id: state.level_id,
        unlocked: state.unlocked,
        completed: state.completed,
        best_score: state.best_score.unwrap_or(0),
        max_score: state.max_score,
    }
}

fn convert_tier_to_proto(tier: &TierSummary) -> quiz_proto::TierSummary {
    quiz_proto::TierSummary {
        difficulty: convert_difficulty_to_proto(tier.difficulty) as i32,
        completed: tier.completed as u32,
        total: tier.total as u32,
        unlocked: tier.unlocked,
        requires: tier
            .requires
            .map(|d| convert_difficulty_to_proto(d) as i32)
            .unwrap_or(quiz_proto::Difficulty::Unspecified as i32),
    }
}

pub fn convert_unlock_state_to_proto(state: &UnlockState) -> UnlockStateResponse {
    UnlockStateResponse {
        user_id: state.user_id.clone(),
        levels: state.levels.iter().map(convert_level_state_to_proto).collect(),
        tiers: state.tiers.iter().map(convert_tier_to_proto).collect(),
        total_score: state.total_score,
        max_score: state.max_score,
        completed_count: state.completed_count as u32,
        level_count: state.level_count as u32,
    }
}

pub fn convert_phase_to_proto(phase: AttemptPhase) -> SessionPhase {
    match phase {
        AttemptPhase::NotStarted => SessionPhase::Unspecified,
        AttemptPhase::Running => SessionPhase::Running,
        AttemptPhase::Completed(CompletionReason::Finished) => SessionPhase::Finished,
        AttemptPhase::Completed(CompletionReason::TimedOut) => SessionPhase::TimedOut,
        AttemptPhase::Abandoned => SessionPhase::Abandoned,
    }
}

/// Convert a domain SessionSnapshot into the proto SessionSnapshot.
pub fn convert_snapshot_to_proto(snap: SessionSnapshot) -> quiz_proto::SessionSnapshot {
    quiz_proto::SessionSnapshot {
        session_id: snap.session_id,
        user_id: snap.user_id,
        level_id: snap.level_id,
        phase: convert_phase_to_proto(snap.phase) as i32,
        score: snap.score,
        max_score: snap.max_score,
        grades: snap
            .grades
            .iter()
            .enumerate()
            .map(|(i, grade)| QuestionGrade {
                index: i as u32,
                graded: grade.is_some(),
                correct: grade.unwrap_or(false),
            })
            .collect(),
        remaining_ms: snap.remaining_ms,
        persisted: snap.persisted,
    }
}

pub fn convert_record_to_proto(record: &SessionRecord) -> quiz_proto::SessionRecord {
    quiz_proto::SessionRecord {
        session_id: record.session_id.clone(),
        user_id: record.user_id.clone(),
        level_id: record.level_id,
        score: record.score,
        completed: record.completed,
        created_at: record.created_at,
    }
}

fn convert_completion_to_proto(completion: CompletionEvent) -> SessionCompleted {
    SessionCompleted {
        record: Some(convert_record_to_proto(&completion.record)),
        saved: completion.progress.is_some(),
        progress: completion.progress.as_ref().map(convert_progress_to_proto),
    }
}

pub fn convert_session_event_to_proto(event: SessionEvent, session_id: &str) -> SessionStreamEvent {
    let event = match event {
        SessionEvent::StateChanged(snapshot) => {
            session_stream_event::Event::StateChanged(convert_snapshot_to_proto(snapshot))
        }
        SessionEvent::Completed(completion) => {
            session_stream_event::Event::Completed(convert_completion_to_proto(completion))
        }
        SessionEvent::Error(message) => session_stream_event::Event::Error(message),
    };
    SessionStreamEvent {
        session_id: session_id.to_string(),
        event: Some(event),
    }
}

impl From<SessionError> for Status {
    fn from(err: SessionError) -> Self {
        let message = err.to_string();
        match err {
            SessionError::Quiz(QuizError::LevelNotFound(_)) | SessionError::SessionNotFound(_) => {
                Status::not_found(message)
            }
            SessionError::Quiz(
                QuizError::LevelLocked { .. }
                | QuizError::NotRunning(_)
                | QuizError::Unanswered { .. },
            ) => Status::failed_precondition(message),
            SessionError::Quiz(QuizError::OutOfRange { .. }) => Status::out_of_range(message),
            SessionError::StoreUnavailable(_) => Status::unavailable(message),
            SessionError::Internal(_) => Status::internal(message),
        }
    }
}
