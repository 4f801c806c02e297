//! Shared fixtures for server tests.

use std::sync::Arc;

use quiz::{AnswerKey, Catalog, Difficulty, GameType, Level, LevelId, Question, SessionRecord};

/// Three levels, one per tier:
/// - 1: easy quiz, 2 questions at 10 points, 60 s; correct option is `i % 3`
/// - 2: medium fill-blank, 3 questions at 10 points, 30 s; answer is `word{i}`
/// - 3: hard match, 4 questions at 25 points, 45 s; pairing is the identity
pub fn sample_catalog() -> Arc<Catalog> {
    let quiz_level = Level {
        id: 1,
        title: "Preamble".into(),
        description: String::new(),
        difficulty: Difficulty::Easy,
        game_type: GameType::Quiz,
        points_per_question: 10,
        time_limit_secs: 60,
        questions: (0..2)
            .map(|i| Question {
                prompt: format!("Pick {i}"),
                answer: AnswerKey::Choice {
                    options: vec!["a".into(), "b".into(), "c".into()],
                    correct: i % 3,
                },
            })
            .collect(),
    };
    let fill_level = Level {
        id: 2,
        title: "Rights".into(),
        description: String::new(),
        difficulty: Difficulty::Medium,
        game_type: GameType::FillBlank,
        points_per_question: 10,
        time_limit_secs: 30,
        questions: (0..3)
            .map(|i| Question {
                prompt: format!("Blank {i}"),
                answer: AnswerKey::FillBlank {
                    accepted: vec![format!("word{i}")],
                },
            })
            .collect(),
    };
    let match_level = Level {
        id: 3,
        title: "Bodies".into(),
        description: String::new(),
        difficulty: Difficulty::Hard,
        game_type: GameType::Match,
        points_per_question: 25,
        time_limit_secs: 45,
        questions: (0..4)
            .map(|i| Question {
                prompt: format!("Match {i}"),
                answer: AnswerKey::Match {
                    left: vec!["x".into(), "y".into()],
                    right: vec!["1".into(), "2".into()],
                    pairs: vec![(0, 0), (1, 1)],
                },
            })
            .collect(),
    };
    Arc::new(
        Catalog::new(1, vec![quiz_level, fill_level, match_level])
            .expect("fixture catalog is valid"),
    )
}

pub fn record(session_id: &str, user_id: &str, level_id: LevelId, score: u32) -> SessionRecord {
    SessionRecord {
        session_id: session_id.to_string(),
        user_id: user_id.to_string(),
        level_id,
        score,
        completed: true,
        created_at: 1_700_000_000,
    }
}
