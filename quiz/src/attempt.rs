//! A single play-through of one level.
//!
//! ```text
//! NotStarted ──start──▶ Running ──finish──▶ Completed(Finished)
//!                          │ ────expire──▶ Completed(TimedOut)
//!                          └────abandon──▶ Abandoned
//! ```
//!
//! The attempt knows nothing about clocks. Callers measure elapsed time and
//! ask [`Attempt::is_expired`]; the server's session actor turns that into a
//! scheduled timeout.

use std::sync::Arc;
use std::time::Duration;

use crate::error::QuizError;
use crate::level::{Answer, Level};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptPhase {
    NotStarted,
    Running,
    Completed(CompletionReason),
    Abandoned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionReason {
    /// Every question graded, then finished by the player.
    Finished,
    /// The time limit ran out; ungraded questions score zero.
    TimedOut,
}

impl AttemptPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::Running => "running",
            Self::Completed(CompletionReason::Finished) => "finished",
            Self::Completed(CompletionReason::TimedOut) => "timed_out",
            Self::Abandoned => "abandoned",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed(_) | Self::Abandoned)
    }
}

impl std::fmt::Display for AttemptPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct Attempt {
    level: Arc<Level>,
    phase: AttemptPhase,
    /// `None` until graded; regrading an index overwrites it.
    grades: Vec<Option<bool>>,
}

impl Attempt {
    pub fn new(level: Arc<Level>) -> Self {
        let grades = vec![None; level.question_count()];
        Self {
            level,
            phase: AttemptPhase::NotStarted,
            grades,
        }
    }

    pub fn level(&self) -> &Arc<Level> {
        &self.level
    }

    pub fn phase(&self) -> AttemptPhase {
        self.phase
    }

    pub fn grades(&self) -> &[Option<bool>] {
        &self.grades
    }

    pub fn start(&mut self) -> Result<(), QuizError> {
        if self.phase != AttemptPhase::NotStarted {
            return Err(QuizError::NotRunning(self.phase));
        }
        self.phase = AttemptPhase::Running;
        Ok(())
    }

    /// Grade one question. Returns whether the answer was correct.
    pub fn submit(&mut self, index: usize, answer: &Answer) -> Result<bool, QuizError> {
        self.ensure_running()?;
        let question = self.level.question(index).ok_or(QuizError::OutOfRange {
            index,
            count: self.level.question_count(),
        })?;
        let correct = question.answer.accepts(answer);
        self.grades[index] = Some(correct);
        Ok(correct)
    }

    /// Points earned so far. Never exceeds the level's max score.
    pub fn score(&self) -> u32 {
        let correct = self.grades.iter().filter(|g| **g == Some(true)).count() as u32;
        correct * self.level.points_per_question
    }

    pub fn graded_count(&self) -> usize {
        self.grades.iter().filter(|g| g.is_some()).count()
    }

    pub fn is_fully_graded(&self) -> bool {
        self.grades.iter().all(Option::is_some)
    }

    /// Complete by player action. Every question must be graded.
    pub fn finish(&mut self) -> Result<u32, QuizError> {
        self.ensure_running()?;
        let remaining = self.grades.len() - self.graded_count();
        if remaining > 0 {
            return Err(QuizError::Unanswered { remaining });
        }
        self.phase = AttemptPhase::Completed(CompletionReason::Finished);
        Ok(self.score())
    }

    /// Complete because time ran out, keeping whatever was graded.
    pub fn expire(&mut self) -> Result<u32, QuizError> {
        self.ensure_running()?;
        self.phase = AttemptPhase::Completed(CompletionReason::TimedOut);
        Ok(self.score())
    }

    /// Leave without finishing. Nothing about the attempt is kept.
    pub fn abandon(&mut self) -> Result<(), QuizError> {
        match self.phase {
            AttemptPhase::NotStarted | AttemptPhase::Running => {
                self.phase = AttemptPhase::Abandoned;
                Ok(())
            }
            phase => Err(QuizError::NotRunning(phase)),
        }
    }

    pub fn time_limit(&self) -> Duration {
        self.level.time_limit()
    }

    /// Expiry is inclusive: elapsed equal to the limit has expired.
    pub fn is_expired(&self, elapsed: Duration) -> bool {
        elapsed >= self.time_limit()
    }

    pub fn remaining(&self, elapsed: Duration) -> Duration {
        self.time_limit().saturating_sub(elapsed)
    }

    fn ensure_running(&self) -> Result<(), QuizError> {
        if self.phase == AttemptPhase::Running {
            Ok(())
        } else {
            Err(QuizError::NotRunning(self.phase))
        }
    }
}
