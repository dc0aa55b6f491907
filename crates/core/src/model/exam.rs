use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{QualificationId, QuestionId, SubjectId};

/// Default exam budget when the caller does not supply one (30 minutes).
pub const DEFAULT_TIME_LIMIT_SECS: u32 = 1_800;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ExamConfigError {
    #[error("exam mode needs a time limit greater than zero")]
    ZeroTimeLimit,

    #[error("critical threshold ({critical}s) must not exceed warning threshold ({warning}s)")]
    ThresholdOrder { warning: u32, critical: u32 },

    #[error("question count must be greater than zero")]
    ZeroQuestionCount,
}

//
// ─── MODE ──────────────────────────────────────────────────────────────────────
//

/// How a session presents questions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionMode {
    /// Timed, answers hidden until submit.
    Exam,
    /// Untimed, each answer revealed immediately.
    Practice,
    /// Practice over questions whose last answer was wrong.
    WeakReview,
    /// Practice over a shuffled draw.
    Random,
}

impl SessionMode {
    #[must_use]
    pub fn is_timed(self) -> bool {
        matches!(self, Self::Exam)
    }

    /// Whether answering reveals correctness straight away.
    #[must_use]
    pub fn reveals_on_answer(self) -> bool {
        !self.is_timed()
    }
}

//
// ─── CONFIG ────────────────────────────────────────────────────────────────────
//

/// Parameters for one exam or practice attempt.
///
/// Everything except the qualification and mode has a default: 30 minute
/// budget, warning at 25% and critical at 10% of it, all questions, no
/// shuffling, auto-submit on expiry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamConfig {
    pub qualification_id: QualificationId,
    pub subject_id: Option<SubjectId>,
    pub year: Option<i32>,
    pub time_limit_secs: u32,
    pub warning_threshold_secs: u32,
    pub critical_threshold_secs: u32,
    pub question_count: Option<usize>,
    pub shuffle_questions: bool,
    pub shuffle_choices: bool,
    pub auto_submit: bool,
    pub mode: SessionMode,
}

impl ExamConfig {
    #[must_use]
    pub fn new(qualification_id: impl Into<QualificationId>, mode: SessionMode) -> Self {
        let (warning, critical) = default_thresholds(DEFAULT_TIME_LIMIT_SECS);
        Self {
            qualification_id: qualification_id.into(),
            subject_id: None,
            year: None,
            time_limit_secs: DEFAULT_TIME_LIMIT_SECS,
            warning_threshold_secs: warning,
            critical_threshold_secs: critical,
            question_count: None,
            shuffle_questions: matches!(mode, SessionMode::Random),
            shuffle_choices: false,
            auto_submit: true,
            mode,
        }
    }

    #[must_use]
    pub fn exam(qualification_id: impl Into<QualificationId>) -> Self {
        Self::new(qualification_id, SessionMode::Exam)
    }

    #[must_use]
    pub fn practice(qualification_id: impl Into<QualificationId>) -> Self {
        Self::new(qualification_id, SessionMode::Practice)
    }

    /// Set the time budget and recompute the default thresholds from it.
    #[must_use]
    pub fn with_time_limit(mut self, secs: u32) -> Self {
        let (warning, critical) = default_thresholds(secs);
        self.time_limit_secs = secs;
        self.warning_threshold_secs = warning;
        self.critical_threshold_secs = critical;
        self
    }

    #[must_use]
    pub fn with_thresholds(mut self, warning_secs: u32, critical_secs: u32) -> Self {
        self.warning_threshold_secs = warning_secs;
        self.critical_threshold_secs = critical_secs;
        self
    }

    #[must_use]
    pub fn with_subject(mut self, subject_id: impl Into<SubjectId>) -> Self {
        self.subject_id = Some(subject_id.into());
        self
    }

    #[must_use]
    pub fn with_year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }

    #[must_use]
    pub fn with_question_count(mut self, count: usize) -> Self {
        self.question_count = Some(count);
        self
    }

    #[must_use]
    pub fn with_shuffle(mut self, questions: bool, choices: bool) -> Self {
        self.shuffle_questions = questions;
        self.shuffle_choices = choices;
        self
    }

    #[must_use]
    pub fn with_auto_submit(mut self, auto_submit: bool) -> Self {
        self.auto_submit = auto_submit;
        self
    }

    /// # Errors
    ///
    /// Returns `ExamConfigError` for a zero exam budget, inverted thresholds
    /// or a zero question count.
    pub fn validate(&self) -> Result<(), ExamConfigError> {
        if self.mode.is_timed() && self.time_limit_secs == 0 {
            return Err(ExamConfigError::ZeroTimeLimit);
        }
        if self.critical_threshold_secs > self.warning_threshold_secs {
            return Err(ExamConfigError::ThresholdOrder {
                warning: self.warning_threshold_secs,
                critical: self.critical_threshold_secs,
            });
        }
        if self.question_count == Some(0) {
            return Err(ExamConfigError::ZeroQuestionCount);
        }
        Ok(())
    }
}

/// Warning at a quarter and critical at a tenth of the budget, rounded down.
#[must_use]
pub fn default_thresholds(time_limit_secs: u32) -> (u32, u32) {
    (time_limit_secs / 4, time_limit_secs / 10)
}

/// `round(correct / total * 100)` with halves rounded up; 0 when `total` is 0.
#[must_use]
pub fn accuracy_percent(correct: u64, total: u64) -> u32 {
    if total == 0 {
        return 0;
    }
    let correct = correct.min(total);
    let rounded = (correct * 200 + total) / (total * 2);
    u32::try_from(rounded).unwrap_or(100)
}

//
// ─── STATUS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionStatus {
    NotStarted,
    InProgress,
    Completed,
    TimeUp,
}

impl SessionStatus {
    #[must_use]
    pub fn is_finished(self) -> bool {
        matches!(self, Self::Completed | Self::TimeUp)
    }

    /// Screen the presentation layer should show for this status.
    #[must_use]
    pub fn phase(self) -> SessionPhase {
        match self {
            Self::NotStarted => SessionPhase::Setup,
            Self::InProgress => SessionPhase::Running,
            Self::Completed | Self::TimeUp => SessionPhase::Result,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Setup,
    Running,
    Result,
}

/// How a finished session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionEnd {
    Completed,
    TimeUp,
}

//
// ─── RESULT ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamAnswer {
    pub question_id: QuestionId,
    /// Selected label, empty when the question was left unanswered.
    pub selected: String,
    pub correct: String,
    pub is_correct: bool,
}

/// Score of a finished session. Produced once and cached by the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamResult {
    pub qualification_id: QualificationId,
    pub subject_id: Option<SubjectId>,
    pub year: Option<i32>,
    pub total_questions: usize,
    pub correct_count: usize,
    pub accuracy: u32,
    pub time_taken_secs: u64,
    pub answers: Vec<ExamAnswer>,
    pub completed_at: DateTime<Utc>,
    pub ended_by: SessionEnd,
}

impl ExamResult {
    #[must_use]
    pub fn unanswered_count(&self) -> usize {
        self.answers.iter().filter(|a| a.selected.is_empty()).count()
    }

    pub fn incorrect(&self) -> impl Iterator<Item = &ExamAnswer> {
        self.answers.iter().filter(|a| !a.is_correct)
    }
}
