use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::fmt;
use tracing::debug;

use kakomon_core::model::{
    AnswerRecord, ExamAnswer, ExamConfig, ExamResult, Question, QuestionId, SessionEnd,
    SessionMode, SessionPhase, SessionStatus, accuracy_percent,
};
use kakomon_core::time::elapsed_secs;

use super::plan::{SessionBuilder, SessionPlan};
use super::progress::SessionProgress;
use crate::error::SessionError;

//
// ─── ANSWER OUTCOME ────────────────────────────────────────────────────────────
//

/// What happened to a submitted answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerOutcome {
    /// Stored without revealing correctness (exam mode).
    Recorded,
    /// Stored and revealed; the question is now locked.
    Revealed {
        is_correct: bool,
        correct_answer: String,
    },
    /// Not valid in the current state; nothing changed.
    Ignored,
}

impl AnswerOutcome {
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        !matches!(self, Self::Ignored)
    }
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// In-memory exam or practice session over a fixed question sequence.
///
/// Pure state machine: time comes in as arguments, the countdown and
/// persistence live in `SessionController`.
pub struct ExamSession {
    config: ExamConfig,
    questions: Vec<Question>,
    available: usize,
    current: usize,
    answers: HashMap<QuestionId, String>,
    revealed: HashSet<QuestionId>,
    bookmarks: HashSet<QuestionId>,
    started_at: DateTime<Utc>,
    last_answer_at: DateTime<Utc>,
    status: SessionStatus,
    result: Option<ExamResult>,
}

impl ExamSession {
    /// Start a session from a candidate question list.
    ///
    /// The config's filters, count limit and shuffles are applied here; the
    /// resulting order is fixed for the lifetime of the session.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Config` for an invalid config and
    /// `SessionError::NoQuestions` when nothing is left after filtering.
    pub fn start(
        config: ExamConfig,
        questions: impl IntoIterator<Item = Question>,
        started_at: DateTime<Utc>,
    ) -> Result<Self, SessionError> {
        config.validate()?;
        let plan = SessionBuilder::new(&config).build(questions);
        Self::from_plan(config, plan, started_at)
    }

    pub(crate) fn from_plan(
        config: ExamConfig,
        plan: SessionPlan,
        started_at: DateTime<Utc>,
    ) -> Result<Self, SessionError> {
        if plan.is_empty() {
            return Err(SessionError::NoQuestions);
        }

        Ok(Self {
            config,
            available: plan.available,
            questions: plan.questions,
            current: 0,
            answers: HashMap::new(),
            revealed: HashSet::new(),
            bookmarks: HashSet::new(),
            started_at,
            last_answer_at: started_at,
            status: SessionStatus::InProgress,
            result: None,
        })
    }

    #[must_use]
    pub fn config(&self) -> &ExamConfig {
        &self.config
    }

    #[must_use]
    pub fn mode(&self) -> SessionMode {
        self.config.mode
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.status.phase()
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    /// Candidates that matched the filters before the count limit.
    #[must_use]
    pub fn available(&self) -> usize {
        self.available
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current
    }

    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        self.questions.get(self.current)
    }

    #[must_use]
    pub fn question(&self, question_id: &QuestionId) -> Option<&Question> {
        self.questions.iter().find(|q| &q.id == question_id)
    }

    #[must_use]
    pub fn selected(&self, question_id: &QuestionId) -> Option<&str> {
        self.answers.get(question_id).map(String::as_str)
    }

    #[must_use]
    pub fn is_revealed(&self, question_id: &QuestionId) -> bool {
        self.revealed.contains(question_id)
    }

    #[must_use]
    pub fn is_bookmarked(&self, question_id: &QuestionId) -> bool {
        self.bookmarks.contains(question_id)
    }

    /// Bookmarked questions in session order.
    #[must_use]
    pub fn bookmarks(&self) -> Vec<&QuestionId> {
        self.questions
            .iter()
            .map(|q| &q.id)
            .filter(|id| self.bookmarks.contains(*id))
            .collect()
    }

    #[must_use]
    pub fn result(&self) -> Option<&ExamResult> {
        self.result.as_ref()
    }

    #[must_use]
    pub fn answered_count(&self) -> usize {
        self.answers.len()
    }

    #[must_use]
    pub fn progress(&self) -> SessionProgress {
        SessionProgress {
            total: self.questions.len(),
            answered: self.answered_count(),
            remaining: self.questions.len().saturating_sub(self.answered_count()),
            current: self.current,
            bookmarked: self.bookmarks.len(),
            is_complete: self.status.is_finished(),
        }
    }

    //
    // ─── ANSWERING ─────────────────────────────────────────────────────────────
    //

    /// Select `label` for `question_id`.
    ///
    /// Exam mode lets the answer be changed until submission. Reveal modes
    /// accept the first answer only.
    pub fn answer(
        &mut self,
        question_id: &QuestionId,
        label: &str,
        at: DateTime<Utc>,
    ) -> AnswerOutcome {
        self.answer_with_record(question_id, label, at).0
    }

    /// Like `answer`, also returning the progress record for an accepted answer.
    pub(crate) fn answer_with_record(
        &mut self,
        question_id: &QuestionId,
        label: &str,
        at: DateTime<Utc>,
    ) -> (AnswerOutcome, Option<AnswerRecord>) {
        if self.status != SessionStatus::InProgress {
            debug!(question_id = %question_id, status = ?self.status, "answer ignored: session not in progress");
            return (AnswerOutcome::Ignored, None);
        }
        let reveals = self.config.mode.reveals_on_answer();
        let Some(question) = self.questions.iter().find(|q| &q.id == question_id) else {
            debug!(question_id = %question_id, "answer ignored: question not in session");
            return (AnswerOutcome::Ignored, None);
        };
        if question.choice(label).is_none() {
            debug!(question_id = %question_id, label, "answer ignored: unknown choice");
            return (AnswerOutcome::Ignored, None);
        }
        if reveals && self.revealed.contains(question_id) {
            debug!(question_id = %question_id, "answer ignored: question locked");
            return (AnswerOutcome::Ignored, None);
        }

        let is_correct = question.is_correct(label);
        let record = AnswerRecord {
            qualification_id: question.qualification_id.clone(),
            subject_id: question.subject_id.clone(),
            year: question.year_label(),
            question_id: question.id.clone(),
            selected: label.to_owned(),
            is_correct,
            time_spent_secs: elapsed_secs(self.last_answer_at, at),
        };
        let outcome = if reveals {
            AnswerOutcome::Revealed {
                is_correct,
                correct_answer: question.correct_answer.clone(),
            }
        } else {
            AnswerOutcome::Recorded
        };

        self.answers.insert(question_id.clone(), label.to_owned());
        if reveals {
            self.revealed.insert(question_id.clone());
        }
        self.last_answer_at = at;
        (outcome, Some(record))
    }

    //
    // ─── NAVIGATION ────────────────────────────────────────────────────────────
    //

    /// Move to `index`, clamped to the question range. Returns the new index.
    pub fn go_to(&mut self, index: usize) -> usize {
        self.current = index.min(self.questions.len().saturating_sub(1));
        self.current
    }

    pub fn next(&mut self) -> usize {
        self.go_to(self.current.saturating_add(1))
    }

    pub fn prev(&mut self) -> usize {
        self.go_to(self.current.saturating_sub(1))
    }

    /// Toggle a session-local bookmark. Returns whether it is now bookmarked.
    ///
    /// Ids outside the session are ignored.
    pub fn toggle_bookmark(&mut self, question_id: &QuestionId) -> bool {
        if self.question(question_id).is_none() {
            debug!(question_id = %question_id, "bookmark ignored: question not in session");
            return false;
        }
        if self.bookmarks.remove(question_id) {
            false
        } else {
            self.bookmarks.insert(question_id.clone());
            true
        }
    }

    //
    // ─── COMPLETION ────────────────────────────────────────────────────────────
    //

    /// Finish the session and compute its result.
    ///
    /// Idempotent: once a result exists it is returned unchanged. A session
    /// that already timed out keeps `TimeUp` as its end reason.
    pub fn submit(&mut self, at: DateTime<Utc>) -> &ExamResult {
        let ended_by = match self.status {
            SessionStatus::TimeUp => SessionEnd::TimeUp,
            _ => SessionEnd::Completed,
        };
        self.finish(ended_by, at)
    }

    /// Handle countdown expiry.
    ///
    /// Moves an in-progress session to `TimeUp`. With `auto_submit` the result
    /// is produced immediately; otherwise it waits for `submit`. Returns the
    /// result when this call produced it.
    pub fn expire(&mut self, at: DateTime<Utc>) -> Option<&ExamResult> {
        if self.status != SessionStatus::InProgress {
            return None;
        }
        self.status = SessionStatus::TimeUp;
        if self.config.auto_submit {
            Some(self.finish(SessionEnd::TimeUp, at))
        } else {
            None
        }
    }

    fn finish(&mut self, ended_by: SessionEnd, at: DateTime<Utc>) -> &ExamResult {
        let result = match self.result.take() {
            Some(cached) => cached,
            None => {
                if self.status == SessionStatus::InProgress {
                    self.status = SessionStatus::Completed;
                }
                self.build_result(ended_by, at)
            }
        };
        self.result.insert(result)
    }

    fn build_result(&self, ended_by: SessionEnd, completed_at: DateTime<Utc>) -> ExamResult {
        let answers: Vec<ExamAnswer> = self
            .questions
            .iter()
            .map(|q| {
                let selected = self.answers.get(&q.id).cloned().unwrap_or_default();
                let is_correct = !selected.is_empty() && q.is_correct(&selected);
                ExamAnswer {
                    question_id: q.id.clone(),
                    selected,
                    correct: q.correct_answer.clone(),
                    is_correct,
                }
            })
            .collect();
        let correct_count = answers.iter().filter(|a| a.is_correct).count();

        ExamResult {
            qualification_id: self.config.qualification_id.clone(),
            subject_id: self.config.subject_id.clone(),
            year: self.config.year,
            total_questions: answers.len(),
            correct_count,
            accuracy: accuracy_percent(correct_count as u64, answers.len() as u64),
            time_taken_secs: elapsed_secs(self.started_at, completed_at),
            answers,
            completed_at,
            ended_by,
        }
    }
}

impl fmt::Debug for ExamSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExamSession")
            .field("qualification_id", &self.config.qualification_id)
            .field("mode", &self.config.mode)
            .field("questions_len", &self.questions.len())
            .field("current", &self.current)
            .field("answers_len", &self.answers.len())
            .field("status", &self.status)
            .field("started_at", &self.started_at)
            .finish_non_exhaustive()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
