use kakomon_core::model::{Question, SessionMode, SessionPhase, SessionStatus};

use super::progress::SessionProgress;
use super::service::ExamSession;
use crate::timer::TimerSnapshot;

/// Presentation-agnostic picture of a running session.
///
/// Correctness is only present once it may be shown: after a reveal in
/// practice-like modes, never during an exam.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub mode: SessionMode,
    pub status: SessionStatus,
    pub phase: SessionPhase,
    pub progress: SessionProgress,
    pub current: Option<QuestionView>,
    pub timer: Option<TimerSnapshot>,
}

/// The question under the cursor and the visitor's interaction with it.
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionView {
    pub index: usize,
    pub question: Question,
    pub selected: Option<String>,
    pub bookmarked: bool,
    /// `Some(is_correct)` once revealed.
    pub revealed: Option<bool>,
}

impl SessionSnapshot {
    pub(crate) fn of(session: &ExamSession, timer: Option<TimerSnapshot>) -> Self {
        let current = session.current_question().map(|question| {
            let selected = session.selected(&question.id).map(str::to_owned);
            let revealed = session
                .is_revealed(&question.id)
                .then(|| selected.as_deref().is_some_and(|s| question.is_correct(s)));
            QuestionView {
                index: session.current_index(),
                bookmarked: session.is_bookmarked(&question.id),
                question: question.clone(),
                selected,
                revealed,
            }
        });

        Self {
            mode: session.mode(),
            status: session.status(),
            phase: session.phase(),
            progress: session.progress(),
            current,
            timer,
        }
    }
}
