use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tracing::{debug, info};

use kakomon_core::Clock;
use kakomon_core::model::{
    ExamConfig, ExamResult, Question, QuestionId, SessionPhase, SessionStatus,
};

use super::service::{AnswerOutcome, ExamSession};
use super::view::SessionSnapshot;
use crate::error::SessionError;
use crate::observer::{Listeners, Subscription};
use crate::progress_service::ProgressService;
use crate::timer::{ExamTimer, TimerSnapshot};

type SharedSession = Arc<Mutex<Option<ExamSession>>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Drives one session at a time: countdown, answer recording and result
/// delivery.
///
/// Answers are written to the progress ledger as they are accepted, in every
/// mode. Practice-like modes also move the "continue" pointer.
pub struct SessionController {
    clock: Clock,
    progress: Option<Arc<ProgressService>>,
    session: SharedSession,
    timer: Mutex<Option<ExamTimer>>,
    results: Listeners<ExamResult>,
    statuses: Listeners<SessionStatus>,
}

impl SessionController {
    #[must_use]
    pub fn new(clock: Clock) -> Self {
        Self {
            clock,
            progress: None,
            session: Arc::new(Mutex::new(None)),
            timer: Mutex::new(None),
            results: Listeners::new(),
            statuses: Listeners::new(),
        }
    }

    #[must_use]
    pub fn with_progress(mut self, progress: Arc<ProgressService>) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Replace any current session with a new one and, in exam mode, start
    /// its countdown.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` if the config is invalid or no question is left
    /// after filtering; the previous session is discarded either way.
    pub fn start(
        &self,
        config: ExamConfig,
        questions: impl IntoIterator<Item = Question>,
    ) -> Result<SessionSnapshot, SessionError> {
        self.teardown();

        let timed = config.mode.is_timed();
        let (limit, warning, critical) = (
            config.time_limit_secs,
            config.warning_threshold_secs,
            config.critical_threshold_secs,
        );
        let session = ExamSession::start(config, questions, self.clock.now())?;
        info!(
            qualification_id = %session.config().qualification_id,
            mode = ?session.mode(),
            questions = session.questions().len(),
            "session started"
        );
        let timer = timed.then(|| {
            ExamTimer::new(limit, warning, critical).on_expire(self.expiry_handler())
        });

        let snapshot = SessionSnapshot::of(&session, timer.as_ref().map(ExamTimer::snapshot));
        *lock(&self.session) = Some(session);
        if let Some(timer) = timer {
            timer.start();
            *lock(&self.timer) = Some(timer);
        }
        self.statuses.notify(&SessionStatus::InProgress);
        Ok(snapshot)
    }

    fn expiry_handler(&self) -> impl Fn() + Send + Sync + 'static {
        let session: Weak<Mutex<Option<ExamSession>>> = Arc::downgrade(&self.session);
        let clock = self.clock;
        let results = self.results.clone();
        let statuses = self.statuses.clone();
        move || {
            let Some(session) = session.upgrade() else {
                return;
            };
            let (status, produced) = {
                let mut guard = lock(&session);
                let Some(session) = guard.as_mut() else {
                    return;
                };
                let produced = session.expire(clock.now()).cloned();
                (session.status(), produced)
            };
            info!(auto_submitted = produced.is_some(), "time up");
            statuses.notify(&status);
            if let Some(result) = produced {
                results.notify(&result);
            }
        }
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        lock(&self.session)
            .as_ref()
            .map_or(SessionStatus::NotStarted, ExamSession::status)
    }

    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.status().phase()
    }

    #[must_use]
    pub fn snapshot(&self) -> Option<SessionSnapshot> {
        let timer = self.timer_snapshot();
        lock(&self.session)
            .as_ref()
            .map(|session| SessionSnapshot::of(session, timer))
    }

    /// The session's question sequence, in presentation order.
    #[must_use]
    pub fn questions(&self) -> Vec<Question> {
        lock(&self.session)
            .as_ref()
            .map(|s| s.questions().to_vec())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn result(&self) -> Option<ExamResult> {
        lock(&self.session)
            .as_ref()
            .and_then(|s| s.result().cloned())
    }

    /// Select an answer and record it in the progress ledger.
    pub async fn answer(&self, question_id: &QuestionId, label: &str) -> AnswerOutcome {
        let now = self.clock.now();
        let (outcome, record, pointer) = {
            let mut guard = lock(&self.session);
            let Some(session) = guard.as_mut() else {
                debug!(question_id = %question_id, "answer ignored: no session");
                return AnswerOutcome::Ignored;
            };
            let (outcome, record) = session.answer_with_record(question_id, label, now);
            let pointer = (session.mode().reveals_on_answer() && record.is_some())
                .then(|| session.current_index());
            (outcome, record, pointer)
        };

        if let (Some(progress), Some(record)) = (&self.progress, record) {
            let (qualification_id, subject_id, year) = (
                record.qualification_id.clone(),
                record.subject_id.clone(),
                record.year.clone(),
            );
            progress.record_answer(record).await;
            if let Some(index) = pointer {
                progress
                    .set_last_session(qualification_id, subject_id, year, index)
                    .await;
            }
        }
        outcome
    }

    /// Move to `index` (clamped). `None` without a session.
    pub fn go_to(&self, index: usize) -> Option<usize> {
        lock(&self.session).as_mut().map(|s| s.go_to(index))
    }

    pub fn next(&self) -> Option<usize> {
        lock(&self.session).as_mut().map(ExamSession::next)
    }

    pub fn prev(&self) -> Option<usize> {
        lock(&self.session).as_mut().map(ExamSession::prev)
    }

    /// Toggle a session-local bookmark.
    pub fn toggle_bookmark(&self, question_id: &QuestionId) -> bool {
        lock(&self.session)
            .as_mut()
            .is_some_and(|s| s.toggle_bookmark(question_id))
    }

    /// Finish the session. Returns the (possibly cached) result, or `None`
    /// without a session.
    pub fn submit(&self) -> Option<ExamResult> {
        let (result, fresh, status) = {
            let mut guard = lock(&self.session);
            let session = guard.as_mut()?;
            let fresh = session.result().is_none();
            let result = session.submit(self.clock.now()).clone();
            (result, fresh, session.status())
        };
        self.cancel_timer();
        if fresh {
            info!(
                correct = result.correct_count,
                total = result.total_questions,
                accuracy = result.accuracy,
                "session submitted"
            );
            self.statuses.notify(&status);
            self.results.notify(&result);
        }
        Some(result)
    }

    //
    // ─── TIMER ─────────────────────────────────────────────────────────────────
    //

    #[must_use]
    pub fn timer_snapshot(&self) -> Option<TimerSnapshot> {
        lock(&self.timer).as_ref().map(ExamTimer::snapshot)
    }

    #[must_use]
    pub fn formatted_time(&self) -> Option<String> {
        lock(&self.timer).as_ref().map(ExamTimer::formatted)
    }

    pub fn pause_timer(&self) -> bool {
        lock(&self.timer).as_ref().is_some_and(ExamTimer::pause)
    }

    pub fn resume_timer(&self) -> bool {
        if self.status() != SessionStatus::InProgress {
            return false;
        }
        lock(&self.timer).as_ref().is_some_and(ExamTimer::resume)
    }

    /// Tick updates for the current session's countdown, if it has one.
    pub fn subscribe_timer(
        &self,
        listener: impl Fn(&TimerSnapshot) + Send + Sync + 'static,
    ) -> Option<Subscription> {
        lock(&self.timer).as_ref().map(|t| t.subscribe(listener))
    }

    fn cancel_timer(&self) {
        if let Some(timer) = lock(&self.timer).as_ref() {
            timer.cancel();
        }
    }

    //
    // ─── LIFECYCLE ─────────────────────────────────────────────────────────────
    //

    /// Called once per session with its result.
    pub fn subscribe_result(
        &self,
        listener: impl Fn(&ExamResult) + Send + Sync + 'static,
    ) -> Subscription {
        self.results.subscribe(listener)
    }

    pub fn subscribe_status(
        &self,
        listener: impl Fn(&SessionStatus) + Send + Sync + 'static,
    ) -> Subscription {
        self.statuses.subscribe(listener)
    }

    /// Cancel the countdown and discard the session.
    pub fn teardown(&self) {
        if let Some(timer) = lock(&self.timer).take() {
            timer.cancel();
        }
        if lock(&self.session).take().is_some() {
            debug!("session torn down");
        }
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl fmt::Debug for SessionController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionController")
            .field("status", &self.status())
            .field("timer", &self.timer_snapshot())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sessions::test_support::questions;
    use kakomon_core::model::SessionEnd;
    use kakomon_core::time::fixed_clock;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn id(n: u32) -> QuestionId {
        QuestionId::new(format!("A1-2024-Q{n:02}"))
    }

    #[test]
    fn starts_not_started() {
        let controller = SessionController::new(fixed_clock());
        assert_eq!(controller.status(), SessionStatus::NotStarted);
        assert_eq!(controller.phase(), SessionPhase::Setup);
        assert!(controller.submit().is_none());
        assert_eq!(controller.go_to(3), None);
    }

    #[test]
    fn empty_start_stays_in_setup() {
        let controller = SessionController::new(fixed_clock());
        let err = controller.start(ExamConfig::practice("A1"), Vec::new()).unwrap_err();
        assert!(matches!(err, SessionError::NoQuestions));
        assert_eq!(controller.phase(), SessionPhase::Setup);
    }

    #[tokio::test]
    async fn practice_has_no_timer() {
        let controller = SessionController::new(fixed_clock());
        controller
            .start(ExamConfig::practice("A1"), questions("A1", 2024, 3))
            .unwrap();
        assert!(controller.timer_snapshot().is_none());
        assert!(!controller.pause_timer());
        assert!(matches!(
            controller.answer(&id(1), "1").await,
            AnswerOutcome::Revealed { is_correct: true, .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn submit_freezes_timer_and_notifies_once() {
        let controller = SessionController::new(fixed_clock());
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let _sub = controller.subscribe_result(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        controller
            .start(ExamConfig::exam("A1").with_time_limit(60), questions("A1", 2024, 3))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(5_500)).await;
        assert_eq!(controller.timer_snapshot().unwrap().remaining, 55);

        let first = controller.submit().unwrap();
        let second = controller.submit().unwrap();
        assert_eq!(first, second);
        assert_eq!(first.ended_by, SessionEnd::Completed);
        assert_eq!(controller.status(), SessionStatus::Completed);

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(controller.timer_snapshot().unwrap().remaining, 55);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!controller.resume_timer());
    }

    #[tokio::test(start_paused = true)]
    async fn expiry_without_auto_submit_waits_for_submit() {
        let controller = SessionController::new(fixed_clock());
        let config = ExamConfig::exam("A1").with_time_limit(10).with_auto_submit(false);
        controller.start(config, questions("A1", 2024, 2)).unwrap();

        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(controller.status(), SessionStatus::TimeUp);
        assert!(controller.result().is_none());
        assert_eq!(controller.answer(&id(1), "1").await, AnswerOutcome::Ignored);

        let result = controller.submit().unwrap();
        assert_eq!(result.ended_by, SessionEnd::TimeUp);
        assert_eq!(controller.phase(), SessionPhase::Result);
    }

    #[tokio::test(start_paused = true)]
    async fn teardown_cancels_the_countdown() {
        let controller = SessionController::new(fixed_clock());
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let _sub = controller.subscribe_result(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        controller
            .start(ExamConfig::exam("A1").with_time_limit(5), questions("A1", 2024, 2))
            .unwrap();

        controller.teardown();
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(controller.status(), SessionStatus::NotStarted);
        assert!(controller.timer_snapshot().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn restart_replaces_previous_session() {
        let controller = SessionController::new(fixed_clock());
        controller
            .start(ExamConfig::exam("A1").with_time_limit(5), questions("A1", 2024, 2))
            .unwrap();
        controller.answer(&id(1), "1").await;

        let snapshot = controller
            .start(ExamConfig::practice("A1"), questions("A1", 2024, 4))
            .unwrap();
        assert_eq!(snapshot.progress.total, 4);
        assert_eq!(snapshot.progress.answered, 0);
        assert!(snapshot.timer.is_none());

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(controller.status(), SessionStatus::InProgress);
    }
}
