use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info};
use uuid::Uuid;

use kakomon_core::Clock;
use kakomon_core::model::{
    AnswerRecord, LastSession, QualificationId, QuestionId, SubjectId, UserProgress,
};
use storage::documents::{LAST_SESSION_KEY, PROGRESS_KEY};
use storage::repository::KeyValueStore;

use crate::observer::{Listeners, Subscription};
use crate::persistence::Persistence;

struct ProgressState {
    progress: UserProgress,
    last_session: Option<LastSession>,
    loaded: bool,
}

/// Durable per-visitor answer ledger.
///
/// Mutations update memory first and then persist before returning; storage
/// failures are logged and never reach the caller. Writes are applied one at a
/// time, in call order.
pub struct ProgressService {
    clock: Clock,
    persistence: Persistence,
    state: Mutex<ProgressState>,
    listeners: Listeners<UserProgress>,
}

impl ProgressService {
    #[must_use]
    pub fn new(clock: Clock, documents: Arc<dyn KeyValueStore>) -> Self {
        Self {
            clock,
            persistence: Persistence::new(documents),
            state: Mutex::new(ProgressState {
                progress: UserProgress::default(),
                last_session: None,
                loaded: false,
            }),
            listeners: Listeners::new(),
        }
    }

    fn state(&self) -> MutexGuard<'_, ProgressState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Read persisted progress, assigning a visitor id on first run.
    ///
    /// Mutations made before this call load first, so a fresh instance never
    /// writes its empty default over stored progress.
    pub async fn load(&self) {
        let _writer = self.persistence.writer().await;
        self.load_stored().await;
    }

    async fn ensure_loaded(&self) {
        if !self.is_loaded() {
            self.load_stored().await;
        }
    }

    async fn load_stored(&self) {
        let stored: Option<UserProgress> = self.persistence.load(PROGRESS_KEY).await;
        let last_session: Option<LastSession> = self.persistence.load(LAST_SESSION_KEY).await;

        let mut progress = stored.unwrap_or_default();
        progress.dedupe();
        let assigned = progress.visitor_id().is_empty();
        if assigned {
            progress.set_visitor_id(Uuid::new_v4().to_string());
        }
        info!(
            visitor_id = progress.visitor_id(),
            qualifications = progress.qualifications().len(),
            "progress loaded"
        );

        let snapshot = {
            let mut state = self.state();
            state.progress = progress;
            state.last_session = last_session;
            state.loaded = true;
            state.progress.clone()
        };
        if assigned {
            self.persistence.save(PROGRESS_KEY, &snapshot).await;
        }
        self.listeners.notify(&snapshot);
    }

    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.state().loaded
    }

    /// Whether storage failed and writes are now kept in memory only.
    #[must_use]
    pub fn is_memory_only(&self) -> bool {
        self.persistence.is_degraded()
    }

    #[must_use]
    pub fn snapshot(&self) -> UserProgress {
        self.state().progress.clone()
    }

    #[must_use]
    pub fn visitor_id(&self) -> String {
        self.state().progress.visitor_id().to_owned()
    }

    /// Upsert the answer for `record.question_id`.
    pub async fn record_answer(&self, record: AnswerRecord) {
        let now = self.clock.now();
        debug!(
            qualification_id = %record.qualification_id,
            question_id = %record.question_id,
            is_correct = record.is_correct,
            "recording answer"
        );
        self.mutate(|progress| progress.record_answer(record, now))
            .await;
    }

    /// Returns whether the question is bookmarked afterwards.
    pub async fn toggle_bookmark(&self, question_id: &QuestionId) -> bool {
        self.mutate(|progress| progress.toggle_bookmark(question_id))
            .await
    }

    /// Record how many questions the catalog has for a year bucket.
    pub async fn set_questions_total(
        &self,
        qualification_id: &QualificationId,
        subject_id: &SubjectId,
        year: &str,
        total: u32,
    ) {
        let now = self.clock.now();
        self.mutate(|progress| {
            progress.set_questions_total(qualification_id, subject_id, year, total, now);
        })
        .await;
    }

    /// Accuracy percent over all recorded answers, or one qualification's.
    #[must_use]
    pub fn accuracy(&self, qualification_id: Option<&QualificationId>) -> u32 {
        self.state().progress.accuracy(qualification_id)
    }

    #[must_use]
    pub fn total_answered(&self) -> u64 {
        self.state().progress.total_answered()
    }

    #[must_use]
    pub fn total_correct(&self) -> u64 {
        self.state().progress.total_correct()
    }

    #[must_use]
    pub fn weak_questions(&self) -> Vec<QuestionId> {
        self.state().progress.weak_questions().to_vec()
    }

    #[must_use]
    pub fn bookmarks(&self) -> Vec<QuestionId> {
        self.state().progress.bookmarks().to_vec()
    }

    #[must_use]
    pub fn is_bookmarked(&self, question_id: &QuestionId) -> bool {
        self.state().progress.is_bookmarked(question_id)
    }

    #[must_use]
    pub fn is_weak(&self, question_id: &QuestionId) -> bool {
        self.state().progress.is_weak(question_id)
    }

    //
    // ─── LAST SESSION ──────────────────────────────────────────────────────────
    //

    #[must_use]
    pub fn last_session(&self) -> Option<LastSession> {
        self.state().last_session.clone()
    }

    pub async fn set_last_session(
        &self,
        qualification_id: QualificationId,
        subject_id: SubjectId,
        year: String,
        question_index: usize,
    ) {
        let _writer = self.persistence.writer().await;
        self.ensure_loaded().await;
        let pointer = LastSession {
            qualification_id,
            subject_id,
            year,
            question_index,
            timestamp: self.clock.now(),
        };
        self.state().last_session = Some(pointer.clone());
        self.persistence.save(LAST_SESSION_KEY, &pointer).await;
    }

    pub async fn clear_last_session(&self) {
        let _writer = self.persistence.writer().await;
        self.ensure_loaded().await;
        self.state().last_session = None;
        self.persistence.remove(LAST_SESSION_KEY).await;
    }

    /// Wipe answers, statistics, bookmarks and the last-session pointer.
    ///
    /// The visitor id survives.
    pub async fn reset_progress(&self) {
        let _writer = self.persistence.writer().await;
        self.ensure_loaded().await;
        let snapshot = {
            let mut state = self.state();
            let visitor_id = state.progress.visitor_id().to_owned();
            state.progress = UserProgress::new(visitor_id);
            state.last_session = None;
            state.progress.clone()
        };
        info!("progress reset");
        self.persistence.save(PROGRESS_KEY, &snapshot).await;
        self.persistence.remove(LAST_SESSION_KEY).await;
        self.listeners.notify(&snapshot);
    }

    /// Write the current state again. Nothing is written before a load.
    pub async fn flush(&self) {
        let _writer = self.persistence.writer().await;
        let (progress, last_session) = {
            let state = self.state();
            if !state.loaded {
                return;
            }
            (state.progress.clone(), state.last_session.clone())
        };
        self.persistence.save(PROGRESS_KEY, &progress).await;
        if let Some(pointer) = last_session {
            self.persistence.save(LAST_SESSION_KEY, &pointer).await;
        }
    }

    /// Flush and drop all listeners.
    pub async fn close(&self) {
        self.flush().await;
        self.listeners.clear();
    }

    /// Called with the new state after every change.
    pub fn subscribe(
        &self,
        listener: impl Fn(&UserProgress) + Send + Sync + 'static,
    ) -> Subscription {
        self.listeners.subscribe(listener)
    }

    async fn mutate<R>(&self, change: impl FnOnce(&mut UserProgress) -> R) -> R {
        let _writer = self.persistence.writer().await;
        self.ensure_loaded().await;
        let (out, snapshot) = {
            let mut state = self.state();
            let out = change(&mut state.progress);
            (out, state.progress.clone())
        };
        self.persistence.save(PROGRESS_KEY, &snapshot).await;
        self.listeners.notify(&snapshot);
        out
    }
}

impl fmt::Debug for ProgressService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        f.debug_struct("ProgressService")
            .field("visitor_id", &state.progress.visitor_id())
            .field("loaded", &state.loaded)
            .field("memory_only", &self.persistence.is_degraded())
            .finish_non_exhaustive()
    }
}
