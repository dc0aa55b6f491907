use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::info;

use kakomon_core::model::{ExamConfig, QualificationId, Question, SessionMode, SubjectId};
use storage::catalog::{QuestionRepository, StaticCatalog};
use storage::{Storage, StorageConfig};

use crate::Clock;
use crate::app_settings_service::AppSettingsService;
use crate::error::{AppServicesError, SessionError};
use crate::progress_service::ProgressService;
use crate::sessions::{SessionController, SessionQueries, SessionSnapshot};

/// Assembles the catalog and the stores, loaded and ready to use.
#[derive(Clone)]
pub struct AppServices {
    clock: Clock,
    catalog: Arc<dyn QuestionRepository>,
    progress: Arc<ProgressService>,
    settings: Arc<AppSettingsService>,
}

impl AppServices {
    /// Build services over the backend selected by `config` and the bundled catalog.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if the storage backend cannot be opened or
    /// the bundled catalog is invalid.
    pub async fn from_config(config: &StorageConfig, clock: Clock) -> Result<Self, AppServicesError> {
        let storage = Storage::from_config(config).await?;
        let catalog: Arc<dyn QuestionRepository> = StaticCatalog::embedded()?;
        Ok(Self::with_parts(storage, catalog, clock).await)
    }

    /// Build services over in-memory storage and the bundled catalog.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError::Catalog` if the bundled catalog is invalid.
    pub async fn in_memory(clock: Clock) -> Result<Self, AppServicesError> {
        Self::from_config(&StorageConfig::memory(), clock).await
    }

    /// Wire services from explicit parts and load both stores.
    pub async fn with_parts(storage: Storage, catalog: Arc<dyn QuestionRepository>, clock: Clock) -> Self {
        let progress = Arc::new(ProgressService::new(clock, Arc::clone(&storage.documents)));
        let settings = Arc::new(AppSettingsService::new(Arc::clone(&storage.documents)));
        progress.load().await;
        settings.load().await;
        info!(
            qualifications = catalog.qualifications().len(),
            "services ready"
        );

        Self {
            clock,
            catalog,
            progress,
            settings,
        }
    }

    #[must_use]
    pub fn clock(&self) -> Clock {
        self.clock
    }

    #[must_use]
    pub fn catalog(&self) -> Arc<dyn QuestionRepository> {
        Arc::clone(&self.catalog)
    }

    #[must_use]
    pub fn progress(&self) -> Arc<ProgressService> {
        Arc::clone(&self.progress)
    }

    #[must_use]
    pub fn settings(&self) -> Arc<AppSettingsService> {
        Arc::clone(&self.settings)
    }

    /// A controller that records answers into this visitor's progress.
    #[must_use]
    pub fn session_controller(&self) -> SessionController {
        SessionController::new(self.clock).with_progress(Arc::clone(&self.progress))
    }

    /// Default config for `mode`: the qualification's exam budget plus the
    /// current preference flags.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::UnknownQualification` for ids missing from the catalog.
    pub fn session_config(
        &self,
        qualification_id: &QualificationId,
        mode: SessionMode,
    ) -> Result<ExamConfig, SessionError> {
        SessionQueries::config_for(
            self.catalog.as_ref(),
            qualification_id,
            mode,
            &self.settings.get(),
        )
    }

    /// Resolve candidates from the catalog (weak questions for weak review)
    /// and start `controller` on them.
    ///
    /// The catalog size of every year bucket the session touches is stored in
    /// progress so completion can be shown.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` if the config is invalid or nothing matches it.
    pub async fn start_session(
        &self,
        controller: &SessionController,
        config: ExamConfig,
    ) -> Result<SessionSnapshot, SessionError> {
        let weak = self.progress.weak_questions();
        let candidates = SessionQueries::candidates(self.catalog.as_ref(), &config, &weak);
        let qualification_id = config.qualification_id.clone();
        let snapshot = controller.start(config, candidates)?;

        let sizes = self.bucket_sizes(&qualification_id);
        let mut touched: Vec<(SubjectId, String)> = controller
            .questions()
            .iter()
            .map(|q| (q.subject_id.clone(), q.year_label()))
            .collect();
        touched.sort();
        touched.dedup();
        for bucket in touched {
            if let Some(total) = sizes.get(&bucket) {
                let (subject_id, year) = &bucket;
                self.progress
                    .set_questions_total(&qualification_id, subject_id, year, *total)
                    .await;
            }
        }
        Ok(snapshot)
    }

    /// Globally bookmarked questions that still exist in the catalog.
    #[must_use]
    pub fn bookmarked_questions(&self) -> Vec<Question> {
        self.catalog.questions_by_ids(&self.progress.bookmarks())
    }

    /// Flush progress and drop its listeners.
    pub async fn shutdown(&self) {
        self.progress.close().await;
        info!("services shut down");
    }

    fn bucket_sizes(&self, qualification_id: &QualificationId) -> BTreeMap<(SubjectId, String), u32> {
        let mut sizes = BTreeMap::new();
        for question in self.catalog.questions(qualification_id) {
            *sizes
                .entry((question.subject_id.clone(), question.year_label()))
                .or_insert(0) += 1;
        }
        sizes
    }
}
