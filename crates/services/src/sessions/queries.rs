use kakomon_core::model::{
    AppSettings, DEFAULT_EXAM_MINUTES, ExamConfig, QualificationId, Question, QuestionId,
    SessionMode,
};
use storage::catalog::QuestionRepository;

use crate::error::SessionError;

/// Catalog-backed config and candidate resolution.
pub(crate) struct SessionQueries;

impl SessionQueries {
    /// Build a config for `mode` with the qualification's exam time budget
    /// and the visitor's preference flags applied.
    ///
    /// Qualifications with questions but no metadata get the default budget.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::UnknownQualification` if the catalog knows
    /// neither the qualification nor any of its questions.
    pub(crate) fn config_for(
        catalog: &dyn QuestionRepository,
        qualification_id: &QualificationId,
        mode: SessionMode,
        settings: &AppSettings,
    ) -> Result<ExamConfig, SessionError> {
        let time_limit = match catalog.qualification(qualification_id) {
            Some(qualification) => qualification.exam_time_limit_secs(),
            None if !catalog.question_counts(qualification_id).is_empty() => {
                DEFAULT_EXAM_MINUTES * 60
            }
            None => return Err(SessionError::UnknownQualification(qualification_id.clone())),
        };

        let mut config = ExamConfig::new(qualification_id.clone(), mode)
            .with_auto_submit(settings.auto_submit);
        if mode.is_timed() {
            config = config.with_time_limit(time_limit);
        }
        config.shuffle_choices = settings.shuffle_choices;
        Ok(config)
    }

    /// Candidate questions for a config, before its filters are applied.
    ///
    /// Weak review draws from `weak` in the given order, restricted to the
    /// configured qualification.
    pub(crate) fn candidates(
        catalog: &dyn QuestionRepository,
        config: &ExamConfig,
        weak: &[QuestionId],
    ) -> Vec<Question> {
        match config.mode {
            SessionMode::WeakReview => catalog
                .questions_by_ids(weak)
                .into_iter()
                .filter(|q| q.qualification_id == config.qualification_id)
                .collect(),
            SessionMode::Exam | SessionMode::Practice | SessionMode::Random => {
                catalog.questions(&config.qualification_id)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storage::catalog::StaticCatalog;

    fn catalog() -> std::sync::Arc<StaticCatalog> {
        StaticCatalog::embedded().unwrap()
    }

    #[test]
    fn exam_config_uses_qualification_time_budget() {
        let catalog = catalog();
        let qualification = catalog.qualifications().into_iter().next().unwrap();
        let config = SessionQueries::config_for(
            catalog.as_ref(),
            &qualification.id,
            SessionMode::Exam,
            &AppSettings::default(),
        )
        .unwrap();
        assert_eq!(config.time_limit_secs, qualification.exam_time_limit_secs());
        assert!(config.validate().is_ok());
        assert!(config.auto_submit);
    }

    #[test]
    fn settings_flags_flow_into_config() {
        let catalog = catalog();
        let qualification = catalog.qualifications().into_iter().next().unwrap();
        let settings = AppSettings {
            auto_submit: false,
            shuffle_choices: true,
            ..AppSettings::default()
        };
        let config =
            SessionQueries::config_for(catalog.as_ref(), &qualification.id, SessionMode::Practice, &settings)
                .unwrap();
        assert!(!config.auto_submit);
        assert!(config.shuffle_choices);
    }

    #[test]
    fn qualification_without_metadata_gets_default_budget() {
        let config = SessionQueries::config_for(
            catalog().as_ref(),
            &QualificationId::new("C2"),
            SessionMode::Exam,
            &AppSettings::default(),
        )
        .unwrap();
        assert_eq!(config.time_limit_secs, DEFAULT_EXAM_MINUTES * 60);
    }

    #[test]
    fn unknown_qualification_is_reported() {
        let err = SessionQueries::config_for(
            catalog().as_ref(),
            &QualificationId::new("ZZ"),
            SessionMode::Exam,
            &AppSettings::default(),
        )
        .unwrap_err();
        assert!(matches!(err, SessionError::UnknownQualification(_)));
    }

    #[test]
    fn weak_review_keeps_only_weak_questions_of_the_qualification() {
        let catalog = catalog();
        let b1 = catalog.questions(&QualificationId::new("B1"));
        let b2 = catalog.questions(&QualificationId::new("B2"));
        let weak = vec![
            b1[0].id.clone(),
            b2[0].id.clone(),
            QuestionId::new("missing"),
        ];

        let config = ExamConfig::new("B1", SessionMode::WeakReview);
        let picked = SessionQueries::candidates(catalog.as_ref(), &config, &weak);
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].id, b1[0].id);
    }
}
