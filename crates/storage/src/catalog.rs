//! Read-only question catalog.
//!
//! The bundled catalog is compiled into the binary from `data/*.json` and
//! parsed once on first use.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, OnceLock};

use kakomon_core::model::{QualificationId, Qualification, Question, QuestionError, QuestionId};
use thiserror::Error;
use tracing::debug;

const EMBEDDED_QUESTIONS: &str = include_str!("../data/questions.json");
const EMBEDDED_QUALIFICATIONS: &str = include_str!("../data/qualifications.json");

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CatalogError {
    #[error("catalog is not valid JSON: {0}")]
    Parse(String),
    #[error(transparent)]
    InvalidQuestion(#[from] QuestionError),
    #[error("duplicate question id {0}")]
    DuplicateQuestion(QuestionId),
}

/// Lookup contract over the static question set.
///
/// Lookups never fail: unknown ids yield empty results.
pub trait QuestionRepository: Send + Sync {
    /// All questions of a qualification, newest year first, then by number.
    fn questions(&self, qualification_id: &QualificationId) -> Vec<Question>;

    /// Question count per year label (e.g. `"2024" -> 50`).
    fn question_counts(&self, qualification_id: &QualificationId) -> BTreeMap<String, usize>;

    fn question(&self, id: &QuestionId) -> Option<Question>;

    fn qualification(&self, id: &QualificationId) -> Option<Qualification>;

    fn qualifications(&self) -> Vec<Qualification>;

    /// Resolve ids in the given order, skipping unknown ones.
    fn questions_by_ids(&self, ids: &[QuestionId]) -> Vec<Question> {
        ids.iter().filter_map(|id| self.question(id)).collect()
    }
}

/// In-memory catalog grouped by qualification.
#[derive(Debug, Default)]
pub struct StaticCatalog {
    by_qualification: HashMap<QualificationId, Vec<Question>>,
    index: HashMap<QuestionId, (QualificationId, usize)>,
    qualifications: Vec<Qualification>,
}

impl StaticCatalog {
    /// Build a catalog from already-decoded records.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` if a question breaks its invariants or an id repeats.
    pub fn new(
        questions: Vec<Question>,
        qualifications: Vec<Qualification>,
    ) -> Result<Self, CatalogError> {
        let mut by_qualification: HashMap<QualificationId, Vec<Question>> = HashMap::new();
        let mut seen = std::collections::HashSet::with_capacity(questions.len());

        for question in questions {
            question.validate()?;
            if !seen.insert(question.id.clone()) {
                return Err(CatalogError::DuplicateQuestion(question.id));
            }
            by_qualification
                .entry(question.qualification_id.clone())
                .or_default()
                .push(question);
        }

        let mut index = HashMap::with_capacity(seen.len());
        for (qualification_id, list) in &mut by_qualification {
            list.sort_by(|a, b| {
                b.year
                    .cmp(&a.year)
                    .then(a.question_number.cmp(&b.question_number))
            });
            for (pos, question) in list.iter().enumerate() {
                index.insert(question.id.clone(), (qualification_id.clone(), pos));
            }
        }

        Ok(Self {
            by_qualification,
            index,
            qualifications,
        })
    }

    /// Decode a catalog from its JSON documents.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Parse` for malformed JSON, or any error from [`StaticCatalog::new`].
    pub fn from_json(questions: &str, qualifications: &str) -> Result<Self, CatalogError> {
        let questions: Vec<Question> =
            serde_json::from_str(questions).map_err(|e| CatalogError::Parse(e.to_string()))?;
        let qualifications: Vec<Qualification> = serde_json::from_str(qualifications)
            .map_err(|e| CatalogError::Parse(e.to_string()))?;
        Self::new(questions, qualifications)
    }

    /// The catalog bundled with the crate, parsed on first call.
    ///
    /// # Errors
    ///
    /// Returns the (cached) `CatalogError` if the bundled data is invalid.
    pub fn embedded() -> Result<Arc<Self>, CatalogError> {
        static EMBEDDED: OnceLock<Result<Arc<StaticCatalog>, CatalogError>> = OnceLock::new();
        EMBEDDED
            .get_or_init(|| {
                let catalog =
                    StaticCatalog::from_json(EMBEDDED_QUESTIONS, EMBEDDED_QUALIFICATIONS)?;
                debug!(
                    qualifications = catalog.by_qualification.len(),
                    questions = catalog.len(),
                    "loaded embedded catalog"
                );
                Ok(Arc::new(catalog))
            })
            .clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

impl QuestionRepository for StaticCatalog {
    fn questions(&self, qualification_id: &QualificationId) -> Vec<Question> {
        self.by_qualification
            .get(qualification_id)
            .cloned()
            .unwrap_or_default()
    }

    fn question_counts(&self, qualification_id: &QualificationId) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for question in self
            .by_qualification
            .get(qualification_id)
            .into_iter()
            .flatten()
        {
            *counts.entry(question.year_label()).or_insert(0) += 1;
        }
        counts
    }

    fn question(&self, id: &QuestionId) -> Option<Question> {
        let (qualification_id, pos) = self.index.get(id)?;
        self.by_qualification.get(qualification_id)?.get(*pos).cloned()
    }

    fn qualification(&self, id: &QualificationId) -> Option<Qualification> {
        self.qualifications.iter().find(|q| &q.id == id).cloned()
    }

    fn qualifications(&self) -> Vec<Qualification> {
        self.qualifications.clone()
    }
}
