use rand::Rng;
use rand::rng;
use rand::seq::SliceRandom;

use kakomon_core::model::{ExamConfig, Question};

/// Questions picked for one session, in presentation order.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionPlan {
    pub questions: Vec<Question>,
    /// Candidates left after the subject/year filters, before truncation.
    pub available: usize,
}

impl SessionPlan {
    #[must_use]
    pub fn total(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}

/// Applies an `ExamConfig`'s filters, shuffles and count limit to a question list.
pub struct SessionBuilder<'a> {
    config: &'a ExamConfig,
}

impl<'a> SessionBuilder<'a> {
    #[must_use]
    pub fn new(config: &'a ExamConfig) -> Self {
        Self { config }
    }

    /// Build with the thread-local RNG.
    pub fn build(self, questions: impl IntoIterator<Item = Question>) -> SessionPlan {
        self.build_with_rng(questions, &mut rng())
    }

    /// Build with a caller-supplied RNG (seeded in tests).
    ///
    /// Choice shuffling reorders choices only; labels travel with their text,
    /// so `correct_answer` stays valid.
    pub fn build_with_rng<R: Rng + ?Sized>(
        self,
        questions: impl IntoIterator<Item = Question>,
        rng: &mut R,
    ) -> SessionPlan {
        let config = self.config;
        let mut selected: Vec<Question> = questions
            .into_iter()
            .filter(|q| config.subject_id.as_ref().is_none_or(|s| &q.subject_id == s))
            .filter(|q| config.year.is_none_or(|y| q.year == y))
            .collect();
        let available = selected.len();

        if config.shuffle_questions {
            selected.shuffle(rng);
        }
        if let Some(count) = config.question_count {
            selected.truncate(count);
        }
        if config.shuffle_choices {
            for question in &mut selected {
                question.choices.shuffle(rng);
            }
        }

        SessionPlan {
            questions: selected,
            available,
        }
    }
}
