use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

use crate::model::ids::{QualificationId, QuestionId, SubjectId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question {id} has no choices")]
    NoChoices { id: QuestionId },

    #[error("question {id} has duplicate choice label {label:?}")]
    DuplicateLabel { id: QuestionId, label: String },

    #[error("question {id}: correct answer {answer:?} is not one of its choices")]
    UnknownCorrectAnswer { id: QuestionId, answer: String },

    #[error("question {id}: difficulty {value} is outside 1..=5")]
    InvalidDifficulty { id: QuestionId, value: u8 },
}

//
// ─── CHOICES & EXPLANATION ─────────────────────────────────────────────────────
//

/// A single selectable answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    pub label: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub title: String,
    pub url: String,
}

/// Explanation payload shown once a question is revealed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Explanation {
    pub summary: String,
    #[serde(default)]
    pub detailed_text: String,
    #[serde(default)]
    pub key_points: Vec<String>,
    #[serde(default)]
    pub references: Vec<Reference>,
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

/// A multiple-choice question from the static catalog.
///
/// Questions are immutable once loaded. Use [`Question::validate`] before
/// handing a question to a session; the catalog does this on load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: QuestionId,
    pub qualification_id: QualificationId,
    pub subject_id: SubjectId,
    #[serde(default)]
    pub subject_name: String,
    pub year: i32,
    /// Exam sitting within the year (first half, second half, ...).
    pub session: String,
    pub question_number: u32,
    pub text: String,
    pub choices: Vec<Choice>,
    pub correct_answer: String,
    #[serde(default)]
    pub explanation: Explanation,
    pub difficulty: u8,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub source: String,
}

impl Question {
    /// Check the structural invariants of a question.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` if there are no choices, labels repeat, the
    /// correct answer is not a choice label, or difficulty is outside 1..=5.
    pub fn validate(&self) -> Result<(), QuestionError> {
        if self.choices.is_empty() {
            return Err(QuestionError::NoChoices {
                id: self.id.clone(),
            });
        }

        let mut seen = HashSet::with_capacity(self.choices.len());
        for choice in &self.choices {
            if !seen.insert(choice.label.as_str()) {
                return Err(QuestionError::DuplicateLabel {
                    id: self.id.clone(),
                    label: choice.label.clone(),
                });
            }
        }

        if !seen.contains(self.correct_answer.as_str()) {
            return Err(QuestionError::UnknownCorrectAnswer {
                id: self.id.clone(),
                answer: self.correct_answer.clone(),
            });
        }

        if !(1..=5).contains(&self.difficulty) {
            return Err(QuestionError::InvalidDifficulty {
                id: self.id.clone(),
                value: self.difficulty,
            });
        }

        Ok(())
    }

    /// Year rendered the way progress buckets are keyed.
    #[must_use]
    pub fn year_label(&self) -> String {
        self.year.to_string()
    }

    #[must_use]
    pub fn is_correct(&self, label: &str) -> bool {
        self.correct_answer == label
    }

    #[must_use]
    pub fn choice(&self, label: &str) -> Option<&Choice> {
        self.choices.iter().find(|choice| choice.label == label)
    }
}

#[cfg(test)]
mod fixtures {
    use super::*;

    /// Four-choice question whose correct label is `"1"`.
    pub(crate) fn question(qualification: &str, year: i32, number: u32) -> Question {
        Question {
            id: QuestionId::new(format!("{qualification}-{year}-Q{number:02}")),
            qualification_id: QualificationId::new(qualification),
            subject_id: SubjectId::new("written"),
            subject_name: "Written".into(),
            year,
            session: "first-half".into(),
            question_number: number,
            text: format!("Question {number}"),
            choices: ["1", "2", "3", "4"]
                .into_iter()
                .map(|label| Choice {
                    label: label.into(),
                    text: format!("choice {label}"),
                })
                .collect(),
            correct_answer: "1".into(),
            explanation: Explanation::default(),
            difficulty: 2,
            category: "theory".into(),
            tags: Vec::new(),
            source: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::question;
    use super::*;

    #[test]
    fn valid_question_passes() {
        assert!(question("A1", 2024, 1).validate().is_ok());
    }

    #[test]
    fn correct_answer_must_be_a_choice() {
        let mut q = question("A1", 2024, 1);
        q.correct_answer = "9".into();
        assert!(matches!(
            q.validate(),
            Err(QuestionError::UnknownCorrectAnswer { .. })
        ));
    }

    #[test]
    fn duplicate_labels_are_rejected() {
        let mut q = question("A1", 2024, 1);
        q.choices[1].label = "1".into();
        assert!(matches!(
            q.validate(),
            Err(QuestionError::DuplicateLabel { .. })
        ));
    }

    #[test]
    fn difficulty_range_is_checked() {
        let mut q = question("A1", 2024, 1);
        q.difficulty = 0;
        assert!(matches!(
            q.validate(),
            Err(QuestionError::InvalidDifficulty { value: 0, .. })
        ));
    }

    #[test]
    fn deserializes_catalog_shape() {
        let raw = r#"{
            "id": "B1-2024-Q01", "qualificationId": "B1", "subjectId": "first",
            "year": 2024, "session": "first-half", "questionNumber": 1,
            "text": "?", "choices": [{"label": "1", "text": "a"}, {"label": "2", "text": "b"}],
            "correctAnswer": "2", "explanation": {"summary": "because"},
            "difficulty": 3
        }"#;
        let q: Question = serde_json::from_str(raw).unwrap();
        assert_eq!(q.year_label(), "2024");
        assert!(q.is_correct("2"));
        assert_eq!(q.explanation.summary, "because");
        assert!(q.validate().is_ok());
    }
}
