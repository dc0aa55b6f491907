use serde::{Deserialize, Serialize};

use crate::model::ids::{QualificationId, SubjectId};

/// Fallback exam budget when a qualification has no exam config.
pub const DEFAULT_EXAM_MINUTES: u32 = 30;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub id: SubjectId,
    pub name: String,
}

/// Official exam format for one subject of a qualification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamTimeConfig {
    pub subject_id: SubjectId,
    pub time_minutes: u32,
    pub question_count: u32,
}

/// A certification program that owns a catalog of questions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Qualification {
    pub id: QualificationId,
    pub name: String,
    #[serde(default)]
    pub short_name: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub subjects: Vec<Subject>,
    #[serde(default)]
    pub exam_configs: Vec<ExamTimeConfig>,
    #[serde(default)]
    pub difficulty: u8,
}

impl Qualification {
    /// Time budget for a full exam, taken from the first exam config.
    #[must_use]
    pub fn exam_time_limit_secs(&self) -> u32 {
        let minutes = self
            .exam_configs
            .first()
            .map_or(DEFAULT_EXAM_MINUTES, |config| config.time_minutes);
        minutes.saturating_mul(60)
    }

    #[must_use]
    pub fn subject(&self, id: &SubjectId) -> Option<&Subject> {
        self.subjects.iter().find(|subject| &subject.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn qualification(configs: Vec<ExamTimeConfig>) -> Qualification {
        Qualification {
            id: QualificationId::new("A1"),
            name: "Electrician".into(),
            short_name: String::new(),
            category: "electrician".into(),
            subjects: vec![Subject {
                id: SubjectId::new("written"),
                name: "Written".into(),
            }],
            exam_configs: configs,
            difficulty: 2,
        }
    }

    #[test]
    fn time_limit_comes_from_first_config() {
        let q = qualification(vec![ExamTimeConfig {
            subject_id: SubjectId::new("written"),
            time_minutes: 120,
            question_count: 50,
        }]);
        assert_eq!(q.exam_time_limit_secs(), 7200);
    }

    #[test]
    fn missing_config_falls_back_to_thirty_minutes() {
        assert_eq!(qualification(Vec::new()).exam_time_limit_secs(), 1800);
    }
}
