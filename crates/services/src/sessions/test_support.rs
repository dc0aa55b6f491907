use kakomon_core::model::{Choice, Explanation, QualificationId, Question, QuestionId, SubjectId};

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

pub(crate) fn questions(qualification: &str, year: i32, count: u32) -> Vec<Question> {
    (1..=count).map(|n| question(qualification, year, n)).collect()
}
