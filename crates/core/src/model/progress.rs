use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use crate::model::exam::accuracy_percent;
use crate::model::ids::{QualificationId, QuestionId, SubjectId};

//
// ─── LEDGER ENTRIES ────────────────────────────────────────────────────────────
//

/// Latest answer recorded for one question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionAnswer {
    pub selected_answer: String,
    pub is_correct: bool,
    pub attempt_count: u32,
    pub last_attempt_at: DateTime<Utc>,
}

/// Statistics for one (qualification, subject, year) bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YearProgress {
    pub questions_total: u32,
    pub questions_answered: u32,
    pub questions_correct: u32,
    pub last_attempt_at: DateTime<Utc>,
    pub time_spent_seconds: u64,
    #[serde(default)]
    pub answers: BTreeMap<QuestionId, QuestionAnswer>,
}

impl YearProgress {
    fn empty(at: DateTime<Utc>) -> Self {
        Self {
            questions_total: 0,
            questions_answered: 0,
            questions_correct: 0,
            last_attempt_at: at,
            time_spent_seconds: 0,
            answers: BTreeMap::new(),
        }
    }

    fn recount(&mut self) {
        self.questions_answered = count_u32(self.answers.len());
        self.questions_correct = count_u32(self.answers.values().filter(|a| a.is_correct).count());
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectProgress {
    #[serde(default)]
    pub years: BTreeMap<String, YearProgress>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualificationProgress {
    #[serde(default)]
    pub subjects: BTreeMap<SubjectId, SubjectProgress>,
    pub overall_accuracy: u32,
    pub total_time_spent: u64,
    pub last_studied_at: DateTime<Utc>,
}

impl QualificationProgress {
    fn empty(at: DateTime<Utc>) -> Self {
        Self {
            subjects: BTreeMap::new(),
            overall_accuracy: 0,
            total_time_spent: 0,
            last_studied_at: at,
        }
    }

    fn years(&self) -> impl Iterator<Item = &YearProgress> {
        self.subjects.values().flat_map(|subject| subject.years.values())
    }
}

/// One answer to fold into the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerRecord {
    pub qualification_id: QualificationId,
    pub subject_id: SubjectId,
    pub year: String,
    pub question_id: QuestionId,
    pub selected: String,
    pub is_correct: bool,
    pub time_spent_secs: u64,
}

//
// ─── USER PROGRESS ─────────────────────────────────────────────────────────────
//

/// Durable per-visitor study ledger.
///
/// `weak_questions` holds a question iff its most recent answer was wrong.
/// Both it and `bookmarks` are ordered sets: insertion order is kept and
/// duplicates are never written.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProgress {
    #[serde(default)]
    visitor_id: String,
    #[serde(default)]
    qualifications: BTreeMap<QualificationId, QualificationProgress>,
    #[serde(default)]
    weak_questions: Vec<QuestionId>,
    #[serde(default)]
    bookmarks: Vec<QuestionId>,
}

impl UserProgress {
    #[must_use]
    pub fn new(visitor_id: impl Into<String>) -> Self {
        Self {
            visitor_id: visitor_id.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn visitor_id(&self) -> &str {
        &self.visitor_id
    }

    pub fn set_visitor_id(&mut self, visitor_id: impl Into<String>) {
        self.visitor_id = visitor_id.into();
    }

    #[must_use]
    pub fn qualifications(&self) -> &BTreeMap<QualificationId, QualificationProgress> {
        &self.qualifications
    }

    #[must_use]
    pub fn qualification(&self, id: &QualificationId) -> Option<&QualificationProgress> {
        self.qualifications.get(id)
    }

    #[must_use]
    pub fn year(
        &self,
        qualification_id: &QualificationId,
        subject_id: &SubjectId,
        year: &str,
    ) -> Option<&YearProgress> {
        self.qualifications
            .get(qualification_id)?
            .subjects
            .get(subject_id)?
            .years
            .get(year)
    }

    #[must_use]
    pub fn weak_questions(&self) -> &[QuestionId] {
        &self.weak_questions
    }

    #[must_use]
    pub fn bookmarks(&self) -> &[QuestionId] {
        &self.bookmarks
    }

    #[must_use]
    pub fn is_bookmarked(&self, question_id: &QuestionId) -> bool {
        self.bookmarks.contains(question_id)
    }

    #[must_use]
    pub fn is_weak(&self, question_id: &QuestionId) -> bool {
        self.weak_questions.contains(question_id)
    }

    /// Upsert one answer into its bucket, creating buckets on demand.
    ///
    /// Re-answering overwrites the selection and bumps `attempt_count` without
    /// counting the question as answered a second time.
    pub fn record_answer(&mut self, record: AnswerRecord, at: DateTime<Utc>) {
        let qualification = self
            .qualifications
            .entry(record.qualification_id)
            .or_insert_with(|| QualificationProgress::empty(at));
        let year = qualification
            .subjects
            .entry(record.subject_id)
            .or_default()
            .years
            .entry(record.year)
            .or_insert_with(|| YearProgress::empty(at));

        year.answers
            .entry(record.question_id.clone())
            .and_modify(|answer| {
                answer.selected_answer.clone_from(&record.selected);
                answer.is_correct = record.is_correct;
                answer.attempt_count = answer.attempt_count.saturating_add(1);
                answer.last_attempt_at = at;
            })
            .or_insert_with(|| QuestionAnswer {
                selected_answer: record.selected.clone(),
                is_correct: record.is_correct,
                attempt_count: 1,
                last_attempt_at: at,
            });
        year.recount();
        year.time_spent_seconds = year.time_spent_seconds.saturating_add(record.time_spent_secs);
        year.last_attempt_at = at;

        qualification.total_time_spent = qualification
            .total_time_spent
            .saturating_add(record.time_spent_secs);
        qualification.last_studied_at = at;
        let (correct, total) = tally(qualification.years());
        qualification.overall_accuracy = accuracy_percent(correct, total);

        if record.is_correct {
            self.weak_questions.retain(|id| id != &record.question_id);
        } else if !self.weak_questions.contains(&record.question_id) {
            self.weak_questions.push(record.question_id);
        }
    }

    /// Flip bookmark membership; returns whether the question is now bookmarked.
    pub fn toggle_bookmark(&mut self, question_id: &QuestionId) -> bool {
        if let Some(pos) = self.bookmarks.iter().position(|id| id == question_id) {
            self.bookmarks.remove(pos);
            false
        } else {
            self.bookmarks.push(question_id.clone());
            true
        }
    }

    /// Store the catalog size of a bucket so completion can be shown.
    pub fn set_questions_total(
        &mut self,
        qualification_id: &QualificationId,
        subject_id: &SubjectId,
        year: &str,
        total: u32,
        at: DateTime<Utc>,
    ) {
        let bucket = self
            .qualifications
            .entry(qualification_id.clone())
            .or_insert_with(|| QualificationProgress::empty(at))
            .subjects
            .entry(subject_id.clone())
            .or_default()
            .years
            .entry(year.to_owned())
            .or_insert_with(|| YearProgress::empty(at));
        bucket.questions_total = total;
    }

    /// Percent of recorded answers whose latest attempt was correct,
    /// for one qualification or across all of them.
    #[must_use]
    pub fn accuracy(&self, qualification_id: Option<&QualificationId>) -> u32 {
        let (correct, total) = match qualification_id {
            Some(id) => self
                .qualifications
                .get(id)
                .map_or((0, 0), |q| tally(q.years())),
            None => tally(self.qualifications.values().flat_map(|q| q.years())),
        };
        accuracy_percent(correct, total)
    }

    #[must_use]
    pub fn total_answered(&self) -> u64 {
        self.all_years().map(|y| u64::from(y.questions_answered)).sum()
    }

    #[must_use]
    pub fn total_correct(&self) -> u64 {
        self.all_years().map(|y| u64::from(y.questions_correct)).sum()
    }

    /// Drop duplicate entries from the set-typed lists, keeping first occurrences.
    pub fn dedupe(&mut self) {
        dedupe_in_place(&mut self.weak_questions);
        dedupe_in_place(&mut self.bookmarks);
    }

    fn all_years(&self) -> impl Iterator<Item = &YearProgress> {
        self.qualifications.values().flat_map(|q| q.years())
    }
}

fn tally<'a>(years: impl Iterator<Item = &'a YearProgress>) -> (u64, u64) {
    years
        .flat_map(|year| year.answers.values())
        .fold((0, 0), |(correct, total), answer| {
            (correct + u64::from(answer.is_correct), total + 1)
        })
}

fn dedupe_in_place(ids: &mut Vec<QuestionId>) {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.retain(|id| seen.insert(id.clone()));
}

fn count_u32(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

//
// ─── LAST SESSION ──────────────────────────────────────────────────────────────
//

/// Where the visitor last left off, for a "continue" shortcut.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastSession {
    pub qualification_id: QualificationId,
    pub subject_id: SubjectId,
    pub year: String,
    pub question_index: usize,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    fn answer(question: &str, selected: &str, is_correct: bool) -> AnswerRecord {
        AnswerRecord {
            qualification_id: QualificationId::new("A1"),
            subject_id: SubjectId::new("written"),
            year: "2024".into(),
            question_id: QuestionId::new(question),
            selected: selected.into(),
            is_correct,
            time_spent_secs: 10,
        }
    }

    fn bucket(progress: &UserProgress) -> &YearProgress {
        progress
            .year(&QualificationId::new("A1"), &SubjectId::new("written"), "2024")
            .unwrap()
    }

    #[test]
    fn re_answering_counts_once() {
        let mut progress = UserProgress::new("visitor");
        progress.record_answer(answer("q1", "2", false), fixed_now());
        progress.record_answer(answer("q1", "1", true), fixed_now());

        let year = bucket(&progress);
        assert_eq!(year.questions_answered, 1);
        assert_eq!(year.questions_correct, 1);
        assert_eq!(year.time_spent_seconds, 20);
        let entry = &year.answers[&QuestionId::new("q1")];
        assert_eq!(entry.attempt_count, 2);
        assert_eq!(entry.selected_answer, "1");
        assert!(entry.is_correct);
    }

    #[test]
    fn correct_count_tracks_latest_answers() {
        let mut progress = UserProgress::default();
        progress.record_answer(answer("q1", "1", true), fixed_now());
        progress.record_answer(answer("q1", "1", true), fixed_now());
        assert_eq!(bucket(&progress).questions_correct, 1);

        progress.record_answer(answer("q1", "3", false), fixed_now());
        assert_eq!(bucket(&progress).questions_correct, 0);
    }

    #[test]
    fn weak_list_follows_last_answer() {
        let mut progress = UserProgress::default();
        let q1 = QuestionId::new("q1");

        progress.record_answer(answer("q1", "2", false), fixed_now());
        progress.record_answer(answer("q1", "3", false), fixed_now());
        assert_eq!(progress.weak_questions(), &[q1.clone()]);

        progress.record_answer(answer("q1", "1", true), fixed_now());
        assert!(!progress.is_weak(&q1));

        progress.record_answer(answer("q1", "4", false), fixed_now());
        assert!(progress.is_weak(&q1));
    }

    #[test]
    fn accuracy_per_qualification_and_global() {
        let mut progress = UserProgress::default();
        progress.record_answer(answer("q1", "1", true), fixed_now());
        progress.record_answer(answer("q2", "1", true), fixed_now());
        progress.record_answer(answer("q3", "2", false), fixed_now());

        let a1 = QualificationId::new("A1");
        assert_eq!(progress.accuracy(Some(&a1)), 67);
        assert_eq!(progress.accuracy(None), 67);
        assert_eq!(progress.accuracy(Some(&QualificationId::new("Z9"))), 0);
        assert_eq!(progress.qualification(&a1).unwrap().overall_accuracy, 67);
        assert_eq!(progress.total_answered(), 3);
        assert_eq!(progress.total_correct(), 2);
    }

    #[test]
    fn bookmark_toggles() {
        let mut progress = UserProgress::default();
        let q = QuestionId::new("q1");
        assert!(progress.toggle_bookmark(&q));
        assert!(progress.is_bookmarked(&q));
        assert!(!progress.toggle_bookmark(&q));
        assert!(progress.bookmarks().is_empty());
    }

    #[test]
    fn dedupe_keeps_first_occurrence() {
        let raw = r#"{"visitorId":"v","weakQuestions":["a","b","a"],"bookmarks":["c","c"]}"#;
        let mut progress: UserProgress = serde_json::from_str(raw).unwrap();
        progress.dedupe();
        assert_eq!(
            progress.weak_questions(),
            &[QuestionId::new("a"), QuestionId::new("b")]
        );
        assert_eq!(progress.bookmarks(), &[QuestionId::new("c")]);
    }

    #[test]
    fn questions_total_is_kept_across_answers() {
        let mut progress = UserProgress::default();
        let a1 = QualificationId::new("A1");
        let written = SubjectId::new("written");
        progress.set_questions_total(&a1, &written, "2024", 50, fixed_now());
        progress.record_answer(answer("q1", "1", true), fixed_now());
        assert_eq!(bucket(&progress).questions_total, 50);
        assert_eq!(bucket(&progress).questions_answered, 1);
    }
}
