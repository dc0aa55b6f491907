mod app_settings;
mod exam;
mod ids;
mod progress;
mod qualification;
mod question;

pub use app_settings::{AppSettings, FontSize, Theme};
pub use exam::{
    DEFAULT_TIME_LIMIT_SECS, ExamAnswer, ExamConfig, ExamConfigError, ExamResult, SessionEnd,
    SessionMode, SessionPhase, SessionStatus, accuracy_percent, default_thresholds,
};
pub use ids::{QualificationId, QuestionId, SubjectId};
pub use progress::{
    AnswerRecord, LastSession, QualificationProgress, QuestionAnswer, SubjectProgress,
    UserProgress, YearProgress,
};
pub use qualification::{DEFAULT_EXAM_MINUTES, ExamTimeConfig, Qualification, Subject};
pub use question::{Choice, Explanation, Question, QuestionError, Reference};
