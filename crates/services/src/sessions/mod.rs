mod plan;
mod progress;
mod queries;
mod service;
mod view;
mod workflow;

#[cfg(test)]
mod test_support;

// Public API of the session subsystem.
pub use crate::error::SessionError;
pub(crate) use queries::SessionQueries;
pub use plan::{SessionBuilder, SessionPlan};
pub use progress::SessionProgress;
pub use service::{AnswerOutcome, ExamSession};
pub use view::{QuestionView, SessionSnapshot};
pub use workflow::SessionController;
