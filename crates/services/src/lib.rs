#![forbid(unsafe_code)]

pub mod app_services;
pub mod app_settings_service;
pub mod error;
pub mod observer;
mod persistence;
pub mod progress_service;
pub mod sessions;
pub mod timer;

pub use kakomon_core::Clock;
pub use sessions as session;

pub use app_services::AppServices;
pub use app_settings_service::AppSettingsService;
pub use error::{AppServicesError, SessionError};
pub use observer::{Listeners, Subscription};
pub use progress_service::ProgressService;
pub use timer::{ExamTimer, ExpiryCallback, TimerSnapshot};

pub use sessions::{
    AnswerOutcome, ExamSession, QuestionView, SessionBuilder, SessionController, SessionPlan,
    SessionProgress, SessionSnapshot,
};
