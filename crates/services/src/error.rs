//! Shared error types for the services crate.

use thiserror::Error;

use kakomon_core::model::{ExamConfigError, QualificationId};
use storage::catalog::CatalogError;
use storage::sqlite::SqliteInitError;

/// Errors emitted when a session cannot be started.
///
/// Everything after a successful start is infallible: calls that are not
/// valid in the current state are ignored instead of reported.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error("no questions available for session")]
    NoQuestions,
    #[error("unknown qualification {0}")]
    UnknownQualification(QualificationId),
    #[error(transparent)]
    Config(#[from] ExamConfigError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}
