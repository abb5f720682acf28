use std::path::PathBuf;

use thiserror::Error;

/// Failures the pipeline needs to tell apart from plain I/O errors.
#[derive(Debug, Error)]
pub enum FinanceError {
    /// The roster workbook is absent: nothing can be linked, the run aborts.
    #[error("roster file not found: {}", .0.display())]
    MissingRoster(PathBuf),

    /// A persisted company key does not match any company of the roster.
    #[error("unknown company key in persisted store: {0}")]
    UnknownCompany(String),

    #[error("cannot determine fiscal year from file name: {}", .0.display())]
    InvalidFileName(PathBuf),

    #[error("missing sheet: {0}")]
    MissingSheet(String),
}
