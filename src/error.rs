//! Error type shared by the loader, the aggregates, and the registry queries.

use thiserror::Error;

/// Errors that can occur while loading listings or querying statistics.
#[derive(Debug, Error)]
pub enum RaterError {
    /// A listing row is missing a required field or a field does not parse.
    #[error("Malformed row {row}: {reason}")]
    MalformedRow {
        /// 1-based data row index; 0 refers to the header.
        row: u64,
        /// Description of what went wrong.
        reason: String,
    },

    /// A name that is not one of the reference neighbourhoods.
    #[error("Unknown neighbourhood: {0}")]
    UnknownNeighbourhood(String),

    /// An average was requested for a neighbourhood with no listings.
    #[error("Average undefined for neighbourhood with no listings: {0}")]
    DivisionUndefined(String),

    /// CSV reading or writing failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// I/O error (file read/write).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing or serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RaterError {
    pub(crate) fn malformed(row: u64, reason: impl Into<String>) -> Self {
        Self::MalformedRow {
            row,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, RaterError>;
