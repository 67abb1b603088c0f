use thiserror::Error;

/// Errors surfaced by the storage layer and the bet pipeline.
#[derive(Error, Debug)]
pub enum DashboardError {
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Invalid bet record for match {match_id}: {reason}")]
    InvalidRecord { match_id: String, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type DashboardResult<T> = Result<T, DashboardError>;
