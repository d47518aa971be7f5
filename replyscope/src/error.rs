//! Error types for replyscope
//!
//! Each stage has its own error enum; [`PipelineError`] is what a run reports.

use crate::cloud::RenderError;
use crate::services::reply_fetcher::FetchError;
use crate::services::tabular_store::PersistenceError;
use thiserror::Error;

/// Run-level error
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Fetch stage failed
    #[error("Query failed: {0}")]
    Fetch(#[from] FetchError),

    /// Fetch succeeded but the user has no replies
    #[error("No replies found for {0}")]
    NoRecords(String),

    /// Writing or reading the reply table failed
    #[error("Saving replies failed: {0}")]
    Persistence(#[from] PersistenceError),

    /// Word cloud stage failed
    #[error("Word cloud failed: {0}")]
    Render(#[from] RenderError),

    /// Another run of the same orchestrator is in flight
    #[error("A run is already in progress")]
    AlreadyRunning,

    /// A blocking worker panicked or was cancelled
    #[error("Worker task failed: {0}")]
    Worker(String),

    /// Shared configuration error
    #[error(transparent)]
    Common(#[from] replyscope_common::Error),
}

impl PipelineError {
    /// Whether the run failed while collecting replies
    pub fn is_fetch_failure(&self) -> bool {
        matches!(self, PipelineError::Fetch(_) | PipelineError::NoRecords(_))
    }
}

/// Result type for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;
