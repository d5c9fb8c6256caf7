use thiserror::Error;

#[derive(Error, Debug)]
pub enum RankingError {
    /// Structural misconfiguration. Always fatal for the run.
    #[error("Config invariant violated: {0}")]
    ConfigInvariant(String),

    #[error("Fetch failed: {0}")]
    FetchFailure(String),

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RankingError {
    /// True for errors that must abort the whole run rather than a single entity.
    pub fn is_fatal(&self) -> bool {
        matches!(self, RankingError::ConfigInvariant(_))
    }
}
