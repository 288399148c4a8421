use thiserror::Error;

/// The single failure kind of the analytics engines.
///
/// Degenerate numeric cases (zero variance, constant series, empty input)
/// are not errors; they resolve to neutral values documented on each
/// operation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl AnalysisError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        AnalysisError::InvalidInput(msg.into())
    }
}

pub type AnalysisResult<T> = Result<T, AnalysisError>;
