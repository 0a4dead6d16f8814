// ⚠️ Analysis Errors - typed failures of the stats pipeline

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisError {
    /// The area filter matched no rows at all
    #[error("no rows for area {area:?}")]
    EmptySelection { area: String },

    /// Not enough rows left after forward-fill / drop to fit a line
    #[error("regression needs at least {needed} usable rows, got {rows}")]
    InsufficientData { rows: usize, needed: usize },

    /// log(price) has zero variance, so the slope is undefined
    #[error("design matrix is singular (log(price) is constant)")]
    SingularDesign,

    #[error("non-finite value in transformed column {column}")]
    NonFinite { column: &'static str },

    #[error("chart encoding failed: {0}")]
    Encoding(String),
}

pub type AnalysisResult<T> = std::result::Result<T, AnalysisError>;
