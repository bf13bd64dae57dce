use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Calculation error: {0}")]
    CalculationError(String),

    #[error("Provider error: {0}")]
    ProviderError(String),

    #[error("{context}: too few symbols succeeded, missing [{}]", .missing.join(", "))]
    BatchFailed {
        context: String,
        missing: Vec<String>,
    },
}
