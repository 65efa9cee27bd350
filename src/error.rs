//! Error types for holdcv

use thiserror::Error;

/// Result type alias for tuning operations
pub type Result<T> = std::result::Result<T, TuneError>;

/// Main error type for the tuning core
#[derive(Error, Debug)]
pub enum TuneError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid hyperparameter: {name} = {value}, {reason}")]
    InvalidHyperparameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Data error: {0}")]
    DataError(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Optimization error: {0}")]
    OptimizationError(String),

    #[error("Thread pool error: {0}")]
    ThreadPoolError(String),

    #[error("Worker for {0} panicked")]
    WorkerPanicked(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl TuneError {
    /// Shorthand for a positivity / presence violation on a candidate value
    pub fn invalid_hyperparameter(
        name: impl Into<String>,
        value: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        TuneError::InvalidHyperparameter {
            name: name.into(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for TuneError {
    fn from(err: serde_json::Error) -> Self {
        TuneError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for TuneError {
    fn from(err: ndarray::ShapeError) -> Self {
        TuneError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}

impl From<rayon::ThreadPoolBuildError> for TuneError {
    fn from(err: rayon::ThreadPoolBuildError) -> Self {
        TuneError::ThreadPoolError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TuneError::ConfigError("end < begin".to_string());
        assert_eq!(err.to_string(), "Configuration error: end < begin");
    }

    #[test]
    fn test_invalid_hyperparameter_display() {
        let err = TuneError::invalid_hyperparameter("C", -0.5, "C <= 0");
        assert_eq!(err.to_string(), "Invalid hyperparameter: C = -0.5, C <= 0");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: TuneError = io_err.into();
        assert!(matches!(err, TuneError::IoError(_)));
    }
}
