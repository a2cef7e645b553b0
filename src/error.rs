//! Error types for stacking, partitioning and model fitting.
//!
//! Two layers of errors exist:
//! - [`ModelError`]: raised by an [`Estimator`](crate::model::Estimator) or
//!   [`Predictor`](crate::model::Predictor) implementation.
//! - [`StackingError`]: raised by the library's own operations. Model failures
//!   surface here wrapped in [`StackingError::PredictorFailure`] together with
//!   the fold index and the phase that failed.

use std::fmt;
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T, E = StackingError> = std::result::Result<T, E>;

/// Phase of a fold iteration in which a model failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Fitting on the fold's training rows.
    Fit,
    /// Predicting the fold's validation rows or the test matrix.
    Predict,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Fit => write!(f, "fit"),
            Phase::Predict => write!(f, "predict"),
        }
    }
}

/// Reason a fold partition does not cover the training rows exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartitionDefect {
    /// The partition contains no folds.
    Empty,
    /// A training row is not present in any validation slice.
    MissingIndex(usize),
    /// A training row appears in more than one validation slice.
    DuplicateIndex(usize),
    /// An index (train or validation) is outside `0..n_samples`.
    IndexOutOfRange { fold: usize, index: usize, n_samples: usize },
    /// A fold trains on a row it also validates on.
    TrainValidationOverlap { fold: usize, index: usize },
}

impl fmt::Display for PartitionDefect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartitionDefect::Empty => write!(f, "partition has no folds"),
            PartitionDefect::MissingIndex(i) => {
                write!(f, "row {} is not in any validation slice", i)
            }
            PartitionDefect::DuplicateIndex(i) => {
                write!(f, "row {} is in more than one validation slice", i)
            }
            PartitionDefect::IndexOutOfRange {
                fold,
                index,
                n_samples,
            } => write!(
                f,
                "fold {} references row {} but only {} rows exist",
                fold, index, n_samples
            ),
            PartitionDefect::TrainValidationOverlap { fold, index } => write!(
                f,
                "fold {} has row {} in both its train and validation slices",
                fold, index
            ),
        }
    }
}

/// Errors raised by estimators and fitted predictors.
#[derive(Error, Debug)]
pub enum ModelError {
    /// Input data is unusable (empty, mismatched lengths, non-finite values).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Prediction input has a different feature count than the fitted data.
    #[error("Feature mismatch: expected {expected} features, got {got}")]
    FeatureMismatch { expected: usize, got: usize },

    /// A hyper-parameter is outside its valid domain.
    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    /// Training diverged or produced non-finite values.
    #[error("Numerical error: {0}")]
    NumericalError(String),

    /// Fitted parameters could not be written or read.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<std::io::Error> for ModelError {
    fn from(err: std::io::Error) -> Self {
        ModelError::Serialization(err.to_string())
    }
}

impl From<bincode::Error> for ModelError {
    fn from(err: bincode::Error) -> Self {
        ModelError::Serialization(err.to_string())
    }
}

/// Errors raised by the stacking library.
#[derive(Error, Debug)]
pub enum StackingError {
    /// Row or column counts disagree between matrices, vectors or partitions.
    #[error("Shape mismatch in {context}: expected {expected}, got {got}")]
    ShapeMismatch {
        context: &'static str,
        expected: usize,
        got: usize,
    },

    /// The fold partition is not an exact cover of the training rows.
    #[error("Incomplete partition: {0}")]
    IncompletePartition(PartitionDefect),

    /// The underlying model failed while processing a fold.
    #[error("Predictor failed during {phase} on fold {fold}: {source}")]
    PredictorFailure {
        fold: usize,
        phase: Phase,
        #[source]
        source: ModelError,
    },

    /// A configuration or hyper-parameter value is invalid.
    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    /// Data required by an operation is empty.
    #[error("Empty data: {0}")]
    EmptyData(String),

    /// A CSV cell could not be parsed as a number.
    #[error("Cannot parse '{value}' in column '{column}' at record {record}")]
    Parse {
        record: usize,
        column: String,
        value: String,
    },

    /// Every tuning trial failed.
    #[error("No successful trial for model '{model}' after {trials} trials")]
    NoSuccessfulTrial { model: String, trials: usize },

    /// Model error outside of a fold loop (e.g. fitting the second layer).
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl StackingError {
    pub(crate) fn invalid_parameter(name: impl Into<String>, reason: impl Into<String>) -> Self {
        StackingError::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

impl ModelError {
    pub(crate) fn invalid_parameter(name: impl Into<String>, reason: impl Into<String>) -> Self {
        ModelError::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }
}
