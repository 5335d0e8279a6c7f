//! Error types for model fitting and prediction.

use thiserror::Error;

/// Errors raised by the classifier implementations.
#[derive(Debug, Error, PartialEq)]
pub enum ModelError {
    /// No training rows were supplied.
    #[error("training set is empty")]
    EmptyTrainingSet,

    /// Feature rows and labels disagree in length.
    #[error("feature matrix has {rows} rows but {labels} labels were supplied")]
    LengthMismatch { rows: usize, labels: usize },

    /// A label index is outside the declared level set.
    #[error("label index {label} is out of range for {n_classes} classes")]
    LabelOutOfRange { label: usize, n_classes: usize },

    /// Fewer than two distinct classes are present.
    #[error("training labels contain {found} distinct class(es); at least 2 are required")]
    TooFewClasses { found: usize },

    /// A feature value is NaN or infinite.
    #[error("non-finite feature value at row {row}, column {col}")]
    NonFinite { row: usize, col: usize },

    /// A hyperparameter value is not usable by the model.
    #[error("invalid value {value} for hyperparameter '{name}'")]
    InvalidHyperparameter { name: &'static str, value: f64 },

    /// The underlying learning library rejected the data or failed to converge.
    #[error("{library}: {message}")]
    Backend {
        library: &'static str,
        message: String,
    },

    /// Prediction input does not have the width the model was trained on.
    #[error("model expects {expected} features, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}
