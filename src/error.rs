//! Error types for saliency computation.

use briny::prelude::ValidationError;
use thiserror::Error;

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while building inputs, running models or computing gradients.
///
/// No call recovers partially: any error means no gradients were produced.
#[derive(Error, Debug)]
pub enum Error {
    /// The image does not satisfy a precondition (e.g. batch size 1).
    #[error("invalid image: {0}")]
    InvalidImage(String),

    /// A label sequence does not have one label per image.
    #[error("label count mismatch: expected {expected} labels (one per image), got {got}")]
    LabelMismatch {
        /// Number of images in the batch.
        expected: usize,
        /// Number of labels supplied.
        got: usize,
    },

    /// A label indexes past the model's output width.
    #[error("label {label} is out of range for a model with {classes} outputs")]
    LabelOutOfRange {
        /// The offending label.
        label: usize,
        /// Width of the model output.
        classes: usize,
    },

    /// No enabled framework claims the model.
    #[error("`model` should belong to an enabled framework (channels-first or channels-last) instead of {type_name}")]
    UnsupportedModel {
        /// Concrete type name of the rejected model.
        type_name: &'static str,
    },

    /// An argument is outside its valid domain.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Tensor shapes are incompatible.
    #[error("shape mismatch: {0}")]
    Shape(String),

    /// A backward interceptor was misused.
    #[error("hook error: {0}")]
    Hook(String),

    /// Data rejected by validation.
    #[error("validation failed: {0}")]
    Validation(ValidationError),
}

impl From<ValidationError> for Error {
    fn from(err: ValidationError) -> Self {
        Self::Validation(err)
    }
}
