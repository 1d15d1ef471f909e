//! Error taxonomy for image construction and the transform pipeline.

use std::fmt;

use crate::image::DataType;

/// Errors raised while building or converting an [`Image`](crate::image::Image).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ImageError {
    #[error("channel {channel} holds {actual} samples, expected {expected}")]
    BufferLength {
        channel: usize,
        expected: usize,
        actual: usize,
    },
    #[error("channel {channel} is {actual}, image is {expected}")]
    MixedDataTypes {
        channel: usize,
        expected: DataType,
        actual: DataType,
    },
    #[error("raw buffer holds {actual} bytes, expected {expected}")]
    RawLength { expected: usize, actual: usize },
    #[error("{channels}-channel {data_type} images have no display layout")]
    UnsupportedLayout { data_type: DataType, channels: usize },
}

/// The four failure classes a transform can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The image or the options were missing.
    NullInput,
    /// Dimensions or channel count outside what the transform supports.
    IncompatibleImage,
    /// An option outside its valid domain.
    InvalidParameter,
    /// Unexpected failure inside the numeric routine.
    AlgorithmFailure,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NullInput => write!(f, "null input"),
            Self::IncompatibleImage => write!(f, "incompatible image"),
            Self::InvalidParameter => write!(f, "invalid parameter"),
            Self::AlgorithmFailure => write!(f, "algorithm failure"),
        }
    }
}

/// Phase of a transform run in which an error was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    Validate,
    PreProcess,
    Compute,
    PostProcess,
    /// Checking the produced image against the transform's contract.
    Result,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validate => write!(f, "validate"),
            Self::PreProcess => write!(f, "pre-process"),
            Self::Compute => write!(f, "compute"),
            Self::PostProcess => write!(f, "post-process"),
            Self::Result => write!(f, "result check"),
        }
    }
}

/// A typed transform failure.
///
/// Concrete transforms build these with the per-kind constructors; the
/// execution boundary in [`crate::transform::base`] stamps the transform
/// name and step before the error reaches the caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} in {transform} ({step}): {message}")]
pub struct TransformError {
    pub kind: ErrorKind,
    pub message: String,
    /// Name of the transform that failed. Empty until stamped.
    pub transform: &'static str,
    pub step: Step,
}

impl TransformError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            transform: "",
            step: Step::Validate,
        }
    }

    pub fn null_input(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NullInput, message)
    }

    pub fn incompatible(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::IncompatibleImage, message)
    }

    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidParameter, message)
    }

    pub fn algorithm(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AlgorithmFailure, message)
    }

    /// Attach the transform name (unless one is already set) and the step.
    pub fn within(mut self, transform: &'static str, step: Step) -> Self {
        if self.transform.is_empty() {
            self.transform = transform;
        }
        self.step = step;
        self
    }
}

impl From<ImageError> for TransformError {
    fn from(err: ImageError) -> Self {
        Self::algorithm(err.to_string())
    }
}

pub type TransformResult<T> = Result<T, TransformError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_within_keeps_first_transform_name() {
        let err = TransformError::invalid_parameter("bad span")
            .within("x_diff", Step::Validate)
            .within("composite", Step::Compute);
        assert_eq!(err.transform, "x_diff");
        assert_eq!(err.step, Step::Compute);
    }

    #[test]
    fn test_display_includes_context() {
        let err =
            TransformError::incompatible("needs 3 channels").within("rgb_diffs", Step::Validate);
        assert_eq!(
            err.to_string(),
            "incompatible image in rgb_diffs (validate): needs 3 channels"
        );
    }

    #[test]
    fn test_image_error_becomes_algorithm_failure() {
        let err: TransformError = ImageError::RawLength { expected: 4, actual: 2 }.into();
        assert_eq!(err.kind, ErrorKind::AlgorithmFailure);
        assert!(err.message.contains("expected 4"));
    }
}
