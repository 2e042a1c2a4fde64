//! Errors of the detection pipeline.
//!
//! Every error is terminal for the current forward pass. Each variant names
//! the scale where the failed check happened, or [MODEL_SCOPE] and
//! [MERGED_SCOPE] for model-wide and assembly-wide checks.

use model_config::ConfigError;
use ndarray::ShapeError;
use thiserror::Error;

/// Scope name of model-wide checks.
pub const MODEL_SCOPE: &str = "<model>";

/// Scope name of checks on the merged output.
pub const MERGED_SCOPE: &str = "<merged>";

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// The configuration cannot describe a valid model.
    #[error("invalid configuration for scale '{scale}': {error}")]
    Configuration { scale: String, error: ConfigError },

    #[error("invalid grid size {h}x{w} for scale '{scale}'")]
    InvalidGrid { scale: String, h: usize, w: usize },

    #[error("invalid feature map for scale '{scale}': {error}")]
    InvalidFeatureMap {
        scale: String,
        error: FeatureMapError,
    },

    #[error("invalid weight: {reason}")]
    InvalidWeight { reason: String },

    /// The head outputs and anchors disagree in size. It indicates that the
    /// order or the configuration of scales drifted between heads and
    /// anchor generators.
    #[error("shape mismatch at scale '{scale}': {what} is expected to be {expected}, but get {actual}")]
    ShapeMismatch {
        scale: String,
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Blocks that passed the shape checks still failed to concatenate.
    #[error("failed to concatenate {what} at scale '{scale}': {error}")]
    Concatenate {
        scale: String,
        what: &'static str,
        error: ShapeError,
    },
}

impl Error {
    pub(crate) fn config(scale: impl ToString, error: ConfigError) -> Self {
        Self::Configuration {
            scale: scale.to_string(),
            error,
        }
    }

    pub(crate) fn feature(scale: impl ToString, error: FeatureMapError) -> Self {
        Self::InvalidFeatureMap {
            scale: scale.to_string(),
            error,
        }
    }

    pub(crate) fn mismatch(
        scale: impl ToString,
        what: &'static str,
        expected: usize,
        actual: usize,
    ) -> Self {
        Self::ShapeMismatch {
            scale: scale.to_string(),
            what,
            expected,
            actual,
        }
    }

    pub(crate) fn concat(scale: impl ToString, what: &'static str, error: ShapeError) -> Self {
        Self::Concatenate {
            scale: scale.to_string(),
            what,
            error,
        }
    }
}

/// A tensor that cannot be used as a feature map.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeatureMapError {
    #[error("expect a 3-D tensor, but get {ndim} dimensions")]
    NotThreeDimensional { ndim: usize },
    #[error("the channel dimension is empty")]
    ZeroChannels,
    #[error("the spatial size {h}x{w} is empty")]
    EmptyGrid { h: usize, w: usize },
    #[error("expect {expected} channels, but get {actual}")]
    ChannelMismatch { expected: usize, actual: usize },
    #[error("expect a globally pooled 1x1 feature map, but get {h}x{w}")]
    NotPooled { h: usize, w: usize },
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{concatenate, Array2, Axis};

    #[test]
    fn concatenate_error_keeps_shape_error() {
        let lhs = Array2::<f32>::zeros((2, 8));
        let rhs = Array2::<f32>::zeros((3, 7));
        let error = concatenate(Axis(0), &[lhs.view(), rhs.view()])
            .map_err(|error| Error::concat(MERGED_SCOPE, "anchor blocks", error))
            .unwrap_err();

        match &error {
            Error::Concatenate { scale, what, .. } => {
                assert_eq!(scale, MERGED_SCOPE);
                assert_eq!(*what, "anchor blocks");
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert!(error.to_string().starts_with("failed to concatenate anchor blocks"));
    }
}
