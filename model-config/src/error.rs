//! Configuration errors.

use thiserror::Error;

/// A configuration value that cannot describe a valid detection model.
///
/// These errors are raised while the model is being constructed and are
/// never recovered from.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("scale name must not be empty")]
    EmptyScaleName,
    #[error("min_size must be positive, but get {min_size}")]
    NonPositiveMinSize { min_size: f64 },
    #[error("max_size ({max_size}) must be greater than min_size ({min_size})")]
    MaxSizeNotGreater { min_size: f64, max_size: f64 },
    #[error("aspect ratio must be positive, but get {ratio}")]
    NonPositiveAspectRatio { ratio: f64 },
    #[error("expect exactly 4 variances, but get {len}")]
    VariancesLength { len: usize },
    #[error("variance must be positive, but get {variance}")]
    NonPositiveVariance { variance: f64 },
    #[error("grid size must be positive, but get {h}x{w}")]
    NonPositiveGrid { h: usize, w: usize },
    #[error("invalid anchor size: {reason}")]
    InvalidBoxSize { reason: String },
    #[error("l2_norm_scale must be positive, but get {scale}")]
    NonPositiveNormScale { scale: f64 },
    #[error("num_classes must be positive")]
    ZeroClasses,
    #[error("input shape must have positive height, width and channels, but get {shape:?}")]
    InvalidInputShape { shape: [usize; 3] },
    #[error("at least one scale is required")]
    NoScales,
    #[error("scale name '{name}' is used more than once")]
    DuplicateScaleName { name: String },
}
