//! Per-scale anchor configuration.

use crate::{
    common::*,
    error::ConfigError,
    misc::{GridSize, ScaleName},
};

pub use scale_config::*;
pub use scale_spec::*;

/// Default per-coordinate variances `[cx, cy, w, h]`.
pub const DEFAULT_VARIANCES: [f64; 4] = [0.1, 0.1, 0.2, 0.2];

mod scale_config {
    use super::*;

    /// The raw, unchecked configuration of one detection scale.
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct ScaleConfig {
        pub name: String,
        /// Base anchor edge length in input pixels.
        pub min_size: R64,
        /// Enables the extra square anchor of edge `sqrt(min_size * max_size)`.
        #[serde(default)]
        pub max_size: Option<R64>,
        /// Ratio 1 is implied and may be omitted.
        ///
        /// With `flip` on, every ratio also yields its reciprocal. Listing both
        /// `2` and `0.5` therefore produces the same two shapes twice.
        #[serde(default)]
        pub aspect_ratios: Vec<R64>,
        #[serde(default = "default_variances")]
        pub variances: Vec<R64>,
        #[serde(default = "default_true")]
        pub flip: bool,
        #[serde(default = "default_true")]
        pub clip: bool,
        /// Initial per-channel scale of the L2 normalization applied to this
        /// scale's feature map. Normalization is disabled if unset.
        #[serde(default)]
        pub l2_norm_scale: Option<R64>,
        /// Average-pool the feature map down to a single cell before
        /// prediction and anchor generation.
        #[serde(default)]
        pub global_pool: bool,
        /// The expected feature map grid.
        #[serde(default)]
        pub grid: Option<GridSize>,
    }

    impl ScaleConfig {
        /// Create a configuration with default values except the name and `min_size`.
        pub fn new(name: impl Into<String>, min_size: f64) -> Self {
            Self {
                name: name.into(),
                min_size: r64(min_size),
                max_size: None,
                aspect_ratios: vec![],
                variances: default_variances(),
                flip: true,
                clip: true,
                l2_norm_scale: None,
                global_pool: false,
                grid: None,
            }
        }
    }

    fn default_variances() -> Vec<R64> {
        DEFAULT_VARIANCES.iter().cloned().map(r64).collect()
    }

    fn default_true() -> bool {
        true
    }
}

mod scale_spec {
    use super::*;

    /// The validated and immutable configuration of one detection scale.
    #[derive(Debug, Clone, PartialEq, Getters, CopyGetters, Serialize, Deserialize)]
    #[serde(try_from = "ScaleConfig", into = "ScaleConfig")]
    pub struct ScaleSpec {
        #[getset(get = "pub")]
        name: ScaleName,
        #[getset(get_copy = "pub")]
        min_size: R64,
        #[getset(get_copy = "pub")]
        max_size: Option<R64>,
        /// Distinct ratios other than 1, in configured order.
        #[getset(get = "pub")]
        aspect_ratios: Vec<R64>,
        #[getset(get_copy = "pub")]
        variances: [R64; 4],
        #[getset(get_copy = "pub")]
        flip: bool,
        #[getset(get_copy = "pub")]
        clip: bool,
        #[getset(get_copy = "pub")]
        l2_norm_scale: Option<R64>,
        #[getset(get_copy = "pub")]
        global_pool: bool,
        #[getset(get_copy = "pub")]
        grid: Option<GridSize>,
        /// Per-cell anchor sizes in pixels, in generation order.
        #[getset(get = "pub")]
        box_sizes: Vec<HW<f64>>,
    }

    impl ScaleSpec {
        pub fn new(config: ScaleConfig) -> Result<Self, ConfigError> {
            let ScaleConfig {
                name,
                min_size,
                max_size,
                aspect_ratios,
                variances,
                flip,
                clip,
                l2_norm_scale,
                global_pool,
                grid,
            } = config;

            let name = ScaleName::new(name)?;

            if !is_positive_finite(min_size) {
                return Err(ConfigError::NonPositiveMinSize {
                    min_size: min_size.raw(),
                });
            }

            if let Some(max_size) = max_size {
                if !max_size.raw().is_finite() || max_size <= min_size {
                    return Err(ConfigError::MaxSizeNotGreater {
                        min_size: min_size.raw(),
                        max_size: max_size.raw(),
                    });
                }
            }

            if let Some(&ratio) = aspect_ratios
                .iter()
                .find(|&&ratio| !is_positive_finite(ratio))
            {
                return Err(ConfigError::NonPositiveAspectRatio { ratio: ratio.raw() });
            }
            let aspect_ratios: Vec<_> = aspect_ratios
                .into_iter()
                .filter(|&ratio| ratio != 1.0)
                .unique()
                .collect();

            let variances: [R64; 4] = match variances.as_slice() {
                &[cx, cy, w, h] => [cx, cy, w, h],
                _ => {
                    return Err(ConfigError::VariancesLength {
                        len: variances.len(),
                    })
                }
            };
            if let Some(&variance) = variances
                .iter()
                .find(|&&variance| !is_positive_finite(variance))
            {
                return Err(ConfigError::NonPositiveVariance {
                    variance: variance.raw(),
                });
            }

            if let Some(scale) = l2_norm_scale {
                if !is_positive_finite(scale) {
                    return Err(ConfigError::NonPositiveNormScale { scale: scale.raw() });
                }
            }

            let box_sizes = enumerate_box_sizes(min_size, max_size, &aspect_ratios, flip)
                .map_err(|err| ConfigError::InvalidBoxSize {
                    reason: err.to_string(),
                })?;

            Ok(Self {
                name,
                min_size,
                max_size,
                aspect_ratios,
                variances,
                flip,
                clip,
                l2_norm_scale,
                global_pool,
                grid,
                box_sizes,
            })
        }

        /// The number of anchors generated at every grid cell.
        pub fn num_boxes_per_cell(&self) -> usize {
            self.box_sizes.len()
        }
    }

    impl TryFrom<ScaleConfig> for ScaleSpec {
        type Error = ConfigError;

        fn try_from(from: ScaleConfig) -> Result<Self, Self::Error> {
            Self::new(from)
        }
    }

    impl From<ScaleSpec> for ScaleConfig {
        fn from(from: ScaleSpec) -> Self {
            let ScaleSpec {
                name,
                min_size,
                max_size,
                aspect_ratios,
                variances,
                flip,
                clip,
                l2_norm_scale,
                global_pool,
                grid,
                ..
            } = from;

            Self {
                name: name.as_str().to_owned(),
                min_size,
                max_size,
                aspect_ratios,
                variances: variances.to_vec(),
                flip,
                clip,
                l2_norm_scale,
                global_pool,
                grid,
            }
        }
    }

    /// Enumerate the anchor sizes of one grid cell.
    ///
    /// The order is fixed: the `min_size` square, the geometric-mean square
    /// if `max_size` is set, then each aspect ratio in configured order,
    /// directly followed by its transpose when flipping is enabled.
    fn enumerate_box_sizes(
        min_size: R64,
        max_size: Option<R64>,
        aspect_ratios: &[R64],
        flip: bool,
    ) -> anyhow::Result<Vec<HW<f64>>> {
        let min_size = min_size.raw();
        let mut sizes = vec![HW::square(min_size)?];

        if let Some(max_size) = max_size {
            sizes.push(HW::square((min_size * max_size.raw()).sqrt())?);
        }

        for ratio in aspect_ratios {
            let size = HW::from_aspect_ratio(min_size, ratio.raw())?;
            sizes.push(size);
            if flip {
                sizes.push(size.transpose());
            }
        }

        Ok(sizes)
    }

    fn is_positive_finite(value: R64) -> bool {
        value.raw().is_finite() && value > 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn ratios(values: &[f64]) -> Vec<R64> {
        values.iter().cloned().map(r64).collect()
    }

    #[test]
    fn scale_boxes_per_cell() {
        let with_max = ScaleConfig {
            max_size: Some(r64(114.0)),
            aspect_ratios: ratios(&[2.0, 3.0]),
            ..ScaleConfig::new("fc7", 60.0)
        };
        let spec = ScaleSpec::new(with_max.clone()).unwrap();
        assert_eq!(spec.num_boxes_per_cell(), 1 + 1 + 2 * 2);

        let spec = ScaleSpec::new(ScaleConfig {
            flip: false,
            ..with_max.clone()
        })
        .unwrap();
        assert_eq!(spec.num_boxes_per_cell(), 1 + 1 + 2);

        let spec = ScaleSpec::new(ScaleConfig {
            max_size: None,
            ..with_max
        })
        .unwrap();
        assert_eq!(spec.num_boxes_per_cell(), 1 + 2 * 2);
    }

    #[test]
    fn scale_drops_unit_and_repeated_ratios() {
        let spec = ScaleSpec::new(ScaleConfig {
            aspect_ratios: ratios(&[1.0, 2.0, 3.0, 2.0]),
            ..ScaleConfig::new("s", 30.0)
        })
        .unwrap();
        assert_eq!(spec.aspect_ratios(), &ratios(&[2.0, 3.0]));
        assert_eq!(spec.num_boxes_per_cell(), 5);
        assert_eq!(spec.box_sizes().len(), spec.num_boxes_per_cell());
    }

    #[test]
    fn scale_keeps_reciprocal_ratios() {
        let spec = ScaleSpec::new(ScaleConfig {
            aspect_ratios: ratios(&[2.0, 0.5]),
            ..ScaleConfig::new("s", 30.0)
        })
        .unwrap();
        assert_eq!(spec.aspect_ratios(), &ratios(&[2.0, 0.5]));
        assert_eq!(spec.num_boxes_per_cell(), 5);

        // the flipped 2 and the plain 0.5 give the same shape
        let sizes = spec.box_sizes();
        assert_abs_diff_eq!(sizes[2].w(), sizes[3].w(), epsilon = 1e-9);
        assert_abs_diff_eq!(sizes[2].h(), sizes[3].h(), epsilon = 1e-9);
    }

    #[test]
    fn scale_box_sizes_order() {
        let spec = ScaleSpec::new(ScaleConfig {
            max_size: Some(r64(120.0)),
            aspect_ratios: ratios(&[4.0]),
            ..ScaleConfig::new("s", 30.0)
        })
        .unwrap();
        let sizes = spec.box_sizes();
        assert_eq!(sizes.len(), 4);

        // square
        assert_abs_diff_eq!(sizes[0].w(), 30.0);
        assert_abs_diff_eq!(sizes[0].h(), 30.0);

        // geometric mean of 30 and 120
        assert_abs_diff_eq!(sizes[1].w(), 60.0, epsilon = 1e-9);
        assert_abs_diff_eq!(sizes[1].h(), 60.0, epsilon = 1e-9);

        // ratio 4, then its transpose
        assert_abs_diff_eq!(sizes[2].w(), 60.0, epsilon = 1e-9);
        assert_abs_diff_eq!(sizes[2].h(), 15.0, epsilon = 1e-9);
        assert_abs_diff_eq!(sizes[3].w(), 15.0, epsilon = 1e-9);
        assert_abs_diff_eq!(sizes[3].h(), 60.0, epsilon = 1e-9);
    }

    #[test]
    fn scale_rejects_invalid_values() {
        assert_eq!(
            ScaleSpec::new(ScaleConfig::new("s", 0.0)),
            Err(ConfigError::NonPositiveMinSize { min_size: 0.0 })
        );
        assert_eq!(
            ScaleSpec::new(ScaleConfig {
                max_size: Some(r64(30.0)),
                ..ScaleConfig::new("s", 30.0)
            }),
            Err(ConfigError::MaxSizeNotGreater {
                min_size: 30.0,
                max_size: 30.0
            })
        );
        assert_eq!(
            ScaleSpec::new(ScaleConfig {
                aspect_ratios: ratios(&[2.0, -0.5]),
                ..ScaleConfig::new("s", 30.0)
            }),
            Err(ConfigError::NonPositiveAspectRatio { ratio: -0.5 })
        );
        assert_eq!(
            ScaleSpec::new(ScaleConfig {
                variances: ratios(&[0.1, 0.1, 0.2]),
                ..ScaleConfig::new("s", 30.0)
            }),
            Err(ConfigError::VariancesLength { len: 3 })
        );
        assert_eq!(
            ScaleSpec::new(ScaleConfig {
                variances: ratios(&[0.1, 0.0, 0.2, 0.2]),
                ..ScaleConfig::new("s", 30.0)
            }),
            Err(ConfigError::NonPositiveVariance { variance: 0.0 })
        );
        assert_eq!(
            ScaleSpec::new(ScaleConfig::new("", 30.0)),
            Err(ConfigError::EmptyScaleName)
        );
    }

    #[test]
    fn scale_defaults_from_json5() {
        let spec: ScaleSpec = json5::from_str("{ name: 'conv4_3_norm', min_size: 30.0 }").unwrap();
        assert_eq!(spec.name().as_str(), "conv4_3_norm");
        assert_eq!(spec.max_size(), None);
        assert!(spec.aspect_ratios().is_empty());
        assert!(spec.flip());
        assert!(spec.clip());
        assert!(!spec.global_pool());
        assert_eq!(spec.variances(), [r64(0.1), r64(0.1), r64(0.2), r64(0.2)]);
        assert_eq!(spec.num_boxes_per_cell(), 1);

        let result: Result<ScaleSpec, _> = json5::from_str("{ name: 's', min_size: -1.0 }");
        assert!(result.is_err());
    }
}
