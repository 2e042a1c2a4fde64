//! The model-wide detection configuration.

use crate::{
    common::*,
    error::ConfigError,
    misc::{ChannelOrder, ImageSize},
    scale::ScaleSpec,
};

/// Configuration of a multi-scale detection head.
///
/// The order of `scales` decides the row layout of the merged detection
/// tensor, and must match the order in which feature maps and heads are fed
/// to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SsdConfig {
    /// Number of classes including the background class.
    #[serde(default = "default_num_classes")]
    pub num_classes: usize,
    /// The network input shape, interpreted according to `channel_order`.
    #[serde(default = "default_input_shape")]
    pub input_shape: [usize; 3],
    #[serde(default)]
    pub channel_order: ChannelOrder,
    pub scales: Vec<ScaleSpec>,
}

impl SsdConfig {
    pub fn load<P>(path: P) -> anyhow::Result<Self>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file '{}'", path.display()))?;
        let config = Self::from_json5_str(&text)
            .with_context(|| format!("failed to parse config file '{}'", path.display()))?;
        Ok(config)
    }

    pub fn from_json5_str(text: &str) -> anyhow::Result<Self> {
        let config: Self = json5::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the model-wide constraints. Per-scale values are checked when
    /// each [ScaleSpec] is built.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_classes == 0 {
            return Err(ConfigError::ZeroClasses);
        }
        ImageSize::from_input_shape(self.input_shape, self.channel_order)?;
        if self.scales.is_empty() {
            return Err(ConfigError::NoScales);
        }

        let mut names = HashSet::new();
        if let Some(duplicate) = self
            .scales
            .iter()
            .map(|scale| scale.name())
            .find(|&name| !names.insert(name))
        {
            return Err(ConfigError::DuplicateScaleName {
                name: duplicate.to_string(),
            });
        }

        Ok(())
    }

    /// The input resolution used to normalize anchor coordinates.
    pub fn image_size(&self) -> Result<ImageSize, ConfigError> {
        ImageSize::from_input_shape(self.input_shape, self.channel_order)
    }

    /// The number of anchors when every scale has its configured grid size.
    pub fn num_anchors(&self) -> Option<usize> {
        self.scales
            .iter()
            .map(|scale| {
                let grid = scale.grid()?;
                Some(grid.num_cells() * scale.num_boxes_per_cell())
            })
            .sum()
    }
}

fn default_num_classes() -> usize {
    21
}

fn default_input_shape() -> [usize; 3] {
    [300, 300, 3]
}
