use crate::{common::*, error::FeatureMapError, feature::FeatureMap};

#[derive(Debug, Clone)]
pub struct L2NormalizeInit {
    pub channels: usize,
    /// The initial value of every per-channel scale factor.
    pub scale: f32,
}

impl L2NormalizeInit {
    pub fn build(self) -> Result<L2Normalize, FeatureMapError> {
        let Self { channels, scale } = self;
        if channels == 0 {
            return Err(FeatureMapError::ZeroChannels);
        }

        Ok(L2Normalize {
            scale: Array1::from_elem(channels, scale),
        })
    }
}

/// Scales each feature vector to unit L2 norm across channels, then
/// multiplies each channel by a learned factor.
#[derive(Debug, Clone)]
pub struct L2Normalize {
    scale: Array1<f32>,
}

impl L2Normalize {
    /// The floor of the squared norm.
    pub const EPSILON: f32 = 1e-12;

    pub fn channels(&self) -> usize {
        self.scale.len()
    }

    pub fn scale(&self) -> ArrayView1<'_, f32> {
        self.scale.view()
    }

    /// Mutable access to the scale factors for parameter updates.
    pub fn scale_mut(&mut self) -> ArrayViewMut1<'_, f32> {
        self.scale.view_mut()
    }

    pub fn forward(&self, input: &FeatureMap) -> Result<FeatureMap, FeatureMapError> {
        let channels = input.channels();
        if channels != self.channels() {
            return Err(FeatureMapError::ChannelMismatch {
                expected: self.channels(),
                actual: channels,
            });
        }

        let mut output = input.as_array().to_owned();
        output
            .lanes_mut(Axis(2))
            .into_iter()
            .for_each(|mut lane| {
                let sum_sq = lane.fold(0.0, |sum, &value| sum + value * value);
                let inv_norm = sum_sq.max(Self::EPSILON).sqrt().recip();
                lane.zip_mut_with(&self.scale, |value, &scale| {
                    *value = *value * inv_norm * scale
                });
            });

        FeatureMap::new(output, ChannelOrder::ChannelsLast)
    }
}
