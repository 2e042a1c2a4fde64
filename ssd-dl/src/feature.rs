//! Backbone feature maps.

use crate::{common::*, error::FeatureMapError};

/// A 3-D feature map produced by the backbone.
///
/// The data is always stored channels-last, `[height, width, channels]`,
/// whatever the layout of the source tensor was. Height, width and channels
/// are guaranteed to be non-zero.
#[derive(Debug, Clone, PartialEq, CopyGetters)]
pub struct FeatureMap {
    data: Array3<f32>,
    #[getset(get_copy = "pub")]
    grid: GridSize,
}

impl FeatureMap {
    /// Import a 3-D tensor laid out in `order`.
    pub fn new(data: Array3<f32>, order: ChannelOrder) -> Result<Self, FeatureMapError> {
        let data = match order {
            ChannelOrder::ChannelsLast => data,
            ChannelOrder::ChannelsFirst => data.permuted_axes([1, 2, 0]),
        };
        let data = data.as_standard_layout().into_owned();

        let (h, w, c) = data.dim();
        if c == 0 {
            return Err(FeatureMapError::ZeroChannels);
        }
        let grid = GridSize::new(h, w).map_err(|_| FeatureMapError::EmptyGrid { h, w })?;

        Ok(Self { data, grid })
    }

    /// Import a tensor of unchecked dimensionality laid out in `order`.
    pub fn from_dyn(data: ArrayD<f32>, order: ChannelOrder) -> Result<Self, FeatureMapError> {
        let ndim = data.ndim();
        let data = data
            .into_dimensionality::<Ix3>()
            .map_err(|_| FeatureMapError::NotThreeDimensional { ndim })?;
        Self::new(data, order)
    }

    /// Build a 1x1 feature map from a pooled channel vector.
    pub fn from_channels(channels: Array1<f32>) -> Result<Self, FeatureMapError> {
        let len = channels.len();
        let data = channels
            .into_shape((1, 1, len))
            .map_err(|_| FeatureMapError::ZeroChannels)?;
        Self::new(data, ChannelOrder::ChannelsLast)
    }

    pub fn height(&self) -> usize {
        self.grid.h()
    }

    pub fn width(&self) -> usize {
        self.grid.w()
    }

    pub fn channels(&self) -> usize {
        self.data.dim().2
    }

    /// The channels-last view of the data.
    pub fn as_array(&self) -> ArrayView3<'_, f32> {
        self.data.view()
    }

    pub fn into_array(self) -> Array3<f32> {
        self.data
    }

    /// Export the data in the given layout.
    pub fn to_array(&self, order: ChannelOrder) -> Array3<f32> {
        match order {
            ChannelOrder::ChannelsLast => self.data.clone(),
            ChannelOrder::ChannelsFirst => self
                .data
                .view()
                .permuted_axes([2, 0, 1])
                .as_standard_layout()
                .into_owned(),
        }
    }

    /// The channel vector at grid cell `(row, col)`, or `None` outside the grid.
    pub fn cell(&self, row: usize, col: usize) -> Option<ArrayView1<'_, f32>> {
        (row < self.grid.h() && col < self.grid.w()).then(|| self.data.slice(s![row, col, ..]))
    }

    /// Average over the spatial dimensions, giving a 1x1 feature map.
    pub fn global_average_pool(&self) -> Self {
        let num_cells = self.grid.num_cells() as f32;
        let data = self
            .data
            .sum_axis(Axis(0))
            .sum_axis(Axis(0))
            .mapv(|sum| sum / num_cells)
            .insert_axis(Axis(0))
            .insert_axis(Axis(0));

        Self {
            data,
            grid: GridSize::single_cell(),
        }
    }
}
