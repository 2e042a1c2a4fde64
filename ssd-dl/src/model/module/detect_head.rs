use crate::{common::*, detection::HeadOutput, error::FeatureMapError, feature::FeatureMap};

pub use conv_2d_head::*;
pub use dense_head::*;
pub use detection_head::*;

mod detection_head {
    use super::*;

    /// The prediction sub-network of one scale.
    ///
    /// The outputs must be flattened in grid row, grid column, anchor
    /// variant order, the same order as the anchors of the scale.
    pub trait DetectionHead
    where
        Self: Debug + Send + Sync,
    {
        fn in_channels(&self) -> usize;

        fn num_boxes_per_cell(&self) -> usize;

        fn num_classes(&self) -> usize;

        fn forward(&self, input: &FeatureMap) -> Result<HeadOutput, FeatureMapError>;
    }

    pub(super) fn check_channels(
        input: &FeatureMap,
        expected: usize,
    ) -> Result<(), FeatureMapError> {
        let actual = input.channels();
        if actual != expected {
            return Err(FeatureMapError::ChannelMismatch { expected, actual });
        }
        Ok(())
    }

    pub(super) fn check_head_size(
        num_boxes_per_cell: usize,
        num_classes: usize,
        loc_channels: usize,
        conf_channels: usize,
    ) -> Result<()> {
        if num_boxes_per_cell == 0 || num_classes == 0 {
            return Err(Error::InvalidWeight {
                reason: format!(
                    "expect positive boxes per cell and classes, but get {} and {}",
                    num_boxes_per_cell, num_classes
                ),
            });
        }
        if loc_channels != num_boxes_per_cell * 4 {
            return Err(Error::InvalidWeight {
                reason: format!(
                    "localization weight has {} outputs, but {} boxes per cell need {}",
                    loc_channels,
                    num_boxes_per_cell,
                    num_boxes_per_cell * 4
                ),
            });
        }
        if conf_channels != num_boxes_per_cell * num_classes {
            return Err(Error::InvalidWeight {
                reason: format!(
                    "confidence weight has {} outputs, but {} boxes per cell and {} classes need {}",
                    conf_channels,
                    num_boxes_per_cell,
                    num_classes,
                    num_boxes_per_cell * num_classes
                ),
            });
        }
        Ok(())
    }
}

mod conv_2d_head {
    use super::*;

    /// Weight and bias of a 3x3 convolution.
    #[derive(Debug, Clone, PartialEq)]
    pub struct ConvWeight {
        /// Kernel stored as `[ky, kx, out, in]`.
        kernel: Array4<f32>,
        bias: Array1<f32>,
    }

    impl ConvWeight {
        pub const KERNEL_SIZE: usize = 3;

        /// Create from a `[out, in, 3, 3]` kernel and an `[out]` bias.
        pub fn new(weight: Array4<f32>, bias: Array1<f32>) -> Result<Self> {
            let (out_c, in_c, kernel_h, kernel_w) = weight.dim();
            if kernel_h != Self::KERNEL_SIZE || kernel_w != Self::KERNEL_SIZE {
                return Err(Error::InvalidWeight {
                    reason: format!("expect a 3x3 kernel, but get {}x{}", kernel_h, kernel_w),
                });
            }
            if out_c == 0 || in_c == 0 {
                return Err(Error::InvalidWeight {
                    reason: format!("empty kernel with shape {:?}", weight.shape()),
                });
            }
            if bias.len() != out_c {
                return Err(Error::InvalidWeight {
                    reason: format!(
                        "expect a bias of length {}, but get {}",
                        out_c,
                        bias.len()
                    ),
                });
            }

            let kernel = weight
                .permuted_axes([2, 3, 0, 1])
                .as_standard_layout()
                .into_owned();
            Ok(Self { kernel, bias })
        }

        pub fn zeros(in_channels: usize, out_channels: usize) -> Result<Self> {
            Self::new(
                Array4::zeros((
                    out_channels,
                    in_channels,
                    Self::KERNEL_SIZE,
                    Self::KERNEL_SIZE,
                )),
                Array1::zeros(out_channels),
            )
        }

        pub fn in_channels(&self) -> usize {
            self.kernel.dim().3
        }

        pub fn out_channels(&self) -> usize {
            self.kernel.dim().2
        }

        /// Same-padded, stride 1 convolution of a `[h, w, in]` input.
        ///
        /// The output is flattened from `[h, w, out]` in row-major order.
        pub fn forward(&self, input: ArrayView3<'_, f32>) -> Array1<f32> {
            let (feature_h, feature_w, _) = input.dim();
            let mut output = Array3::<f32>::zeros((feature_h, feature_w, self.out_channels()));

            iproduct!(0..feature_h, 0..feature_w).for_each(|(row, col)| {
                let mut out = output.slice_mut(s![row, col, ..]);
                out.assign(&self.bias);

                iproduct!(0..Self::KERNEL_SIZE, 0..Self::KERNEL_SIZE)
                    .filter_map(|(ky, kx)| {
                        let y = (row + ky).checked_sub(1).filter(|&y| y < feature_h)?;
                        let x = (col + kx).checked_sub(1).filter(|&x| x < feature_w)?;
                        Some((ky, kx, y, x))
                    })
                    .for_each(|(ky, kx, y, x)| {
                        let kernel = self.kernel.slice(s![ky, kx, .., ..]);
                        let pixel = input.slice(s![y, x, ..]);
                        out += &kernel.dot(&pixel);
                    });
            });

            Array1::from(output.into_raw_vec())
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    pub struct Conv2DHeadInit {
        pub in_channels: usize,
        pub num_boxes_per_cell: usize,
        pub num_classes: usize,
    }

    impl Conv2DHeadInit {
        /// Build a head with all weights and biases set to zero.
        pub fn build_zeros(self) -> Result<Conv2DHead> {
            let Self {
                in_channels,
                num_boxes_per_cell,
                num_classes,
            } = self;

            Conv2DHead::new(
                num_boxes_per_cell,
                num_classes,
                ConvWeight::zeros(in_channels, num_boxes_per_cell * 4)?,
                ConvWeight::zeros(in_channels, num_boxes_per_cell * num_classes)?,
            )
        }
    }

    /// Predicts offsets and class logits with two 3x3 convolutions.
    #[derive(Debug, Clone, PartialEq, Getters)]
    pub struct Conv2DHead {
        num_boxes_per_cell: usize,
        num_classes: usize,
        #[getset(get = "pub")]
        loc: ConvWeight,
        #[getset(get = "pub")]
        conf: ConvWeight,
    }

    impl Conv2DHead {
        pub fn new(
            num_boxes_per_cell: usize,
            num_classes: usize,
            loc: ConvWeight,
            conf: ConvWeight,
        ) -> Result<Self> {
            check_head_size(
                num_boxes_per_cell,
                num_classes,
                loc.out_channels(),
                conf.out_channels(),
            )?;
            if loc.in_channels() != conf.in_channels() {
                return Err(Error::InvalidWeight {
                    reason: format!(
                        "localization and confidence weights disagree on input channels, {} and {}",
                        loc.in_channels(),
                        conf.in_channels()
                    ),
                });
            }

            Ok(Self {
                num_boxes_per_cell,
                num_classes,
                loc,
                conf,
            })
        }
    }

    impl DetectionHead for Conv2DHead {
        fn in_channels(&self) -> usize {
            self.loc.in_channels()
        }

        fn num_boxes_per_cell(&self) -> usize {
            self.num_boxes_per_cell
        }

        fn num_classes(&self) -> usize {
            self.num_classes
        }

        fn forward(&self, input: &FeatureMap) -> Result<HeadOutput, FeatureMapError> {
            check_channels(input, self.loc.in_channels())?;
            let input = input.as_array();
            Ok(HeadOutput::new(
                self.loc.forward(input),
                self.conf.forward(input),
            ))
        }
    }
}

mod dense_head {
    use super::*;

    /// Weight and bias of a dense projection.
    #[derive(Debug, Clone, PartialEq)]
    pub struct DenseWeight {
        /// `[out, in]`
        weight: Array2<f32>,
        bias: Array1<f32>,
    }

    impl DenseWeight {
        pub fn new(weight: Array2<f32>, bias: Array1<f32>) -> Result<Self> {
            let (out_c, in_c) = weight.dim();
            if out_c == 0 || in_c == 0 {
                return Err(Error::InvalidWeight {
                    reason: format!("empty weight with shape {:?}", weight.shape()),
                });
            }
            if bias.len() != out_c {
                return Err(Error::InvalidWeight {
                    reason: format!(
                        "expect a bias of length {}, but get {}",
                        out_c,
                        bias.len()
                    ),
                });
            }
            Ok(Self { weight, bias })
        }

        pub fn zeros(in_channels: usize, out_channels: usize) -> Result<Self> {
            Self::new(
                Array2::zeros((out_channels, in_channels)),
                Array1::zeros(out_channels),
            )
        }

        pub fn in_channels(&self) -> usize {
            self.weight.ncols()
        }

        pub fn out_channels(&self) -> usize {
            self.weight.nrows()
        }

        pub fn forward(&self, input: ArrayView1<'_, f32>) -> Array1<f32> {
            self.weight.dot(&input) + &self.bias
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    pub struct DenseHeadInit {
        pub in_channels: usize,
        pub num_boxes_per_cell: usize,
        pub num_classes: usize,
    }

    impl DenseHeadInit {
        pub fn build_zeros(self) -> Result<DenseHead> {
            let Self {
                in_channels,
                num_boxes_per_cell,
                num_classes,
            } = self;

            DenseHead::new(
                num_boxes_per_cell,
                num_classes,
                DenseWeight::zeros(in_channels, num_boxes_per_cell * 4)?,
                DenseWeight::zeros(in_channels, num_boxes_per_cell * num_classes)?,
            )
        }
    }

    /// Predicts offsets and class logits of a globally pooled 1x1 feature
    /// map with two dense projections.
    #[derive(Debug, Clone, PartialEq, Getters)]
    pub struct DenseHead {
        num_boxes_per_cell: usize,
        num_classes: usize,
        #[getset(get = "pub")]
        loc: DenseWeight,
        #[getset(get = "pub")]
        conf: DenseWeight,
    }

    impl DenseHead {
        pub fn new(
            num_boxes_per_cell: usize,
            num_classes: usize,
            loc: DenseWeight,
            conf: DenseWeight,
        ) -> Result<Self> {
            check_head_size(
                num_boxes_per_cell,
                num_classes,
                loc.out_channels(),
                conf.out_channels(),
            )?;
            if loc.in_channels() != conf.in_channels() {
                return Err(Error::InvalidWeight {
                    reason: format!(
                        "localization and confidence weights disagree on input channels, {} and {}",
                        loc.in_channels(),
                        conf.in_channels()
                    ),
                });
            }

            Ok(Self {
                num_boxes_per_cell,
                num_classes,
                loc,
                conf,
            })
        }
    }

    impl DetectionHead for DenseHead {
        fn in_channels(&self) -> usize {
            self.loc.in_channels()
        }

        fn num_boxes_per_cell(&self) -> usize {
            self.num_boxes_per_cell
        }

        fn num_classes(&self) -> usize {
            self.num_classes
        }

        fn forward(&self, input: &FeatureMap) -> Result<HeadOutput, FeatureMapError> {
            let grid = input.grid();
            if grid != GridSize::single_cell() {
                return Err(FeatureMapError::NotPooled {
                    h: grid.h(),
                    w: grid.w(),
                });
            }
            check_channels(input, self.loc.in_channels())?;

            let channels = input.cell(0, 0).ok_or(FeatureMapError::EmptyGrid {
                h: grid.h(),
                w: grid.w(),
            })?;
            Ok(HeadOutput::new(
                self.loc.forward(channels),
                self.conf.forward(channels),
            ))
        }
    }
}
