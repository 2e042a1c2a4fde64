//! Per-scale outputs and the merged detection tensor.

use crate::common::*;

pub use anchor_set::*;
pub use detection_tensor::*;
pub use head_output::*;

/// Number of values of an anchor row, 4 coordinates and 4 variances.
pub const ANCHOR_ROW_LEN: usize = 8;

mod anchor_set {
    use super::*;

    /// One anchor box in normalized image coordinates.
    #[derive(Debug, Clone, Copy, PartialEq)]
    pub struct AnchorBox {
        /// `[xmin, ymin, xmax, ymax]`
        pub xyxy: [f32; 4],
        /// `[cx, cy, w, h]`, carried for the decoder and never applied here.
        pub variances: [f32; 4],
    }

    /// The anchors of one scale over a feature map grid.
    ///
    /// Rows are ordered by grid row, then grid column, then anchor variant.
    /// Each row holds `[xmin, ymin, xmax, ymax, var_cx, var_cy, var_w, var_h]`.
    #[derive(Debug, Clone, PartialEq, CopyGetters)]
    pub struct AnchorSet {
        #[getset(get_copy = "pub")]
        grid: GridSize,
        #[getset(get_copy = "pub")]
        num_boxes_per_cell: usize,
        data: Array2<f32>,
    }

    impl AnchorSet {
        pub(crate) fn new(grid: GridSize, num_boxes_per_cell: usize, data: Array2<f32>) -> Self {
            debug_assert_eq!(
                data.dim(),
                (grid.num_cells() * num_boxes_per_cell, ANCHOR_ROW_LEN)
            );
            Self {
                grid,
                num_boxes_per_cell,
                data,
            }
        }

        pub fn len(&self) -> usize {
            self.data.nrows()
        }

        pub fn is_empty(&self) -> bool {
            self.data.nrows() == 0
        }

        /// The `(num_anchors, 8)` array of all anchors.
        pub fn as_array(&self) -> ArrayView2<'_, f32> {
            self.data.view()
        }

        /// The `(num_anchors, 4)` corner coordinates.
        pub fn boxes(&self) -> ArrayView2<'_, f32> {
            self.data.slice(s![.., 0..4])
        }

        /// The `(num_anchors, 4)` variances.
        pub fn variances(&self) -> ArrayView2<'_, f32> {
            self.data.slice(s![.., 4..8])
        }

        /// The anchors of grid cell `(row, col)`, or `None` outside the grid.
        pub fn cell(&self, row: usize, col: usize) -> Option<ArrayView2<'_, f32>> {
            if row >= self.grid.h() || col >= self.grid.w() {
                return None;
            }
            let start = (row * self.grid.w() + col) * self.num_boxes_per_cell;
            Some(
                self.data
                    .slice(s![start..(start + self.num_boxes_per_cell), ..]),
            )
        }

        pub fn get(&self, index: usize) -> Option<AnchorBox> {
            (index < self.len()).then(|| {
                let row = self.data.row(index);
                AnchorBox {
                    xyxy: [row[0], row[1], row[2], row[3]],
                    variances: [row[4], row[5], row[6], row[7]],
                }
            })
        }

        pub fn iter(&self) -> impl Iterator<Item = AnchorBox> + '_ {
            (0..self.len()).filter_map(move |index| self.get(index))
        }
    }
}

mod head_output {
    use super::*;

    /// The flattened predictions of one detection head.
    ///
    /// Both vectors are ordered by grid row, then grid column, then anchor
    /// variant, then coordinate or class, the same order as [AnchorSet] rows.
    #[derive(Debug, Clone, PartialEq, Getters)]
    pub struct HeadOutput {
        /// Localization offsets, `num_anchors * 4` values.
        #[getset(get = "pub")]
        loc: Array1<f32>,
        /// Class logits, `num_anchors * num_classes` values.
        #[getset(get = "pub")]
        conf: Array1<f32>,
    }

    impl HeadOutput {
        pub fn new(loc: Array1<f32>, conf: Array1<f32>) -> Self {
            Self { loc, conf }
        }

        /// Check the vector lengths against the anchors of the same scale.
        pub fn check(&self, scale: &str, num_anchors: usize, num_classes: usize) -> Result<()> {
            if self.loc.len() != num_anchors * 4 {
                return Err(Error::mismatch(
                    scale,
                    "localization length",
                    num_anchors * 4,
                    self.loc.len(),
                ));
            }
            if self.conf.len() != num_anchors * num_classes {
                return Err(Error::mismatch(
                    scale,
                    "confidence length",
                    num_anchors * num_classes,
                    self.conf.len(),
                ));
            }
            Ok(())
        }
    }
}

mod detection_tensor {
    use super::*;

    /// The merged per-anchor output of all scales.
    ///
    /// Each row is laid out as
    /// `[loc_x, loc_y, loc_w, loc_h, class_0 .. class_{n-1}, xmin, ymin, xmax, ymax, var_cx, var_cy, var_w, var_h]`.
    /// Class scores of each row are softmax probabilities.
    #[derive(Debug, Clone, PartialEq, CopyGetters)]
    pub struct DetectionTensor {
        #[getset(get_copy = "pub")]
        num_classes: usize,
        data: Array2<f32>,
    }

    impl DetectionTensor {
        pub(crate) fn new(num_classes: usize, data: Array2<f32>) -> Self {
            debug_assert_eq!(data.ncols(), Self::row_len_of(num_classes));
            Self { num_classes, data }
        }

        pub fn row_len_of(num_classes: usize) -> usize {
            4 + num_classes + ANCHOR_ROW_LEN
        }

        pub fn num_anchors(&self) -> usize {
            self.data.nrows()
        }

        pub fn row_len(&self) -> usize {
            self.data.ncols()
        }

        pub fn as_array(&self) -> ArrayView2<'_, f32> {
            self.data.view()
        }

        pub fn into_array(self) -> Array2<f32> {
            self.data
        }

        pub fn loc(&self) -> ArrayView2<'_, f32> {
            self.data.slice(s![.., 0..4])
        }

        pub fn conf(&self) -> ArrayView2<'_, f32> {
            self.data.slice(s![.., 4..(4 + self.num_classes)])
        }

        /// Anchor corners and variances, `(num_anchors, 8)`.
        pub fn anchors(&self) -> ArrayView2<'_, f32> {
            self.data.slice(s![.., (4 + self.num_classes)..])
        }

        pub fn anchor_boxes(&self) -> ArrayView2<'_, f32> {
            let start = 4 + self.num_classes;
            self.data.slice(s![.., start..(start + 4)])
        }

        pub fn variances(&self) -> ArrayView2<'_, f32> {
            let start = 4 + self.num_classes + 4;
            self.data.slice(s![.., start..])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anchor_set_cell_bounds() {
        let grid = GridSize::new(2, 2).unwrap();
        let anchors = AnchorSet::new(
            grid,
            3,
            Array2::from_shape_fn((12, ANCHOR_ROW_LEN), |(row, _)| row as f32),
        );

        let cell = anchors.cell(1, 0).unwrap();
        assert_eq!(cell.nrows(), 3);
        assert_eq!(cell.column(0).to_vec(), vec![6.0, 7.0, 8.0]);

        assert!(anchors.cell(2, 0).is_none());
        assert!(anchors.cell(0, 2).is_none());
    }
}
