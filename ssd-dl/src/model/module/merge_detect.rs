use crate::{
    common::*,
    detection::{AnchorSet, DetectionTensor, HeadOutput, ANCHOR_ROW_LEN},
    utils::softmax_rows_inplace,
};

/// The head output and the anchors of one scale.
#[derive(Debug, Clone, Copy)]
pub struct ScaleOutput<'a> {
    pub name: &'a str,
    pub head: &'a HeadOutput,
    pub anchors: &'a AnchorSet,
}

/// Concatenates per-scale predictions and anchors into one detection tensor.
#[derive(Debug, Clone, PartialEq, Eq, CopyGetters)]
pub struct MergeDetect {
    #[getset(get_copy = "pub")]
    num_classes: usize,
}

impl MergeDetect {
    pub fn new(num_classes: usize) -> Result<Self> {
        if num_classes == 0 {
            return Err(Error::config(MERGED_SCOPE, ConfigError::ZeroClasses));
        }
        Ok(Self { num_classes })
    }

    /// Merge scales in iteration order, which becomes the row order of the
    /// output.
    pub fn forward<'a, I>(&self, outputs: I) -> Result<DetectionTensor>
    where
        I: IntoIterator<Item = ScaleOutput<'a>>,
    {
        let outputs: Vec<_> = outputs.into_iter().collect();
        if outputs.is_empty() {
            return Err(Error::config(MERGED_SCOPE, ConfigError::NoScales));
        }

        // every head must agree with the anchors of its own scale
        outputs.iter().try_for_each(|output| {
            output
                .head
                .check(output.name, output.anchors.len(), self.num_classes)
        })?;

        let loc: Array1<f32> = outputs
            .iter()
            .flat_map(|output| output.head.loc().iter().cloned())
            .collect();
        let conf: Array1<f32> = outputs
            .iter()
            .flat_map(|output| output.head.conf().iter().cloned())
            .collect();
        let anchor_views: Vec<_> = outputs
            .iter()
            .map(|output| output.anchors.as_array())
            .collect();
        let anchors = concatenate(Axis(0), &anchor_views)
            .map_err(|error| Error::concat(MERGED_SCOPE, "anchor blocks", error))?;

        self.forward_flat(loc.view(), conf.view(), anchors.view())
    }

    /// Merge already concatenated blocks.
    ///
    /// The anchor count is taken from the localization block, and the
    /// confidence and anchor blocks must agree with it.
    pub fn forward_flat(
        &self,
        loc: ArrayView1<'_, f32>,
        conf: ArrayView1<'_, f32>,
        anchors: ArrayView2<'_, f32>,
    ) -> Result<DetectionTensor> {
        let num_classes = self.num_classes;
        let num_anchors = loc.len() / 4;

        if loc.len() != num_anchors * 4 {
            return Err(Error::mismatch(
                MERGED_SCOPE,
                "localization length",
                num_anchors * 4,
                loc.len(),
            ));
        }
        if anchors.ncols() != ANCHOR_ROW_LEN {
            return Err(Error::mismatch(
                MERGED_SCOPE,
                "anchor columns",
                ANCHOR_ROW_LEN,
                anchors.ncols(),
            ));
        }
        if anchors.nrows() != num_anchors {
            return Err(Error::mismatch(
                MERGED_SCOPE,
                "anchor rows",
                num_anchors,
                anchors.nrows(),
            ));
        }
        if conf.len() != num_anchors * num_classes {
            return Err(Error::mismatch(
                MERGED_SCOPE,
                "confidence length",
                num_anchors * num_classes,
                conf.len(),
            ));
        }

        let loc = Array2::from_shape_vec((num_anchors, 4), loc.to_vec()).map_err(|_| {
            Error::mismatch(MERGED_SCOPE, "localization length", num_anchors * 4, loc.len())
        })?;
        let mut conf = Array2::from_shape_vec((num_anchors, num_classes), conf.to_vec())
            .map_err(|_| {
                Error::mismatch(
                    MERGED_SCOPE,
                    "confidence length",
                    num_anchors * num_classes,
                    conf.len(),
                )
            })?;
        softmax_rows_inplace(conf.view_mut());

        let data = concatenate(Axis(1), &[loc.view(), conf.view(), anchors.view()])
            .map_err(|error| Error::concat(MERGED_SCOPE, "detection rows", error))?;
        debug!(
            "merged {} anchors into a {}x{} detection tensor",
            num_anchors,
            data.nrows(),
            data.ncols()
        );

        Ok(DetectionTensor::new(num_classes, data))
    }
}
