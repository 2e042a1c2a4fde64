use super::module::{
    DetectionHead, L2Normalize, L2NormalizeInit, MergeDetect, PriorBox, PriorBoxInit, ScaleOutput,
};
use crate::{
    common::*,
    detection::{AnchorSet, DetectionTensor, HeadOutput},
    feature::FeatureMap,
};

pub struct SsdModelInit {
    pub config: SsdConfig,
    /// One head per scale, in the order of `config.scales`.
    pub heads: Vec<Box<dyn DetectionHead>>,
}

impl SsdModelInit {
    pub fn build(self) -> Result<SsdModel> {
        let Self { config, heads } = self;

        config
            .validate()
            .map_err(|error| Error::config(MODEL_SCOPE, error))?;
        let image_size = config
            .image_size()
            .map_err(|error| Error::config(MODEL_SCOPE, error))?;

        if heads.len() != config.scales.len() {
            return Err(Error::mismatch(
                MODEL_SCOPE,
                "number of heads",
                config.scales.len(),
                heads.len(),
            ));
        }

        let merge = MergeDetect::new(config.num_classes)?;
        let branches: Vec<_> = izip!(&config.scales, heads)
            .map(|(spec, head)| ScaleBranch::new(image_size, config.num_classes, spec, head))
            .collect::<Result<_>>()?;

        info!(
            "built model with {} scales on {} input",
            branches.len(),
            image_size
        );

        Ok(SsdModel {
            config,
            image_size,
            branches,
            merge,
        })
    }
}

/// The multi-scale detection pipeline.
///
/// Each scale branch optionally normalizes and pools its feature map, then
/// produces anchors and head predictions. All branches are merged into one
/// [DetectionTensor] in configured scale order.
#[derive(Debug, Getters, CopyGetters)]
pub struct SsdModel {
    #[getset(get = "pub")]
    config: SsdConfig,
    #[getset(get_copy = "pub")]
    image_size: ImageSize,
    branches: Vec<ScaleBranch>,
    merge: MergeDetect,
}

impl SsdModel {
    pub fn num_scales(&self) -> usize {
        self.branches.len()
    }

    /// Import raw backbone outputs, one per scale, laid out in the
    /// configured channel order.
    pub fn feature_maps(&self, arrays: Vec<ArrayD<f32>>) -> Result<Vec<FeatureMap>> {
        if arrays.len() != self.branches.len() {
            return Err(Error::mismatch(
                MODEL_SCOPE,
                "number of feature maps",
                self.branches.len(),
                arrays.len(),
            ));
        }

        let order = self.config.channel_order;
        izip!(&self.branches, arrays)
            .map(|(branch, array)| {
                FeatureMap::from_dyn(array, order)
                    .map_err(|error| Error::feature(&branch.name, error))
            })
            .collect()
    }

    pub fn forward(&mut self, features: &[FeatureMap]) -> Result<DetectionTensor> {
        let Self {
            ref mut branches,
            ref merge,
            ..
        } = *self;

        if features.len() != branches.len() {
            return Err(Error::mismatch(
                MODEL_SCOPE,
                "number of feature maps",
                branches.len(),
                features.len(),
            ));
        }

        let outputs: Vec<(HeadOutput, Arc<AnchorSet>)> = branches
            .par_iter_mut()
            .zip(features.par_iter())
            .map(|(branch, feature)| branch.forward(feature))
            .collect::<Result<_>>()?;

        merge.forward(
            izip!(branches.iter(), &outputs).map(|(branch, (head, anchors))| ScaleOutput {
                name: branch.name.as_str(),
                head,
                anchors,
            }),
        )
    }

    /// Build the anchors of every scale with a configured grid size ahead
    /// of the first forward pass.
    pub fn warm_up(&mut self) {
        self.branches.iter_mut().for_each(|branch| {
            if let Some(grid) = branch.anchor_grid(branch.prior_box.spec().grid()) {
                branch.prior_box.forward(grid);
            }
        });
    }

    /// The concatenated `(num_anchors, 8)` anchor block for the given
    /// feature map grids, one per scale.
    ///
    /// The grids of globally pooled scales are replaced by a single cell.
    pub fn anchors(&self, grids: &[GridSize]) -> Result<Array2<f32>> {
        if grids.len() != self.branches.len() {
            return Err(Error::mismatch(
                MODEL_SCOPE,
                "number of grids",
                self.branches.len(),
                grids.len(),
            ));
        }

        let anchor_sets: Vec<AnchorSet> = izip!(&self.branches, grids)
            .map(|(branch, &grid)| {
                let grid = if branch.global_pool {
                    GridSize::single_cell()
                } else {
                    grid
                };
                branch.prior_box.generate(grid.h(), grid.w())
            })
            .collect::<Result<_>>()?;

        let views: Vec<_> = anchor_sets.iter().map(|anchors| anchors.as_array()).collect();
        concatenate(Axis(0), &views)
            .map_err(|error| Error::concat(MERGED_SCOPE, "anchor blocks", error))
    }

    /// The feature normalizer of the scale at `index`, if it has one.
    pub fn l2_normalize(&self, index: usize) -> Option<&L2Normalize> {
        self.branches.get(index)?.normalize.as_ref()
    }

    /// Mutable access to the normalizer parameters of the scale at `index`.
    pub fn l2_normalize_mut(&mut self, index: usize) -> Option<&mut L2Normalize> {
        self.branches.get_mut(index)?.normalize.as_mut()
    }

    pub fn head(&self, index: usize) -> Option<&dyn DetectionHead> {
        Some(self.branches.get(index)?.head.as_ref())
    }
}

#[derive(Debug)]
struct ScaleBranch {
    name: ScaleName,
    num_classes: usize,
    normalize: Option<L2Normalize>,
    global_pool: bool,
    prior_box: PriorBox,
    head: Box<dyn DetectionHead>,
}

impl ScaleBranch {
    fn new(
        image_size: ImageSize,
        num_classes: usize,
        spec: &ScaleSpec,
        head: Box<dyn DetectionHead>,
    ) -> Result<Self> {
        let name = spec.name().clone();

        if head.num_boxes_per_cell() != spec.num_boxes_per_cell() {
            return Err(Error::mismatch(
                &name,
                "head boxes per cell",
                spec.num_boxes_per_cell(),
                head.num_boxes_per_cell(),
            ));
        }
        if head.num_classes() != num_classes {
            return Err(Error::mismatch(
                &name,
                "head classes",
                num_classes,
                head.num_classes(),
            ));
        }

        let normalize = spec
            .l2_norm_scale()
            .map(|scale| {
                L2NormalizeInit {
                    channels: head.in_channels(),
                    scale: scale.raw() as f32,
                }
                .build()
            })
            .transpose()
            .map_err(|error| Error::feature(&name, error))?;

        let prior_box = PriorBoxInit {
            image_size,
            spec: spec.clone(),
        }
        .build()?;

        Ok(Self {
            name,
            num_classes,
            normalize,
            global_pool: spec.global_pool(),
            prior_box,
            head,
        })
    }

    /// The grid the anchors are generated on for a feature map grid.
    fn anchor_grid(&self, grid: Option<GridSize>) -> Option<GridSize> {
        if self.global_pool {
            Some(GridSize::single_cell())
        } else {
            grid
        }
    }

    fn forward(&mut self, feature: &FeatureMap) -> Result<(HeadOutput, Arc<AnchorSet>)> {
        let Self {
            ref name,
            num_classes,
            ref normalize,
            global_pool,
            ref mut prior_box,
            ref head,
        } = *self;

        let feature: Cow<'_, FeatureMap> = match normalize {
            Some(normalize) => Cow::Owned(
                normalize
                    .forward(feature)
                    .map_err(|error| Error::feature(name, error))?,
            ),
            None => Cow::Borrowed(feature),
        };
        let feature = if global_pool {
            Cow::Owned(feature.global_average_pool())
        } else {
            feature
        };

        let grid = feature.grid();
        if let Some(expected) = prior_box.spec().grid() {
            if expected != grid {
                warn!(
                    "scale '{}' expects a {} grid, but get {}",
                    name, expected, grid
                );
            }
        }

        let anchors = prior_box.forward(grid);
        let output = head
            .forward(&feature)
            .map_err(|error| Error::feature(name, error))?;
        output.check(name.as_str(), anchors.len(), num_classes)?;

        debug!(
            "scale '{}': {} grid, {} channels, {} anchors",
            name,
            grid,
            feature.channels(),
            anchors.len()
        );

        Ok((output, anchors))
    }
}
