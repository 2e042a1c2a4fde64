use crate::{
    common::*,
    detection::{AnchorSet, ANCHOR_ROW_LEN},
};

#[derive(Debug, Clone)]
pub struct PriorBoxInit {
    pub image_size: ImageSize,
    pub spec: ScaleSpec,
}

impl PriorBoxInit {
    pub fn build(self) -> Result<PriorBox> {
        let Self { image_size, spec } = self;
        let scale_h = (image_size.h() as f64).recip();
        let scale_w = (image_size.w() as f64).recip();

        // anchor sizes relative to the image
        let box_sizes: Vec<HW<f64>> = spec
            .box_sizes()
            .iter()
            .map(|size| size.scale(scale_h, scale_w))
            .collect::<Result<_, _>>()
            .map_err(|err| {
                Error::config(
                    spec.name(),
                    ConfigError::InvalidBoxSize {
                        reason: err.to_string(),
                    },
                )
            })?;
        let variances = spec.variances().map(|variance| variance.raw() as f32);

        Ok(PriorBox {
            image_size,
            spec,
            box_sizes,
            variances,
            cache: None,
        })
    }
}

/// Generates the anchors of one scale over a feature map grid.
///
/// The anchors depend on the grid size only, so the last generated set is
/// kept and returned as long as the grid stays the same.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct PriorBox {
    image_size: ImageSize,
    spec: ScaleSpec,
    box_sizes: Vec<HW<f64>>,
    variances: [f32; 4],
    #[derivative(Debug = "ignore")]
    cache: Option<Cache>,
}

impl PriorBox {
    pub fn spec(&self) -> &ScaleSpec {
        &self.spec
    }

    pub fn image_size(&self) -> ImageSize {
        self.image_size
    }

    pub fn num_boxes_per_cell(&self) -> usize {
        self.box_sizes.len()
    }

    /// The grid size of the cached anchors, if any.
    pub fn cached_grid(&self) -> Option<GridSize> {
        self.cache.as_ref().map(|cache| cache.grid)
    }

    /// Generate anchors for an `h` by `w` grid without touching the cache.
    pub fn generate(&self, h: usize, w: usize) -> Result<AnchorSet> {
        let grid = GridSize::new(h, w).map_err(|_| Error::InvalidGrid {
            scale: self.spec.name().to_string(),
            h,
            w,
        })?;
        Ok(self.generate_grid(grid))
    }

    /// Return the anchors for `grid`, regenerating them if the grid changed.
    pub fn forward(&mut self, grid: GridSize) -> Arc<AnchorSet> {
        if let Some(cache) = &self.cache {
            if cache.grid == grid {
                return cache.anchors.clone();
            }
        }

        info!(
            "build anchors for scale '{}' on {} grid",
            self.spec.name(),
            grid
        );
        let anchors = Arc::new(self.generate_grid(grid));
        self.cache = Some(Cache {
            grid,
            anchors: anchors.clone(),
        });
        anchors
    }

    fn generate_grid(&self, grid: GridSize) -> AnchorSet {
        let Self {
            ref spec,
            ref box_sizes,
            variances,
            ..
        } = *self;
        let clip = spec.clip();
        let feature_h = grid.h();
        let feature_w = grid.w();
        let num_anchors = grid.num_cells() * box_sizes.len();

        let corners = iproduct!(0..feature_h, 0..feature_w, box_sizes.iter()).map(
            |(row, col, size)| {
                let cy = (row as f64 + 0.5) / feature_h as f64;
                let cx = (col as f64 + 0.5) / feature_w as f64;
                let tlbr = CyCxHW::new(cy, cx, *size).to_tlbr();
                let tlbr = if clip { tlbr.clamp(0.0, 1.0) } else { tlbr };
                tlbr.xyxy().map(|value| value as f32)
            },
        );

        let mut data = Array2::<f32>::zeros((num_anchors, ANCHOR_ROW_LEN));
        data.outer_iter_mut()
            .zip(corners)
            .for_each(|(mut row, xyxy)| {
                row.iter_mut()
                    .zip(xyxy.iter().chain(variances.iter()))
                    .for_each(|(dst, &src)| *dst = src);
            });

        AnchorSet::new(grid, box_sizes.len(), data)
    }
}

#[derive(Debug)]
struct Cache {
    grid: GridSize,
    anchors: Arc<AnchorSet>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use model_config::ScaleConfig;

    fn prior_box(config: ScaleConfig) -> PriorBox {
        PriorBoxInit {
            image_size: ImageSize::new(300, 300).unwrap(),
            spec: ScaleSpec::new(config).unwrap(),
        }
        .build()
        .unwrap()
    }

    fn conv4_3(clip: bool) -> ScaleConfig {
        ScaleConfig {
            aspect_ratios: vec![r64(2.0)],
            clip,
            ..ScaleConfig::new("conv4_3_norm", 30.0)
        }
    }

    #[test]
    fn prior_box_conv4_3_example() {
        let unclipped = prior_box(conv4_3(false)).generate(38, 38).unwrap();
        assert_eq!(unclipped.num_boxes_per_cell(), 3);
        assert_eq!(unclipped.len(), 4332);

        let square = unclipped.get(0).unwrap();
        assert_abs_diff_eq!(square.xyxy[0], 0.5 / 38.0 - 0.05, epsilon = 1e-6);
        assert_abs_diff_eq!(square.xyxy[1], 0.5 / 38.0 - 0.05, epsilon = 1e-6);
        assert_abs_diff_eq!(square.xyxy[2], 0.5 / 38.0 + 0.05, epsilon = 1e-6);
        assert_abs_diff_eq!(square.xyxy[3], 0.5 / 38.0 + 0.05, epsilon = 1e-6);
        assert_abs_diff_eq!(square.xyxy[0], -0.0368, epsilon = 1e-4);
        assert_abs_diff_eq!(square.xyxy[3], 0.0632, epsilon = 1e-4);
        assert_eq!(square.variances, [0.1, 0.1, 0.2, 0.2]);

        let clipped = prior_box(conv4_3(true)).generate(38, 38).unwrap();
        let square = clipped.get(0).unwrap();
        assert_eq!(square.xyxy[0], 0.0);
        assert_eq!(square.xyxy[1], 0.0);
        assert_abs_diff_eq!(square.xyxy[2], 0.0632, epsilon = 1e-4);
        assert_abs_diff_eq!(square.xyxy[3], 0.0632, epsilon = 1e-4);
    }

    #[test]
    fn prior_box_ratio_and_flipped_order() {
        let anchors = prior_box(conv4_3(false)).generate(38, 38).unwrap();
        let cell = anchors.cell(5, 7).unwrap();
        let width = |index: usize| cell[[index, 2]] - cell[[index, 0]];
        let height = |index: usize| cell[[index, 3]] - cell[[index, 1]];
        let sqrt2 = std::f32::consts::SQRT_2;

        assert_abs_diff_eq!(width(0), 0.1, epsilon = 1e-6);
        assert_abs_diff_eq!(height(0), 0.1, epsilon = 1e-6);
        assert_abs_diff_eq!(width(1), 0.1 * sqrt2, epsilon = 1e-6);
        assert_abs_diff_eq!(height(1), 0.1 / sqrt2, epsilon = 1e-6);
        assert_abs_diff_eq!(width(2), 0.1 / sqrt2, epsilon = 1e-6);
        assert_abs_diff_eq!(height(2), 0.1 * sqrt2, epsilon = 1e-6);

        // all variants share the cell center
        let cx = (7.0 + 0.5) / 38.0;
        let cy = (5.0 + 0.5) / 38.0;
        (0..3).for_each(|index| {
            assert_abs_diff_eq!((cell[[index, 0]] + cell[[index, 2]]) / 2.0, cx, epsilon = 1e-6);
            assert_abs_diff_eq!((cell[[index, 1]] + cell[[index, 3]]) / 2.0, cy, epsilon = 1e-6);
        });
    }

    #[test]
    fn prior_box_geometric_mean_square() {
        let anchors = prior_box(ScaleConfig {
            max_size: Some(r64(120.0)),
            clip: false,
            ..ScaleConfig::new("s", 30.0)
        })
        .generate(1, 1)
        .unwrap();
        assert_eq!(anchors.len(), 2);

        let mean = anchors.get(1).unwrap();
        assert_abs_diff_eq!(mean.xyxy[2] - mean.xyxy[0], 60.0 / 300.0, epsilon = 1e-6);
        assert_abs_diff_eq!(mean.xyxy[3] - mean.xyxy[1], 60.0 / 300.0, epsilon = 1e-6);
    }

    #[test]
    fn prior_box_normalizes_per_axis() {
        let anchors = PriorBoxInit {
            image_size: ImageSize::new(600, 300).unwrap(),
            spec: ScaleSpec::new(ScaleConfig {
                clip: false,
                ..ScaleConfig::new("s", 60.0)
            })
            .unwrap(),
        }
        .build()
        .unwrap()
        .generate(2, 2)
        .unwrap();

        let square = anchors.get(0).unwrap();
        assert_abs_diff_eq!(square.xyxy[2] - square.xyxy[0], 0.1, epsilon = 1e-6);
        assert_abs_diff_eq!(square.xyxy[3] - square.xyxy[1], 0.2, epsilon = 1e-6);
    }

    #[test]
    fn prior_box_clip_range() {
        let config = ScaleConfig {
            max_size: Some(r64(330.0)),
            aspect_ratios: vec![r64(2.0), r64(3.0)],
            ..ScaleConfig::new("pool6", 276.0)
        };

        let clipped = prior_box(config.clone()).generate(3, 3).unwrap();
        assert!(clipped.boxes().iter().all(|&value| (0.0..=1.0).contains(&value)));

        let unclipped = prior_box(ScaleConfig {
            clip: false,
            ..config
        })
        .generate(3, 3)
        .unwrap();
        assert!(unclipped.boxes().iter().any(|&value| value < 0.0));
        assert!(unclipped.boxes().iter().any(|&value| value > 1.0));
    }

    #[test]
    fn prior_box_is_deterministic() {
        let generator = prior_box(conv4_3(true));
        let first = generator.generate(19, 10).unwrap();
        let second = generator.generate(19, 10).unwrap();
        assert_eq!(first.len(), 19 * 10 * 3);
        assert!(first
            .as_array()
            .iter()
            .zip(second.as_array().iter())
            .all(|(lhs, rhs)| lhs.to_bits() == rhs.to_bits()));
    }

    #[test]
    fn prior_box_rejects_empty_grid() {
        let generator = prior_box(conv4_3(true));
        assert!(matches!(
            generator.generate(0, 38),
            Err(Error::InvalidGrid { h: 0, w: 38, .. })
        ));
    }

    #[test]
    fn prior_box_cache_follows_grid() {
        let mut generator = prior_box(conv4_3(true));
        assert_eq!(generator.cached_grid(), None);

        let grid = GridSize::new(38, 38).unwrap();
        let first = generator.forward(grid);
        let second = generator.forward(grid);
        assert!(Arc::ptr_eq(&first, &second));

        let other = GridSize::new(19, 19).unwrap();
        let third = generator.forward(other);
        assert_eq!(third.len(), 19 * 19 * 3);
        assert_eq!(generator.cached_grid(), Some(other));
    }
}
