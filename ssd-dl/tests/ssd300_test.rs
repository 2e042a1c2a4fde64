use anyhow::Result;
use approx::assert_abs_diff_eq;
use model_config::{ssd300, ChannelOrder, SsdConfig};
use ndarray::{Array1, Array2, Array3, Array4, ArrayD};
use rand::prelude::*;
use ssd_dl::{
    Conv2DHead, Conv2DHeadInit, ConvWeight, DenseHead, DenseHeadInit, DenseWeight, DetectionHead,
    Error, FeatureMap, SsdModel, SsdModelInit,
};

const NUM_CLASSES: usize = 21;
const CHANNELS: usize = 8;

/// Feature map sizes of the SSD300 backbone. The last map is pooled by the
/// model itself.
const FEATURE_SIZES: [usize; 6] = [38, 19, 10, 5, 3, 3];

fn zero_heads(config: &SsdConfig) -> Result<Vec<Box<dyn DetectionHead>>> {
    config
        .scales
        .iter()
        .map(|scale| -> Result<Box<dyn DetectionHead>> {
            let head: Box<dyn DetectionHead> = if scale.global_pool() {
                Box::new(
                    DenseHeadInit {
                        in_channels: CHANNELS,
                        num_boxes_per_cell: scale.num_boxes_per_cell(),
                        num_classes: NUM_CLASSES,
                    }
                    .build_zeros()?,
                )
            } else {
                Box::new(
                    Conv2DHeadInit {
                        in_channels: CHANNELS,
                        num_boxes_per_cell: scale.num_boxes_per_cell(),
                        num_classes: NUM_CLASSES,
                    }
                    .build_zeros()?,
                )
            };
            Ok(head)
        })
        .collect()
}

fn random_heads(config: &SsdConfig, seed: u64) -> Result<Vec<Box<dyn DetectionHead>>> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut uniform = move || rng.gen_range(-0.5f32..0.5);

    config
        .scales
        .iter()
        .map(|scale| -> Result<Box<dyn DetectionHead>> {
            let num_boxes = scale.num_boxes_per_cell();
            let head: Box<dyn DetectionHead> = if scale.global_pool() {
                let mut dense = |out_c: usize| {
                    DenseWeight::new(
                        Array2::from_shape_simple_fn((out_c, CHANNELS), &mut uniform),
                        Array1::from_shape_simple_fn(out_c, &mut uniform),
                    )
                };
                let loc = dense(num_boxes * 4)?;
                let conf = dense(num_boxes * NUM_CLASSES)?;
                Box::new(DenseHead::new(num_boxes, NUM_CLASSES, loc, conf)?)
            } else {
                let mut conv = |out_c: usize| {
                    ConvWeight::new(
                        Array4::from_shape_simple_fn((out_c, CHANNELS, 3, 3), &mut uniform),
                        Array1::from_shape_simple_fn(out_c, &mut uniform),
                    )
                };
                let loc = conv(num_boxes * 4)?;
                let conf = conv(num_boxes * NUM_CLASSES)?;
                Box::new(Conv2DHead::new(num_boxes, NUM_CLASSES, loc, conf)?)
            };
            Ok(head)
        })
        .collect()
}

fn random_features(seed: u64) -> Vec<Array3<f32>> {
    let mut rng = StdRng::seed_from_u64(seed);
    FEATURE_SIZES
        .iter()
        .map(|&size| Array3::from_shape_simple_fn((size, size, CHANNELS), || rng.gen_range(0.0f32..2.0)))
        .collect()
}

fn build(config: SsdConfig, heads: Vec<Box<dyn DetectionHead>>) -> Result<SsdModel> {
    Ok(SsdModelInit { config, heads }.build()?)
}

#[test]
fn ssd300_forward_shape() -> Result<()> {
    let config = ssd300(NUM_CLASSES)?;
    let heads = zero_heads(&config)?;
    let mut model = build(config, heads)?;
    model.warm_up();

    let features: Vec<FeatureMap> = random_features(0)
        .into_iter()
        .map(|array| FeatureMap::new(array, ChannelOrder::ChannelsLast))
        .collect::<Result<_, _>>()?;
    let output = model.forward(&features)?;

    assert_eq!(output.num_anchors(), 7308);
    assert_eq!(output.row_len(), 4 + NUM_CLASSES + 8);
    assert!(output.loc().iter().all(|&value| value == 0.0));
    output
        .conf()
        .iter()
        .for_each(|&prob| assert_abs_diff_eq!(prob, 1.0 / NUM_CLASSES as f32, epsilon = 1e-6));
    output
        .anchor_boxes()
        .iter()
        .for_each(|&value| assert!((0.0..=1.0).contains(&value)));
    output.variances().rows().into_iter().for_each(|row| {
        assert_eq!(row.to_vec(), vec![0.1, 0.1, 0.2, 0.2]);
    });

    // the first anchor is the clipped square of the top-left conv4_3 cell
    let first = output.anchor_boxes().row(0).to_vec();
    assert_abs_diff_eq!(first[0], 0.0);
    assert_abs_diff_eq!(first[1], 0.0);
    assert_abs_diff_eq!(first[2], 0.5 / 38.0 + 0.05, epsilon = 1e-6);
    assert_abs_diff_eq!(first[3], 0.5 / 38.0 + 0.05, epsilon = 1e-6);

    // the last six rows belong to the pooled scale centered on the image
    let last = output.anchor_boxes().row(7307).to_vec();
    assert_abs_diff_eq!((last[0] + last[2]) / 2.0, 0.5, epsilon = 1e-6);
    assert_abs_diff_eq!((last[1] + last[3]) / 2.0, 0.5, epsilon = 1e-6);

    Ok(())
}

#[test]
fn ssd300_softmax_with_random_heads() -> Result<()> {
    let config = ssd300(NUM_CLASSES)?;
    let heads = random_heads(&config, 1)?;
    let mut model = build(config, heads)?;

    let features: Vec<FeatureMap> = random_features(2)
        .into_iter()
        .map(|array| FeatureMap::new(array, ChannelOrder::ChannelsLast))
        .collect::<Result<_, _>>()?;
    let output = model.forward(&features)?;

    output.conf().rows().into_iter().for_each(|row| {
        assert_abs_diff_eq!(row.sum(), 1.0, epsilon = 1e-5);
        assert!(row.iter().all(|&prob| prob >= 0.0));
    });
    assert!(output.loc().iter().any(|&value| value != 0.0));
    Ok(())
}

#[test]
fn ssd300_channel_order_is_transparent() -> Result<()> {
    let last_config = ssd300(NUM_CLASSES)?;
    let first_config = SsdConfig {
        input_shape: [3, 300, 300],
        channel_order: ChannelOrder::ChannelsFirst,
        ..last_config.clone()
    };

    let mut last_model = build(last_config.clone(), random_heads(&last_config, 3)?)?;
    let mut first_model = build(first_config.clone(), random_heads(&first_config, 3)?)?;
    assert_eq!(last_model.image_size(), first_model.image_size());

    let arrays = random_features(4);
    let last_features = last_model.feature_maps(
        arrays
            .iter()
            .map(|array| array.clone().into_dyn())
            .collect(),
    )?;
    let first_features = first_model.feature_maps(
        arrays
            .iter()
            .map(|array| -> ArrayD<f32> {
                array
                    .view()
                    .permuted_axes([2, 0, 1])
                    .as_standard_layout()
                    .into_owned()
                    .into_dyn()
            })
            .collect(),
    )?;

    let last_output = last_model.forward(&last_features)?;
    let first_output = first_model.forward(&first_features)?;
    assert_eq!(last_output, first_output);
    Ok(())
}

#[test]
fn ssd300_anchor_block_matches_forward() -> Result<()> {
    let config = ssd300(NUM_CLASSES)?;
    let grids: Vec<_> = config
        .scales
        .iter()
        .map(|scale| scale.grid())
        .collect::<Option<_>>()
        .expect("every zoo scale has a grid");
    let heads = zero_heads(&config)?;
    let mut model = build(config, heads)?;

    let anchors = model.anchors(&grids)?;
    assert_eq!(anchors.dim(), (7308, 8));

    let features: Vec<FeatureMap> = random_features(5)
        .into_iter()
        .map(|array| FeatureMap::new(array, ChannelOrder::ChannelsLast))
        .collect::<Result<_, _>>()?;
    let output = model.forward(&features)?;
    assert_eq!(output.anchors(), anchors.view());
    Ok(())
}

#[test]
fn ssd300_rejects_wrong_feature_size() -> Result<()> {
    let config = ssd300(NUM_CLASSES)?;
    let heads = zero_heads(&config)?;
    let mut model = build(config, heads)?;

    let mut features: Vec<FeatureMap> = random_features(6)
        .into_iter()
        .map(|array| FeatureMap::new(array, ChannelOrder::ChannelsLast))
        .collect::<Result<_, _>>()?;
    features[2] = FeatureMap::new(Array3::zeros((10, 10, CHANNELS + 1)), ChannelOrder::ChannelsLast)?;

    match model.forward(&features) {
        Err(Error::InvalidFeatureMap { scale, .. }) => assert_eq!(scale, "conv6_2"),
        other => panic!("unexpected result {:?}", other.map(|_| ())),
    }

    let result = model.feature_maps(vec![ArrayD::zeros(vec![4, 4]); 6]);
    assert!(matches!(result, Err(Error::InvalidFeatureMap { .. })));
    Ok(())
}
