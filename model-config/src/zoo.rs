use crate::{
    common::*,
    config::SsdConfig,
    error::ConfigError,
    misc::{ChannelOrder, GridSize},
    scale::{ScaleConfig, ScaleSpec},
};

/// The SSD300 configuration on a 300x300 input.
///
/// Scales are listed from the finest to the coarsest feature map. The first
/// scale is L2-normalized and the last one is globally pooled.
pub fn ssd300(num_classes: usize) -> Result<SsdConfig, ConfigError> {
    let ratios = |values: &[f64]| -> Vec<R64> { values.iter().cloned().map(r64).collect() };

    let scale = |name: &str,
                 min_size: f64,
                 max_size: Option<f64>,
                 aspect_ratios: &[f64],
                 grid: usize|
     -> Result<ScaleSpec, ConfigError> {
        ScaleSpec::new(ScaleConfig {
            max_size: max_size.map(r64),
            aspect_ratios: ratios(aspect_ratios),
            grid: Some(GridSize::new(grid, grid)?),
            ..ScaleConfig::new(name, min_size)
        })
    };

    let conv4_3_norm = ScaleSpec::new(ScaleConfig {
        aspect_ratios: ratios(&[2.0]),
        l2_norm_scale: Some(r64(20.0)),
        grid: Some(GridSize::new(38, 38)?),
        ..ScaleConfig::new("conv4_3_norm", 30.0)
    })?;
    let pool6 = ScaleSpec::new(ScaleConfig {
        max_size: Some(r64(330.0)),
        aspect_ratios: ratios(&[2.0, 3.0]),
        global_pool: true,
        grid: Some(GridSize::new(1, 1)?),
        ..ScaleConfig::new("pool6", 276.0)
    })?;

    let config = SsdConfig {
        num_classes,
        input_shape: [300, 300, 3],
        channel_order: ChannelOrder::ChannelsLast,
        scales: vec![
            conv4_3_norm,
            scale("fc7", 60.0, Some(114.0), &[2.0, 3.0], 19)?,
            scale("conv6_2", 114.0, Some(168.0), &[2.0, 3.0], 10)?,
            scale("conv7_2", 168.0, Some(222.0), &[2.0, 3.0], 5)?,
            scale("conv8_2", 222.0, Some(276.0), &[2.0, 3.0], 3)?,
            pool6,
        ],
    };
    config.validate()?;
    Ok(config)
}
