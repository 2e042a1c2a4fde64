use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use model_config::{ssd300, SsdConfig};
use prettytable::{cell, row, Table};
use serde::Serialize;
use ssd_dl::PriorBoxInit;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Parser)]
/// Inspect anchor configurations of SSD-style detectors.
enum Opts {
    /// Print the scales and anchor counts of a configuration.
    Info {
        /// configuration file
        config_file: PathBuf,
    },
    /// Write the anchors of every scale on its configured grid to a CSV file.
    Anchors {
        /// configuration file
        config_file: PathBuf,
        /// output CSV file
        output_file: PathBuf,
    },
    /// Write the SSD300 reference configuration.
    Zoo {
        /// output JSON5 file
        output_file: PathBuf,
        /// number of classes including the background
        #[clap(long, default_value = "21")]
        num_classes: usize,
    },
}

#[derive(Debug, Serialize)]
struct AnchorRecord<'a> {
    scale: &'a str,
    xmin: f32,
    ymin: f32,
    xmax: f32,
    ymax: f32,
    var_cx: f32,
    var_cy: f32,
    var_w: f32,
    var_h: f32,
}

fn main() -> Result<()> {
    pretty_env_logger::init();

    match Opts::parse() {
        Opts::Info { config_file } => {
            print_info(config_file)?;
        }
        Opts::Anchors {
            config_file,
            output_file,
        } => {
            write_anchors(config_file, output_file)?;
        }
        Opts::Zoo {
            output_file,
            num_classes,
        } => {
            write_zoo(output_file, num_classes)?;
        }
    }

    Ok(())
}

fn print_info(config_file: impl AsRef<Path>) -> Result<()> {
    let config = SsdConfig::load(config_file)?;
    let image_size = config.image_size()?;

    println!(
        "input: {} ({}), classes: {}",
        image_size,
        config.channel_order.as_ref(),
        config.num_classes
    );

    // print scale information
    {
        let mut table = Table::new();
        table.add_row(row![
            "name",
            "min_size",
            "max_size",
            "aspect_ratios",
            "flip",
            "clip",
            "l2_norm",
            "pool",
            "boxes/cell",
            "grid",
            "anchors"
        ]);

        config.scales.iter().for_each(|scale| {
            let ratios: Vec<_> = scale
                .aspect_ratios()
                .iter()
                .map(|ratio| ratio.raw())
                .collect();

            table.add_row(row![
                scale.name(),
                scale.min_size().raw(),
                scale
                    .max_size()
                    .map(|size| format!("{}", size.raw()))
                    .unwrap_or_else(|| "-".to_string()),
                format!("{:?}", ratios),
                scale.flip(),
                scale.clip(),
                scale
                    .l2_norm_scale()
                    .map(|scale| format!("{}", scale.raw()))
                    .unwrap_or_else(|| "-".to_string()),
                scale.global_pool(),
                scale.num_boxes_per_cell(),
                scale
                    .grid()
                    .map(|grid| grid.to_string())
                    .unwrap_or_else(|| "-".to_string()),
                scale
                    .grid()
                    .map(|grid| (grid.num_cells() * scale.num_boxes_per_cell()).to_string())
                    .unwrap_or_else(|| "-".to_string()),
            ]);
        });

        table.printstd();
    }

    match config.num_anchors() {
        Some(num_anchors) => println!("total anchors: {}", num_anchors),
        None => println!("total anchors: unknown, some scales have no grid"),
    }

    Ok(())
}

fn write_anchors(config_file: impl AsRef<Path>, output_file: impl AsRef<Path>) -> Result<()> {
    let output_file = output_file.as_ref();
    let config = SsdConfig::load(config_file)?;
    let image_size = config.image_size()?;

    let mut writer = csv::Writer::from_path(output_file)
        .with_context(|| format!("failed to create '{}'", output_file.display()))?;
    let mut num_anchors = 0;

    for scale in &config.scales {
        let grid = scale
            .grid()
            .with_context(|| format!("scale '{}' has no grid size", scale.name()))?;
        let anchors = PriorBoxInit {
            image_size,
            spec: scale.clone(),
        }
        .build()?
        .generate(grid.h(), grid.w())?;

        for anchor in anchors.iter() {
            let [xmin, ymin, xmax, ymax] = anchor.xyxy;
            let [var_cx, var_cy, var_w, var_h] = anchor.variances;
            writer.serialize(AnchorRecord {
                scale: scale.name().as_str(),
                xmin,
                ymin,
                xmax,
                ymax,
                var_cx,
                var_cy,
                var_w,
                var_h,
            })?;
        }
        num_anchors += anchors.len();
    }
    writer.flush()?;

    info!(
        "wrote {} anchors to '{}'",
        num_anchors,
        output_file.display()
    );
    Ok(())
}

fn write_zoo(output_file: impl AsRef<Path>, num_classes: usize) -> Result<()> {
    let output_file = output_file.as_ref();
    let config = ssd300(num_classes)?;
    let text = json5::to_string(&config)?;
    std::fs::write(output_file, text)
        .with_context(|| format!("failed to write '{}'", output_file.display()))?;
    Ok(())
}
