//! Command line front end for the soft stretch calibration.
//!
//! # Usage
//!
//! ```bash
//! # Print the calibrated stretch for an image
//! soft_stretch analyze m42.png
//! soft_stretch analyze m42.png --json -a 10 --median-target 0.2
//!
//! # Stretch an image and write the result
//! soft_stretch apply m42.png m42_stretched.png --ht-expand-low 0.05
//!
//! # Manage stored presets
//! soft_stretch preset save faint -a 10 --median-target 0.2
//! soft_stretch preset list
//! soft_stretch preset show faint
//! soft_stretch preset delete faint
//! ```
//!
//! Settings start from the last used configuration unless `--preset` or
//! `--defaults` is given. Every successful `analyze` or `apply` records its
//! settings as the new last used configuration.

mod args;
mod io;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use softstretch::{
    soft_stretch, Image16, PresetStorage, SoftStretch, SoftStretchConfig, ToneCurveExecutor,
};

use crate::args::StretchArgs;

#[derive(Parser, Debug)]
#[command(name = "soft_stretch")]
#[command(about = "Automatic soft histogram stretch for astronomical images")]
#[command(version)]
struct Cli {
    /// Show per-channel fit details (sets the default log filter to info)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Preset directory (defaults to ~/.softstretch)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compute the stretch for an image without modifying it
    Analyze {
        /// Input image (grayscale or RGB)
        input: PathBuf,

        /// Print the full result as JSON
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        stretch: StretchArgs,
    },

    /// Compute the stretch and write the stretched image
    Apply {
        /// Input image (grayscale or RGB)
        input: PathBuf,

        /// Output image, format chosen by extension
        output: PathBuf,

        #[command(flatten)]
        stretch: StretchArgs,
    },

    /// Manage stored presets
    Preset {
        #[command(subcommand)]
        action: PresetCommand,
    },
}

#[derive(Subcommand, Debug)]
enum PresetCommand {
    /// Store the resolved settings under a name
    Save {
        name: String,

        #[command(flatten)]
        stretch: StretchArgs,
    },
    /// List stored presets
    List,
    /// Print a stored preset as JSON
    Show { name: String },
    /// Delete a stored preset
    Delete { name: String },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let storage = match cli.config_dir {
        Some(dir) => PresetStorage::with_path(dir),
        None => PresetStorage::new().context("Cannot locate the preset directory")?,
    };

    match cli.command {
        Command::Analyze {
            input,
            json,
            stretch,
        } => cmd_analyze(&storage, &input, json, &stretch),
        Command::Apply {
            input,
            output,
            stretch,
        } => cmd_apply(&storage, &input, &output, &stretch),
        Command::Preset { action } => cmd_preset(&storage, action),
    }
}

/// Load the image, resolve the settings and run the stretch.
fn run_stretch(
    storage: &PresetStorage,
    input: &Path,
    stretch: &StretchArgs,
) -> Result<(Image16, SoftStretchConfig, SoftStretch)> {
    let config = stretch.resolve(storage)?;
    let image = io::load_image(input)?;
    info!(
        "Loaded {} ({} channel{})",
        input.display(),
        image.channel_count(),
        if image.channel_count() == 1 { "" } else { "s" }
    );

    let histogram = image.histogram()?;
    let result = soft_stretch(&histogram, &histogram.medians(), &config)?;
    Ok((image, config, result))
}

fn cmd_analyze(
    storage: &PresetStorage,
    input: &Path,
    json: bool,
    stretch: &StretchArgs,
) -> Result<()> {
    let (_, config, result) = run_stretch(storage, input, stretch)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_summary(&result);
    }

    storage.save_last_used(&config)?;
    Ok(())
}

fn cmd_apply(
    storage: &PresetStorage,
    input: &Path,
    output: &Path,
    stretch: &StretchArgs,
) -> Result<()> {
    let (mut image, config, result) = run_stretch(storage, input, stretch)?;
    print_summary(&result);

    let transform = result.parameters.to_histogram_transform();
    image.execute(&transform)?;
    io::save_image(&image, output)?;
    info!("Wrote {}", output.display());

    storage.save_last_used(&config)?;
    Ok(())
}

fn cmd_preset(storage: &PresetStorage, action: PresetCommand) -> Result<()> {
    match action {
        PresetCommand::Save { name, stretch } => {
            let config = stretch.resolve(storage)?;
            let path = storage.save_preset(&name, &config)?;
            println!("Saved preset '{}' to {}", name, path.display());
        }
        PresetCommand::List => {
            let names = storage.list_presets()?;
            if names.is_empty() {
                println!("No presets in {}", storage.root_path().display());
            }
            for name in names {
                println!("{name}");
            }
        }
        PresetCommand::Show { name } => match storage.get_preset(&name) {
            Some(config) => println!("{}", serde_json::to_string_pretty(&config?)?),
            None => bail!("No preset named '{name}'"),
        },
        PresetCommand::Delete { name } => {
            if storage.delete_preset(&name)? {
                println!("Deleted preset '{name}'");
            } else {
                bail!("No preset named '{name}'");
            }
        }
    }
    Ok(())
}

fn print_summary(result: &SoftStretch) {
    let params = &result.parameters;
    println!("Black point:      {:.6}", params.black_point);
    println!("Midtones balance: {:.8}", params.midtones_balance);
    println!("White point:      {:.6}", params.white_point);
    println!(
        "Output range:     [{:.3}, {:.3}]",
        params.shadows_clip, params.highlights_clip
    );
    println!("Median:           {:.6} -> {:.6}", result.median, result.clipped_median);

    for report in &result.reports {
        match (report.slope, report.confidence_percent) {
            (Some(slope), Some(confidence)) => println!(
                "Channel {}: slope {:.4}, confidence {:.2}%, black point {} ADU",
                report.channel, slope, confidence, report.black_point_adu
            ),
            _ => println!(
                "Channel {}: no shadow fit, black point {} ADU",
                report.channel, report.black_point_adu
            ),
        }
    }

    for warning in &result.warnings {
        println!("Warning: {warning}");
    }
}
