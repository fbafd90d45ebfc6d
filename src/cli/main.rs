//! Badge portrait CLI
//!
//! Face detection is an external capability, so faces are passed in with
//! `--face x,y,w,h` (pixels, or `[0,1]` with `--normalized`).

use super::config::{parse_face, CliConfigBuilder};
use crate::{
    processor::{BadgeProcessor, DefaultBackendFactory, ProcessedImage},
    services::{badge_file_name, timestamp_ms, BadgeVariant, ImageIOService},
    tracing_config::init_cli_tracing,
    types::{BackendKind, BoundingBox},
    utils::ExecutionProviderManager,
};
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use log::info;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Portrait pipeline for identity badges
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "badge-portrait")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging (-v: DEBUG, -vv: TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emit JSON log lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Pipeline configuration JSON file; flags are applied on top
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Crop around the face, as a 4:3 rectangle or a ringed circle
    Crop {
        #[command(flatten)]
        image: ImageArgs,
        #[command(flatten)]
        face: FaceArgs,
        #[arg(long, value_enum, default_value_t = CropShapeArg::Rect)]
        shape: CropShapeArg,
    },
    /// Remove the background with the matte network
    RemoveBackground {
        #[command(flatten)]
        image: ImageArgs,
        #[command(flatten)]
        model: ModelArgs,
    },
    /// Remove the background and cut the round badge portrait
    Badge {
        #[command(flatten)]
        image: ImageArgs,
        #[command(flatten)]
        face: FaceArgs,
        #[command(flatten)]
        model: ModelArgs,
        /// Candidate name, used for the badge file name
        #[arg(long)]
        name: Option<String>,
    },
    /// Round badge canvas around the face, keeping the background
    RoundWithBackground {
        #[command(flatten)]
        image: ImageArgs,
        #[command(flatten)]
        face: FaceArgs,
    },
    /// Show backend and execution provider availability
    Providers,
}

#[derive(Args, Debug)]
pub struct ImageArgs {
    /// Input image
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Output PNG file or directory [default: generated name in the current directory]
    #[arg(short, long, value_name = "OUTPUT")]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct FaceArgs {
    /// Face box as x,y,w,h
    #[arg(long, value_parser = parse_face, allow_hyphen_values = true)]
    pub face: BoundingBox,

    /// The face box is normalized to [0,1] instead of pixels
    #[arg(long)]
    pub normalized: bool,
}

#[derive(Args, Debug)]
pub struct ModelArgs {
    /// Matte network: URL or path to an ONNX file
    #[arg(short, long)]
    pub model: Option<String>,

    /// Expected SHA-256 of the model bytes
    #[arg(long, value_name = "HEX")]
    pub model_sha256: Option<String>,

    /// Execution provider in format backend:provider (e.g., onnx:auto, onnx:coreml, tract:cpu)
    #[arg(short, long, default_value = "onnx:auto")]
    pub execution_provider: String,

    /// Number of threads (0 = auto-detect optimal threading)
    #[arg(short, long, default_value_t = 0)]
    pub threads: usize,

    /// Use custom model cache directory
    #[arg(long, value_name = "PATH")]
    pub cache_dir: Option<PathBuf>,

    /// Do not cache downloaded models
    #[arg(long)]
    pub no_cache: bool,

    /// Show download progress
    #[arg(long)]
    pub progress: bool,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum CropShapeArg {
    Rect,
    Circle,
}

/// Main entry point for CLI application
///
/// # Errors
/// - Invalid arguments or configuration
/// - Image I/O, model fetch or processing failures
pub async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_cli_tracing(cli.verbose, cli.json_logs).context("Failed to initialize tracing")?;

    let start = Instant::now();
    let config_file = cli.config.as_deref();

    let (result, output, file_name) = match &cli.command {
        Command::Providers => {
            show_provider_diagnostics();
            return Ok(());
        },
        Command::Crop { image, face, shape } => {
            let processor = create_processor(config_file, None)?;
            load(&processor, image, Some(face))?;
            let result = match shape {
                CropShapeArg::Rect => processor.crop_face()?,
                CropShapeArg::Circle => processor.crop_round()?,
            };
            (result, image.output.as_deref(), None)
        },
        Command::RemoveBackground { image, model } => {
            let processor = create_processor(config_file, Some(model))?;
            load(&processor, image, None)?;
            processor
                .init_matte_network()
                .await
                .context("Failed to initialize the matte network")?;
            let result = processor
                .remove_background(BackendKind::SingleTensorMatteNetwork)
                .await?;
            (result, image.output.as_deref(), None)
        },
        Command::Badge {
            image,
            face,
            model,
            name,
        } => {
            let file_name = name
                .as_deref()
                .map(|name| badge_file_name(name, BadgeVariant::RoundNoBackground, timestamp_ms()))
                .transpose()?;
            let processor = create_processor(config_file, Some(model))?;
            load(&processor, image, Some(face))?;
            processor
                .init_matte_network()
                .await
                .context("Failed to initialize the matte network")?;
            let result = processor
                .badge_portrait(BackendKind::SingleTensorMatteNetwork)
                .await?;
            (result, image.output.as_deref(), file_name)
        },
        Command::RoundWithBackground { image, face } => {
            let processor = create_processor(config_file, None)?;
            load(&processor, image, Some(face))?;
            (
                processor.round_with_background()?,
                image.output.as_deref(),
                None,
            )
        },
    };

    let result = result.context("Source image changed while processing")?;
    let file_name = file_name.unwrap_or_else(|| result.file_name(timestamp_ms()));
    let path = write_output(&result, output, &file_name)?;

    info!(
        "✅ Wrote {} ({}x{}) in {:.2}s",
        path.display(),
        result.image.width(),
        result.image.height(),
        start.elapsed().as_secs_f64()
    );
    if let Some(segmentation) = &result.segmentation {
        if let Some(spec) = segmentation.input_spec {
            info!(
                "Segmented with {spec} after {} attempt(s)",
                segmentation.attempts.len()
            );
        }
    }
    Ok(())
}

fn create_processor(config_file: Option<&Path>, model: Option<&ModelArgs>) -> Result<BadgeProcessor> {
    let (config, backend_type) = CliConfigBuilder::build(config_file, model)?;
    info!(
        "Backend: {backend_type}, Provider: {:?}",
        config.execution_provider
    );

    let mut processor =
        BadgeProcessor::with_factory(config, Box::new(DefaultBackendFactory), backend_type)
            .context("Failed to create badge processor")?;
    if let Some(model) = model {
        processor = processor
            .with_fetcher(CliConfigBuilder::fetcher(model)?)
            .with_progress(model.progress);
    }
    Ok(processor)
}

fn load(processor: &BadgeProcessor, image: &ImageArgs, face: Option<&FaceArgs>) -> Result<()> {
    let source = ImageIOService::load_image(&image.input)
        .with_context(|| format!("Failed to load {}", image.input.display()))?;
    info!(
        "Loaded {} ({}x{})",
        image.input.display(),
        source.width(),
        source.height()
    );
    processor.load_image(source)?;

    if let Some(face) = face {
        processor
            .set_faces(&[face.face], CliConfigBuilder::coordinate_space(face))
            .context("Invalid face box")?;
    }
    Ok(())
}

/// Output goes to the given file, into the given directory, or to the
/// current directory under the generated name
fn write_output(result: &ProcessedImage, output: Option<&Path>, file_name: &str) -> Result<PathBuf> {
    let path = match output {
        Some(dir) if dir.is_dir() => dir.join(file_name),
        Some(path) => path.to_path_buf(),
        None => PathBuf::from(file_name),
    };
    ImageIOService::save_png(&result.image, &path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

fn show_provider_diagnostics() {
    println!("🔍 Backend and Execution Provider Diagnostics");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let cpu_count = std::thread::available_parallelism()
        .map(std::num::NonZero::get)
        .unwrap_or(1);
    println!("💻 System: {cpu_count} CPU cores detected");

    println!("\n🚀 Execution Providers:");
    for provider_info in ExecutionProviderManager::list_all_providers() {
        let status = if provider_info.available {
            "✅ Available"
        } else {
            "❌ Not Available"
        };
        println!(
            "  • {}: {} - {}",
            provider_info.name, status, provider_info.description
        );
    }

    println!("\n💡 Usage Examples:");
    println!("  --execution-provider onnx:auto    # Auto-select best ONNX provider (default)");
    println!("  --execution-provider onnx:coreml  # Use Apple CoreML (macOS)");
    println!("  --execution-provider onnx:cuda    # Use NVIDIA CUDA");
    println!("  --execution-provider tract        # Pure Rust Tract backend, same as tract:cpu");
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_crop_command() {
        let cli = Cli::try_parse_from([
            "badge-portrait",
            "crop",
            "portrait.jpg",
            "--face",
            "300,150,120,160",
            "--shape",
            "circle",
        ])
        .unwrap();
        match cli.command {
            Command::Crop { image, face, shape } => {
                assert_eq!(image.input, PathBuf::from("portrait.jpg"));
                assert_eq!(face.face, BoundingBox::new(300.0, 150.0, 120.0, 160.0));
                assert!(!face.normalized);
                assert_eq!(shape, CropShapeArg::Circle);
            },
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_badge_command_with_model() {
        let cli = Cli::try_parse_from([
            "badge-portrait",
            "-v",
            "badge",
            "portrait.jpg",
            "--face",
            "0.3,0.2,0.15,0.25",
            "--normalized",
            "--model",
            "https://example.com/matte.onnx",
            "--execution-provider",
            "tract:cpu",
            "--name",
            "Maria Silva",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 1);
        match cli.command {
            Command::Badge {
                face, model, name, ..
            } => {
                assert!(face.normalized);
                assert_eq!(model.execution_provider, "tract:cpu");
                assert_eq!(name.as_deref(), Some("Maria Silva"));
            },
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_face_is_required_for_crop() {
        assert!(Cli::try_parse_from(["badge-portrait", "crop", "portrait.jpg"]).is_err());
    }
}
