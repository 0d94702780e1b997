use std::path::PathBuf;
use std::process;

use clap::Parser;

use firesight_core::detection::domain::device::Device;
use firesight_core::pipeline::pipeline_logger::StdoutPipelineLogger;
use firesight_core::shared::constants::{DEFAULT_CONFIDENCE, DEFAULT_IOU_THRESHOLD};
use firesight_core::{ProcessVideoConfig, ProcessVideoUseCase};

/// Object detection for videos: writes annotated_output.mp4 with a labeled
/// box around every detected object.
#[derive(Parser)]
#[command(name = "firesight")]
struct Cli {
    /// Input video file.
    input: PathBuf,

    /// Compute device: cuda, coreml, directml or cpu (default: best available).
    #[arg(long)]
    device: Option<Device>,

    /// Directory containing last.onnx (default: next to this executable).
    #[arg(long)]
    model_dir: Option<PathBuf>,

    /// Class names file, one per line (default: last.names next to the model).
    #[arg(long)]
    labels: Option<PathBuf>,

    /// Detection confidence threshold (0.0-1.0).
    #[arg(long, default_value_t = DEFAULT_CONFIDENCE)]
    confidence: f32,

    /// NMS IoU threshold (0.0-1.0).
    #[arg(long, default_value_t = DEFAULT_IOU_THRESHOLD)]
    iou: f32,

    /// Directory for annotated_output.mp4.
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    validate(&cli)?;

    let config = ProcessVideoConfig {
        model_dir: cli.model_dir,
        device: cli.device,
        confidence: cli.confidence,
        iou_threshold: cli.iou,
        labels: cli.labels,
        output_dir: cli.output_dir,
    };

    let report = ProcessVideoUseCase::new(config)
        .with_logger(Box::new(StdoutPipelineLogger::default()))
        .execute(&cli.input)?;

    let total: usize = report.detections_per_frame.iter().sum();
    log::info!(
        "{} detections across {} frames",
        total,
        report.frames_written
    );
    println!("{}", report.output_path.display());
    Ok(())
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if !(0.0..=1.0).contains(&cli.confidence) {
        return Err(format!(
            "Confidence must be between 0.0 and 1.0, got {}",
            cli.confidence
        )
        .into());
    }
    if !(0.0..=1.0).contains(&cli.iou) {
        return Err(format!("IoU must be between 0.0 and 1.0, got {}", cli.iou).into());
    }
    if !cli.output_dir.is_dir() {
        return Err(format!(
            "Output directory does not exist: {}",
            cli.output_dir.display()
        )
        .into());
    }
    Ok(())
}
