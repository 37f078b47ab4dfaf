//! nozzle-align CLI: offline detection and calibration math on files.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use nozzle_align::blob::{annotate_frame, stage_color, BlobCascadeDetector};
use nozzle_align::calib::{average_mpp, CalibrationSample, TransformFitter};
use nozzle_align::camera::{frame_to_image, load_frame, ImageFileSource};
use nozzle_align::core::{FrameSize, LatestFrame};
use nozzle_align::jobs::{wait_for_job, DetectionJobManager, PollError};
use nozzle_align::NozzleAlignConfig;
use serde::{Deserialize, Serialize};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "nozzle-align")]
#[command(about = "Locate a printer nozzle in camera images and fit camera calibrations")]
#[command(version)]
struct Cli {
    /// JSON config; missing fields take their defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the blob cascade once on an image.
    Detect {
        image: PathBuf,

        /// Write the annotated frame here.
        #[arg(long)]
        annotated: Option<PathBuf>,
    },

    /// Run a stabilized detection job, re-reading the image for every frame.
    Locate {
        image: PathBuf,

        /// Override the stabilizer timeout, in seconds.
        #[arg(long)]
        timeout: Option<f64>,

        /// Write the last annotated frame here.
        #[arg(long)]
        annotated: Option<PathBuf>,
    },

    /// Fit the pixel-to-machine transform from calibration points.
    Fit {
        /// JSON array of `{ "space_xy": [x, y], "camera_uv": [u, v] }`.
        points: PathBuf,
    },

    /// Average mm-per-pixel samples with outlier pruning.
    Mpp {
        /// JSON array of `{ "space_xy": [x, y], "camera_uv": [u, v], "mpp": m }`.
        samples: PathBuf,
    },

    /// Print the effective configuration.
    Config,
}

#[derive(Debug, Deserialize)]
struct FitPoint {
    space_xy: [f64; 2],
    camera_uv: [f64; 2],
}

#[derive(Serialize)]
struct DetectOutput {
    width: usize,
    height: usize,
    stage_counts: Vec<usize>,
    detection: Option<nozzle_align::blob::CascadeDetection>,
}

#[derive(Serialize)]
struct FitOutput {
    frame: FrameSize,
    transform: nozzle_align::calib::TransformMatrix,
    residual: f64,
    center_position: [f64; 2],
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    if let Err(e) = run(cli) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

#[cfg(feature = "tracing")]
fn init_logging(_verbose: u8) {
    nozzle_align::core::init_tracing(false);
}

#[cfg(not(feature = "tracing"))]
fn init_logging(verbose: u8) {
    use log::LevelFilter;

    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    // A logger can only be installed once; a second install is harmless.
    let _ = nozzle_align::core::init_with_level(level);
}

fn run(cli: Cli) -> CliResult<()> {
    let cfg = match &cli.config {
        Some(path) => NozzleAlignConfig::load_json(path)?,
        None => NozzleAlignConfig::default(),
    };

    match cli.command {
        Commands::Detect { image, annotated } => detect(&cfg, &image, annotated.as_deref()),
        Commands::Locate {
            image,
            timeout,
            annotated,
        } => locate(cfg, image, timeout, annotated.as_deref()),
        Commands::Fit { points } => fit(&cfg, &points),
        Commands::Mpp { samples } => mpp(&cfg, &samples),
        Commands::Config => print_json(&cfg),
    }
}

fn print_json<T: Serialize>(value: &T) -> CliResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> CliResult<T> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

fn detect(cfg: &NozzleAlignConfig, image: &Path, annotated: Option<&Path>) -> CliResult<()> {
    let frame = load_frame(image, &cfg.camera)?;
    let detector = BlobCascadeDetector::new(cfg.cascade.clone());
    let report = detector.detect_with_report(&frame);

    if let Some(out) = annotated {
        let det = report.detection.as_ref();
        let fill = stage_color(det.map_or(0, |d| d.stage));
        let drawn = annotate_frame(&frame, det.map(|d| &d.blob), fill);
        frame_to_image(&drawn)?.save(out)?;
        log::info!("annotated frame written to {}", out.display());
    }

    print_json(&DetectOutput {
        width: frame.width(),
        height: frame.height(),
        stage_counts: report.stage_counts,
        detection: report.detection,
    })
}

fn locate(
    mut cfg: NozzleAlignConfig,
    image: PathBuf,
    timeout: Option<f64>,
    annotated: Option<&Path>,
) -> CliResult<()> {
    if let Some(t) = timeout {
        cfg.stabilize.timeout_s = t;
    }
    let camera = ImageFileSource::new(image, cfg.camera.clone());
    let detector = BlobCascadeDetector::new(cfg.cascade.clone());
    let preview = Arc::new(LatestFrame::new());
    let manager = DetectionJobManager::with_sink(
        Arc::new(camera),
        Arc::new(detector),
        preview.clone(),
        cfg.job_manager(),
    );

    let id = manager.start_job();
    match wait_for_job(&manager, id, &cfg.poll) {
        Ok(_) | Err(PollError::NotFound(_) | PollError::Detection(_)) => {}
        Err(e) => return Err(e.into()),
    }
    if let (Some(out), Some(frame)) = (annotated, preview.latest()) {
        frame_to_image(&frame)?.save(out)?;
        log::info!("annotated frame written to {}", out.display());
    }
    print_json(&manager.response(id))
}

fn fit(cfg: &NozzleAlignConfig, path: &Path) -> CliResult<()> {
    let points: Vec<FitPoint> = read_json(path)?;
    let pairs: Vec<_> = points.iter().map(|p| (p.space_xy, p.camera_uv)).collect();
    let frame = cfg.camera.frame_size();
    let fit = TransformFitter::new(frame).fit(&pairs)?;
    print_json(&FitOutput {
        frame,
        transform: fit.transform,
        residual: fit.residual,
        center_position: fit.transform.center_position(),
    })
}

fn mpp(cfg: &NozzleAlignConfig, path: &Path) -> CliResult<()> {
    let samples: Vec<CalibrationSample> = read_json(path)?;
    let avg = average_mpp(&samples, &cfg.calibration.mpp_filter)?;
    print_json(&avg)
}
