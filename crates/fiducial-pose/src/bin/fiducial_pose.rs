use std::{
    fs,
    path::{Path, PathBuf},
};

use clap::{Parser, Subcommand};
use fiducial_pose::align::{CorrespondenceError, CorrespondenceSet, RigidTransform};
use fiducial_pose::core::{CalibrationError, CameraCalibration};
use fiducial_pose::estimate::{ConfigError, TrackerConfig};
use serde::Serialize;

/// Fiducial pose utilities: board layouts, intrinsics and display alignment.
#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Cli {
    /// Log debug output to stderr.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the marker corner layout of a tracker config.
    Board {
        /// Path to a JSON `TrackerConfig`.
        #[arg(long)]
        config: PathBuf,
    },
    /// Solve the rigid transform of a JSON correspondence set.
    Align {
        /// Path to a JSON `CorrespondenceSet`.
        #[arg(long)]
        input: PathBuf,
        /// Write the report here instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Print the intrinsics matrix and distortion vector of a calibration.
    Intrinsics {
        /// Path to a JSON `CameraCalibration`.
        #[arg(long)]
        calibration: PathBuf,
    },
}

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Calibration(#[from] CalibrationError),
    #[error(transparent)]
    Correspondence(#[from] CorrespondenceError),
}

#[derive(Debug, Serialize)]
struct AlignReport {
    correspondences: usize,
    transform: RigidTransform,
    rms_error: f64,
}

#[derive(Debug, Serialize)]
struct IntrinsicsReport {
    camera_matrix: [[f64; 3]; 3],
    dist_coeffs: [f64; 5],
}

fn run_board(config: &Path) -> Result<String, CliError> {
    let config = TrackerConfig::load_json(config)?;
    let layout = config.build_layout()?;
    Ok(serde_json::to_string_pretty(&layout)?)
}

fn run_align(input: &Path) -> Result<String, CliError> {
    let set = CorrespondenceSet::load_json(input)?;
    let transform = set
        .compute_transform()
        .map_err(CorrespondenceError::from)?;
    let sq_sum: f64 = set
        .camera_points
        .iter()
        .zip(&set.marker_points)
        .map(|(c, m)| (transform.apply(c) - m).norm_squared())
        .sum();
    let report = AlignReport {
        correspondences: set.len(),
        transform,
        rms_error: (sq_sum / set.len() as f64).sqrt(),
    };
    log::info!(
        "aligned {} correspondences, rms error {:.6}",
        report.correspondences,
        report.rms_error
    );
    Ok(serde_json::to_string_pretty(&report)?)
}

fn run_intrinsics(calibration: &Path) -> Result<String, CliError> {
    let calib = CameraCalibration::load_json(calibration)?;
    let k = calib.intrinsics_matrix();
    let report = IntrinsicsReport {
        camera_matrix: std::array::from_fn(|r| std::array::from_fn(|c| k[(r, c)])),
        dist_coeffs: calib.distortion_vector(),
    };
    Ok(serde_json::to_string_pretty(&report)?)
}

fn init_logging(verbose: bool) {
    let level = fiducial_pose::core::verbosity_level(verbose);
    #[cfg(feature = "tracing")]
    fiducial_pose::core::init_tracing(false, level);
    #[cfg(not(feature = "tracing"))]
    let _ = fiducial_pose::core::init_with_level(level);
}

fn main() {
    if let Err(err) = try_main() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn try_main() -> Result<(), CliError> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Board { config } => println!("{}", run_board(&config)?),
        Command::Align { input, output } => {
            let json = run_align(&input)?;
            match output {
                Some(path) => {
                    fs::write(&path, json)?;
                    log::info!("wrote {}", path.display());
                }
                None => println!("{json}"),
            }
        }
        Command::Intrinsics { calibration } => println!("{}", run_intrinsics(&calibration)?),
    }
    Ok(())
}
