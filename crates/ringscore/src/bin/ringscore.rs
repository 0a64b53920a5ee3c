//! ringscore CLI: live or offline scoring sessions and small utilities.

use clap::{Args, Parser, Subcommand};
use log::{info, LevelFilter};
use nalgebra::Point2;
use ringscore::aruco::builtins::DICT_4X4_50;
use ringscore::aruco::draw_marker;
use ringscore::source::stream_url;
use ringscore::{
    CalibrationConfig, CalibrationPreset, DirectorySource, FrameSource, HttpScoreService,
    MjpegSource, PipelineDriver, RingscoreConfig, ScoreMapper, ScoreService, ScoringCalibration,
};
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "ringscore")]
#[command(about = "Score shots on a marker-framed ring target from a camera stream")]
#[command(version)]
struct Cli {
    /// Log level (off, error, warn, info, debug, trace).
    #[arg(long, global = true, default_value = "info")]
    log_level: LevelFilter,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scoring session until `q` is entered or the source ends.
    Run(RunArgs),

    /// Render a DICT_4X4_50 marker with a one-cell quiet zone.
    PrintMarker {
        /// Marker id (0-3 frame the target).
        #[arg(long)]
        id: u32,

        /// Pixels per marker cell.
        #[arg(long, default_value = "40")]
        cell_px: u32,

        /// Output image path.
        #[arg(long)]
        out: PathBuf,
    },

    /// Print ring and angle of a point in canonical coordinates.
    Score {
        #[arg(long, allow_negative_numbers = true)]
        x: f64,

        #[arg(long, allow_negative_numbers = true)]
        y: f64,

        /// Calibration preset (uniform, measured).
        #[arg(long, default_value = "measured")]
        calibration: CalibrationPreset,
    },

    /// Write the default configuration as JSON.
    WriteConfig {
        #[arg(long)]
        out: PathBuf,
    },
}

#[derive(Debug, Clone, Args)]
struct RunArgs {
    /// JSON configuration; missing fields take their defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// MJPEG stream URL. Defaults to the camera selected in the scoring service.
    #[arg(long, conflicts_with = "frames")]
    stream_url: Option<String>,

    /// Replay image files from a directory instead of a live stream.
    #[arg(long)]
    frames: Option<PathBuf>,

    /// Calibration preset, overriding the configuration.
    #[arg(long)]
    calibration: Option<CalibrationPreset>,

    /// Minimum time between processed cycles, overriding the configuration.
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Stop after this many frames.
    #[arg(long)]
    max_frames: Option<u64>,

    /// Skip the final report to the scoring service.
    #[arg(long)]
    no_report: bool,

    /// Write the session summary (JSON) to this path.
    #[arg(long)]
    summary: Option<PathBuf>,
}

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn run() -> CliResult<()> {
    let cli = Cli::parse();
    init_logging(cli.log_level)?;

    match cli.command {
        Commands::Run(args) => run_session(args),
        Commands::PrintMarker { id, cell_px, out } => print_marker(id, cell_px, &out),
        Commands::Score { x, y, calibration } => {
            let mapper = ScoreMapper::new(ScoringCalibration::preset(calibration));
            let score = mapper.score(Point2::new(x, y));
            println!("ring {} angle {}", score.ring, score.angle);
            Ok(())
        }
        Commands::WriteConfig { out } => {
            RingscoreConfig::default().write_json(&out)?;
            println!("wrote {}", out.display());
            Ok(())
        }
    }
}

#[cfg(feature = "tracing")]
fn init_logging(_level: LevelFilter) -> CliResult<()> {
    ringscore::core::init_tracing(false);
    Ok(())
}

#[cfg(not(feature = "tracing"))]
fn init_logging(level: LevelFilter) -> CliResult<()> {
    ringscore::core::init_with_level(level)?;
    Ok(())
}

fn load_config(args: &RunArgs) -> CliResult<RingscoreConfig> {
    let mut config = match &args.config {
        Some(path) => RingscoreConfig::load_json(path)?,
        None => RingscoreConfig::default(),
    };
    if let Some(preset) = args.calibration {
        config.calibration = CalibrationConfig::Preset(preset);
    }
    if let Some(ms) = args.interval_ms {
        config.cycle_interval_ms = ms;
    }
    config.validate()?;
    Ok(config)
}

fn open_source(
    args: &RunArgs,
    config: &RingscoreConfig,
    service: &HttpScoreService,
) -> CliResult<Box<dyn FrameSource>> {
    if let Some(dir) = &args.frames {
        let source = DirectorySource::open(dir)?;
        info!("replaying {} frames from {}", source.len(), dir.display());
        return Ok(Box::new(source));
    }
    let url = match &args.stream_url {
        Some(url) => url.clone(),
        None => {
            let ip = service.selected_ip()?;
            stream_url(&ip, config.stream.port, &config.stream.path)
        }
    };
    info!("opening stream {url}");
    Ok(Box::new(MjpegSource::connect(
        &url,
        config.stream.read_timeout(),
    )?))
}

/// Sets the flag once `q` is read on stdin.
fn spawn_quit_listener(stop: Arc<AtomicBool>) {
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            match line {
                Ok(line) if line.trim().eq_ignore_ascii_case("q") => break,
                Ok(_) => {}
                Err(_) => return,
            }
        }
        stop.store(true, Ordering::Relaxed);
    });
}

fn run_session(args: RunArgs) -> CliResult<()> {
    let config = load_config(&args)?;
    let service = HttpScoreService::new(&config.service.base_url, config.service.timeout());
    let mut source = open_source(&args, &config, &service)?;

    let mut driver = PipelineDriver::new(&config)?;
    driver.seed_from(&service);

    let stop = Arc::new(AtomicBool::new(false));
    if args.frames.is_none() {
        spawn_quit_listener(Arc::clone(&stop));
        info!("scoring; enter q to stop");
    }
    let reason = driver.run(source.as_mut(), &stop, args.max_frames);
    info!("session stopped: {reason:?}");

    let reporter: Option<&dyn ScoreService> = if args.no_report {
        None
    } else {
        Some(&service)
    };
    let summary = driver.finish(source.as_mut(), reporter);

    println!(
        "total {} over {} rectified cycles ({} frames)",
        summary.snapshot.total, summary.cycles_rectified, summary.frames_read
    );
    if let Some(path) = &args.summary {
        std::fs::write(path, serde_json::to_string_pretty(&summary)?)?;
    }
    Ok(())
}

fn print_marker(id: u32, cell_px: u32, out: &Path) -> CliResult<()> {
    let img = draw_marker(&DICT_4X4_50, id, cell_px, 1)
        .ok_or_else(|| format!("cannot render {} marker {id} at {cell_px} px/cell", DICT_4X4_50.name))?;
    img.save(out)?;
    println!("wrote {} ({}x{})", out.display(), img.width(), img.height());
    Ok(())
}
