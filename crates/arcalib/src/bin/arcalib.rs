//! arcalib CLI: target generation, live calibration and the corner viewer.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use arcalib::session::CalibrationSession;
use arcalib::vision::{
    dictionary, CharucoBoardDetector, ChessboardDetector, SidecarDetector, TargetDetector,
    ZhangCalibrator,
};
use arcalib::{
    run_corners, ImageSequenceSource, KeySource, LiveConfig, LiveLoop, LoopOptions, ScriptedKeys,
    StdinKeys, TargetLayout,
};
use clap::{Args, Parser, Subcommand};
use log::LevelFilter;

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "arcalib")]
#[command(about = "Camera calibration from a planar target, with a pose overlay once calibrated")]
#[command(version)]
struct Cli {
    /// Log level: off, error, warn, info, debug or trace.
    #[arg(long, global = true, default_value = "info")]
    log_level: LevelFilter,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a printable target as PNG.
    #[command(subcommand)]
    Generate(GenerateCommand),

    /// Collect samples from a ChArUco board (or from marker detections
    /// stored next to each frame with `--sidecars`), calibrate and overlay
    /// the pose.
    Video(VideoArgs),

    /// Collect samples with the chessboard detector, calibrate and overlay
    /// the pose.
    Chessboard(LiveArgs),

    /// Mark Harris corners on every frame.
    Corners(CornersArgs),
}

#[derive(Subcommand)]
enum GenerateCommand {
    /// Plain chessboard.
    Chessboard(BoardArgs),

    /// Chessboard with ArUco markers in the white squares, as used by
    /// `video`.
    Charuco(BoardArgs),

    /// A single ArUco marker.
    Marker(MarkerArgs),
}

#[derive(Debug, Args)]
struct BoardArgs {
    /// Output PNG [default: chessboard.png or charuco.png].
    #[arg(long)]
    output: Option<PathBuf>,

    /// JSON config; its `board` and `render` sections are used.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Inner corners per row.
    #[arg(long)]
    cols: Option<u32>,

    /// Inner corners per column.
    #[arg(long)]
    rows: Option<u32>,

    /// Square side in pixels.
    #[arg(long)]
    square_px: Option<u32>,
}

#[derive(Debug, Args)]
struct MarkerArgs {
    /// Marker id in the dictionary.
    #[arg(long, default_value_t = 23)]
    id: u32,

    /// Output PNG [default: aruco_marker_<id>.png].
    #[arg(long)]
    output: Option<PathBuf>,

    /// JSON config; its `marker` section is used.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Dictionary name, e.g. DICT_6X6_250.
    #[arg(long)]
    dictionary: Option<String>,

    /// Marker side in pixels.
    #[arg(long)]
    size: Option<u32>,
}

#[derive(Debug, Args)]
struct VideoArgs {
    #[command(flatten)]
    live: LiveArgs,

    /// Read `<frame>.json` marker detections instead of decoding the board.
    #[arg(long)]
    sidecars: bool,
}

#[derive(Debug, Args)]
struct LiveArgs {
    /// Directory of PNG/JPEG frames, read in name order.
    #[arg(long)]
    frames: PathBuf,

    /// Key script, one character per frame (`.` = no key). Reads stdin
    /// when omitted.
    #[arg(long)]
    keys: Option<String>,

    /// JSON config (see `LiveConfig`).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Start from a saved calibration instead of collecting samples.
    #[arg(long)]
    load: Option<PathBuf>,

    /// Where to write the calibration.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Save annotated frames into this directory.
    #[arg(long)]
    save_dir: Option<PathBuf>,

    /// Save the raw frame of every accepted sample into this directory.
    #[arg(long)]
    sample_dir: Option<PathBuf>,

    /// Calibrate on the loop thread.
    #[arg(long)]
    blocking: bool,

    /// Samples required before calibrating.
    #[arg(long)]
    min_samples: Option<usize>,
}

#[derive(Debug, Args)]
struct CornersArgs {
    /// Directory of PNG/JPEG frames, read in name order.
    #[arg(long)]
    frames: PathBuf,

    /// Key script; only `q` / Esc is used.
    #[arg(long)]
    keys: Option<String>,

    /// JSON config; its `harris` section is used.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Save marked frames into this directory.
    #[arg(long)]
    save_dir: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_level);
    if let Err(err) = run(cli.command) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

#[cfg(feature = "tracing")]
fn init_logging(_level: LevelFilter) {
    arcalib::core::init_tracing(false);
}

#[cfg(not(feature = "tracing"))]
fn init_logging(level: LevelFilter) {
    if let Err(e) = arcalib::core::init_with_level(level) {
        eprintln!("logger: {e}");
    }
}

fn run(command: Commands) -> CliResult<()> {
    match command {
        Commands::Generate(GenerateCommand::Chessboard(args)) => run_generate_board(&args, false),
        Commands::Generate(GenerateCommand::Charuco(args)) => run_generate_board(&args, true),
        Commands::Generate(GenerateCommand::Marker(args)) => run_generate_marker(&args),
        Commands::Video(args) => {
            let config = load_config(args.live.config.as_deref())?;
            let detector: Box<dyn TargetDetector> = if args.sidecars {
                Box::new(SidecarDetector)
            } else {
                Box::new(CharucoBoardDetector::new(config.board, &config.charuco)?)
            };
            run_live(&args.live, config, detector)
        }
        Commands::Chessboard(args) => {
            let config = load_config(args.config.as_deref())?;
            let detector = ChessboardDetector::new(config.board, config.chessboard);
            run_live(&args, config, Box::new(detector))
        }
        Commands::Corners(args) => run_corners_cmd(&args),
    }
}

fn load_config(path: Option<&Path>) -> CliResult<LiveConfig> {
    match path {
        Some(path) => {
            log::info!("config: {}", path.display());
            Ok(LiveConfig::load_json(path)?)
        }
        None => Ok(LiveConfig::default()),
    }
}

fn key_source(script: Option<&str>) -> CliResult<Box<dyn KeySource>> {
    Ok(match script {
        Some(script) => Box::new(ScriptedKeys::parse(script)),
        None => {
            log::info!("keys: s = sample, c = calibrate, q = quit (then Enter)");
            Box::new(StdinKeys::spawn()?)
        }
    })
}

// ── generate ──────────────────────────────────────────────────────────

fn run_generate_board(args: &BoardArgs, charuco: bool) -> CliResult<()> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(cols) = args.cols {
        config.board.cols = cols;
    }
    if let Some(rows) = args.rows {
        config.board.rows = rows;
    }
    if let Some(px) = args.square_px {
        config.render.square_px = px;
    }
    config.validate()?;

    let default_name = if charuco { "charuco.png" } else { "chessboard.png" };
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(default_name));
    if charuco {
        let dict = dictionary(&config.charuco.dictionary)?;
        config.render.save_charuco_png(
            &config.board,
            &dict,
            config.charuco.marker_size_rel,
            &output,
        )?;
    } else {
        config.render.save_png(&config.board, &output)?;
    }
    let (w, h) = config.render.image_size(&config.board);
    println!(
        "wrote {} ({}x{} px, {}x{} inner corners)",
        output.display(),
        w,
        h,
        config.board.cols,
        config.board.rows
    );
    Ok(())
}

fn run_generate_marker(args: &MarkerArgs) -> CliResult<()> {
    let mut marker = load_config(args.config.as_deref())?.marker;
    if let Some(name) = &args.dictionary {
        marker.dictionary = name.clone();
    }
    if let Some(size) = args.size {
        marker.side_px = size;
    }
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(format!("aruco_marker_{}.png", args.id)));
    marker.save_png(args.id, &output)?;
    println!(
        "wrote {} ({} marker {}, {} px)",
        output.display(),
        marker.dictionary,
        args.id,
        marker.side_px
    );
    Ok(())
}

// ── video / chessboard ────────────────────────────────────────────────

fn run_live(
    args: &LiveArgs,
    mut config: LiveConfig,
    detector: Box<dyn TargetDetector>,
) -> CliResult<()> {
    if let Some(output) = &args.output {
        config.output = Some(output.clone());
    }
    if let Some(n) = args.min_samples {
        config.min_samples = n;
    }
    config.blocking |= args.blocking;
    config.validate()?;

    let mut frames = ImageSequenceSource::open(&args.frames)?;

    let layout = TargetLayout::from_chessboard(&config.board)?;
    let mut session = CalibrationSession::new(
        layout,
        Arc::new(ZhangCalibrator::new(config.calibrator)),
        config.session_options(),
    );
    if let Some(path) = &args.load {
        let result = session.load_calibration(path)?;
        println!("{result}");
    }

    log::info!(
        "{} detector, {}x{} board, {} samples needed",
        detector.name(),
        config.board.cols,
        config.board.rows,
        config.min_samples
    );
    let mut options = LoopOptions::from_config(&config);
    options.save_dir = args.save_dir.clone();
    options.sample_dir = args.sample_dir.clone();
    let mut keys = key_source(args.keys.as_deref())?;

    let mut live = LiveLoop::new(session, detector, options);
    let report = live.run(&mut frames, keys.as_mut())?;

    println!(
        "{} frames, {} samples, {} rejected, {} pose overlays ({:?})",
        report.frames, report.samples, report.rejected, report.poses, report.exit
    );
    if let Some(result) = live.session().result() {
        println!("{result}");
        if let Some(path) = &config.output {
            println!("calibration file: {}", path.display());
        }
    }
    Ok(())
}

// ── corners ───────────────────────────────────────────────────────────

fn run_corners_cmd(args: &CornersArgs) -> CliResult<()> {
    let config = load_config(args.config.as_deref())?;
    let mut frames = ImageSequenceSource::open(&args.frames)?;
    let mut keys = key_source(args.keys.as_deref())?;
    let report = run_corners(
        &mut frames,
        keys.as_mut(),
        &config.harris,
        config.key_delay(),
        args.save_dir.as_deref(),
    )?;
    println!(
        "{} frames, {} corner pixels ({:?})",
        report.frames, report.corners, report.exit
    );
    Ok(())
}
