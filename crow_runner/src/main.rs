// THEORY:
// `crow_runner` drives a whole survey: it loads the config, lets command line
// flags override it, finds every video under the configured root, and hands
// them to a `Session` in order. The process exit code tells scripts how the run
// went: 0 when every segment was scanned and every detection written, 1 when
// the run stopped on an error, and 2 when the run finished incomplete because
// `--keep-going` skipped a segment or a detection could not be written.

mod discovery;
mod frames;
mod logging;
mod region_select;
mod session;

use anyhow::{Context, Result};
use car_crow::output::{EventSinks, ImageSink, LogSink};
use car_crow::timeline::parse_start_time;
use car_crow::{BoundingBox, CrowConfig};
use clap::Parser;
use frames::FfmpegFrameSource;
use region_select::{FixedRegion, PromptRegion, RegionProvider};
use session::Session;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "crow_runner", version, about = "Counts traffic in fixed camera footage")]
struct Cli {
    /// JSON config file. Missing keys take their defaults.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    #[arg(long, value_name = "DIR")]
    video_path: Option<PathBuf>,
    #[arg(long, value_name = "DIR")]
    output_path: Option<PathBuf>,
    #[arg(long, value_name = "DIR")]
    temp_path: Option<PathBuf>,
    /// Wall-clock time of the first frame, "YYYY-MM-DD HH:MM:SS".
    #[arg(long, value_name = "TIME")]
    start_time: Option<String>,
    /// Region of interest as x,y,w,h. Asked for interactively when absent.
    #[arg(long, value_name = "X,Y,W,H")]
    region: Option<BoundingBox>,
    /// Minimum seconds between two detections.
    #[arg(long, value_name = "SECONDS")]
    cooldown: Option<f64>,
    /// Do not save motion images.
    #[arg(long)]
    no_images: bool,
    /// Do not append to the detection log.
    #[arg(long)]
    no_log: bool,
    /// Skip videos that fail instead of stopping.
    #[arg(long)]
    keep_going: bool,
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Cli {
    fn apply(&self, config: &mut CrowConfig) {
        if let Some(path) = &self.video_path {
            config.video_path = path.clone();
        }
        if let Some(path) = &self.output_path {
            config.output_path = path.clone();
        }
        if let Some(path) = &self.temp_path {
            config.temp_path = path.clone();
        }
        if let Some(start_time) = &self.start_time {
            config.start_time = Some(start_time.clone());
        }
        if let Some(region) = self.region {
            config.region = Some(region);
        }
        if let Some(cooldown) = self.cooldown {
            config.detection.cooldown_seconds = cooldown;
        }
        if self.no_images {
            config.output_images = false;
        }
        if self.no_log {
            config.output_log = false;
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init_logging(&cli.log_level);

    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    // --- 1. Configuration ---
    let mut config = match &cli.config {
        Some(path) => CrowConfig::from_file(path)
            .with_context(|| format!("failed to read config {}", path.display()))?,
        None => CrowConfig::default(),
    };
    cli.apply(&mut config);
    config.validate().context("invalid configuration")?;

    let start = match &config.start_time {
        Some(value) => parse_start_time(value)?,
        None => chrono::Local::now().naive_local(),
    };

    // --- 2. Discovery ---
    let videos = discovery::find_videos(&config.video_path)?;
    for video in &videos {
        info!("{}", video.display());
    }
    info!("{} videos found", videos.len());
    if videos.is_empty() {
        warn!(path = %config.video_path.display(), "nothing to scan");
        return Ok(ExitCode::SUCCESS);
    }

    // --- 3. Session Setup ---
    let mut sinks = EventSinks::new();
    if config.output_images {
        sinks.push(Box::new(ImageSink::new(&config.output_path)));
    }
    if config.output_log {
        sinks.push(Box::new(LogSink::new(config.log_file())));
    }
    if sinks.is_empty() {
        warn!("images and log are both disabled, detections will only be logged");
    }

    let regions: Box<dyn RegionProvider + Send> = match config.region {
        Some(region) => Box::new(FixedRegion(region)),
        None => Box::new(PromptRegion::stdio()),
    };
    let source =
        FfmpegFrameSource::locate(config.detection.frame_rate, config.frame_extension.clone())?;

    // --- 4. Scan ---
    let mut session = Session::new(config, source, regions)
        .with_sinks(sinks)
        .keep_going(cli.keep_going);
    let report = session.run(&videos, start).await?;

    info!(
        scanned = report.segments_scanned,
        failed = report.segments_failed,
        frames = report.frames_scanned,
        events = report.total_events,
        sink_failures = report.sink_failures,
        "session complete"
    );

    Ok(if report.segments_failed > 0 || report.sink_failures > 0 {
        ExitCode::from(2)
    } else {
        ExitCode::SUCCESS
    })
}
