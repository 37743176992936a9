//! sentineld - zone monitoring daemon
//!
//! Runs the capture loop end to end:
//! 1. Opens the configured frame source (camera device or video file)
//! 2. Runs the detector on every frame
//! 3. Counts people inside the zone of interest
//! 4. Fires weapon alerts: screenshot + durable SQLite record
//! 5. Prints the alert log and a run summary on exit

use anyhow::{anyhow, Result};
use clap::Parser;
use std::sync::atomic::Ordering;

use zone_sentinel::alert::{AlertManager, ScreenshotStore, SqliteAlertStore};
use zone_sentinel::config::{MonitorConfig, SourceKind};
use zone_sentinel::detect::{Detector, ScriptedDetector};
use zone_sentinel::pipeline::{FrameSink, JpegDirSink, Monitor, NullSink};
use zone_sentinel::source::{CameraConfig, CameraSource, FileSource, FrameSource};
use zone_sentinel::zone::Zone;
use zone_sentinel::OccupancyCounter;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Source override: a camera index (e.g. `0`), a device path, a video
    /// file path, or `stub://name`. Defaults to the configured source.
    source: Option<String>,
    /// Requested capture resolution as WIDTHxHEIGHT (e.g. 1280x720).
    #[arg(long, value_name = "WxH")]
    resolution: Option<String>,
    /// ONNX model path for the tract detector backend.
    #[arg(long, env = "SENTINEL_MODEL")]
    model: Option<String>,
    /// Write every Nth annotated frame as a JPEG to this directory.
    #[arg(long, value_name = "DIR")]
    save_annotated: Option<String>,
    /// Frame interval for --save-annotated.
    #[arg(long, default_value_t = 30)]
    annotated_interval: u64,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut config = MonitorConfig::load()?;
    apply_source_override(&mut config, &args)?;

    let source = open_source(&config)?;
    let (width, height) = source.resolution();
    let zone = Zone::from_template(&config.zone_template, width, height);
    log::info!(
        "monitoring {} at {}x{}, zone vertices {:?}",
        source.describe(),
        width,
        height,
        zone.vertices()
    );

    let detector = open_detector(&args)?;
    let occupancy = OccupancyCounter::new(&config.occupancy_class, config.occupancy_match);
    let alerts = AlertManager::new(config.alerts.clone());
    let screenshots = ScreenshotStore::new(&config.screenshots_dir)?;
    let store = SqliteAlertStore::open(&config.db_path)?;
    let sink: Box<dyn FrameSink> = match &args.save_annotated {
        Some(dir) => Box::new(JpegDirSink::new(dir, args.annotated_interval)?),
        None => Box::new(NullSink),
    };

    let mut monitor = Monitor::new(
        source,
        detector,
        zone,
        occupancy,
        alerts,
        screenshots,
        Box::new(store),
        sink,
    )
    .with_max_read_failures(config.source.max_read_failures);

    let stop = monitor.stop_flag();
    ctrlc::set_handler(move || {
        stop.store(true, Ordering::SeqCst);
    })?;

    let summary = monitor.run()?;

    println!("--- alert log ---");
    for message in monitor.alert_log() {
        println!("{message}");
    }
    println!(
        "processed {} frames, fired {} alerts ({} detector failures, {} persist failures), last occupancy {}",
        summary.frames_processed,
        summary.alerts_fired,
        summary.detector_failures,
        summary.persist_failures,
        summary.last_occupancy
    );
    Ok(())
}

fn apply_source_override(config: &mut MonitorConfig, args: &Args) -> Result<()> {
    if let Some(source) = &args.source {
        // A bare integer is a camera index; anything else is a path or a
        // stub:// name and keeps the configured kind.
        if let Ok(index) = source.parse::<u32>() {
            config.source.kind = SourceKind::Camera;
            config.source.location = CameraConfig::device_for_index(index);
        } else {
            config.source.location = source.clone();
        }
    }
    if let Some(resolution) = &args.resolution {
        let (width, height) = parse_resolution(resolution)?;
        config.source.width = width;
        config.source.height = height;
    }
    Ok(())
}

fn parse_resolution(value: &str) -> Result<(u32, u32)> {
    let (w, h) = value
        .split_once('x')
        .ok_or_else(|| anyhow!("resolution must be WIDTHxHEIGHT, got \"{}\"", value))?;
    let width: u32 = w
        .parse()
        .map_err(|_| anyhow!("invalid resolution width \"{}\"", w))?;
    let height: u32 = h
        .parse()
        .map_err(|_| anyhow!("invalid resolution height \"{}\"", h))?;
    if width == 0 || height == 0 {
        return Err(anyhow!("resolution must be non-zero"));
    }
    Ok((width, height))
}

fn open_source(config: &MonitorConfig) -> Result<Box<dyn FrameSource>> {
    match config.source.kind {
        SourceKind::Camera => Ok(Box::new(CameraSource::open(config.source.camera_config())?)),
        SourceKind::File => Ok(Box::new(FileSource::open(config.source.file_config())?)),
    }
}

fn open_detector(args: &Args) -> Result<Box<dyn Detector>> {
    match &args.model {
        Some(model) => {
            #[cfg(feature = "backend-tract")]
            {
                // Deployed model vocabulary; indices must match the exported
                // ONNX class order.
                let classes = vec![
                    "person".to_string(),
                    "gun".to_string(),
                    "knife".to_string(),
                ];
                Ok(Box::new(zone_sentinel::detect::TractDetector::new(
                    model, 640, 640, classes,
                )?))
            }
            #[cfg(not(feature = "backend-tract"))]
            {
                Err(anyhow!(
                    "--model {} requires the backend-tract feature",
                    model
                ))
            }
        }
        None => {
            log::warn!("no model configured, running with a silent stub detector");
            Ok(Box::new(ScriptedDetector::silent()))
        }
    }
}
