//! Monitoring pipeline.
//!
//! `Monitor` wires a frame source, a detector, the zone, the occupancy
//! counter and the alert manager into one capture loop. Per frame it runs
//! detection, counts zone occupancy, evaluates alert triggers (screenshot +
//! durable record) and hands an annotated copy of the frame to the sink.
//!
//! Error policy per frame:
//! - end-of-stream (`Ok(None)`) stops the loop cleanly;
//! - a failed read from a live source is absorbed and retried, up to a
//!   consecutive-failure limit;
//! - a detector failure skips detection for that frame (zero detections);
//! - an alert persistence failure is logged and counted, the loop continues.
//!
//! A stop request is honored between frames, never mid-frame, so a fired
//! alert always completes its screenshot and record before shutdown.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use image::RgbImage;

use crate::alert::store::AlertStore;
use crate::alert::{AlertManager, ScreenshotStore};
use crate::annotate::Annotator;
use crate::detect::Detector;
use crate::frame::Frame;
use crate::occupancy::OccupancyCounter;
use crate::source::FrameSource;
use crate::zone::Zone;

/// Receives annotated frames. The daemon uses `NullSink` headless or
/// `JpegDirSink` to dump annotated frames for inspection.
pub trait FrameSink: Send {
    fn present(&mut self, frame: &Frame, annotated: &RgbImage) -> Result<()>;
}

/// Discards annotated frames.
pub struct NullSink;

impl FrameSink for NullSink {
    fn present(&mut self, _frame: &Frame, _annotated: &RgbImage) -> Result<()> {
        Ok(())
    }
}

/// Writes every `interval`-th annotated frame as a JPEG under `dir`.
pub struct JpegDirSink {
    dir: std::path::PathBuf,
    interval: u64,
}

impl JpegDirSink {
    pub fn new(dir: impl Into<std::path::PathBuf>, interval: u64) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("create annotated-frame directory {}", dir.display()))?;
        Ok(Self {
            dir,
            interval: interval.max(1),
        })
    }
}

impl FrameSink for JpegDirSink {
    fn present(&mut self, frame: &Frame, annotated: &RgbImage) -> Result<()> {
        if frame.index % self.interval != 0 {
            return Ok(());
        }
        let path = self.dir.join(format!("frame_{:08}.jpg", frame.index));
        annotated
            .save_with_format(&path, image::ImageFormat::Jpeg)
            .with_context(|| format!("write annotated frame {}", path.display()))?;
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MonitorState {
    Init,
    Running,
    Stopped,
    Error,
}

/// Counters reported when the loop ends.
#[derive(Clone, Debug, Default)]
pub struct RunSummary {
    pub frames_processed: u64,
    pub alerts_fired: u64,
    pub detector_failures: u64,
    pub persist_failures: u64,
    pub last_occupancy: usize,
}

pub struct Monitor {
    source: Box<dyn FrameSource>,
    detector: Box<dyn Detector>,
    zone: Zone,
    occupancy: OccupancyCounter,
    alerts: AlertManager,
    screenshots: ScreenshotStore,
    store: Box<dyn AlertStore>,
    annotator: Annotator,
    sink: Box<dyn FrameSink>,
    stop: Arc<AtomicBool>,
    max_read_failures: u32,
    state: MonitorState,
}

impl Monitor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        source: Box<dyn FrameSource>,
        detector: Box<dyn Detector>,
        zone: Zone,
        occupancy: OccupancyCounter,
        alerts: AlertManager,
        screenshots: ScreenshotStore,
        store: Box<dyn AlertStore>,
        sink: Box<dyn FrameSink>,
    ) -> Self {
        Self {
            source,
            detector,
            zone,
            occupancy,
            alerts,
            screenshots,
            store,
            annotator: Annotator::default(),
            sink,
            stop: Arc::new(AtomicBool::new(false)),
            max_read_failures: 30,
            state: MonitorState::Init,
        }
    }

    /// Consecutive live-source read failures tolerated before the run errors.
    pub fn with_max_read_failures(mut self, limit: u32) -> Self {
        self.max_read_failures = limit.max(1);
        self
    }

    /// Shared flag that stops the loop at the next frame boundary. Hand this
    /// to a signal handler.
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    pub fn state(&self) -> MonitorState {
        self.state
    }

    /// Messages from the bounded alert log, oldest first.
    pub fn alert_log(&self) -> impl Iterator<Item = &str> {
        self.alerts.alert_log()
    }

    /// Run the capture loop until end-of-stream, a stop request, or a fatal
    /// error.
    pub fn run(&mut self) -> Result<RunSummary> {
        self.state = MonitorState::Running;
        log::info!(
            "monitor started: source={} detector={} resolution={:?}",
            self.source.describe(),
            self.detector.name(),
            self.source.resolution()
        );
        if let Err(err) = self.detector.warm_up() {
            self.state = MonitorState::Error;
            return Err(err.context("detector warm-up failed"));
        }

        let mut summary = RunSummary::default();
        let mut consecutive_read_failures = 0u32;

        loop {
            if self.stop.load(Ordering::SeqCst) {
                log::info!("monitor stopping on request");
                break;
            }

            let frame = match self.source.next_frame() {
                Ok(Some(frame)) => {
                    consecutive_read_failures = 0;
                    frame
                }
                Ok(None) => {
                    log::info!("source reported end-of-stream");
                    break;
                }
                Err(err) => {
                    consecutive_read_failures += 1;
                    if !self.source.is_live() || consecutive_read_failures >= self.max_read_failures
                    {
                        self.state = MonitorState::Error;
                        self.source.close();
                        return Err(err.context(format!(
                            "source read failed ({} consecutive)",
                            consecutive_read_failures
                        )));
                    }
                    log::warn!(
                        "transient source read failure ({}/{}): {:#}",
                        consecutive_read_failures,
                        self.max_read_failures,
                        err
                    );
                    continue;
                }
            };

            let detections = match self.detector.detect(&frame) {
                Ok(detections) => detections,
                Err(err) => {
                    summary.detector_failures += 1;
                    log::warn!("detector failed on frame {}: {:#}", frame.index, err);
                    Vec::new()
                }
            };

            // Occupancy covers the whole frame; the zone subset only feeds
            // the overlay.
            summary.last_occupancy = self.occupancy.count(&detections);
            let zone_hit_count = self.zone.trigger(&detections).len();

            match self.alerts.process_frame(
                &frame,
                &detections,
                &mut self.screenshots,
                self.store.as_mut(),
            ) {
                Ok(fired) => summary.alerts_fired += fired.len() as u64,
                Err(err) => {
                    summary.persist_failures += 1;
                    log::error!("alert handling failed on frame {}: {:#}", frame.index, err);
                }
            }

            let annotated = self.annotator.annotate(
                &frame,
                &detections,
                summary.last_occupancy,
                &self.zone,
                zone_hit_count,
            );
            if let Err(err) = self.sink.present(&frame, &annotated) {
                log::warn!("frame sink failed on frame {}: {:#}", frame.index, err);
            }

            summary.frames_processed += 1;
        }

        self.source.close();
        self.state = MonitorState::Stopped;
        log::info!(
            "monitor stopped: frames={} alerts={} detector_failures={} persist_failures={}",
            summary.frames_processed,
            summary.alerts_fired,
            summary.detector_failures,
            summary.persist_failures
        );
        Ok(summary)
    }

    /// Records persisted so far, for end-of-run reporting.
    pub fn stored_alerts(&self) -> Result<Vec<crate::alert::store::AlertRecord>> {
        self.store.list_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use crate::alert::store::InMemoryAlertStore;
    use crate::alert::AlertPolicy;
    use crate::detect::{BoundingBox, Detection, ScriptedDetector};
    use crate::source::{StubSource, StubStep};
    use crate::zone::ZoneTemplate;

    fn gun(cx: f32, cy: f32) -> Detection {
        Detection {
            label: "gun 0.91".to_string(),
            confidence: 0.91,
            bbox: BoundingBox {
                x_min: cx - 5.0,
                y_min: cy - 5.0,
                x_max: cx + 5.0,
                y_max: cy + 5.0,
            },
        }
    }

    fn person(cx: f32, cy: f32) -> Detection {
        Detection {
            label: "person 0.80".to_string(),
            confidence: 0.80,
            bbox: BoundingBox {
                x_min: cx - 10.0,
                y_min: cy - 20.0,
                x_max: cx + 10.0,
                y_max: cy + 20.0,
            },
        }
    }

    fn test_monitor(
        source: Box<dyn FrameSource>,
        detector: Box<dyn Detector>,
        screenshots_dir: &std::path::Path,
    ) -> Monitor {
        let (width, height) = source.resolution();
        let zone = Zone::from_template(&ZoneTemplate::left_half(), width, height);
        Monitor::new(
            source,
            detector,
            zone,
            OccupancyCounter::default(),
            AlertManager::new(AlertPolicy::default()),
            ScreenshotStore::new(screenshots_dir).expect("screenshot dir"),
            Box::new(InMemoryAlertStore::default()),
            Box::new(NullSink),
        )
    }

    #[test]
    fn file_source_runs_to_end_of_stream() {
        let dir = tempfile::tempdir().expect("tempdir");
        let source = Box::new(StubSource::file(4, 64, 64));
        let detector = Box::new(ScriptedDetector::silent());
        let mut monitor = test_monitor(source, detector, dir.path());
        let summary = monitor.run().expect("clean run");
        assert_eq!(summary.frames_processed, 4);
        assert_eq!(summary.alerts_fired, 0);
        assert_eq!(monitor.state(), MonitorState::Stopped);
    }

    #[test]
    fn weapon_detection_fires_once_across_sustained_frames() {
        let dir = tempfile::tempdir().expect("tempdir");
        let source = Box::new(StubSource::file(3, 64, 64));
        let detector = Box::new(ScriptedDetector::new(vec![
            vec![gun(20.0, 20.0)],
            vec![gun(21.0, 20.0)],
            vec![gun(22.0, 20.0)],
        ]));
        let mut monitor = test_monitor(source, detector, dir.path());
        let summary = monitor.run().expect("clean run");
        assert_eq!(summary.frames_processed, 3);
        assert_eq!(summary.alerts_fired, 1);
        let records = monitor.stored_alerts().expect("records");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].item_name, "gun");
    }

    #[test]
    fn occupancy_counts_people_regardless_of_zone() {
        let dir = tempfile::tempdir().expect("tempdir");
        // 64x64 frame, left-half zone covers x in [0, 32): one person inside,
        // one outside. Both count.
        let source = Box::new(StubSource::file(1, 64, 64));
        let detector = Box::new(ScriptedDetector::new(vec![vec![
            person(16.0, 32.0),
            person(48.0, 32.0),
        ]]));
        let mut monitor = test_monitor(source, detector, dir.path());
        let summary = monitor.run().expect("clean run");
        assert_eq!(summary.last_occupancy, 2);
    }

    #[test]
    fn detector_failure_skips_frame_but_run_continues() {
        struct FailingDetector;
        impl Detector for FailingDetector {
            fn name(&self) -> &'static str {
                "failing"
            }
            fn detect(&mut self, _frame: &Frame) -> Result<Vec<Detection>> {
                Err(anyhow!("inference exploded"))
            }
        }

        let dir = tempfile::tempdir().expect("tempdir");
        let source = Box::new(StubSource::file(2, 32, 32));
        let mut monitor = test_monitor(source, Box::new(FailingDetector), dir.path());
        let summary = monitor.run().expect("run survives detector failures");
        assert_eq!(summary.frames_processed, 2);
        assert_eq!(summary.detector_failures, 2);
        assert_eq!(summary.alerts_fired, 0);
    }

    #[test]
    fn live_source_absorbs_transient_read_failures() {
        let dir = tempfile::tempdir().expect("tempdir");
        let source = Box::new(StubSource::live(
            vec![StubStep::Frame, StubStep::Fail, StubStep::Frame],
            32,
            32,
        ));
        let detector = Box::new(ScriptedDetector::silent());
        let mut monitor = test_monitor(source, detector, dir.path()).with_max_read_failures(5);
        let stop = monitor.stop_flag();

        // Stop after a handful of frames via the sink side effect.
        struct StopAfter {
            remaining: u64,
            stop: Arc<AtomicBool>,
        }
        impl FrameSink for StopAfter {
            fn present(&mut self, _frame: &Frame, _annotated: &RgbImage) -> Result<()> {
                self.remaining -= 1;
                if self.remaining == 0 {
                    self.stop.store(true, Ordering::SeqCst);
                }
                Ok(())
            }
        }
        monitor.sink = Box::new(StopAfter { remaining: 3, stop });

        let summary = monitor.run().expect("transient failure absorbed");
        assert_eq!(summary.frames_processed, 3);
    }

    #[test]
    fn repeated_live_failures_become_fatal() {
        let dir = tempfile::tempdir().expect("tempdir");
        let source = Box::new(StubSource::live(
            vec![StubStep::Fail, StubStep::Fail, StubStep::Fail],
            32,
            32,
        ));
        let detector = Box::new(ScriptedDetector::silent());
        let mut monitor = test_monitor(source, detector, dir.path()).with_max_read_failures(3);
        assert!(monitor.run().is_err());
        assert_eq!(monitor.state(), MonitorState::Error);
    }

    #[test]
    fn file_read_failure_is_immediately_fatal() {
        let dir = tempfile::tempdir().expect("tempdir");
        struct FlakyFile {
            sent: bool,
        }
        impl FrameSource for FlakyFile {
            fn describe(&self) -> String {
                "flaky".to_string()
            }
            fn resolution(&self) -> (u32, u32) {
                (16, 16)
            }
            fn is_live(&self) -> bool {
                false
            }
            fn next_frame(&mut self) -> Result<Option<Frame>> {
                if self.sent {
                    Err(anyhow!("corrupt packet"))
                } else {
                    self.sent = true;
                    let pixels = vec![0u8; 16 * 16 * 3];
                    Ok(Some(Frame::new(pixels, 16, 16, 1, chrono::Utc::now())?))
                }
            }
        }

        let detector = Box::new(ScriptedDetector::silent());
        let mut monitor = test_monitor(Box::new(FlakyFile { sent: false }), detector, dir.path());
        assert!(monitor.run().is_err());
    }
}
