//! zone-sentinel: video monitoring with zone occupancy and weapon alerts.
//!
//! The crate wires a frame source (camera or video file), an object detector,
//! a polygonal zone of interest and an alerting state machine into a single
//! capture loop. Per frame it counts people inside the zone, watches for
//! configured weapon classes, and on a trigger captures a screenshot and
//! appends a durable record to SQLite.
//!
//! The `sentineld` binary runs the loop; `list_alerts` reads the records
//! back. Heavy ingestion and inference backends are feature-gated
//! (`ingest-file-ffmpeg`, `ingest-v4l2`, `backend-tract`); the default build
//! runs end-to-end on synthetic `stub://` sources and a scripted detector.

pub mod alert;
pub mod annotate;
pub mod config;
pub mod detect;
pub mod frame;
pub mod occupancy;
pub mod pipeline;
pub mod source;
pub mod zone;

pub use alert::{AlertManager, AlertPolicy, AlertRecord, AlertStore, ScreenshotStore};
pub use config::MonitorConfig;
pub use detect::{Detection, Detector, MatchMode};
pub use frame::Frame;
pub use occupancy::OccupancyCounter;
pub use pipeline::{Monitor, MonitorState, RunSummary};
pub use source::FrameSource;
pub use zone::{Zone, ZoneTemplate};
