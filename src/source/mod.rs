//! Frame sources.
//!
//! A source abstracts a live camera or a file-backed video, producing frames
//! at the source's native rate and reporting its resolution before the first
//! frame so zone scaling is deterministic.
//!
//! End-of-stream is `Ok(None)` and only file-backed sources produce it; a
//! failed read from a live source is a transient `Err`, which the orchestrator
//! absorbs up to a consecutive-failure limit. Each source holds an exclusive
//! OS handle for its lifetime, released on `close` and again on drop.

pub mod camera;
pub mod file;
#[cfg(feature = "ingest-file-ffmpeg")]
pub(crate) mod file_ffmpeg;
mod stub;

pub use camera::{CameraConfig, CameraSource};
pub use file::{FileConfig, FileSource};
pub use stub::{StubSource, StubStep};

use anyhow::Result;

use crate::frame::Frame;

pub trait FrameSource: Send {
    /// Human-readable identifier for logs.
    fn describe(&self) -> String;

    /// Source resolution, known before the first frame.
    fn resolution(&self) -> (u32, u32);

    /// `true` for cameras and streams, `false` for file-backed sources.
    fn is_live(&self) -> bool;

    /// Capture the next frame. `Ok(None)` signals end-of-stream (file
    /// sources only); `Err` is a read failure, transient for live sources.
    fn next_frame(&mut self) -> Result<Option<Frame>>;

    /// Release the underlying handle. Also happens on drop; calling twice is
    /// harmless.
    fn close(&mut self) {}
}
