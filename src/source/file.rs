//! File-backed frame source.
//!
//! Reads frames from a local video file at its native rate and signals
//! end-of-stream with `Ok(None)`. Decoding uses FFmpeg behind the
//! `ingest-file-ffmpeg` feature; `stub://` paths select a synthetic backend
//! that works in any build, which is what tests and the default daemon
//! configuration use.

use anyhow::{anyhow, Result};

use crate::frame::Frame;
#[cfg(feature = "ingest-file-ffmpeg")]
use crate::source::file_ffmpeg::FfmpegFileSource;
use crate::source::{FrameSource, StubSource};

/// Configuration for a file source.
#[derive(Clone, Debug)]
pub struct FileConfig {
    /// Local file path, or `stub://name` for the synthetic backend.
    pub path: String,
    /// Synthetic backend resolution; the FFmpeg backend reports the file's own.
    pub width: u32,
    pub height: u32,
    /// Frames produced by the synthetic backend before end-of-stream.
    pub stub_frames: usize,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            path: "stub://video".to_string(),
            width: 1280,
            height: 720,
            stub_frames: 100,
        }
    }
}

pub struct FileSource {
    backend: FileBackend,
    path: String,
}

enum FileBackend {
    Synthetic(StubSource),
    #[cfg(feature = "ingest-file-ffmpeg")]
    Ffmpeg(FfmpegFileSource),
}

impl FileSource {
    pub fn open(config: FileConfig) -> Result<Self> {
        if !is_local_file_path(&config.path) {
            return Err(anyhow!(
                "file ingestion only supports local paths (no URL schemes)"
            ));
        }
        let path = config.path.clone();
        if config.path.starts_with("stub://") {
            log::info!("FileSource: opened {} (synthetic)", path);
            Ok(Self {
                backend: FileBackend::Synthetic(StubSource::file(
                    config.stub_frames,
                    config.width,
                    config.height,
                )),
                path,
            })
        } else {
            #[cfg(feature = "ingest-file-ffmpeg")]
            {
                let source = FfmpegFileSource::open(&config.path)?;
                log::info!("FileSource: opened {} (ffmpeg)", path);
                Ok(Self {
                    backend: FileBackend::Ffmpeg(source),
                    path,
                })
            }
            #[cfg(not(feature = "ingest-file-ffmpeg"))]
            {
                Err(anyhow!(
                    "file ingestion from {} requires the ingest-file-ffmpeg feature",
                    config.path
                ))
            }
        }
    }
}

impl FrameSource for FileSource {
    fn describe(&self) -> String {
        format!("file:{}", self.path)
    }

    fn resolution(&self) -> (u32, u32) {
        match &self.backend {
            FileBackend::Synthetic(source) => source.resolution(),
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.resolution(),
        }
    }

    fn is_live(&self) -> bool {
        false
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        match &mut self.backend {
            FileBackend::Synthetic(source) => source.next_frame(),
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.next_frame(),
        }
    }

    fn close(&mut self) {
        #[cfg(feature = "ingest-file-ffmpeg")]
        if let FileBackend::Ffmpeg(source) = &mut self.backend {
            source.close();
        }
    }
}

fn is_local_file_path(path: &str) -> bool {
    if path.trim().is_empty() {
        return false;
    }
    if path.starts_with("stub://") {
        return true;
    }
    !path.contains("://")
}
