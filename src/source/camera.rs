//! Live camera source.
//!
//! Captures frames from a local V4L2 device behind the `ingest-v4l2` feature.
//! `stub://` devices select a synthetic live backend available in any build.
//! A camera never reports end-of-stream: read failures are transient errors
//! and the orchestrator decides when too many in a row become fatal.

use anyhow::Result;

use crate::frame::Frame;
use crate::source::{FrameSource, StubSource};

/// Configuration for a camera source.
#[derive(Clone, Debug)]
pub struct CameraConfig {
    /// Device path (e.g. `/dev/video0`), or `stub://name` for the synthetic
    /// backend.
    pub device: String,
    /// Requested capture width; the device may negotiate a different one.
    pub width: u32,
    pub height: u32,
    /// Target frame rate hint for the device.
    pub target_fps: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device: "stub://camera".to_string(),
            width: 1280,
            height: 720,
            target_fps: 30,
        }
    }
}

impl CameraConfig {
    /// Map a numeric camera index to its V4L2 device node.
    pub fn device_for_index(index: u32) -> String {
        format!("/dev/video{}", index)
    }
}

pub struct CameraSource {
    backend: CameraBackend,
    device: String,
}

enum CameraBackend {
    Synthetic(StubSource),
    #[cfg(feature = "ingest-v4l2")]
    V4l2(v4l2::DeviceCameraSource),
}

impl CameraSource {
    pub fn open(config: CameraConfig) -> Result<Self> {
        let device = config.device.clone();
        if config.device.starts_with("stub://") {
            log::info!("CameraSource: opened {} (synthetic)", device);
            Ok(Self {
                backend: CameraBackend::Synthetic(StubSource::live(
                    Vec::new(),
                    config.width,
                    config.height,
                )),
                device,
            })
        } else {
            #[cfg(feature = "ingest-v4l2")]
            {
                let source = v4l2::DeviceCameraSource::open(config)?;
                Ok(Self {
                    backend: CameraBackend::V4l2(source),
                    device,
                })
            }
            #[cfg(not(feature = "ingest-v4l2"))]
            {
                Err(anyhow::anyhow!(
                    "camera capture from {} requires the ingest-v4l2 feature",
                    config.device
                ))
            }
        }
    }
}

impl FrameSource for CameraSource {
    fn describe(&self) -> String {
        format!("camera:{}", self.device)
    }

    fn resolution(&self) -> (u32, u32) {
        match &self.backend {
            CameraBackend::Synthetic(source) => source.resolution(),
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::V4l2(source) => source.resolution(),
        }
    }

    fn is_live(&self) -> bool {
        true
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        match &mut self.backend {
            CameraBackend::Synthetic(source) => source.next_frame(),
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::V4l2(source) => source.next_frame().map(Some),
        }
    }

    fn close(&mut self) {
        #[cfg(feature = "ingest-v4l2")]
        if let CameraBackend::V4l2(source) = &mut self.backend {
            source.close();
        }
    }
}

#[cfg(feature = "ingest-v4l2")]
mod v4l2 {
    use anyhow::{Context, Result};
    use chrono::Utc;
    use ouroboros::self_referencing;

    use super::CameraConfig;
    use crate::frame::Frame;

    pub(super) struct DeviceCameraSource {
        config: CameraConfig,
        state: Option<CameraState>,
        frame_count: u64,
        active_width: u32,
        active_height: u32,
    }

    #[self_referencing]
    struct CameraState {
        device: v4l::Device,
        #[borrows(mut device)]
        #[covariant]
        stream: v4l::prelude::MmapStream<'this, v4l::Device>,
    }

    impl DeviceCameraSource {
        pub(super) fn open(config: CameraConfig) -> Result<Self> {
            use v4l::buffer::Type;
            use v4l::video::Capture;

            let mut device = v4l::Device::with_path(&config.device)
                .with_context(|| format!("open v4l2 device {}", config.device))?;
            let mut format = device.format().context("read v4l2 format")?;
            format.width = config.width;
            format.height = config.height;
            format.fourcc = v4l::FourCC::new(b"RGB3");

            let format = match device.set_format(&format) {
                Ok(format) => format,
                Err(err) => {
                    log::warn!(
                        "CameraSource: failed to set format on {}: {}",
                        config.device,
                        err
                    );
                    device
                        .format()
                        .context("read v4l2 format after set failure")?
                }
            };

            if config.target_fps > 0 {
                let params = v4l::video::capture::Parameters::with_fps(config.target_fps);
                if let Err(err) = device.set_params(&params) {
                    log::warn!(
                        "CameraSource: failed to set fps on {}: {}",
                        config.device,
                        err
                    );
                }
            }

            let active_width = format.width;
            let active_height = format.height;

            let state = CameraStateBuilder {
                device,
                stream_builder: |device| {
                    v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, 4)
                        .map_err(|err| anyhow::Error::new(err).context("create v4l2 buffer stream"))
                },
            }
            .try_build()?;

            log::info!(
                "CameraSource: opened {} ({}x{})",
                config.device,
                active_width,
                active_height
            );

            Ok(Self {
                config,
                state: Some(state),
                frame_count: 0,
                active_width,
                active_height,
            })
        }

        pub(super) fn resolution(&self) -> (u32, u32) {
            (self.active_width, self.active_height)
        }

        pub(super) fn next_frame(&mut self) -> Result<Frame> {
            use v4l::io::traits::CaptureStream;

            let state = self
                .state
                .as_mut()
                .with_context(|| format!("camera {} already closed", self.config.device))?;
            let pixels = state
                .with_mut(|fields| fields.stream.next().map(|(buf, _meta)| buf.to_vec()))
                .context("capture v4l2 frame")?;

            self.frame_count += 1;
            Frame::new(
                pixels,
                self.active_width,
                self.active_height,
                self.frame_count,
                Utc::now(),
            )
        }

        pub(super) fn close(&mut self) {
            self.state = None;
        }
    }
}
