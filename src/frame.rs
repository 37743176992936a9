//! Frame representation.
//!
//! A `Frame` is a dense RGB24 pixel buffer with fixed dimensions for the
//! session. Frames are immutable once captured: the capture loop owns each
//! frame exclusively until it is handed to the annotator or screenshot store,
//! both of which read the buffer without mutating it.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use image::RgbImage;

/// One captured video frame (RGB24, row-major, no padding).
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Monotonic capture index within the session, starting at 1.
    pub index: u64,
    /// Precise capture time. Used for alert records and screenshot names.
    pub captured_at: DateTime<Utc>,
}

impl Frame {
    /// Create a new frame. Called only by frame sources.
    pub fn new(
        data: Vec<u8>,
        width: u32,
        height: u32,
        index: u64,
        captured_at: DateTime<Utc>,
    ) -> Result<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;
        if data.len() != expected {
            return Err(anyhow!(
                "expected {} RGB bytes for {}x{}, received {}",
                expected,
                width,
                height,
                data.len()
            ));
        }
        Ok(Self {
            data,
            width,
            height,
            index,
            captured_at,
        })
    }

    /// Read-only pixel access for detectors, annotation and screenshots.
    pub fn pixels(&self) -> &[u8] {
        &self.data
    }

    /// Copy the frame into an `image::RgbImage` for encoding or drawing.
    pub fn to_image(&self) -> RgbImage {
        // Length was validated in `new`, so from_raw cannot fail.
        RgbImage::from_raw(self.width, self.height, self.data.clone())
            .unwrap_or_else(|| RgbImage::new(self.width, self.height))
    }
}
