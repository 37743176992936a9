//! Screenshot persistence.
//!
//! Writes one JPEG per fired alert into a fixed directory, named by capture
//! timestamp at second resolution. Two alerts within the same second get a
//! monotonic suffix so names never collide. The directory is created on
//! construction (idempotent), and a returned path is verified readable.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use image::ImageFormat;

use crate::frame::Frame;

const STAMP_FORMAT: &str = "%Y%m%d%H%M%S";

pub struct ScreenshotStore {
    dir: PathBuf,
    last_stamp: Option<String>,
    sequence: u32,
}

impl ScreenshotStore {
    /// Open the store, creating the target directory if needed.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create screenshot directory {}", dir.display()))?;
        Ok(Self {
            dir,
            last_stamp: None,
            sequence: 0,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Persist the frame as a JPEG and return its path.
    pub fn save(&mut self, frame: &Frame, captured_at: DateTime<Utc>) -> Result<PathBuf> {
        let stamp = captured_at.format(STAMP_FORMAT).to_string();
        if self.last_stamp.as_deref() == Some(stamp.as_str()) {
            self.sequence += 1;
        } else {
            self.sequence = 0;
            self.last_stamp = Some(stamp.clone());
        }

        let file_name = if self.sequence == 0 {
            format!("screenshot_{}.jpg", stamp)
        } else {
            format!("screenshot_{}_{}.jpg", stamp, self.sequence)
        };
        let path = self.dir.join(file_name);

        frame
            .to_image()
            .save_with_format(&path, ImageFormat::Jpeg)
            .with_context(|| format!("failed to write screenshot {}", path.display()))?;

        fs::metadata(&path)
            .with_context(|| format!("screenshot {} not readable after write", path.display()))?;

        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn test_frame() -> Frame {
        Frame::new(vec![128u8; 8 * 8 * 3], 8, 8, 1, Utc::now()).expect("frame")
    }

    #[test]
    fn creates_directory_idempotently() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let target = dir.path().join("shots");
        let _first = ScreenshotStore::new(&target)?;
        let _second = ScreenshotStore::new(&target)?;
        assert!(target.is_dir());
        Ok(())
    }

    #[test]
    fn same_second_saves_do_not_collide() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut store = ScreenshotStore::new(dir.path())?;
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();

        let first = store.save(&test_frame(), at)?;
        let second = store.save(&test_frame(), at)?;

        assert_ne!(first, second);
        // Both files exist and decode back to images.
        for path in [&first, &second] {
            let loaded = image::open(path)?;
            assert_eq!(loaded.width(), 8);
        }
        Ok(())
    }

    #[test]
    fn sequence_resets_when_the_second_changes() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut store = ScreenshotStore::new(dir.path())?;
        let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let t1 = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 1).unwrap();

        store.save(&test_frame(), t0)?;
        let next = store.save(&test_frame(), t1)?;
        assert!(next
            .file_name()
            .unwrap()
            .to_string_lossy()
            .ends_with("screenshot_20240501120001.jpg"));
        Ok(())
    }
}
