//! Object detection boundary.
//!
//! The detector is an external collaborator accessed through a narrow trait:
//! given a frame, it returns labelled bounding boxes. Model weights, inference
//! and non-max suppression live behind that boundary. Label vocabulary is not
//! contractually stable beyond "a string containing a recognizable class
//! name", which is why matching against labels is centralised here.

mod stub;
#[cfg(feature = "backend-tract")]
mod tract;

pub use stub::ScriptedDetector;
#[cfg(feature = "backend-tract")]
pub use tract::TractDetector;

use anyhow::Result;

use crate::frame::Frame;

/// Axis-aligned bounding box in pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub x_min: f32,
    pub y_min: f32,
    pub x_max: f32,
    pub y_max: f32,
}

impl BoundingBox {
    pub fn new(x_min: f32, y_min: f32, x_max: f32, y_max: f32) -> Self {
        Self {
            x_min,
            y_min,
            x_max,
            y_max,
        }
    }

    /// Box center, the reference point for zone containment tests.
    pub fn center(&self) -> (f32, f32) {
        (
            (self.x_min + self.x_max) / 2.0,
            (self.y_min + self.y_max) / 2.0,
        )
    }
}

/// One object instance reported by the detector for a single frame.
#[derive(Clone, Debug)]
pub struct Detection {
    /// Raw detector label. Untrusted free-form vocabulary.
    pub label: String,
    /// Confidence in `[0, 1]`.
    pub confidence: f32,
    pub bbox: BoundingBox,
}

impl Detection {
    pub fn new(label: impl Into<String>, confidence: f32, bbox: BoundingBox) -> Self {
        Self {
            label: label.into(),
            confidence,
            bbox,
        }
    }
}

/// How raw detector labels are matched against a canonical class name.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MatchMode {
    /// Case-insensitive substring containment. Tolerates vocabulary drift and
    /// labels that carry human-readable confidence suffixes.
    #[default]
    Substring,
    /// Case-insensitive equality. For detectors with a clean label contract.
    Exact,
}

/// Test a raw label against a canonical class name.
///
/// `class` is expected to be lowercase already (config validation enforces
/// this); the raw label is lowercased here.
pub fn label_matches(label: &str, class: &str, mode: MatchMode) -> bool {
    let label = label.to_lowercase();
    match mode {
        MatchMode::Substring => label.contains(class),
        MatchMode::Exact => label == class,
    }
}

/// Detector backend trait.
///
/// Implementations must treat the frame as read-only and may block for an
/// unbounded, per-frame-varying amount of time.
pub trait Detector: Send {
    /// Backend identifier for logs.
    fn name(&self) -> &'static str;

    /// Run detection on a frame.
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
