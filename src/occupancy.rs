//! Per-frame occupancy counting.
//!
//! Counts detections of one configured class (typically "person") in the
//! current frame, independent of zone membership. No history is retained
//! here; downstream consumers log the value if they need a series.

use crate::detect::{label_matches, Detection, MatchMode};

/// Stateless per-frame counter for one target class.
#[derive(Clone, Debug)]
pub struct OccupancyCounter {
    target_class: String,
    mode: MatchMode,
}

impl OccupancyCounter {
    pub fn new(target_class: impl Into<String>, mode: MatchMode) -> Self {
        Self {
            target_class: target_class.into().to_lowercase(),
            mode,
        }
    }

    pub fn target_class(&self) -> &str {
        &self.target_class
    }

    /// Number of detections whose label matches the target class.
    pub fn count(&self, detections: &[Detection]) -> usize {
        detections
            .iter()
            .filter(|d| label_matches(&d.label, &self.target_class, self.mode))
            .count()
    }
}

impl Default for OccupancyCounter {
    fn default() -> Self {
        Self::new("person", MatchMode::Substring)
    }
}
