use anyhow::Result;
use std::collections::VecDeque;

use crate::detect::{Detection, Detector};
use crate::frame::Frame;

/// Scripted detector for testing. Replays a queue of per-frame detection
/// lists; once the script is exhausted every frame yields no detections.
pub struct ScriptedDetector {
    script: VecDeque<Vec<Detection>>,
}

impl ScriptedDetector {
    pub fn new(script: Vec<Vec<Detection>>) -> Self {
        Self {
            script: script.into(),
        }
    }

    /// A detector that never reports anything. The daemon falls back to this
    /// when no inference backend is configured.
    pub fn silent() -> Self {
        Self::new(Vec::new())
    }
}

impl Detector for ScriptedDetector {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn detect(&mut self, _frame: &Frame) -> Result<Vec<Detection>> {
        Ok(self.script.pop_front().unwrap_or_default())
    }
}
