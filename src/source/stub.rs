use anyhow::{anyhow, Result};
use chrono::Utc;
use std::collections::VecDeque;

use crate::frame::Frame;
use crate::source::FrameSource;

/// What the stub source does on one `next_frame` call.
#[derive(Clone, Copy, Debug)]
pub enum StubStep {
    /// Produce a synthetic frame.
    Frame,
    /// Fail the read (models a transient live-source error).
    Fail,
}

/// Scripted synthetic source for tests and for running the daemon without
/// hardware. Plays a fixed step script; a file-mode stub ends afterwards,
/// a live-mode stub keeps producing frames forever.
pub struct StubSource {
    width: u32,
    height: u32,
    live: bool,
    script: VecDeque<StubStep>,
    frame_count: u64,
}

impl StubSource {
    /// File-backed stub: `frames` synthetic frames, then end-of-stream.
    pub fn file(frames: usize, width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            live: false,
            script: vec![StubStep::Frame; frames].into(),
            frame_count: 0,
        }
    }

    /// Live stub with an explicit step script; once the script is exhausted
    /// it produces frames indefinitely.
    pub fn live(script: Vec<StubStep>, width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            live: true,
            script: script.into(),
            frame_count: 0,
        }
    }

    fn synthesize_frame(&mut self) -> Result<Frame> {
        self.frame_count += 1;
        let pixel_count = (self.width as usize) * (self.height as usize) * 3;
        let mut pixels = vec![0u8; pixel_count];
        for (i, pixel) in pixels.iter_mut().enumerate() {
            *pixel = ((i as u64 + self.frame_count) % 256) as u8;
        }
        Frame::new(pixels, self.width, self.height, self.frame_count, Utc::now())
    }
}

impl FrameSource for StubSource {
    fn describe(&self) -> String {
        format!("stub://{}", if self.live { "camera" } else { "file" })
    }

    fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn is_live(&self) -> bool {
        self.live
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        match self.script.pop_front() {
            Some(StubStep::Frame) => Ok(Some(self.synthesize_frame()?)),
            Some(StubStep::Fail) => Err(anyhow!("stub source injected read failure")),
            None if self.live => Ok(Some(self.synthesize_frame()?)),
            None => Ok(None),
        }
    }
}
