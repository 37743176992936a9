//! FFmpeg-backed file decoding.
//!
//! Decodes a local video file to RGB24 in-memory. Frames come out at the
//! file's native cadence; when the container is exhausted the decoder is
//! drained and the source reports end-of-stream.

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use ffmpeg_next as ffmpeg;

use crate::frame::Frame;

pub(crate) struct FfmpegFileSource {
    state: Option<DecodeState>,
    width: u32,
    height: u32,
    frame_count: u64,
    draining: bool,
}

struct DecodeState {
    input: ffmpeg::format::context::Input,
    stream_index: usize,
    decoder: ffmpeg::codec::decoder::Video,
    scaler: ffmpeg::software::scaling::Context,
}

impl FfmpegFileSource {
    pub(crate) fn open(path: &str) -> Result<Self> {
        ffmpeg::init().context("initialize ffmpeg")?;
        let input = ffmpeg::format::input(&path)
            .with_context(|| format!("failed to open video file '{}'", path))?;
        let input_stream = input
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or_else(|| anyhow!("file has no video track"))?;
        let stream_index = input_stream.index();
        let context = ffmpeg::codec::context::Context::from_parameters(input_stream.parameters())
            .context("load video decoder parameters")?;
        let decoder = context
            .decoder()
            .video()
            .context("open ffmpeg video decoder")?;

        let width = decoder.width();
        let height = decoder.height();
        let scaler = ffmpeg::software::scaling::context::Context::get(
            decoder.format(),
            width,
            height,
            ffmpeg::util::format::pixel::Pixel::RGB24,
            width,
            height,
            ffmpeg::software::scaling::flag::Flags::BILINEAR,
        )
        .context("create ffmpeg scaler")?;

        Ok(Self {
            state: Some(DecodeState {
                input,
                stream_index,
                decoder,
                scaler,
            }),
            width,
            height,
            frame_count: 0,
            draining: false,
        })
    }

    pub(crate) fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub(crate) fn next_frame(&mut self) -> Result<Option<Frame>> {
        let Some(state) = self.state.as_mut() else {
            return Ok(None);
        };

        let mut decoded = ffmpeg::frame::Video::empty();
        let mut rgb_frame = ffmpeg::frame::Video::empty();

        loop {
            if state.decoder.receive_frame(&mut decoded).is_ok() {
                state
                    .scaler
                    .run(&decoded, &mut rgb_frame)
                    .context("scale frame to RGB")?;
                let pixels = packed_rgb(&rgb_frame)?;
                self.frame_count += 1;
                return Ok(Some(Frame::new(
                    pixels,
                    self.width,
                    self.height,
                    self.frame_count,
                    Utc::now(),
                )?));
            }

            if self.draining {
                return Ok(None);
            }

            match next_video_packet(&mut state.input, state.stream_index) {
                Some(packet) => {
                    state
                        .decoder
                        .send_packet(&packet)
                        .context("send packet to ffmpeg decoder")?;
                }
                None => {
                    state
                        .decoder
                        .send_eof()
                        .context("flush ffmpeg decoder at end of file")?;
                    self.draining = true;
                }
            }
        }
    }

    pub(crate) fn close(&mut self) {
        self.state = None;
    }
}

fn next_video_packet(
    input: &mut ffmpeg::format::context::Input,
    stream_index: usize,
) -> Option<ffmpeg::Packet> {
    for (stream, packet) in input.packets() {
        if stream.index() == stream_index {
            return Some(packet);
        }
    }
    None
}

/// Copy a scaled RGB frame into a packed row-major buffer, dropping any
/// per-row stride padding.
fn packed_rgb(frame: &ffmpeg::frame::Video) -> Result<Vec<u8>> {
    let width = frame.width() as usize;
    let height = frame.height() as usize;
    let row_bytes = width * 3;
    let stride = frame.stride(0) as usize;
    let data = frame.data(0);

    if stride == row_bytes {
        return Ok(data[..row_bytes * height].to_vec());
    }

    let mut pixels = Vec::with_capacity(row_bytes * height);
    for row in 0..height {
        let start = row * stride;
        let end = start + row_bytes;
        pixels.extend_from_slice(
            data.get(start..end)
                .context("ffmpeg frame row is out of bounds")?,
        );
    }
    Ok(pixels)
}
