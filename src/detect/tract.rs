#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use tract_onnx::prelude::*;

use crate::detect::{BoundingBox, Detection, Detector};
use crate::frame::Frame;

/// Tract-based ONNX detector.
///
/// Loads a local model file and runs inference on RGB frames. The model is
/// expected to emit decoded detections shaped `[1, N, 6]` as
/// `(x_min, y_min, x_max, y_max, score, class_index)` in model-input pixel
/// coordinates; boxes are scaled back to frame coordinates here. No network
/// I/O and no disk writes beyond model loading.
pub struct TractDetector {
    model: SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>,
    input_width: u32,
    input_height: u32,
    class_names: Vec<String>,
    confidence_threshold: f32,
}

impl TractDetector {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(
        model_path: P,
        input_width: u32,
        input_height: u32,
        class_names: Vec<String>,
    ) -> Result<Self> {
        let model_path = model_path.as_ref();
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(1, 3, input_height as usize, input_width as usize),
                ),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self {
            model,
            input_width,
            input_height,
            class_names,
            confidence_threshold: 0.5,
        })
    }

    /// Override the default confidence threshold.
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    /// Resample the frame to the model input size and normalise to `[0, 1]`
    /// NCHW. Nearest-neighbour is good enough for detection input.
    fn build_input(&self, frame: &Frame) -> Result<Tensor> {
        let src_w = frame.width as usize;
        let src_h = frame.height as usize;
        if src_w == 0 || src_h == 0 {
            return Err(anyhow!("cannot run inference on an empty frame"));
        }
        let dst_w = self.input_width as usize;
        let dst_h = self.input_height as usize;
        let pixels = frame.pixels();

        let input =
            tract_ndarray::Array4::from_shape_fn((1, 3, dst_h, dst_w), |(_, channel, y, x)| {
                let sx = x * src_w / dst_w;
                let sy = y * src_h / dst_h;
                let idx = (sy * src_w + sx) * 3 + channel;
                pixels[idx] as f32 / 255.0
            });

        Ok(input.into_tensor())
    }

    fn class_name(&self, index: usize) -> String {
        self.class_names
            .get(index)
            .cloned()
            .unwrap_or_else(|| format!("class_{}", index))
    }
}

impl Detector for TractDetector {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>> {
        let input = self.build_input(frame)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?;

        let rows = view
            .to_shape((view.len() / 6, 6))
            .context("model output is not shaped as (N, 6) detections")?;

        let scale_x = frame.width as f32 / self.input_width as f32;
        let scale_y = frame.height as f32 / self.input_height as f32;

        let mut detections = Vec::new();
        for row in rows.outer_iter() {
            let score = row[4];
            if score < self.confidence_threshold {
                continue;
            }
            let bbox = BoundingBox::new(
                row[0] * scale_x,
                row[1] * scale_y,
                row[2] * scale_x,
                row[3] * scale_y,
            );
            let label = self.class_name(row[5] as usize);
            detections.push(Detection::new(label, score.clamp(0.0, 1.0), bbox));
        }

        Ok(detections)
    }

    fn warm_up(&mut self) -> Result<()> {
        let zeros = Tensor::zero::<f32>(&[
            1,
            3,
            self.input_height as usize,
            self.input_width as usize,
        ])?;
        self.model
            .run(tvec!(zeros.into()))
            .context("ONNX warm-up inference failed")?;
        Ok(())
    }
}
