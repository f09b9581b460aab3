#![cfg(feature = "backend-tract")]

//! YOLOv8 ONNX backend on tract.
//!
//! Expects the exported detection head layout `[1, 4 + classes, anchors]`
//! with centre-format boxes in input pixels.

use std::path::Path;

use image::RgbImage;
use tract_onnx::prelude::*;

use crate::detect::backend::{DetectParams, Detector};
use crate::detect::detection::{BoundingBox, Detection};
use crate::detect::nms::non_max_suppression;
use crate::error::DetectError;

type Plan = TypedRunnableModel<TypedModel>;

/// Tract-based YOLOv8 detector
pub struct TractYoloDetector {
    model: Plan,
    labels: Vec<String>,
    width: u32,
    height: u32,
}

impl TractYoloDetector {
    /// Load an ONNX model and a label file (one label per line).
    pub fn load<P: AsRef<Path>, L: AsRef<Path>>(
        model_path: P,
        labels_path: L,
        width: u32,
        height: u32,
    ) -> Result<Self, DetectError> {
        let model_path = model_path.as_ref();
        let labels = load_labels(labels_path.as_ref())?;
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .and_then(|model| {
                model.with_input_fact(
                    0,
                    InferenceFact::dt_shape(
                        f32::datum_type(),
                        tvec!(1, 3, height as usize, width as usize),
                    ),
                )
            })
            .and_then(|model| model.into_optimized())
            .and_then(|model| model.into_runnable())
            .map_err(|e| {
                DetectError::Load(format!("{}: {}", model_path.display(), e))
            })?;

        tracing::info!(
            model = %model_path.display(),
            labels = labels.len(),
            width = width,
            height = height,
            "YOLOv8 model loaded"
        );

        Ok(Self {
            model,
            labels,
            width,
            height,
        })
    }

    fn build_input(&self, frame: &RgbImage) -> Result<Tensor, DetectError> {
        if frame.dimensions() != (self.width, self.height) {
            return Err(DetectError::InvalidInput(format!(
                "frame size {}x{} does not match model input {}x{}",
                frame.width(),
                frame.height(),
                self.width,
                self.height
            )));
        }
        let input = tract_ndarray::Array4::from_shape_fn(
            (1, 3, self.height as usize, self.width as usize),
            |(_, channel, y, x)| frame.get_pixel(x as u32, y as u32)[channel] as f32 / 255.0,
        );
        Ok(input.into_tensor())
    }

    fn decode(&self, output: &Tensor, params: &DetectParams) -> Result<Vec<Detection>, DetectError> {
        let view = output
            .to_array_view::<f32>()
            .map_err(|e| DetectError::MalformedOutput(e.to_string()))?;
        let shape = view.shape().to_vec();
        if shape.len() != 3 || shape[0] != 1 || shape[1] <= 4 {
            return Err(DetectError::MalformedOutput(format!(
                "unexpected output shape {:?}",
                shape
            )));
        }
        let classes = shape[1] - 4;
        let anchors = shape[2];

        let mut detections = Vec::new();
        for i in 0..anchors {
            let (mut best_class, mut best_score) = (0usize, f32::MIN);
            for c in 0..classes {
                let score = view[[0, 4 + c, i]];
                if score > best_score {
                    best_class = c;
                    best_score = score;
                }
            }
            if best_score < params.confidence_threshold {
                continue;
            }
            let cx = view[[0, 0, i]];
            let cy = view[[0, 1, i]];
            let w = view[[0, 2, i]];
            let h = view[[0, 3, i]];
            let label = self
                .labels
                .get(best_class)
                .cloned()
                .unwrap_or_else(|| format!("class{}", best_class));
            detections.push(Detection::new(
                label,
                best_score,
                BoundingBox::new(cx - w / 2.0, cy - h / 2.0, w, h),
            ));
        }

        Ok(match params.nms_threshold {
            Some(iou) => non_max_suppression(detections, iou),
            None => detections,
        })
    }
}

impl Detector for TractYoloDetector {
    fn name(&self) -> &'static str {
        "tract-yolov8"
    }

    fn detect(
        &mut self,
        frame: &RgbImage,
        params: &DetectParams,
    ) -> Result<Vec<Detection>, DetectError> {
        let input = self.build_input(frame)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .map_err(|e| DetectError::Inference(e.to_string()))?;
        let output = outputs
            .first()
            .ok_or_else(|| DetectError::MalformedOutput("model produced no outputs".into()))?;
        self.decode(output, params)
    }

    fn warm_up(&mut self) -> Result<(), DetectError> {
        let blank = RgbImage::new(self.width, self.height);
        self.detect(&blank, &DetectParams::default()).map(|_| ())
    }
}

fn load_labels(path: &Path) -> Result<Vec<String>, DetectError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| DetectError::Load(format!("{}: {}", path.display(), e)))?;
    Ok(raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}
