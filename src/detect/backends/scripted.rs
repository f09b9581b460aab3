use std::sync::{Arc, Mutex, PoisonError};

use image::RgbImage;

use crate::detect::backend::{DetectParams, Detector};
use crate::detect::detection::{BoundingBox, Detection};
use crate::detect::nms::{filter_confidence, non_max_suppression};
use crate::error::DetectError;

/// One scripted detector response
#[derive(Debug, Clone)]
pub enum ScriptedFrame {
    /// Report these detections (in detection-resolution pixels)
    Detections(Vec<Detection>),
    /// Fail this call with a malformed-output error
    Fail(String),
}

/// Observes the calls a [`ScriptedDetector`] receives after it has been
/// moved into the pipeline.
#[derive(Debug, Clone, Default)]
pub struct DetectorProbe {
    input_sizes: Arc<Mutex<Vec<(u32, u32)>>>,
}

impl DetectorProbe {
    /// Sizes of every frame passed to `detect`, in call order
    pub fn input_sizes(&self) -> Vec<(u32, u32)> {
        self.input_sizes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn calls(&self) -> usize {
        self.input_sizes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn record(&self, size: (u32, u32)) {
        self.input_sizes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(size);
    }
}

/// Detector that replays a fixed script, cycling when it reaches the end.
///
/// Thresholds are honoured the way a model backend would: detections below
/// the confidence threshold are dropped and NMS is applied when requested.
pub struct ScriptedDetector {
    script: Vec<ScriptedFrame>,
    cursor: usize,
    probe: DetectorProbe,
}

impl ScriptedDetector {
    pub fn new(script: Vec<ScriptedFrame>) -> Self {
        Self {
            script,
            cursor: 0,
            probe: DetectorProbe::default(),
        }
    }

    /// A detector that reports the same detections on every call
    pub fn constant(detections: Vec<Detection>) -> Self {
        Self::new(vec![ScriptedFrame::Detections(detections)])
    }

    /// Small looping scene used with synthetic sources
    pub fn demo(detect_size: (u32, u32)) -> Self {
        let (w, h) = (detect_size.0 as f32, detect_size.1 as f32);
        let person = Detection::new(
            "person",
            0.82,
            BoundingBox::new(w * 0.1, h * 0.2, w * 0.25, h * 0.6),
        );
        let chair = Detection::new(
            "chair",
            0.64,
            BoundingBox::new(w * 0.6, h * 0.5, w * 0.2, h * 0.3),
        );
        let cup = Detection::new(
            "cup",
            0.71,
            BoundingBox::new(w * 0.45, h * 0.45, w * 0.06, h * 0.08),
        );
        Self::new(vec![
            ScriptedFrame::Detections(vec![person.clone()]),
            ScriptedFrame::Detections(vec![person.clone(), chair.clone()]),
            ScriptedFrame::Detections(vec![person, chair, cup]),
            ScriptedFrame::Detections(Vec::new()),
        ])
    }

    /// Handle for inspecting calls after the detector is moved
    pub fn probe(&self) -> DetectorProbe {
        self.probe.clone()
    }
}

impl Detector for ScriptedDetector {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn detect(
        &mut self,
        frame: &RgbImage,
        params: &DetectParams,
    ) -> Result<Vec<Detection>, DetectError> {
        self.probe.record(frame.dimensions());

        if self.script.is_empty() {
            return Ok(Vec::new());
        }
        let step = self.script[self.cursor % self.script.len()].clone();
        self.cursor = self.cursor.wrapping_add(1);

        match step {
            ScriptedFrame::Fail(reason) => Err(DetectError::MalformedOutput(reason)),
            ScriptedFrame::Detections(detections) => {
                let detections = filter_confidence(detections, params.confidence_threshold);
                Ok(match params.nms_threshold {
                    Some(iou) => non_max_suppression(detections, iou),
                    None => detections,
                })
            }
        }
    }
}
