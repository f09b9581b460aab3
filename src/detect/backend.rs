use image::RgbImage;

use crate::error::DetectError;

use super::detection::Detection;

/// Thresholds handed to the detector on every call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectParams {
    /// Minimum confidence for a detection to be reported
    pub confidence_threshold: f32,
    /// IoU threshold for non-max suppression (None = backend default / off)
    pub nms_threshold: Option<f32>,
}

impl Default for DetectParams {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.5,
            nms_threshold: Some(0.3),
        }
    }
}

/// Detector backend trait.
///
/// A backend receives a frame already downscaled to the detection
/// resolution and returns boxes in that frame's pixel coordinates. It may be
/// slow; the pipeline never calls it while holding a lock.
pub trait Detector: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run detection on a frame.
    fn detect(
        &mut self,
        frame: &RgbImage,
        params: &DetectParams,
    ) -> Result<Vec<Detection>, DetectError>;

    /// Optional warm-up hook, called once before the first frame.
    fn warm_up(&mut self) -> Result<(), DetectError> {
        Ok(())
    }
}
