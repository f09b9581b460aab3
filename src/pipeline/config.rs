//! Frame pipeline configuration

use std::path::PathBuf;

use crate::detect::DetectParams;
use crate::state::CountPolicy;

/// Frame pipeline options
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Run detection on every Nth frame (1 = every frame)
    pub skip_interval: u32,

    /// Resolution frames are downscaled to before detection
    pub detect_size: (u32, u32),

    /// Thresholds passed to the detector
    pub params: DetectParams,

    /// How each processed frame updates the detection state
    pub count_policy: CountPolicy,

    /// JPEG quality, 1..=100
    pub jpeg_quality: u8,

    /// Redraw the last detections on frames that skip detection
    pub hold_overlay: bool,

    /// TTF/OTF font for box labels (rectangles only when unset)
    pub font_path: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            skip_interval: 4,
            detect_size: (320, 240),
            params: DetectParams::default(),
            count_policy: CountPolicy::Replace,
            jpeg_quality: 80,
            hold_overlay: true,
            font_path: None,
        }
    }
}

impl PipelineConfig {
    /// Set the skip interval (at least 1)
    pub fn skip_interval(mut self, n: u32) -> Self {
        self.skip_interval = n.max(1);
        self
    }

    /// Set the detection resolution
    pub fn detect_size(mut self, width: u32, height: u32) -> Self {
        self.detect_size = (width, height);
        self
    }

    /// Set the confidence threshold
    pub fn confidence_threshold(mut self, threshold: f32) -> Self {
        self.params.confidence_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    /// Set the NMS IoU threshold (None disables NMS)
    pub fn nms_threshold(mut self, threshold: Option<f32>) -> Self {
        self.params.nms_threshold = threshold.map(|t| t.clamp(0.0, 1.0));
        self
    }

    /// Set the count policy
    pub fn count_policy(mut self, policy: CountPolicy) -> Self {
        self.count_policy = policy;
        self
    }

    /// Set JPEG quality, clamped to 1..=100
    pub fn jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality.clamp(1, 100);
        self
    }

    /// Enable or disable the held overlay
    pub fn hold_overlay(mut self, hold: bool) -> Self {
        self.hold_overlay = hold;
        self
    }

    /// Draw labels with this font
    pub fn font_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.font_path = Some(path.into());
        self
    }

    /// Whether frame `n` (1-based) goes through the detector
    pub fn should_process(&self, frame_number: u64) -> bool {
        frame_number % self.skip_interval.max(1) as u64 == 0
    }
}
