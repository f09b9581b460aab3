//! Confidence filtering and non-max suppression

use super::detection::{BoundingBox, Detection};

/// Intersection over union of two boxes
pub fn iou(a: &BoundingBox, b: &BoundingBox) -> f32 {
    let left = a.x.max(b.x);
    let top = a.y.max(b.y);
    let right = a.right().min(b.right());
    let bottom = a.bottom().min(b.bottom());

    let intersection = (right - left).max(0.0) * (bottom - top).max(0.0);
    let union = a.area() + b.area() - intersection;
    if union <= 0.0 {
        0.0
    } else {
        intersection / union
    }
}

/// Drop detections below `threshold`
pub fn filter_confidence(detections: Vec<Detection>, threshold: f32) -> Vec<Detection> {
    detections
        .into_iter()
        .filter(|d| d.confidence >= threshold)
        .collect()
}

/// Greedy per-label non-max suppression.
///
/// Highest-confidence boxes win; a box is suppressed when it overlaps an
/// already kept box of the same label by more than `iou_threshold`.
pub fn non_max_suppression(mut detections: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    detections.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut kept: Vec<Detection> = Vec::with_capacity(detections.len());
    for candidate in detections {
        let suppressed = kept.iter().any(|k| {
            k.label == candidate.label && iou(&k.bbox, &candidate.bbox) > iou_threshold
        });
        if !suppressed {
            kept.push(candidate);
        }
    }
    kept
}
