//! Detection overlay

use std::path::Path;

use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;

use crate::detect::Detection;

const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const LABEL_SCALE: f32 = 16.0;

/// Draws boxes and, when a font is available, `label: 87%` captions
pub struct Annotator {
    font: Option<FontVec>,
}

impl Annotator {
    /// Rectangles only
    pub fn new() -> Self {
        Self { font: None }
    }

    /// Load a font for captions; falls back to rectangles only on failure
    pub fn with_font(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::new();
        };

        let font = std::fs::read(path)
            .map_err(|e| e.to_string())
            .and_then(|bytes| FontVec::try_from_vec(bytes).map_err(|e| e.to_string()));

        match font {
            Ok(font) => Self { font: Some(font) },
            Err(e) => {
                tracing::warn!(font = %path.display(), error = %e, "Failed to load font, labels disabled");
                Self::new()
            }
        }
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// Draw every detection onto `frame` in place
    pub fn draw(&self, frame: &mut RgbImage, detections: &[Detection]) {
        let bounds = frame.dimensions();

        for detection in detections {
            let Some((x, y, w, h)) = detection.bbox.clipped(bounds) else {
                continue;
            };

            draw_hollow_rect_mut(frame, Rect::at(x, y).of_size(w, h), BOX_COLOR);
            // second pass one pixel inside for a 2px outline
            if w > 2 && h > 2 {
                draw_hollow_rect_mut(frame, Rect::at(x + 1, y + 1).of_size(w - 2, h - 2), BOX_COLOR);
            }

            if let Some(font) = &self.font {
                let caption = format!(
                    "{}: {:.0}%",
                    detection.label,
                    detection.confidence * 100.0
                );
                let text_y = (y - LABEL_SCALE as i32 - 2).max(0);
                draw_text_mut(
                    frame,
                    BOX_COLOR,
                    x,
                    text_y,
                    PxScale::from(LABEL_SCALE),
                    font,
                    &caption,
                );
            }
        }
    }
}

impl Default for Annotator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::BoundingBox;

    #[test]
    fn test_draws_outline() {
        let mut frame = RgbImage::new(40, 30);
        let detections = vec![Detection::new(
            "person",
            0.9,
            BoundingBox::new(10.0, 5.0, 20.0, 10.0),
        )];

        Annotator::new().draw(&mut frame, &detections);

        assert_eq!(frame.get_pixel(10, 5), &BOX_COLOR);
        assert_eq!(frame.get_pixel(29, 14), &BOX_COLOR);
        assert_eq!(frame.get_pixel(11, 6), &BOX_COLOR);
        // interior untouched
        assert_eq!(frame.get_pixel(20, 10), &Rgb([0, 0, 0]));
    }

    #[test]
    fn test_skips_box_outside_frame() {
        let mut frame = RgbImage::new(20, 20);
        let detections = vec![Detection::new(
            "cup",
            0.7,
            BoundingBox::new(50.0, 50.0, 10.0, 10.0),
        )];

        Annotator::new().draw(&mut frame, &detections);

        assert!(frame.pixels().all(|p| *p == Rgb([0, 0, 0])));
    }

    #[test]
    fn test_missing_font_falls_back() {
        let annotator = Annotator::with_font(Some(Path::new("/nonexistent/font.ttf")));
        assert!(!annotator.has_font());
        assert!(!Annotator::with_font(None).has_font());
    }
}
