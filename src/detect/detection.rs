/// Axis-aligned box in pixel coordinates: top-left corner plus size
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Build from corner coordinates
    pub fn from_corners(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self::new(x1, y1, (x2 - x1).max(0.0), (y2 - y1).max(0.0))
    }

    pub fn area(&self) -> f32 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    /// Map the box from a `from` sized frame into a `to` sized frame.
    ///
    /// Each axis is scaled independently: x and width by `to.0 / from.0`,
    /// y and height by `to.1 / from.1`.
    pub fn rescale(&self, from: (u32, u32), to: (u32, u32)) -> Self {
        if from.0 == 0 || from.1 == 0 {
            return *self;
        }
        let sx = to.0 as f32 / from.0 as f32;
        let sy = to.1 as f32 / from.1 as f32;
        Self {
            x: self.x * sx,
            y: self.y * sy,
            width: self.width * sx,
            height: self.height * sy,
        }
    }

    /// Integer rectangle clipped to a `bounds` sized frame.
    ///
    /// Returns None when nothing of the box lies inside the frame.
    pub fn clipped(&self, bounds: (u32, u32)) -> Option<(i32, i32, u32, u32)> {
        let left = self.x.round().max(0.0);
        let top = self.y.round().max(0.0);
        let right = self.right().round().min(bounds.0 as f32);
        let bottom = self.bottom().round().min(bounds.1 as f32);
        if right - left < 1.0 || bottom - top < 1.0 {
            return None;
        }
        Some((
            left as i32,
            top as i32,
            (right - left) as u32,
            (bottom - top) as u32,
        ))
    }
}

/// One detector output for a single processed frame
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    /// Class label (e.g. "person")
    pub label: String,
    /// Confidence in [0, 1]
    pub confidence: f32,
    /// Box in the pixel space of the frame it was computed on
    pub bbox: BoundingBox,
}

impl Detection {
    pub fn new(label: impl Into<String>, confidence: f32, bbox: BoundingBox) -> Self {
        Self {
            label: label.into(),
            confidence: confidence.clamp(0.0, 1.0),
            bbox,
        }
    }
}

/// Reproject detections computed on a `from` sized frame onto a `to` sized frame
pub fn reproject(detections: Vec<Detection>, from: (u32, u32), to: (u32, u32)) -> Vec<Detection> {
    if from == to {
        return detections;
    }
    detections
        .into_iter()
        .map(|d| Detection {
            bbox: d.bbox.rescale(from, to),
            ..d
        })
        .collect()
}
