//! Synthetic `stub://` source
//!
//! Produces a gradient background with a square sweeping across it. An
//! optional `?frames=N` limit makes the N+1th read fail, which is how tests
//! and demos simulate a camera being unplugged.

use image::{Rgb, RgbImage};

use super::{Pacer, SourceConfig};
use crate::error::CaptureError;

/// Moving test pattern
#[derive(Debug)]
pub struct SyntheticSource {
    name: String,
    width: u32,
    height: u32,
    frame_limit: Option<u64>,
    frame_count: u64,
    pacer: Pacer,
}

impl SyntheticSource {
    /// Build from a `stub://name[?frames=N]` URI
    pub fn from_config(config: &SourceConfig) -> Result<Self, CaptureError> {
        let rest = config
            .uri
            .strip_prefix("stub://")
            .ok_or_else(|| CaptureError::UnsupportedSource(config.uri.clone()))?;

        let (name, query) = match rest.split_once('?') {
            Some((name, query)) => (name, Some(query)),
            None => (rest, None),
        };

        let mut frame_limit = None;
        for pair in query.into_iter().flat_map(|q| q.split('&')) {
            match pair.split_once('=') {
                Some(("frames", value)) => {
                    let limit = value.parse::<u64>().map_err(|_| {
                        CaptureError::Open(format!("invalid frame limit {:?}", value))
                    })?;
                    frame_limit = Some(limit);
                }
                _ => tracing::warn!(param = pair, "Ignoring unknown stub source parameter"),
            }
        }

        if config.width == 0 || config.height == 0 {
            return Err(CaptureError::Open(format!(
                "invalid frame size {}x{}",
                config.width, config.height
            )));
        }

        Ok(Self {
            name: if name.is_empty() { "stub" } else { name }.to_string(),
            width: config.width,
            height: config.height,
            frame_limit,
            frame_count: 0,
            pacer: Pacer::new(config.fps),
        })
    }

    /// Frames produced so far
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    fn render(&self) -> RgbImage {
        let (w, h) = (self.width, self.height);
        let side = (w.min(h) / 4).max(1);
        let travel = w.saturating_sub(side).max(1) as u64;
        let offset = (self.frame_count * 4) % (travel * 2);
        let left = if offset < travel {
            offset as u32
        } else {
            (travel * 2 - offset) as u32
        };
        let top = (h - side.min(h)) / 2;

        RgbImage::from_fn(w, h, |x, y| {
            if x >= left && x < left + side && y >= top && y < top + side {
                Rgb([230, 60, 40])
            } else {
                let shade = ((x * 96 / w) + (y * 64 / h)) as u8;
                Rgb([20 + shade, 40 + shade, 70 + shade])
            }
        })
    }
}

impl super::FrameSource for SyntheticSource {
    fn describe(&self) -> String {
        format!("stub://{} ({}x{})", self.name, self.width, self.height)
    }

    fn read_frame(&mut self) -> Result<RgbImage, CaptureError> {
        if let Some(limit) = self.frame_limit {
            if self.frame_count >= limit {
                return Err(CaptureError::Read(format!(
                    "stub://{} stopped after {} frames",
                    self.name, limit
                )));
            }
        }

        self.pacer.wait();
        let frame = self.render();
        self.frame_count += 1;
        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::FrameSource;

    fn config(uri: &str) -> SourceConfig {
        SourceConfig::default().uri(uri).size(32, 24).fps(0)
    }

    #[test]
    fn test_frames_move() {
        let mut source = SyntheticSource::from_config(&config("stub://move")).unwrap();

        let first = source.read_frame().unwrap();
        let second = source.read_frame().unwrap();

        assert_eq!(first.dimensions(), (32, 24));
        assert_ne!(first.as_raw(), second.as_raw());
        assert_eq!(source.frame_count(), 2);
    }

    #[test]
    fn test_frame_limit() {
        let mut source = SyntheticSource::from_config(&config("stub://cam?frames=4")).unwrap();

        for _ in 0..4 {
            source.read_frame().unwrap();
        }
        assert!(matches!(source.read_frame(), Err(CaptureError::Read(_))));
        assert!(matches!(source.read_frame(), Err(CaptureError::Read(_))));
    }

    #[test]
    fn test_invalid_frame_limit() {
        let err = SyntheticSource::from_config(&config("stub://cam?frames=many")).unwrap_err();
        assert!(matches!(err, CaptureError::Open(_)));
    }

    #[test]
    fn test_empty_name() {
        let source = SyntheticSource::from_config(&config("stub://")).unwrap();
        assert_eq!(source.describe(), "stub://stub (32x24)");
    }

    #[test]
    fn test_zero_size_rejected() {
        let config = SourceConfig::default().uri("stub://x").size(0, 10);
        assert!(SyntheticSource::from_config(&config).is_err());
    }
}
