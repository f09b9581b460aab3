//! Frame sources
//!
//! A `FrameSource` hands the pipeline one RGB frame per call and blocks
//! until it has one. Sources are chosen by URI:
//!
//! | URI                       | Source                                    |
//! |---------------------------|-------------------------------------------|
//! | `stub://name[?frames=N]`  | synthetic moving pattern, optional limit  |
//! | `dir:///path/to/frames`   | replay of JPEG/PNG files, looping         |
//! | `/dev/videoN`, `v4l2://…` | V4L2 device (`camera-v4l2` feature)       |

mod replay;
mod synthetic;
#[cfg(feature = "camera-v4l2")]
mod v4l2;

use std::path::Path;
use std::time::{Duration, Instant};

use image::RgbImage;

use crate::error::CaptureError;

pub use replay::ReplaySource;
pub use synthetic::SyntheticSource;
#[cfg(feature = "camera-v4l2")]
pub use v4l2::V4l2Source;

/// Blocking source of display-resolution frames
pub trait FrameSource: Send {
    /// Human-readable identity for logs
    fn describe(&self) -> String;

    /// Block until the next frame is available
    ///
    /// Any error is treated as the camera being gone.
    fn read_frame(&mut self) -> Result<RgbImage, CaptureError>;
}

/// Where frames come from and at what size
#[derive(Debug, Clone)]
pub struct SourceConfig {
    /// Source URI, see the module docs
    pub uri: String,
    /// Display width
    pub width: u32,
    /// Display height
    pub height: u32,
    /// Frame rate cap (0 = as fast as the source delivers)
    pub fps: u32,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            uri: "stub://demo".to_string(),
            width: 640,
            height: 480,
            fps: 15,
        }
    }
}

impl SourceConfig {
    /// Set the source URI
    pub fn uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = uri.into();
        self
    }

    /// Set the display size
    pub fn size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Set the frame rate cap
    pub fn fps(mut self, fps: u32) -> Self {
        self.fps = fps;
        self
    }
}

/// Open the source named by `config.uri`
pub fn open(config: &SourceConfig) -> Result<Box<dyn FrameSource>, CaptureError> {
    let uri = config.uri.as_str();

    if uri.starts_with("stub://") {
        return Ok(Box::new(SyntheticSource::from_config(config)?));
    }

    if let Some(path) = uri.strip_prefix("dir://") {
        return Ok(Box::new(ReplaySource::open(Path::new(path), config)?));
    }

    if uri.starts_with("v4l2://") || uri.starts_with("/dev/video") {
        return open_device(config);
    }

    if Path::new(uri).is_dir() {
        return Ok(Box::new(ReplaySource::open(Path::new(uri), config)?));
    }

    Err(CaptureError::UnsupportedSource(config.uri.clone()))
}

#[cfg(feature = "camera-v4l2")]
fn open_device(config: &SourceConfig) -> Result<Box<dyn FrameSource>, CaptureError> {
    Ok(Box::new(V4l2Source::open(config)?))
}

#[cfg(not(feature = "camera-v4l2"))]
fn open_device(config: &SourceConfig) -> Result<Box<dyn FrameSource>, CaptureError> {
    Err(CaptureError::UnsupportedSource(format!(
        "{} (built without the camera-v4l2 feature)",
        config.uri
    )))
}

/// Sleeps just enough to hold a frame rate cap
#[derive(Debug)]
pub(crate) struct Pacer {
    interval: Option<Duration>,
    last: Option<Instant>,
}

impl Pacer {
    pub(crate) fn new(fps: u32) -> Self {
        let interval = (fps > 0).then(|| Duration::from_secs_f64(1.0 / fps as f64));
        Self {
            interval,
            last: None,
        }
    }

    pub(crate) fn wait(&mut self) {
        if let (Some(interval), Some(last)) = (self.interval, self.last) {
            let elapsed = last.elapsed();
            if elapsed < interval {
                std::thread::sleep(interval - elapsed);
            }
        }
        self.last = Some(Instant::now());
    }
}
