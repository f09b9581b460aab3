//! Object detection
//!
//! The detector itself is a collaborator behind the [`Detector`] trait. This
//! module owns the detection types, box reprojection between the detection
//! and display resolutions, and the NMS helpers shared by backends.

mod backend;
pub mod backends;
mod detection;
pub mod nms;

pub use backend::{DetectParams, Detector};
pub use backends::{DetectorProbe, ScriptedDetector, ScriptedFrame};
pub use detection::{reproject, BoundingBox, Detection};

#[cfg(feature = "backend-tract")]
pub use backends::TractYoloDetector;
