pub mod scripted;

#[cfg(feature = "backend-tract")]
pub mod tract;

pub use scripted::{DetectorProbe, ScriptedDetector, ScriptedFrame};

#[cfg(feature = "backend-tract")]
pub use tract::TractYoloDetector;
