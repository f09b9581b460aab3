//! Error types
//!
//! Each concern has its own error type; `Error` wraps them for callers that
//! drive the whole service.

use std::fmt;
use std::io;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type
#[derive(Debug)]
pub enum Error {
    /// Socket or file I/O failure
    Io(io::Error),
    /// Frame source failure (fatal for the frame pipeline)
    Capture(CaptureError),
    /// Detector failure (recoverable per frame)
    Detect(DetectError),
    /// JPEG encoding failure
    Encode(EncodeError),
    /// Speech sink failure
    Speech(SpeechError),
    /// Invalid configuration
    Config(ConfigError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Capture(e) => write!(f, "Capture error: {}", e),
            Error::Detect(e) => write!(f, "Detection error: {}", e),
            Error::Encode(e) => write!(f, "Encode error: {}", e),
            Error::Speech(e) => write!(f, "Speech error: {}", e),
            Error::Config(e) => write!(f, "Config error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Capture(e) => Some(e),
            Error::Detect(e) => Some(e),
            Error::Encode(e) => Some(e),
            Error::Speech(e) => Some(e),
            Error::Config(e) => Some(e),
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<CaptureError> for Error {
    fn from(e: CaptureError) -> Self {
        Error::Capture(e)
    }
}

impl From<DetectError> for Error {
    fn from(e: DetectError) -> Self {
        Error::Detect(e)
    }
}

impl From<EncodeError> for Error {
    fn from(e: EncodeError) -> Self {
        Error::Encode(e)
    }
}

impl From<SpeechError> for Error {
    fn from(e: SpeechError) -> Self {
        Error::Speech(e)
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::Config(e)
    }
}

/// Frame source errors
#[derive(Debug)]
pub enum CaptureError {
    /// The source could not be opened
    Open(String),
    /// Reading the next frame failed
    Read(String),
    /// The source has no more frames
    Exhausted,
    /// The source URI is not understood
    UnsupportedSource(String),
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureError::Open(msg) => write!(f, "failed to open source: {}", msg),
            CaptureError::Read(msg) => write!(f, "failed to read frame: {}", msg),
            CaptureError::Exhausted => write!(f, "source exhausted"),
            CaptureError::UnsupportedSource(uri) => write!(f, "unsupported source: {}", uri),
        }
    }
}

impl std::error::Error for CaptureError {}

/// Detector errors
#[derive(Debug, Clone)]
pub enum DetectError {
    /// Input frame was rejected (wrong size, empty, ...)
    InvalidInput(String),
    /// Inference itself failed
    Inference(String),
    /// Model output could not be interpreted
    MalformedOutput(String),
    /// The detector could not be constructed
    Load(String),
}

impl fmt::Display for DetectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetectError::InvalidInput(msg) => write!(f, "invalid input: {}", msg),
            DetectError::Inference(msg) => write!(f, "inference failed: {}", msg),
            DetectError::MalformedOutput(msg) => write!(f, "malformed output: {}", msg),
            DetectError::Load(msg) => write!(f, "failed to load detector: {}", msg),
        }
    }
}

impl std::error::Error for DetectError {}

/// JPEG encoding error
#[derive(Debug)]
pub struct EncodeError(pub String);

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for EncodeError {}

/// Speech sink errors
#[derive(Debug)]
pub enum SpeechError {
    /// The speech program could not be started
    Spawn(io::Error),
    /// The speech program exited unsuccessfully
    Failed(String),
    /// The speech queue is full; the utterance was not accepted
    QueueFull,
    /// The speech worker has stopped
    WorkerGone,
}

impl fmt::Display for SpeechError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpeechError::Spawn(e) => write!(f, "failed to start speech program: {}", e),
            SpeechError::Failed(msg) => write!(f, "speech program failed: {}", msg),
            SpeechError::QueueFull => write!(f, "speech queue full"),
            SpeechError::WorkerGone => write!(f, "speech worker stopped"),
        }
    }
}

impl std::error::Error for SpeechError {}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Config file could not be read
    Read(String),
    /// Config file could not be parsed
    Parse(String),
    /// A value is out of range
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Read(msg) => write!(f, "failed to read config: {}", msg),
            ConfigError::Parse(msg) => write!(f, "failed to parse config: {}", msg),
            ConfigError::Invalid(msg) => write!(f, "invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_wraps_inner() {
        let err: Error = CaptureError::Read("device unplugged".into()).into();
        assert_eq!(
            err.to_string(),
            "Capture error: failed to read frame: device unplugged"
        );
    }

    #[test]
    fn test_source_is_inner_error() {
        let err: Error = DetectError::MalformedOutput("tensor rank 2".into()).into();
        let source = std::error::Error::source(&err).unwrap();
        assert_eq!(source.to_string(), "malformed output: tensor rank 2");
    }
}
