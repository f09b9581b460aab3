//! Application configuration
//!
//! Resolution order: built-in defaults, then the optional TOML file, then
//! `SEESAY_*` environment variables, then command-line flags (applied by the
//! binary). The result is validated once everything is merged.
//!
//! ```toml
//! [server]
//! bind_addr = "0.0.0.0:8080"
//! max_connections = 16
//!
//! [source]
//! uri = "/dev/video0"
//! width = 640
//! height = 480
//!
//! [detector]
//! model = "yolov8n.onnx"
//! labels = "coco.names"
//! width = 320
//! height = 240
//! confidence_threshold = 0.5
//!
//! [pipeline]
//! skip_interval = 4
//! count_policy = "replace"
//!
//! [announcer]
//! period_ms = 3000
//!
//! [speech]
//! sink = "command"
//! program = "espeak"
//! rate = 150
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::announce::AnnouncerConfig;
use crate::camera::SourceConfig;
use crate::error::ConfigError;
use crate::pipeline::PipelineConfig;
use crate::server::ServerConfig;
use crate::speech::{SinkKind, SpeechConfig};
use crate::state::CountPolicy;

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    server: Option<ServerFile>,
    source: Option<SourceFile>,
    detector: Option<DetectorFile>,
    pipeline: Option<PipelineFile>,
    announcer: Option<AnnouncerFile>,
    speech: Option<SpeechFile>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ServerFile {
    bind_addr: Option<String>,
    max_connections: Option<usize>,
    stream_path: Option<String>,
    drain_timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct SourceFile {
    uri: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    fps: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct DetectorFile {
    backend: Option<DetectorBackend>,
    model: Option<PathBuf>,
    labels: Option<PathBuf>,
    width: Option<u32>,
    height: Option<u32>,
    confidence_threshold: Option<f32>,
    nms_threshold: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct PipelineFile {
    skip_interval: Option<u32>,
    count_policy: Option<CountPolicy>,
    jpeg_quality: Option<u8>,
    hold_overlay: Option<bool>,
    font: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct AnnouncerFile {
    period_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct SpeechFile {
    sink: Option<SinkName>,
    program: Option<String>,
    args: Option<Vec<String>>,
    rate: Option<u32>,
    queue_capacity: Option<usize>,
}

/// Which detector implementation to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectorBackend {
    /// Built-in scripted demo scene, no model required
    Scripted,
    /// YOLOv8 ONNX model through tract (`backend-tract` feature)
    Tract,
}

/// Speech sink selector as written in config files and on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkName {
    Command,
    Log,
}

/// Resolved detector settings
#[derive(Debug, Clone)]
pub struct DetectorSettings {
    pub backend: DetectorBackend,
    pub model: Option<PathBuf>,
    pub labels: Option<PathBuf>,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            backend: DetectorBackend::Scripted,
            model: None,
            labels: None,
        }
    }
}

/// Fully resolved configuration of one service
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub source: SourceConfig,
    pub detector: DetectorSettings,
    pub pipeline: PipelineConfig,
    pub announcer: AnnouncerConfig,
    pub speech: SpeechConfig,
}

impl AppConfig {
    /// Defaults, then `path` (if any), then the process environment
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => read_config_file(path)?,
            None => ConfigFile::default(),
        };
        let mut config = Self::from_file(file)?;
        config.apply_env_from(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse TOML text on top of the defaults, without environment overrides
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile =
            toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        let config = Self::from_file(file)?;
        config.validate()?;
        Ok(config)
    }

    fn from_file(file: ConfigFile) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(server) = file.server {
            if let Some(addr) = server.bind_addr {
                config.server.bind_addr = parse_addr("server.bind_addr", &addr)?;
            }
            if let Some(max) = server.max_connections {
                config.server.max_connections = max;
            }
            if let Some(path) = server.stream_path {
                config.server = config.server.stream_path(path);
            }
            if let Some(ms) = server.drain_timeout_ms {
                config.server.drain_timeout = Duration::from_millis(ms);
            }
        }

        if let Some(source) = file.source {
            if let Some(uri) = source.uri {
                config.source.uri = uri;
            }
            if let Some(width) = source.width {
                config.source.width = width;
            }
            if let Some(height) = source.height {
                config.source.height = height;
            }
            if let Some(fps) = source.fps {
                config.source.fps = fps;
            }
        }

        if let Some(detector) = file.detector {
            config.detector.model = detector.model;
            config.detector.labels = detector.labels;
            config.detector.backend = detector.backend.unwrap_or(if config.detector.model.is_some() {
                DetectorBackend::Tract
            } else {
                DetectorBackend::Scripted
            });
            if let Some(width) = detector.width {
                config.pipeline.detect_size.0 = width;
            }
            if let Some(height) = detector.height {
                config.pipeline.detect_size.1 = height;
            }
            if let Some(threshold) = detector.confidence_threshold {
                config.pipeline.params.confidence_threshold = threshold;
            }
            if let Some(threshold) = detector.nms_threshold {
                config.pipeline.params.nms_threshold = Some(threshold);
            }
        }

        if let Some(pipeline) = file.pipeline {
            if let Some(n) = pipeline.skip_interval {
                config.pipeline.skip_interval = n;
            }
            if let Some(policy) = pipeline.count_policy {
                config.pipeline.count_policy = policy;
            }
            if let Some(quality) = pipeline.jpeg_quality {
                config.pipeline.jpeg_quality = quality;
            }
            if let Some(hold) = pipeline.hold_overlay {
                config.pipeline.hold_overlay = hold;
            }
            config.pipeline.font_path = pipeline.font;
        }

        if let Some(announcer) = file.announcer {
            if let Some(ms) = announcer.period_ms {
                config.announcer.period = Duration::from_millis(ms);
            }
        }

        if let Some(speech) = file.speech {
            if let Some(rate) = speech.rate {
                config.speech.rate = rate;
            }
            if let Some(capacity) = speech.queue_capacity {
                config.speech.queue_capacity = capacity;
            }
            match speech.sink.unwrap_or(SinkName::Command) {
                SinkName::Log => config.speech.sink = SinkKind::Log,
                SinkName::Command => {
                    config.speech.sink = SinkKind::Command {
                        program: speech.program.unwrap_or_else(|| "espeak".to_string()),
                        args: speech.args.unwrap_or_default(),
                    };
                }
            }
        }

        Ok(config)
    }

    /// Apply `SEESAY_*` overrides read through `lookup`
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(addr) = var("SEESAY_BIND_ADDR") {
            self.server.bind_addr = parse_addr("SEESAY_BIND_ADDR", addr.trim())?;
        }
        if let Some(uri) = var("SEESAY_SOURCE") {
            self.source.uri = uri;
        }
        if let Some(ms) = var("SEESAY_ANNOUNCE_PERIOD_MS") {
            let ms: u64 = ms.trim().parse().map_err(|_| {
                ConfigError::Invalid(
                    "SEESAY_ANNOUNCE_PERIOD_MS must be an integer number of milliseconds".into(),
                )
            })?;
            self.announcer.period = Duration::from_millis(ms);
        }
        if let Some(n) = var("SEESAY_SKIP_INTERVAL") {
            self.pipeline.skip_interval = n.trim().parse().map_err(|_| {
                ConfigError::Invalid("SEESAY_SKIP_INTERVAL must be a positive integer".into())
            })?;
        }
        Ok(())
    }

    /// Reject values the components cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pipeline.skip_interval == 0 {
            return Err(invalid("pipeline.skip_interval must be at least 1"));
        }
        let (width, height) = self.pipeline.detect_size;
        if width == 0 || height == 0 {
            return Err(invalid("detection size must be non-zero"));
        }
        if self.source.width == 0 || self.source.height == 0 {
            return Err(invalid("source size must be non-zero"));
        }
        if !(0.0..=1.0).contains(&self.pipeline.params.confidence_threshold) {
            return Err(invalid("confidence_threshold must be within [0, 1]"));
        }
        if let Some(nms) = self.pipeline.params.nms_threshold {
            if !(0.0..=1.0).contains(&nms) {
                return Err(invalid("nms_threshold must be within [0, 1]"));
            }
        }
        if !(1..=100).contains(&self.pipeline.jpeg_quality) {
            return Err(invalid("jpeg_quality must be within 1..=100"));
        }
        if self.announcer.period.is_zero() {
            return Err(invalid("announcer period must be greater than zero"));
        }
        if self.speech.queue_capacity == 0 {
            return Err(invalid("speech.queue_capacity must be at least 1"));
        }
        self.server.validate()?;
        if self.detector.backend == DetectorBackend::Tract
            && (self.detector.model.is_none() || self.detector.labels.is_none())
        {
            return Err(invalid("the tract backend needs both a model and a labels file"));
        }
        Ok(())
    }
}

fn invalid(msg: &str) -> ConfigError {
    ConfigError::Invalid(msg.to_string())
}

fn parse_addr(what: &str, value: &str) -> Result<SocketAddr, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::Invalid(format!("{} is not a socket address: {:?}", what, value)))
}

fn read_config_file(path: &Path) -> Result<ConfigFile, ConfigError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Read(format!("{}: {}", path.display(), e)))?;
    toml::from_str(&text).map_err(|e| ConfigError::Parse(format!("{}: {}", path.display(), e)))
}
