use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::EnvFilter;

use seesay::config::{AppConfig, DetectorBackend};
use seesay::service;
use seesay::speech::SinkKind;

/// Camera object detection with a live MJPEG stream and spoken summaries
#[derive(Debug, Parser)]
#[command(name = "seesay", version, about)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, env = "SEESAY_CONFIG")]
    config: Option<PathBuf>,

    /// Frame source: /dev/videoN, dir:///path or stub://name
    #[arg(short, long)]
    source: Option<String>,

    /// HTTP port (keeps the configured host)
    #[arg(short, long)]
    port: Option<u16>,

    /// YOLOv8 ONNX model (selects the tract backend)
    #[arg(long, requires = "labels")]
    model: Option<PathBuf>,

    /// Label file, one class name per line
    #[arg(long)]
    labels: Option<PathBuf>,

    /// Where announcements go
    #[arg(long, value_enum)]
    speech: Option<SpeechArg>,

    /// Debug logging for this crate
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SpeechArg {
    /// Run espeak (or the configured program)
    Command,
    /// Print `TTS: <text>` to the log
    Log,
}

impl Cli {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(source) = &self.source {
            config.source.uri = source.clone();
        }
        if let Some(port) = self.port {
            config.server.bind_addr.set_port(port);
        }
        if let Some(model) = &self.model {
            config.detector.backend = DetectorBackend::Tract;
            config.detector.model = Some(model.clone());
        }
        if let Some(labels) = &self.labels {
            config.detector.labels = Some(labels.clone());
        }
        match self.speech {
            Some(SpeechArg::Log) => config.speech.sink = SinkKind::Log,
            Some(SpeechArg::Command) if config.speech.sink == SinkKind::Log => {
                config.speech.sink = SinkKind::Command {
                    program: "espeak".to_string(),
                    args: Vec::new(),
                };
            }
            _ => {}
        }
    }
}

/// Used when `RUST_LOG` is unset or blank
const DEFAULT_LOG: &str = "seesay=info";

/// `RUST_LOG` wins over the default; `--verbose` raises this crate to debug
fn log_filter(rust_log: Option<&str>, verbose: bool) -> Result<EnvFilter, ParseError> {
    let filter = match rust_log.map(str::trim).filter(|value| !value.is_empty()) {
        Some(directives) => EnvFilter::try_new(directives)?,
        None => EnvFilter::new(DEFAULT_LOG),
    };

    if verbose {
        Ok(filter.add_directive("seesay=debug".parse()?))
    } else {
        Ok(filter)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(rust_log.as_deref(), cli.verbose)?)
        .init();

    let mut config = AppConfig::load(cli.config.as_deref())?;
    cli.apply(&mut config);
    config.validate()?;

    tracing::info!(
        source = %config.source.uri,
        addr = %config.server.bind_addr,
        stream = %config.server.stream_path,
        "Starting"
    );

    service::run_until(config, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
        tracing::info!("Shutting down");
    })
    .await?;

    Ok(())
}
