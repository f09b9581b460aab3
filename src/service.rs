//! Wires every component into one running service
//!
//! ```text
//!   camera ─► FramePipeline (thread) ─┬─► DetectionState ─► Announcer (task) ─► speech (thread)
//!                                     └─► frame slot ─────► StreamServer (tasks) ─► HTTP clients
//! ```

use std::future::Future;
use std::sync::Arc;

use crate::announce::Announcer;
use crate::camera;
use crate::config::{AppConfig, DetectorBackend, DetectorSettings};
use crate::detect::{Detector, ScriptedDetector};
use crate::error::{DetectError, Error, Result};
use crate::pipeline::FramePipeline;
use crate::publish;
use crate::server::StreamServer;
use crate::shutdown::ShutdownSignal;
use crate::speech::SpeechWorker;
use crate::state::DetectionState;
use crate::stats::Stats;

/// Build the detector named by the settings
pub fn build_detector(
    settings: &DetectorSettings,
    detect_size: (u32, u32),
) -> std::result::Result<Box<dyn Detector>, DetectError> {
    match settings.backend {
        DetectorBackend::Scripted => Ok(Box::new(ScriptedDetector::demo(detect_size))),
        DetectorBackend::Tract => build_tract(settings, detect_size),
    }
}

#[cfg(feature = "backend-tract")]
fn build_tract(
    settings: &DetectorSettings,
    detect_size: (u32, u32),
) -> std::result::Result<Box<dyn Detector>, DetectError> {
    let (Some(model), Some(labels)) = (&settings.model, &settings.labels) else {
        return Err(DetectError::Load("model and labels paths are required".into()));
    };
    let detector =
        crate::detect::TractYoloDetector::load(model, labels, detect_size.0, detect_size.1)?;
    Ok(Box::new(detector))
}

#[cfg(not(feature = "backend-tract"))]
fn build_tract(
    _settings: &DetectorSettings,
    _detect_size: (u32, u32),
) -> std::result::Result<Box<dyn Detector>, DetectError> {
    Err(DetectError::Load(
        "built without the backend-tract feature".into(),
    ))
}

/// Run everything until `shutdown` resolves
///
/// A camera failure stops only the frame pipeline: the HTTP server keeps
/// answering (stream requests get 503) until shutdown.
pub async fn run_until<F>(config: AppConfig, shutdown: F) -> Result<()>
where
    F: Future<Output = ()>,
{
    let stats = Arc::new(Stats::new());
    let state = Arc::new(DetectionState::new());
    let signal = ShutdownSignal::new();

    let source = camera::open(&config.source)?;
    let detector = build_detector(&config.detector, config.pipeline.detect_size)?;
    let (publisher, feed) = publish::channel();

    let sink = config.speech.build_sink();
    tracing::info!(sink = sink.name(), "Speech sink ready");
    let (speech, speech_worker) =
        SpeechWorker::spawn(sink, config.speech.queue_capacity, Arc::clone(&stats))?;

    let pipeline = FramePipeline::new(
        config.pipeline.clone(),
        source,
        detector,
        Arc::clone(&state),
        publisher,
    )
    .with_stats(Arc::clone(&stats))
    .with_shutdown(signal.clone())
    .spawn()?;

    let announcer = Announcer::new(config.announcer.clone(), Arc::clone(&state), speech)
        .with_stats(Arc::clone(&stats));
    let announcer_task = {
        let signal = signal.clone();
        tokio::spawn(async move { announcer.run_until(signal.wait()).await })
    };

    let server = StreamServer::with_shared(config.server.clone(), feed, state, stats);
    let server_result = server
        .run_until(async {
            tokio::select! {
                _ = shutdown => {}
                _ = signal.wait() => {}
            }
        })
        .await;

    signal.trigger();

    if announcer_task.await.is_err() {
        tracing::error!("Announcer task panicked");
    }

    let pipeline_result = tokio::task::spawn_blocking(move || pipeline.join())
        .await
        .map_err(|e| Error::Io(std::io::Error::other(e)))?;
    if let Err(e) = pipeline_result {
        tracing::warn!(error = %e, "Frame pipeline had stopped before shutdown");
    }

    // The announcer owned the last speech handle, so the worker now drains
    // what is queued and exits.
    tokio::task::spawn_blocking(move || speech_worker.join())
        .await
        .map_err(|e| Error::Io(std::io::Error::other(e)))?;

    tracing::info!("Service stopped");
    server_result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_scripted_detector() {
        let detector = build_detector(&DetectorSettings::default(), (320, 240)).unwrap();
        assert_eq!(detector.name(), "scripted");
    }

    #[cfg(not(feature = "backend-tract"))]
    #[test]
    fn test_tract_unavailable_without_feature() {
        let settings = DetectorSettings {
            backend: DetectorBackend::Tract,
            model: Some("yolov8n.onnx".into()),
            labels: Some("coco.names".into()),
        };
        assert!(matches!(
            build_detector(&settings, (320, 240)),
            Err(DetectError::Load(_))
        ));
    }

    #[tokio::test]
    async fn test_unsupported_source_fails_startup() {
        let mut config = AppConfig::default();
        config.source.uri = "rtsp://nowhere".into();

        let result = run_until(config, std::future::ready(())).await;
        assert!(matches!(result, Err(Error::Capture(_))));
    }
}
