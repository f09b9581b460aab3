//! Frame pipeline
//!
//! Runs on its own OS thread because both the camera read and the detector
//! call block. Per captured frame:
//!
//! ```text
//!   read ─► skip? ─┬─(processed)─► downscale ─► detect ─► reproject ─► record
//!                  │                                                     │
//!                  └─(skipped)──── held overlay ◄────────────────────────┘
//!                                       │
//!                                       ▼
//!                                draw ─► encode ─► publish
//! ```
//!
//! A camera failure ends the loop with `Error::Capture`; dropping the
//! pipeline releases the camera and closes the frame feed so every stream
//! client finishes.

mod annotate;
mod config;
mod encode;

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use image::imageops::{self, FilterType};
use image::RgbImage;

use crate::camera::FrameSource;
use crate::detect::{reproject, Detection, Detector};
use crate::error::{DetectError, Error, Result};
use crate::publish::FramePublisher;
use crate::shutdown::ShutdownSignal;
use crate::state::DetectionState;
use crate::stats::Stats;

pub use annotate::Annotator;
pub use config::PipelineConfig;
pub use encode::encode_jpeg;

/// Capture → detect → annotate → publish loop
pub struct FramePipeline {
    config: PipelineConfig,
    source: Box<dyn FrameSource>,
    detector: Box<dyn Detector>,
    state: Arc<DetectionState>,
    publisher: FramePublisher,
    stats: Arc<Stats>,
    shutdown: ShutdownSignal,
    annotator: Annotator,
}

impl FramePipeline {
    pub fn new(
        config: PipelineConfig,
        source: Box<dyn FrameSource>,
        detector: Box<dyn Detector>,
        state: Arc<DetectionState>,
        publisher: FramePublisher,
    ) -> Self {
        let annotator = Annotator::with_font(config.font_path.as_deref());
        Self {
            config,
            source,
            detector,
            state,
            publisher,
            stats: Arc::new(Stats::new()),
            shutdown: ShutdownSignal::new(),
            annotator,
        }
    }

    /// Count into these stats instead of private ones
    pub fn with_stats(mut self, stats: Arc<Stats>) -> Self {
        self.stats = stats;
        self
    }

    /// Stop when this signal is triggered
    pub fn with_shutdown(mut self, shutdown: ShutdownSignal) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Run on the current thread until shutdown or camera failure
    pub fn run(mut self) -> Result<()> {
        tracing::info!(
            source = %self.source.describe(),
            detector = self.detector.name(),
            skip_interval = self.config.skip_interval,
            detect_width = self.config.detect_size.0,
            detect_height = self.config.detect_size.1,
            "Frame pipeline started"
        );

        if let Err(e) = self.detector.warm_up() {
            tracing::warn!(error = %e, "Detector warm-up failed");
        }

        let mut frame_number: u64 = 0;
        let mut held: Option<Vec<Detection>> = None;

        while !self.shutdown.is_triggered() {
            let mut frame = match self.source.read_frame() {
                Ok(frame) => frame,
                Err(e) => {
                    tracing::error!(
                        frame = frame_number + 1,
                        error = %e,
                        "Camera read failed, stopping frame pipeline"
                    );
                    return Err(Error::Capture(e));
                }
            };
            frame_number += 1;
            self.stats.pipeline.record_captured();

            let processed = self.config.should_process(frame_number);
            if processed {
                match self.detect(&frame) {
                    Ok(detections) => {
                        tracing::trace!(
                            frame = frame_number,
                            detections = detections.len(),
                            "Frame processed"
                        );
                        held = Some(detections);
                    }
                    Err(e) => {
                        self.stats.pipeline.record_detection_error();
                        tracing::warn!(frame = frame_number, error = %e, "Detection failed");
                        held = None;
                    }
                }
            }

            let overlay: &[Detection] = match &held {
                Some(detections) if processed || self.config.hold_overlay => detections,
                _ => &[],
            };
            self.annotator.draw(&mut frame, overlay);

            match encode_jpeg(&frame, self.config.jpeg_quality) {
                Ok(jpeg) => {
                    self.publisher
                        .publish(jpeg, frame.dimensions(), overlay.len());
                    self.stats.pipeline.record_published();
                }
                Err(e) => {
                    self.stats.pipeline.record_encode_error();
                    tracing::warn!(frame = frame_number, error = %e, "JPEG encode failed");
                }
            }
        }

        tracing::info!(frames = frame_number, "Frame pipeline stopped");
        Ok(())
    }

    /// Run on a dedicated thread
    pub fn spawn(self) -> std::io::Result<PipelineHandle> {
        let thread = thread::Builder::new()
            .name("frame-pipeline".to_string())
            .spawn(move || self.run())?;
        Ok(PipelineHandle { thread })
    }

    fn detect(&mut self, frame: &RgbImage) -> std::result::Result<Vec<Detection>, DetectError> {
        let display = frame.dimensions();
        let (width, height) = self.config.detect_size;

        let detections = if display == (width, height) {
            self.detector.detect(frame, &self.config.params)?
        } else {
            let small = imageops::resize(frame, width, height, FilterType::Triangle);
            self.detector.detect(&small, &self.config.params)?
        };
        let detections = reproject(detections, (width, height), display);

        self.state.record(
            detections.iter().map(|d| d.label.as_str()),
            self.config.count_policy,
        );
        self.stats.pipeline.record_processed();

        Ok(detections)
    }
}

/// Handle to a pipeline running on its own thread
#[derive(Debug)]
pub struct PipelineHandle {
    thread: JoinHandle<Result<()>>,
}

impl PipelineHandle {
    /// Wait for the pipeline to stop and return how it stopped
    pub fn join(self) -> Result<()> {
        match self.thread.join() {
            Ok(result) => result,
            Err(_) => Err(Error::Io(std::io::Error::other("frame pipeline panicked"))),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::camera::{self, SourceConfig};
    use crate::detect::{BoundingBox, ScriptedDetector, ScriptedFrame};
    use crate::error::CaptureError;
    use crate::publish::{self, FrameFeed};
    use crate::state::CountPolicy;

    fn source(uri: &str) -> Box<dyn FrameSource> {
        camera::open(&SourceConfig::default().uri(uri).size(64, 48).fps(0)).unwrap()
    }

    fn person_and_chair() -> Vec<Detection> {
        vec![
            Detection::new("person", 0.9, BoundingBox::new(4.0, 4.0, 8.0, 16.0)),
            Detection::new("chair", 0.8, BoundingBox::new(18.0, 10.0, 10.0, 10.0)),
        ]
    }

    fn pipeline(
        config: PipelineConfig,
        uri: &str,
        detector: ScriptedDetector,
    ) -> (FramePipeline, Arc<DetectionState>, FrameFeed, Arc<Stats>) {
        let state = Arc::new(DetectionState::new());
        let stats = Arc::new(Stats::new());
        let (publisher, feed) = publish::channel();
        let pipeline = FramePipeline::new(
            config,
            source(uri),
            Box::new(detector),
            Arc::clone(&state),
            publisher,
        )
        .with_stats(Arc::clone(&stats));
        (pipeline, state, feed, stats)
    }

    #[test]
    fn test_person_and_chair_scenario() {
        let config = PipelineConfig::default().skip_interval(1).detect_size(32, 24);
        let (pipeline, state, feed, _stats) = pipeline(
            config,
            "stub://scene?frames=1",
            ScriptedDetector::constant(person_and_chair()),
        );

        assert!(matches!(pipeline.run(), Err(Error::Capture(_))));

        let peek = state.peek();
        assert_eq!(peek.count_of("person"), 1);
        assert_eq!(peek.count_of("chair"), 1);
        assert_eq!(state.drain().utterance(), "1 person, 1 chair");
        assert!(state.is_empty());

        let frame = feed.latest().unwrap();
        assert_eq!(frame.detections, 2);
        assert_eq!((frame.width, frame.height), (64, 48));
    }

    #[tokio::test]
    async fn test_camera_failure_on_fifth_read() {
        let config = PipelineConfig::default().skip_interval(1).detect_size(32, 24);
        let (pipeline, _state, feed, stats) = pipeline(
            config,
            "stub://flaky?frames=4",
            ScriptedDetector::constant(person_and_chair()),
        );

        let mut subscriber = feed.subscribe();
        let reader = tokio::spawn(async move {
            let mut count = 0;
            while subscriber.next_frame().await.is_some() {
                count += 1;
            }
            count
        });

        let result = pipeline.spawn().unwrap().join();
        assert!(matches!(
            result,
            Err(Error::Capture(CaptureError::Read(_)))
        ));

        let delivered = tokio::time::timeout(Duration::from_secs(5), reader)
            .await
            .unwrap()
            .unwrap();
        assert!((1..=4).contains(&delivered));
        assert!(feed.is_closed());

        let snapshot = stats.pipeline.snapshot();
        assert_eq!(snapshot.captured, 4);
        assert_eq!(snapshot.published, 4);
    }

    #[test]
    fn test_skip_policy_and_downscale() {
        let detector = ScriptedDetector::constant(vec![]);
        let probe = detector.probe();
        let config = PipelineConfig::default().skip_interval(4).detect_size(32, 24);
        let (pipeline, _state, _feed, stats) = pipeline(config, "stub://skip?frames=12", detector);

        let _ = pipeline.run();

        assert_eq!(probe.calls(), 3);
        assert!(probe.input_sizes().iter().all(|size| *size == (32, 24)));

        let snapshot = stats.pipeline.snapshot();
        assert_eq!(snapshot.captured, 12);
        assert_eq!(snapshot.processed, 3);
        assert_eq!(snapshot.published, 12);
    }

    #[test]
    fn test_detector_failure_is_not_fatal() {
        let detector = ScriptedDetector::new(vec![
            ScriptedFrame::Fail("bad tensor".into()),
            ScriptedFrame::Detections(person_and_chair()),
        ]);
        let config = PipelineConfig::default().skip_interval(1).detect_size(64, 48);
        let (pipeline, state, feed, stats) = pipeline(config, "stub://x?frames=2", detector);

        assert!(matches!(pipeline.run(), Err(Error::Capture(_))));

        let snapshot = stats.pipeline.snapshot();
        assert_eq!(snapshot.detection_errors, 1);
        assert_eq!(snapshot.processed, 1);
        assert_eq!(snapshot.published, 2);
        assert_eq!(state.peek().total(), 2);
        assert_eq!(feed.latest().unwrap().sequence, 2);
    }

    #[test]
    fn test_detector_failure_leaves_state_untouched() {
        let detector = ScriptedDetector::new(vec![
            ScriptedFrame::Detections(person_and_chair()),
            ScriptedFrame::Fail("bad tensor".into()),
        ]);
        let config = PipelineConfig::default().skip_interval(1).detect_size(64, 48);
        let (pipeline, state, feed, _stats) = pipeline(config, "stub://x?frames=2", detector);

        let _ = pipeline.run();

        assert_eq!(state.peek().utterance(), "1 person, 1 chair");
        assert_eq!(feed.latest().unwrap().detections, 0);
    }

    #[test]
    fn test_held_overlay_on_skipped_frames() {
        let config = PipelineConfig::default().skip_interval(2).detect_size(32, 24);
        let (pipeline, _state, feed, _stats) = pipeline(
            config,
            "stub://hold?frames=3",
            ScriptedDetector::constant(person_and_chair()),
        );

        let _ = pipeline.run();

        // frame 3 skipped detection but still shows frame 2's boxes
        let frame = feed.latest().unwrap();
        assert_eq!(frame.sequence, 3);
        assert_eq!(frame.detections, 2);
    }

    #[test]
    fn test_overlay_not_held_when_disabled() {
        let config = PipelineConfig::default()
            .skip_interval(2)
            .detect_size(32, 24)
            .hold_overlay(false);
        let (pipeline, _state, feed, _stats) = pipeline(
            config,
            "stub://nohold?frames=3",
            ScriptedDetector::constant(person_and_chair()),
        );

        let _ = pipeline.run();

        assert_eq!(feed.latest().unwrap().detections, 0);
    }

    #[test]
    fn test_accumulate_policy() {
        let config = PipelineConfig::default()
            .skip_interval(1)
            .detect_size(32, 24)
            .count_policy(CountPolicy::Accumulate);
        let (pipeline, state, _feed, _stats) = pipeline(
            config,
            "stub://acc?frames=3",
            ScriptedDetector::constant(person_and_chair()),
        );

        let _ = pipeline.run();

        assert_eq!(state.peek().count_of("person"), 3);
    }

    #[test]
    fn test_shutdown_stops_loop() {
        let shutdown = ShutdownSignal::new();
        let config = PipelineConfig::default();
        let (pipeline, _state, feed, _stats) =
            pipeline(config, "stub://forever", ScriptedDetector::constant(vec![]));

        let handle = pipeline.with_shutdown(shutdown.clone()).spawn().unwrap();
        std::thread::sleep(Duration::from_millis(50));
        shutdown.trigger();

        assert!(handle.join().is_ok());
        assert!(feed.is_closed());
    }
}
