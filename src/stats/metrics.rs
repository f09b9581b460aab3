//! Counters for the pipeline, announcer, speech worker and HTTP server
//!
//! All counters are relaxed atomics: they are written from the pipeline
//! thread, the speech thread and many client tasks, and only ever read for
//! reporting.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use serde::Serialize;

/// Frame pipeline counters
#[derive(Debug)]
pub struct PipelineStats {
    started_at: Instant,
    /// Frames read from the source
    captured: AtomicU64,
    /// Frames that went through the detector successfully
    processed: AtomicU64,
    /// Frames encoded and published
    published: AtomicU64,
    /// Detector failures
    detection_errors: AtomicU64,
    /// JPEG encode failures
    encode_errors: AtomicU64,
}

impl PipelineStats {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            captured: AtomicU64::new(0),
            processed: AtomicU64::new(0),
            published: AtomicU64::new(0),
            detection_errors: AtomicU64::new(0),
            encode_errors: AtomicU64::new(0),
        }
    }

    pub fn record_captured(&self) {
        self.captured.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_processed(&self) {
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_published(&self) {
        self.published.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_detection_error(&self) {
        self.detection_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_encode_error(&self) {
        self.encode_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Time since the counters were created
    pub fn duration(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Average capture rate since start
    pub fn calculated_framerate(&self) -> f64 {
        framerate(self.captured.load(Ordering::Relaxed), self.duration())
    }

    pub fn snapshot(&self) -> PipelineSnapshot {
        PipelineSnapshot {
            captured: self.captured.load(Ordering::Relaxed),
            processed: self.processed.load(Ordering::Relaxed),
            published: self.published.load(Ordering::Relaxed),
            detection_errors: self.detection_errors.load(Ordering::Relaxed),
            encode_errors: self.encode_errors.load(Ordering::Relaxed),
            capture_fps: self.calculated_framerate(),
        }
    }
}

impl Default for PipelineStats {
    fn default() -> Self {
        Self::new()
    }
}

fn framerate(frames: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        frames as f64 / secs
    } else {
        0.0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PipelineSnapshot {
    pub captured: u64,
    pub processed: u64,
    pub published: u64,
    pub detection_errors: u64,
    pub encode_errors: u64,
    pub capture_fps: f64,
}

/// Announcer and speech worker counters
#[derive(Debug, Default)]
pub struct SpeechStats {
    /// Utterances accepted by the speech queue
    submitted: AtomicU64,
    /// Utterances dropped because the queue was full or the worker had stopped
    dropped: AtomicU64,
    /// Utterances the sink finished speaking
    spoken: AtomicU64,
    /// Sink failures
    failed: AtomicU64,
}

impl SpeechStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_submitted(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_spoken(&self) {
        self.spoken.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> SpeechSnapshot {
        SpeechSnapshot {
            submitted: self.submitted.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            spoken: self.spoken.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SpeechSnapshot {
    pub submitted: u64,
    pub dropped: u64,
    pub spoken: u64,
    pub failed: u64,
}

/// HTTP server counters
#[derive(Debug, Default)]
pub struct ServerStats {
    /// Total requests received
    total_requests: AtomicU64,
    /// Requests turned away by the connection limit
    rejected_requests: AtomicU64,
    /// Requests whose handler is still running
    active_requests: AtomicU64,
    /// Current MJPEG streams
    active_streams: AtomicU64,
    /// Multipart parts written across all clients
    frames_sent: AtomicU64,
    /// Bytes written across all clients
    bytes_sent: AtomicU64,
}

impl ServerStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a new request; it stays active until the guard is dropped
    pub fn request_started(&self) -> ActiveGuard<'_> {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        ActiveGuard::new(&self.active_requests)
    }

    pub fn record_rejected(&self) {
        self.rejected_requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a new stream; it stays active until the guard is dropped
    pub fn stream_opened(&self) -> ActiveGuard<'_> {
        ActiveGuard::new(&self.active_streams)
    }

    pub fn record_frame_sent(&self, bytes: usize) {
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ServerSnapshot {
        ServerSnapshot {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            rejected_requests: self.rejected_requests.load(Ordering::Relaxed),
            active_requests: self.active_requests.load(Ordering::Relaxed),
            active_streams: self.active_streams.load(Ordering::Relaxed),
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ServerSnapshot {
    pub total_requests: u64,
    pub rejected_requests: u64,
    pub active_requests: u64,
    pub active_streams: u64,
    pub frames_sent: u64,
    pub bytes_sent: u64,
}

/// Decrements a gauge when dropped
#[derive(Debug)]
pub struct ActiveGuard<'a> {
    gauge: &'a AtomicU64,
}

impl<'a> ActiveGuard<'a> {
    fn new(gauge: &'a AtomicU64) -> Self {
        gauge.fetch_add(1, Ordering::Relaxed);
        Self { gauge }
    }
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.gauge.fetch_sub(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_stats_new() {
        let stats = PipelineStats::new();
        let snapshot = stats.snapshot();

        assert_eq!(snapshot.captured, 0);
        assert_eq!(snapshot.processed, 0);
        assert_eq!(snapshot.published, 0);
        assert_eq!(snapshot.detection_errors, 0);
        assert_eq!(snapshot.encode_errors, 0);
    }

    #[test]
    fn test_pipeline_stats_counts() {
        let stats = PipelineStats::new();
        for _ in 0..4 {
            stats.record_captured();
            stats.record_published();
        }
        stats.record_processed();
        stats.record_detection_error();
        stats.record_encode_error();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.captured, 4);
        assert_eq!(snapshot.published, 4);
        assert_eq!(snapshot.processed, 1);
        assert_eq!(snapshot.detection_errors, 1);
        assert_eq!(snapshot.encode_errors, 1);
        assert!(snapshot.capture_fps >= 0.0);
    }

    #[test]
    fn test_framerate_zero_duration() {
        assert_eq!(framerate(100, Duration::ZERO), 0.0);
        assert_eq!(framerate(300, Duration::from_secs(10)), 30.0);
    }

    #[test]
    fn test_speech_stats() {
        let stats = SpeechStats::new();
        stats.record_submitted();
        stats.record_submitted();
        stats.record_dropped();
        stats.record_spoken();
        stats.record_failed();

        assert_eq!(
            stats.snapshot(),
            SpeechSnapshot {
                submitted: 2,
                dropped: 1,
                spoken: 1,
                failed: 1,
            }
        );
    }

    #[test]
    fn test_server_stats_guards() {
        let stats = ServerStats::new();

        let request = stats.request_started();
        let stream = stats.stream_opened();
        stats.record_frame_sent(1000);
        stats.record_frame_sent(500);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.total_requests, 1);
        assert_eq!(snapshot.active_requests, 1);
        assert_eq!(snapshot.active_streams, 1);
        assert_eq!(snapshot.frames_sent, 2);
        assert_eq!(snapshot.bytes_sent, 1500);

        drop(stream);
        drop(request);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.total_requests, 1);
        assert_eq!(snapshot.active_requests, 0);
        assert_eq!(snapshot.active_streams, 0);
    }

    #[test]
    fn test_server_stats_rejected() {
        let stats = ServerStats::new();
        stats.record_rejected();

        assert_eq!(stats.snapshot().rejected_requests, 1);
        assert_eq!(stats.snapshot().total_requests, 0);
    }
}
