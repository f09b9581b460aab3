//! Periodic spoken summary
//!
//! Every `period` the announcer drains the detection state and, if anything
//! was seen, hands one line such as `"2 person, 1 chair"` to the speech
//! worker. The first announcement comes one full period after start. Ticks
//! missed while the runtime was busy are delayed rather than replayed, so
//! there is never more than one utterance per period.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{self, Instant, MissedTickBehavior};

use crate::error::SpeechError;
use crate::speech::SpeechHandle;
use crate::state::DetectionState;
use crate::stats::Stats;

/// Announcer options
#[derive(Debug, Clone)]
pub struct AnnouncerConfig {
    /// Time between announcements
    pub period: Duration,
}

impl Default for AnnouncerConfig {
    fn default() -> Self {
        Self {
            period: Duration::from_secs(3),
        }
    }
}

impl AnnouncerConfig {
    /// Set the period (at least 1ms)
    pub fn period(mut self, period: Duration) -> Self {
        self.period = period.max(Duration::from_millis(1));
        self
    }
}

/// What a single tick did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing was visible
    Silent,
    /// The utterance was queued for speech
    Submitted(String),
    /// The speech queue refused the utterance
    Dropped(String),
}

/// Drains the detection state on a fixed period and feeds the speech worker
pub struct Announcer {
    config: AnnouncerConfig,
    state: Arc<DetectionState>,
    speech: SpeechHandle,
    stats: Arc<Stats>,
}

impl Announcer {
    pub fn new(config: AnnouncerConfig, state: Arc<DetectionState>, speech: SpeechHandle) -> Self {
        Self {
            config,
            state,
            speech,
            stats: Arc::new(Stats::new()),
        }
    }

    /// Count into these stats instead of private ones
    pub fn with_stats(mut self, stats: Arc<Stats>) -> Self {
        self.stats = stats;
        self
    }

    /// Drain once and hand the result to speech
    pub fn tick(&self) -> TickOutcome {
        let snapshot = self.state.drain();
        if snapshot.is_empty() {
            return TickOutcome::Silent;
        }

        let text = snapshot.utterance();
        match self.speech.try_submit(text.clone()) {
            Ok(()) => {
                self.stats.speech.record_submitted();
                tracing::debug!(text = %text, "Announcement queued");
                TickOutcome::Submitted(text)
            }
            Err(SpeechError::QueueFull) => {
                self.stats.speech.record_dropped();
                tracing::warn!(text = %text, "Speech queue full, dropping announcement");
                TickOutcome::Dropped(text)
            }
            Err(e) => {
                self.stats.speech.record_dropped();
                tracing::warn!(error = %e, "Announcement not delivered");
                TickOutcome::Dropped(text)
            }
        }
    }

    /// Tick every period until `shutdown` resolves
    pub async fn run_until<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let period = self.config.period;
        let mut interval = time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(period_ms = period.as_millis() as u64, "Announcer started");

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = interval.tick() => {
                    self.tick();
                }
            }
        }

        tracing::info!("Announcer stopped");
    }
}
