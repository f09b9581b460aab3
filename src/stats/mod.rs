//! Runtime statistics exposed on `/stats`

pub mod metrics;

use std::time::Instant;

use serde::Serialize;

use crate::state::Snapshot;

pub use metrics::{
    ActiveGuard, PipelineSnapshot, PipelineStats, ServerSnapshot, ServerStats, SpeechSnapshot,
    SpeechStats,
};

/// All counters of one running service
#[derive(Debug)]
pub struct Stats {
    started_at: Instant,
    pub pipeline: PipelineStats,
    pub speech: SpeechStats,
    pub server: ServerStats,
}

impl Stats {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            pipeline: PipelineStats::new(),
            speech: SpeechStats::new(),
            server: ServerStats::new(),
        }
    }

    /// Point-in-time copy, with the current (undrained) detection counts
    pub fn snapshot(&self, visible: Snapshot) -> StatsSnapshot {
        StatsSnapshot {
            uptime_secs: self.started_at.elapsed().as_secs(),
            pipeline: self.pipeline.snapshot(),
            speech: self.speech.snapshot(),
            server: self.server.snapshot(),
            visible,
        }
    }
}

impl Default for Stats {
    fn default() -> Self {
        Self::new()
    }
}

/// JSON body of `/stats`
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub uptime_secs: u64,
    pub pipeline: PipelineSnapshot,
    pub speech: SpeechSnapshot,
    pub server: ServerSnapshot,
    pub visible: Snapshot,
}
