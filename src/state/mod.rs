//! Shared "currently visible" detection counts
//!
//! `DetectionState` is the only state shared between the frame pipeline
//! (writer) and the announcer (drainer). Every operation takes the lock in a
//! single scope and copies data out before releasing it, so no caller ever
//! holds a reference into the map.
//!
//! ```text
//!   FramePipeline ──record()──►┌──────────────────────┐
//!                              │ Mutex<LabelCounts>   │
//!   Announcer ─────drain()────►│  label → (count, seq)│
//!                              └──────────────────────┘
//! ```

mod snapshot;

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Deserialize;

pub use snapshot::{LabelCount, Snapshot};

/// How a processed frame's detections are folded into the state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CountPolicy {
    /// The latest processed frame replaces whatever was there
    #[default]
    Replace,
    /// Counts add up across frames until the next drain
    Accumulate,
}

#[derive(Debug, Default)]
struct LabelCounts {
    counts: HashMap<String, Tally>,
    next_seq: u64,
}

#[derive(Debug, Clone, Copy)]
struct Tally {
    count: u32,
    /// First-seen order since the last clear, used for tie breaking
    seq: u64,
}

impl LabelCounts {
    fn add(&mut self, label: &str) {
        if let Some(tally) = self.counts.get_mut(label) {
            tally.count = tally.count.saturating_add(1);
            return;
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.counts.insert(label.to_string(), Tally { count: 1, seq });
    }

    fn clear(&mut self) {
        self.counts.clear();
        self.next_seq = 0;
    }

    fn snapshot(&self) -> Snapshot {
        let mut entries: Vec<(u64, LabelCount)> = self
            .counts
            .iter()
            .map(|(label, tally)| {
                (
                    tally.seq,
                    LabelCount {
                        label: label.clone(),
                        count: tally.count,
                    },
                )
            })
            .collect();
        entries.sort_by(|(seq_a, a), (seq_b, b)| b.count.cmp(&a.count).then(seq_a.cmp(seq_b)));
        Snapshot::new(entries.into_iter().map(|(_, entry)| entry).collect())
    }
}

/// Label → count map behind a single mutex
#[derive(Debug, Default)]
pub struct DetectionState {
    inner: Mutex<LabelCounts>,
}

impl DetectionState {
    /// Create an empty state
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, LabelCounts> {
        // A panic elsewhere while holding the lock leaves the map consistent
        // (every mutation is a single insert or clear), so keep going.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fold one processed frame's labels into the state
    pub fn record<'a, I>(&self, labels: I, policy: CountPolicy)
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut counts = self.lock();
        if policy == CountPolicy::Replace {
            counts.clear();
        }
        for label in labels {
            counts.add(label);
        }
    }

    /// Add a single sighting of `label`
    pub fn increment(&self, label: &str) {
        self.lock().add(label);
    }

    /// Read and clear in one critical section
    pub fn drain(&self) -> Snapshot {
        let mut counts = self.lock();
        let snapshot = counts.snapshot();
        counts.clear();
        snapshot
    }

    /// Copy of the current counts without clearing
    pub fn peek(&self) -> Snapshot {
        self.lock().snapshot()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().counts.is_empty()
    }
}
