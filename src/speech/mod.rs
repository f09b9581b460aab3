//! Speech output
//!
//! One long-lived worker thread owns the `SpeechSink` and speaks queued
//! utterances one at a time. Producers hand text over with
//! [`SpeechHandle::try_submit`], which never blocks: when the bounded queue
//! is full the utterance is refused and the caller decides what to do.

mod command;
mod log;

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tokio::sync::mpsc;

use crate::error::SpeechError;
use crate::stats::SpeechStats;

pub use command::CommandSink;
pub use log::LogSink;

/// Something that can say a line of text
///
/// `speak` may block for as long as the utterance takes; it is only ever
/// called from the speech worker thread.
pub trait SpeechSink: Send {
    fn name(&self) -> &'static str;

    fn speak(&mut self, text: &str) -> Result<(), SpeechError>;
}

/// Which sink to build
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkKind {
    /// Run an external program per utterance
    Command { program: String, args: Vec<String> },
    /// Write `TTS: <text>` to the log
    Log,
}

/// Speech worker configuration
#[derive(Debug, Clone)]
pub struct SpeechConfig {
    /// Utterances that may wait while one is being spoken
    pub queue_capacity: usize,
    /// Speaking rate in words per minute, passed to the command sink
    pub rate: u32,
    pub sink: SinkKind,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 2,
            rate: 150,
            sink: SinkKind::Command {
                program: "espeak".to_string(),
                args: Vec::new(),
            },
        }
    }
}

impl SpeechConfig {
    /// Set the queue capacity (at least 1)
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    /// Set the speaking rate
    pub fn rate(mut self, rate: u32) -> Self {
        self.rate = rate;
        self
    }

    /// Use an external program
    pub fn command(mut self, program: impl Into<String>, args: Vec<String>) -> Self {
        self.sink = SinkKind::Command {
            program: program.into(),
            args,
        };
        self
    }

    /// Log utterances instead of speaking them
    pub fn log_only(mut self) -> Self {
        self.sink = SinkKind::Log;
        self
    }

    /// Build the configured sink
    pub fn build_sink(&self) -> Box<dyn SpeechSink> {
        match &self.sink {
            SinkKind::Command { program, args } => {
                Box::new(CommandSink::new(program.clone(), args.clone(), self.rate))
            }
            SinkKind::Log => Box::new(LogSink::new()),
        }
    }
}

/// Sending side of the speech queue
#[derive(Debug, Clone)]
pub struct SpeechHandle {
    tx: mpsc::Sender<String>,
}

impl SpeechHandle {
    /// Queue an utterance without waiting
    pub fn try_submit(&self, text: String) -> Result<(), SpeechError> {
        self.tx.try_send(text).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SpeechError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => SpeechError::WorkerGone,
        })
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// The worker thread; exits once every `SpeechHandle` is dropped
#[derive(Debug)]
pub struct SpeechWorker {
    thread: JoinHandle<()>,
}

impl SpeechWorker {
    /// Start the worker thread with the given sink
    pub fn spawn(
        mut sink: Box<dyn SpeechSink>,
        capacity: usize,
        stats: Arc<crate::stats::Stats>,
    ) -> std::io::Result<(SpeechHandle, SpeechWorker)> {
        let (tx, mut rx) = mpsc::channel::<String>(capacity.max(1));

        let thread = thread::Builder::new()
            .name("speech".to_string())
            .spawn(move || {
                tracing::debug!(sink = sink.name(), "Speech worker started");
                while let Some(text) = rx.blocking_recv() {
                    speak_one(sink.as_mut(), &text, &stats.speech);
                }
                tracing::debug!("Speech worker stopped");
            })?;

        Ok((SpeechHandle { tx }, SpeechWorker { thread }))
    }

    /// Wait for the worker to finish the queue and exit
    pub fn join(self) {
        if self.thread.join().is_err() {
            tracing::error!("Speech worker panicked");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }
}

fn speak_one(sink: &mut dyn SpeechSink, text: &str, stats: &SpeechStats) {
    match sink.speak(text) {
        Ok(()) => {
            stats.record_spoken();
            tracing::debug!(text, "Spoke");
        }
        Err(e) => {
            stats.record_failed();
            tracing::warn!(sink = sink.name(), error = %e, "Speech failed");
        }
    }
}


#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::testing::RecordingSink;
    use super::*;
    use crate::stats::Stats;

    #[test]
    fn test_worker_speaks_in_order() {
        let sink = RecordingSink::default();
        let stats = Arc::new(Stats::new());
        let (handle, worker) = SpeechWorker::spawn(Box::new(sink.clone()), 4, stats.clone()).unwrap();

        handle.try_submit("1 person".into()).unwrap();
        handle.try_submit("2 cup".into()).unwrap();
        drop(handle);
        worker.join();

        assert_eq!(sink.utterances(), vec!["1 person", "2 cup"]);
        assert_eq!(stats.speech.snapshot().spoken, 2);
    }

    #[test]
    fn test_full_queue_refuses() {
        let sink = RecordingSink {
            delay: Duration::from_millis(200),
            ..Default::default()
        };
        let stats = Arc::new(Stats::new());
        let (handle, worker) = SpeechWorker::spawn(Box::new(sink.clone()), 1, stats).unwrap();

        let results: Vec<_> = (0..5).map(|n| handle.try_submit(format!("{}", n))).collect();
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(SpeechError::QueueFull))));

        drop(handle);
        worker.join();
        assert!(sink.utterances().len() < 5);
    }

    #[test]
    fn test_failures_do_not_stop_worker() {
        let sink = RecordingSink {
            fail: true,
            ..Default::default()
        };
        let stats = Arc::new(Stats::new());
        let (handle, worker) = SpeechWorker::spawn(Box::new(sink), 4, stats.clone()).unwrap();

        handle.try_submit("a".into()).unwrap();
        handle.try_submit("b".into()).unwrap();
        drop(handle);
        worker.join();

        assert_eq!(stats.speech.snapshot().failed, 2);
    }

    #[test]
    fn test_submit_after_worker_gone() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let handle = SpeechHandle { tx };

        assert!(handle.is_closed());
        assert!(matches!(
            handle.try_submit("late".into()),
            Err(SpeechError::WorkerGone)
        ));
    }

    #[test]
    fn test_config_builders() {
        let config = SpeechConfig::default();
        assert_eq!(config.rate, 150);
        assert_eq!(
            config.sink,
            SinkKind::Command {
                program: "espeak".into(),
                args: vec![]
            }
        );

        let config = SpeechConfig::default().queue_capacity(0).log_only();
        assert_eq!(config.queue_capacity, 1);
        assert_eq!(config.build_sink().name(), "log");
        assert_eq!(
            SpeechConfig::default().command("say", vec![]).build_sink().name(),
            "command"
        );
    }
}
