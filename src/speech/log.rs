use super::SpeechSink;
use crate::error::SpeechError;

/// Writes utterances to the log instead of an audio device
#[derive(Debug, Clone, Default)]
pub struct LogSink;

impl LogSink {
    pub fn new() -> Self {
        Self
    }
}

impl SpeechSink for LogSink {
    fn name(&self) -> &'static str {
        "log"
    }

    fn speak(&mut self, text: &str) -> Result<(), SpeechError> {
        tracing::info!("TTS: {}", text);
        Ok(())
    }
}
