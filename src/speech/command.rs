//! External text-to-speech program

use std::process::{Command, Stdio};

use super::SpeechSink;
use crate::error::SpeechError;

/// Runs `<program> [args...] -s <rate> <text>` and waits for it
///
/// With the default `espeak` this speaks through the system audio device.
#[derive(Debug, Clone)]
pub struct CommandSink {
    program: String,
    args: Vec<String>,
    rate: u32,
}

impl CommandSink {
    pub fn new(program: impl Into<String>, args: Vec<String>, rate: u32) -> Self {
        Self {
            program: program.into(),
            args,
            rate,
        }
    }

    fn command(&self, text: &str) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .arg("-s")
            .arg(self.rate.to_string())
            .arg(text)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        command
    }
}

impl SpeechSink for CommandSink {
    fn name(&self) -> &'static str {
        "command"
    }

    fn speak(&mut self, text: &str) -> Result<(), SpeechError> {
        let output = self.command(text).output().map_err(SpeechError::Spawn)?;

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(SpeechError::Failed(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_line() {
        let sink = CommandSink::new("espeak", vec!["-v".into(), "en".into()], 150);
        let command = sink.command("1 person, 1 chair");

        assert_eq!(command.get_program(), "espeak");
        let args: Vec<_> = command.get_args().map(|a| a.to_string_lossy()).collect();
        assert_eq!(args, vec!["-v", "en", "-s", "150", "1 person, 1 chair"]);
    }

    #[test]
    fn test_missing_program() {
        let mut sink = CommandSink::new("/nonexistent/tts-program", vec![], 150);
        assert!(matches!(sink.speak("hello"), Err(SpeechError::Spawn(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_program_failure() {
        let mut sink = CommandSink::new("false", vec![], 150);
        assert!(matches!(sink.speak("hello"), Err(SpeechError::Failed(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_program_success() {
        let mut sink = CommandSink::new("true", vec![], 150);
        assert!(sink.speak("hello").is_ok());
    }
}
