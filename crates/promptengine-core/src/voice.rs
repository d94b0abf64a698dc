//! Voice input behind a capability interface
//!
//! A recognizer is chosen once at startup. Without a configured speech
//! command the `UnsupportedRecognizer` is used and the UI shows a single
//! notice the first time voice input is requested.

use anyhow::{anyhow, Result};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::Config;

pub const UNSUPPORTED_NOTICE: &str =
    "Voice input is not available. Set \"voice_command\" in the config to enable it.";

/// Lines starting with this prefix are interim results
const PARTIAL_PREFIX: &str = "partial:";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoiceEvent {
    Partial(String),
    Final(String),
    Error(String),
    Ended,
}

pub trait SpeechRecognizer: Send {
    fn is_supported(&self) -> bool;
    fn start(&mut self, sink: mpsc::UnboundedSender<VoiceEvent>) -> Result<()>;
    fn stop(&mut self);
}

/// No speech capability in this environment
pub struct UnsupportedRecognizer;

impl SpeechRecognizer for UnsupportedRecognizer {
    fn is_supported(&self) -> bool {
        false
    }

    fn start(&mut self, _sink: mpsc::UnboundedSender<VoiceEvent>) -> Result<()> {
        Err(anyhow!(UNSUPPORTED_NOTICE))
    }

    fn stop(&mut self) {}
}

/// Runs an external speech-to-text command and reads its stdout.
///
/// Each line is a result: `partial: <text>` for interim text, anything else
/// is final. The process ending ends the listening session.
pub struct CommandRecognizer {
    command: String,
    task: Option<JoinHandle<()>>,
}

impl CommandRecognizer {
    pub fn new(command: &str) -> Self {
        Self {
            command: command.to_string(),
            task: None,
        }
    }
}

impl SpeechRecognizer for CommandRecognizer {
    fn is_supported(&self) -> bool {
        true
    }

    fn start(&mut self, sink: mpsc::UnboundedSender<VoiceEvent>) -> Result<()> {
        self.stop();

        let mut child = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| anyhow!("Failed to start voice command: {}", e))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow!("Voice command has no stdout"))?;

        self.task = Some(tokio::spawn(async move {
            // Keep the child alive for as long as we read from it
            let _child = child;
            let mut lines = BufReader::new(stdout).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if let Some(event) = parse_line(&line) {
                            if sink.send(event).is_err() {
                                return;
                            }
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        let _ = sink.send(VoiceEvent::Error(e.to_string()));
                        break;
                    }
                }
            }
            let _ = sink.send(VoiceEvent::Ended);
        }));
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for CommandRecognizer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn parse_line(line: &str) -> Option<VoiceEvent> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match line.strip_prefix(PARTIAL_PREFIX) {
        Some(rest) => Some(VoiceEvent::Partial(rest.trim().to_string())),
        None => Some(VoiceEvent::Final(line.to_string())),
    }
}

pub fn select_recognizer(config: &Config) -> Box<dyn SpeechRecognizer> {
    match config.voice_command.as_deref().map(str::trim) {
        Some(command) if !command.is_empty() => {
            tracing::info!("Voice input enabled");
            Box::new(CommandRecognizer::new(command))
        }
        _ => Box::new(UnsupportedRecognizer),
    }
}

/// Listening state for the query field
pub struct VoiceInput {
    recognizer: Box<dyn SpeechRecognizer>,
    listening: bool,
    /// Text heard so far in the current utterance
    pub interim: String,
    /// Message to show the user, if any
    pub notice: Option<String>,
    notice_shown: bool,
}

impl VoiceInput {
    pub fn new(recognizer: Box<dyn SpeechRecognizer>) -> Self {
        Self {
            recognizer,
            listening: false,
            interim: String::new(),
            notice: None,
            notice_shown: false,
        }
    }

    pub fn is_listening(&self) -> bool {
        self.listening
    }

    pub fn toggle(&mut self, sink: mpsc::UnboundedSender<VoiceEvent>) {
        if !self.recognizer.is_supported() {
            if !self.notice_shown {
                self.notice = Some(UNSUPPORTED_NOTICE.to_string());
                self.notice_shown = true;
            }
            return;
        }

        if self.listening {
            self.recognizer.stop();
            self.listening = false;
            self.interim.clear();
            return;
        }

        match self.recognizer.start(sink) {
            Ok(()) => {
                self.listening = true;
                self.notice = None;
            }
            Err(e) => {
                tracing::warn!("Voice input failed to start: {}", e);
                self.notice = Some(e.to_string());
            }
        }
    }

    /// Apply a recognizer event; final text is appended to `query`
    pub fn handle(&mut self, event: VoiceEvent, query: &mut String) {
        match event {
            VoiceEvent::Partial(text) => self.interim = text,
            VoiceEvent::Final(text) => {
                self.interim.clear();
                if !query.is_empty() && !query.ends_with(' ') {
                    query.push(' ');
                }
                query.push_str(&text);
            }
            VoiceEvent::Error(message) => {
                tracing::warn!("Voice input error: {}", message);
                self.notice = Some(message);
                self.listening = false;
                self.interim.clear();
            }
            VoiceEvent::Ended => {
                self.listening = false;
                self.interim.clear();
            }
        }
    }

    pub fn dismiss_notice(&mut self) {
        self.notice = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Recognizer that accepts start/stop without doing anything
    struct Scripted;

    impl SpeechRecognizer for Scripted {
        fn is_supported(&self) -> bool {
            true
        }
        fn start(&mut self, _sink: mpsc::UnboundedSender<VoiceEvent>) -> Result<()> {
            Ok(())
        }
        fn stop(&mut self) {}
    }

    #[test]
    fn unsupported_notice_is_shown_once() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut voice = VoiceInput::new(Box::new(UnsupportedRecognizer));

        voice.toggle(tx.clone());
        assert_eq!(voice.notice.as_deref(), Some(UNSUPPORTED_NOTICE));
        voice.dismiss_notice();

        voice.toggle(tx);
        assert_eq!(voice.notice, None);
        assert!(!voice.is_listening());
    }

    #[test]
    fn toggle_starts_and_stops() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut voice = VoiceInput::new(Box::new(Scripted));
        voice.toggle(tx.clone());
        assert!(voice.is_listening());
        voice.toggle(tx);
        assert!(!voice.is_listening());
    }

    #[test]
    fn final_text_is_appended_to_query() {
        let mut voice = VoiceInput::new(Box::new(Scripted));
        let mut query = "Write a poem".to_string();

        voice.handle(VoiceEvent::Partial("about".to_string()), &mut query);
        assert_eq!(voice.interim, "about");
        assert_eq!(query, "Write a poem");

        voice.handle(VoiceEvent::Final("about rain".to_string()), &mut query);
        assert_eq!(query, "Write a poem about rain");
        assert!(voice.interim.is_empty());
    }

    #[test]
    fn parses_partial_and_final_lines() {
        assert_eq!(
            parse_line("partial: hel"),
            Some(VoiceEvent::Partial("hel".to_string()))
        );
        assert_eq!(parse_line("hello"), Some(VoiceEvent::Final("hello".to_string())));
        assert_eq!(parse_line("   "), None);
    }

    #[test]
    fn selection_follows_config() {
        let mut config = Config::new();
        assert!(!select_recognizer(&config).is_supported());
        config.voice_command = Some("  ".to_string());
        assert!(!select_recognizer(&config).is_supported());
        config.voice_command = Some("whisper-stream".to_string());
        assert!(select_recognizer(&config).is_supported());
    }

    #[tokio::test]
    async fn command_recognizer_streams_lines() {
        let mut recognizer = CommandRecognizer::new("printf 'partial: hi\\nhi there\\n'");
        let (tx, mut rx) = mpsc::unbounded_channel();
        recognizer.start(tx).unwrap();

        assert_eq!(rx.recv().await, Some(VoiceEvent::Partial("hi".to_string())));
        assert_eq!(rx.recv().await, Some(VoiceEvent::Final("hi there".to_string())));
        assert_eq!(rx.recv().await, Some(VoiceEvent::Ended));
    }
}
