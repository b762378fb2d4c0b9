//! Speech recognition boundary with platform-specific backends.
//!
//! - macOS: native Speech framework via objc2-speech
//! - Windows: native Windows.Media.SpeechRecognition API
//! - Linux: Vosk offline speech recognition (behind the `vosk` feature)
//! - Everywhere else: scripted mock for development
//!
//! Backends are turn-based: `begin_listening` arms one recognition turn that
//! ends with exactly one `Result` or `Error` event, unless the turn is
//! cancelled first. Partial hypotheses and end-of-speech markers are backend
//! internals and never surface here; a result or error always follows them.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

/// Recognizer error taxonomy, with the classic integer codes preserved for
/// diagnostics: 3 audio, 6 speech timeout, 7 no match, 8 recognizer busy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineError {
    AudioUnavailable,
    SpeechTimeout,
    NoMatch,
    RecognizerBusy,
    Other(i32),
}

impl EngineError {
    pub fn code(self) -> i32 {
        match self {
            EngineError::AudioUnavailable => 3,
            EngineError::SpeechTimeout => 6,
            EngineError::NoMatch => 7,
            EngineError::RecognizerBusy => 8,
            EngineError::Other(code) => code,
        }
    }

    pub fn from_code(code: i32) -> Self {
        match code {
            3 => EngineError::AudioUnavailable,
            6 => EngineError::SpeechTimeout,
            7 => EngineError::NoMatch,
            8 => EngineError::RecognizerBusy,
            other => EngineError::Other(other),
        }
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::AudioUnavailable => write!(f, "audio unavailable (3)"),
            EngineError::SpeechTimeout => write!(f, "speech timeout (6)"),
            EngineError::NoMatch => write!(f, "no match (7)"),
            EngineError::RecognizerBusy => write!(f, "recognizer busy (8)"),
            EngineError::Other(code) => write!(f, "engine error ({code})"),
        }
    }
}

/// Typed event produced by a backend for the current recognition turn.
#[derive(Debug, Clone, PartialEq)]
pub enum RecognitionEvent {
    /// The backend is capturing audio for this turn.
    Ready,
    /// The turn completed with the best transcript, verbatim from the
    /// backend. May be empty when the backend produced no usable candidate.
    Result(String),
    /// The turn ended without a transcript.
    Error(EngineError),
}

/// Push handle a backend uses to deliver events for its current turn.
#[derive(Clone)]
pub struct EngineEvents {
    deliver: Arc<dyn Fn(RecognitionEvent) + Send + Sync>,
}

impl EngineEvents {
    pub fn new(deliver: impl Fn(RecognitionEvent) + Send + Sync + 'static) -> Self {
        Self {
            deliver: Arc::new(deliver),
        }
    }

    pub fn ready(&self) {
        (self.deliver)(RecognitionEvent::Ready);
    }

    pub fn result(&self, transcript: String) {
        (self.deliver)(RecognitionEvent::Result(transcript));
    }

    pub fn error(&self, error: EngineError) {
        (self.deliver)(RecognitionEvent::Error(error));
    }
}

/// One live connection to the host speech recognizer.
///
/// The handle is created once per listening session and reused across turn
/// restarts; dropping it releases the recognizer.
pub trait SpeechEngine: Send {
    /// Arms one recognition turn. Non-blocking; the turn concludes through
    /// the `EngineEvents` handle the engine was created with.
    fn begin_listening(&mut self) -> Result<()>;

    /// Abandons the current turn. No further events are delivered for it.
    fn cancel(&mut self);
}

/// Creates a fresh engine handle bound to an event channel.
pub type EngineFactory = Box<dyn FnMut(EngineEvents) -> Result<Box<dyn SpeechEngine>> + Send>;

/// Backend tuning shared by all platforms.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Speech model location override, for backends that load one.
    pub model_path: Option<PathBuf>,
    /// Silence window after which a turn ends in `SpeechTimeout`.
    pub turn_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            model_path: None,
            turn_timeout: Duration::from_secs(6),
        }
    }
}

#[cfg(target_os = "macos")]
mod macos;

#[cfg(target_os = "windows")]
mod windows;

#[cfg(all(target_os = "linux", feature = "vosk"))]
mod linux;

#[cfg(not(any(
    target_os = "macos",
    target_os = "windows",
    all(target_os = "linux", feature = "vosk")
)))]
mod mock;

// Re-export the appropriate implementation as NativeEngine
#[cfg(target_os = "macos")]
pub use macos::EngineImpl as NativeEngine;

#[cfg(target_os = "windows")]
pub use windows::EngineImpl as NativeEngine;

#[cfg(all(target_os = "linux", feature = "vosk"))]
pub use linux::EngineImpl as NativeEngine;

#[cfg(not(any(
    target_os = "macos",
    target_os = "windows",
    all(target_os = "linux", feature = "vosk")
)))]
pub use mock::EngineImpl as NativeEngine;

/// Factory producing the platform backend for this build.
pub fn native_factory(config: EngineConfig) -> EngineFactory {
    Box::new(move |events| {
        let engine = NativeEngine::new(&config, events)?;
        Ok(Box::new(engine) as Box<dyn SpeechEngine>)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_round_trip() {
        for error in [
            EngineError::AudioUnavailable,
            EngineError::SpeechTimeout,
            EngineError::NoMatch,
            EngineError::RecognizerBusy,
            EngineError::Other(11),
        ] {
            assert_eq!(EngineError::from_code(error.code()), error);
        }
    }

    #[test]
    fn timeout_is_the_classic_code_six() {
        assert_eq!(EngineError::SpeechTimeout.code(), 6);
        assert_eq!(EngineError::from_code(6), EngineError::SpeechTimeout);
        assert_eq!(EngineError::NoMatch.code(), 7);
    }
}
