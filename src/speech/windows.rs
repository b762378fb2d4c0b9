//! Windows speech recognition using the native Windows.Media.SpeechRecognition API.
//!
//! One handle holds one compiled recognizer; each turn runs a single-shot
//! recognition on a background thread. The platform's initial-silence
//! timeout is set to the configured turn timeout, so a silent turn comes
//! back as the timeout error rather than hanging.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Result};
use windows::core::HSTRING;
use windows::Foundation::TimeSpan;
use windows::Globalization::Language;
use windows::Media::SpeechRecognition::{
    SpeechRecognitionConfidence, SpeechRecognitionResult, SpeechRecognitionResultStatus,
    SpeechRecognizer as WinSpeechRecognizer,
};

use super::{EngineConfig, EngineError, EngineEvents, SpeechEngine};

pub struct EngineImpl {
    recognizer: WinSpeechRecognizer,
    events: EngineEvents,
    /// Stamp of the live turn; zeroed on delivery or cancellation.
    turn: Arc<AtomicU64>,
    next_turn: u64,
}

impl EngineImpl {
    pub fn new(config: &EngineConfig, events: EngineEvents) -> Result<Self> {
        let language = Language::CreateLanguage(&HSTRING::from("en-US"))
            .map_err(|err| anyhow!("failed to create language: {err}"))?;
        let recognizer = WinSpeechRecognizer::Create(&language)
            .map_err(|err| anyhow!("failed to create speech recognizer: {err}"))?;

        // Bound the silent-turn wait; it surfaces as the timeout error below.
        let timeouts = recognizer
            .Timeouts()
            .map_err(|err| anyhow!("failed to read recognizer timeouts: {err}"))?;
        timeouts
            .SetInitialSilenceTimeout(to_timespan(config.turn_timeout))
            .map_err(|err| anyhow!("failed to set silence timeout: {err}"))?;

        // Compile the default dictation grammar before the first turn
        let compile_op = recognizer
            .CompileConstraintsAsync()
            .map_err(|err| anyhow!("failed to compile constraints: {err}"))?;
        compile_op
            .get()
            .map_err(|err| anyhow!("failed to compile grammar: {err}"))?;

        Ok(Self {
            recognizer,
            events,
            turn: Arc::new(AtomicU64::new(0)),
            next_turn: 0,
        })
    }
}

impl SpeechEngine for EngineImpl {
    fn begin_listening(&mut self) -> Result<()> {
        self.next_turn += 1;
        let id = self.next_turn;
        self.turn.store(id, Ordering::SeqCst);

        let recognizer = self.recognizer.clone();
        let events = self.events.clone();
        let turn = Arc::clone(&self.turn);

        thread::spawn(move || {
            let operation = match recognizer.RecognizeAsync() {
                Ok(operation) => operation,
                Err(err) => {
                    log::warn!("recognition could not start: {err}");
                    if turn
                        .compare_exchange(id, 0, Ordering::SeqCst, Ordering::SeqCst)
                        .is_ok()
                    {
                        events.error(EngineError::RecognizerBusy);
                    }
                    return;
                }
            };

            if turn.load(Ordering::SeqCst) == id {
                events.ready();
            }

            let result = match operation.get() {
                Ok(result) => result,
                Err(err) => {
                    log::warn!("recognition failed: {err}");
                    if turn
                        .compare_exchange(id, 0, Ordering::SeqCst, Ordering::SeqCst)
                        .is_ok()
                    {
                        events.error(EngineError::AudioUnavailable);
                    }
                    return;
                }
            };

            let outcome = interpret(&result);
            if turn
                .compare_exchange(id, 0, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                match outcome {
                    Ok(text) => events.result(text),
                    Err(error) => events.error(error),
                }
            }
        });

        Ok(())
    }

    fn cancel(&mut self) {
        // Suppress delivery; the in-flight platform operation is left to
        // finish on its own and its outcome is discarded.
        self.turn.store(0, Ordering::SeqCst);
    }
}

impl Drop for EngineImpl {
    fn drop(&mut self) {
        self.turn.store(0, Ordering::SeqCst);
    }
}

fn interpret(result: &SpeechRecognitionResult) -> std::result::Result<String, EngineError> {
    let status = result
        .Status()
        .unwrap_or(SpeechRecognitionResultStatus::Unknown);
    if status == SpeechRecognitionResultStatus::TimeoutExceeded {
        return Err(EngineError::SpeechTimeout);
    }
    if status == SpeechRecognitionResultStatus::MicrophoneUnavailable {
        return Err(EngineError::AudioUnavailable);
    }
    if status != SpeechRecognitionResultStatus::Success {
        return Err(EngineError::Other(status.0));
    }
    if matches!(
        result.Confidence(),
        Ok(SpeechRecognitionConfidence::Rejected)
    ) {
        return Err(EngineError::NoMatch);
    }

    let text = result
        .Text()
        .map(|text| text.to_string())
        .unwrap_or_default();
    Ok(text)
}

fn to_timespan(duration: Duration) -> TimeSpan {
    // TimeSpan counts 100 ns ticks
    TimeSpan {
        Duration: (duration.as_nanos() / 100) as i64,
    }
}
