//! macOS speech recognition using the native Speech framework.
//!
//! The recognizer and audio engine are created once per handle; each turn
//! installs a fresh recognition request and input tap. Only the final
//! transcript of a turn is delivered; partial hypotheses are disabled at
//! the request level. Speech-recognition authorization is assumed to have
//! been granted out of band.

use std::ptr::NonNull;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Result};
use block2::RcBlock;
use objc2::rc::Retained;
use objc2::AllocAnyThread;
use objc2_avf_audio::{AVAudioEngine, AVAudioPCMBuffer, AVAudioTime};
use objc2_foundation::{NSError, NSLocale, NSOperationQueue};
use objc2_speech::{
    SFSpeechAudioBufferRecognitionRequest, SFSpeechRecognitionResult, SFSpeechRecognitionTask,
    SFSpeechRecognizer,
};

use super::{EngineConfig, EngineError, EngineEvents, SpeechEngine};

pub struct EngineImpl {
    recognizer: Retained<SFSpeechRecognizer>,
    audio_engine: Retained<AVAudioEngine>,
    request: Option<Retained<SFSpeechAudioBufferRecognitionRequest>>,
    task: Option<Retained<SFSpeechRecognitionTask>>,
    events: EngineEvents,
    /// Stamp of the live turn; zeroed on delivery or cancellation so each
    /// turn produces at most one event.
    turn: Arc<AtomicU64>,
    next_turn: u64,
    turn_timeout: Duration,
    // Keep blocks alive for the duration of the turn
    _tap_block: Option<RcBlock<dyn Fn(NonNull<AVAudioPCMBuffer>, NonNull<AVAudioTime>)>>,
    _handler: Option<RcBlock<dyn Fn(*mut SFSpeechRecognitionResult, *mut NSError)>>,
}

// The handle never leaves the session thread that created it; Send is
// required so it can live inside the session actor.
unsafe impl Send for EngineImpl {}

impl EngineImpl {
    pub fn new(config: &EngineConfig, events: EngineEvents) -> Result<Self> {
        // Create speech recognizer with the current locale
        let recognizer = unsafe {
            let locale = NSLocale::currentLocale();
            SFSpeechRecognizer::initWithLocale(SFSpeechRecognizer::alloc(), &locale)
        }
        .ok_or_else(|| anyhow!("failed to create speech recognizer"))?;

        let available = unsafe { recognizer.isAvailable() };
        if !available {
            return Err(anyhow!(
                "speech recognition is not available; check system permissions"
            ));
        }

        // Callbacks need their own queue: this process has no main run loop.
        let queue = NSOperationQueue::new();
        unsafe {
            recognizer.setQueue(&queue);
        }

        let audio_engine = unsafe { AVAudioEngine::new() };

        Ok(Self {
            recognizer,
            audio_engine,
            request: None,
            task: None,
            events,
            turn: Arc::new(AtomicU64::new(0)),
            next_turn: 0,
            turn_timeout: config.turn_timeout,
            _tap_block: None,
            _handler: None,
        })
    }

    /// Stops capture and drops the per-turn request/task state.
    fn teardown_turn(&mut self) {
        unsafe {
            self.audio_engine.stop();
            let input_node = self.audio_engine.inputNode();
            input_node.removeTapOnBus(0);
        }

        if let Some(request) = self.request.take() {
            unsafe {
                request.endAudio();
            }
        }
        if let Some(task) = self.task.take() {
            unsafe {
                task.cancel();
            }
        }
        self._tap_block = None;
        self._handler = None;
    }
}

impl SpeechEngine for EngineImpl {
    fn begin_listening(&mut self) -> Result<()> {
        self.teardown_turn();

        self.next_turn += 1;
        let id = self.next_turn;
        self.turn.store(id, Ordering::SeqCst);

        let request = unsafe { SFSpeechAudioBufferRecognitionRequest::new() };
        unsafe {
            // Only the final transcript matters here.
            request.setShouldReportPartialResults(false);
        }

        let input_node = unsafe { self.audio_engine.inputNode() };
        let format = unsafe { input_node.outputFormatForBus(0) };

        let events = self.events.clone();
        let turn = Arc::clone(&self.turn);
        let handler = RcBlock::new(
            move |result: *mut SFSpeechRecognitionResult, error: *mut NSError| {
                if !error.is_null() {
                    let code = unsafe { (*error).code() } as i32;
                    if turn
                        .compare_exchange(id, 0, Ordering::SeqCst, Ordering::SeqCst)
                        .is_ok()
                    {
                        events.error(map_recognition_error(code));
                    }
                    return;
                }

                if result.is_null() {
                    return;
                }
                let result = unsafe { &*result };
                if !unsafe { result.isFinal() } {
                    return;
                }

                let text = unsafe { result.bestTranscription().formattedString() }.to_string();
                if turn
                    .compare_exchange(id, 0, Ordering::SeqCst, Ordering::SeqCst)
                    .is_ok()
                {
                    events.result(text);
                }
            },
        );

        let task = unsafe {
            self.recognizer
                .recognitionTaskWithRequest_resultHandler(&request, &handler)
        };

        // Feed captured audio into the request
        let request_for_tap = request.clone();
        let tap_block = RcBlock::new(
            move |buffer: NonNull<AVAudioPCMBuffer>, _when: NonNull<AVAudioTime>| unsafe {
                request_for_tap.appendAudioPCMBuffer(buffer.as_ref());
            },
        );

        unsafe {
            // Convert RcBlock to raw pointer for the C API
            let tap_block_ptr = &*tap_block as *const block2::Block<_> as *mut block2::Block<_>;
            input_node.installTapOnBus_bufferSize_format_block(0, 1024, Some(&format), tap_block_ptr);
        }

        // Stored before the engine starts so a failed start is still torn
        // down by the next cancel.
        self.request = Some(request);
        self.task = Some(task);
        self._tap_block = Some(tap_block);
        self._handler = Some(handler);

        unsafe {
            self.audio_engine.prepare();
            self.audio_engine
                .startAndReturnError()
                .map_err(|err| anyhow!("failed to start audio engine: {err:?}"))?;
        }
        self.events.ready();

        // The framework never times a turn out on its own; a silent turn
        // ends here instead.
        let events = self.events.clone();
        let turn = Arc::clone(&self.turn);
        let timeout = self.turn_timeout;
        thread::spawn(move || {
            thread::sleep(timeout);
            if turn
                .compare_exchange(id, 0, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                events.error(EngineError::SpeechTimeout);
            }
        });

        Ok(())
    }

    fn cancel(&mut self) {
        self.turn.store(0, Ordering::SeqCst);
        self.teardown_turn();
    }
}

impl Drop for EngineImpl {
    fn drop(&mut self) {
        self.turn.store(0, Ordering::SeqCst);
        self.teardown_turn();
    }
}

fn map_recognition_error(code: i32) -> EngineError {
    match code {
        // kAFAssistantErrorDomain: no speech detected / retry
        203 | 1110 => EngineError::NoMatch,
        // Request was cancelled by the host
        216 => EngineError::RecognizerBusy,
        other => EngineError::Other(other),
    }
}
