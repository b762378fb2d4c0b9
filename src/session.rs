//! Continuous recognition session.
//!
//! A single actor thread owns the speech engine handle and keeps it
//! listening for as long as the user wants: every completed turn is followed
//! by an immediate restart on the same handle, every recognizer error by a
//! restart after a short settle delay. Errors are never fatal; the loop only
//! ends on an explicit stop. Unbounded retries are the intended steady state
//! of an always-listening service, so there is no backoff growth and no
//! retry ceiling.

use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};

use crate::diagnostics::{DiagnosticEvent, Diagnostics};
use crate::speech::{EngineEvents, EngineFactory, RecognitionEvent, SpeechEngine};

/// Delay before restarting after a recognizer error, letting the audio
/// channel settle instead of hammering it.
pub const ERROR_RESTART_DELAY: Duration = Duration::from_millis(500);

/// Called with the lowercased transcript of every completed turn. Runs on
/// the session thread and must not block.
pub type UtteranceHandler = Box<dyn FnMut(&str) + Send>;

#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    pub error_restart_delay: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            error_restart_delay: ERROR_RESTART_DELAY,
        }
    }
}

enum Msg {
    Start,
    Stop,
    Shutdown,
    /// Event from an engine handle. The epoch identifies which handle sent
    /// it, so events from a torn-down handle are discarded.
    Engine {
        epoch: u64,
        event: RecognitionEvent,
    },
}

/// Handle to the recognition session actor.
///
/// `start_listening`/`stop_listening` are non-blocking and safe from any
/// thread, including callbacks running on the session thread itself.
/// Dropping the handle stops the session and joins the actor.
pub struct RecognitionSession {
    tx: Sender<Msg>,
    worker: Option<JoinHandle<()>>,
}

impl RecognitionSession {
    pub fn spawn(
        factory: EngineFactory,
        on_utterance: UtteranceHandler,
        diagnostics: Diagnostics,
        config: SessionConfig,
    ) -> Self {
        let (tx, rx) = unbounded();
        let actor = Actor {
            factory,
            on_utterance,
            diagnostics,
            delay: config.error_restart_delay,
            tx: tx.clone(),
            active: false,
            engine: None,
            epoch: 0,
            restart_at: None,
        };
        let worker = thread::spawn(move || actor.run(rx));
        Self {
            tx,
            worker: Some(worker),
        }
    }

    /// Begins listening. No-op while already listening.
    pub fn start_listening(&self) {
        let _ = self.tx.send(Msg::Start);
    }

    /// Stops listening, cancels any pending restart, and destroys the
    /// engine handle. Safe to call repeatedly and while not listening.
    pub fn stop_listening(&self) {
        let _ = self.tx.send(Msg::Stop);
    }
}

impl Drop for RecognitionSession {
    fn drop(&mut self) {
        let _ = self.tx.send(Msg::Shutdown);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

struct Actor {
    factory: EngineFactory,
    on_utterance: UtteranceHandler,
    diagnostics: Diagnostics,
    delay: Duration,
    tx: Sender<Msg>,
    /// User intent to keep listening. Every restart path re-checks this at
    /// fire time, so a stop always wins over a scheduled restart.
    active: bool,
    /// The one live engine handle, exclusively owned here.
    engine: Option<Box<dyn SpeechEngine>>,
    /// Bumped whenever a handle is created; stamps its events.
    epoch: u64,
    /// Deadline of the pending delayed restart, if any.
    restart_at: Option<Instant>,
}

impl Actor {
    fn run(mut self, rx: Receiver<Msg>) {
        loop {
            let msg = if let Some(deadline) = self.restart_at {
                match rx.recv_deadline(deadline) {
                    Ok(msg) => Some(msg),
                    Err(RecvTimeoutError::Timeout) => None,
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            } else {
                match rx.recv() {
                    Ok(msg) => Some(msg),
                    Err(_) => break,
                }
            };

            match msg {
                None => {
                    // Delayed restart came due.
                    self.restart_at = None;
                    if self.active {
                        self.restart_turn(true);
                    }
                }
                Some(Msg::Start) => self.handle_start(),
                Some(Msg::Stop) => self.handle_stop(),
                Some(Msg::Shutdown) => {
                    self.handle_stop();
                    break;
                }
                Some(Msg::Engine { epoch, event }) => self.handle_event(epoch, event),
            }
        }
    }

    fn handle_start(&mut self) {
        if self.active {
            return;
        }
        self.active = true;

        // Tear down any leftover handle before creating the fresh one; at
        // most one exists at a time.
        self.engine = None;
        self.epoch += 1;
        let epoch = self.epoch;
        let tx = self.tx.clone();
        let events = EngineEvents::new(move |event| {
            let _ = tx.send(Msg::Engine { epoch, event });
        });

        match (self.factory)(events) {
            Ok(engine) => {
                self.engine = Some(engine);
                self.diagnostics.emit(DiagnosticEvent::ListeningStarted);
                self.begin_turn();
            }
            Err(err) => {
                // A handle that cannot be created is a configuration fault,
                // not a transient turn error; drop back to idle.
                log::error!("cannot create speech engine: {err:#}");
                self.active = false;
                self.diagnostics.emit(DiagnosticEvent::EngineUnavailable);
            }
        }
    }

    fn handle_stop(&mut self) {
        let was_listening = self.active || self.engine.is_some();
        self.active = false;
        self.restart_at = None;
        if let Some(mut engine) = self.engine.take() {
            engine.cancel();
        }
        if was_listening {
            self.diagnostics.emit(DiagnosticEvent::ListeningStopped);
        }
    }

    fn handle_event(&mut self, epoch: u64, event: RecognitionEvent) {
        if epoch != self.epoch || !self.active {
            // Late event from a torn-down handle, or the user already
            // stopped; either way it must not re-arm anything.
            return;
        }

        match event {
            RecognitionEvent::Ready => log::debug!("ready and listening"),
            RecognitionEvent::Result(transcript) => {
                let utterance = transcript.to_lowercase();
                self.diagnostics.emit(DiagnosticEvent::UtteranceHeard {
                    text: utterance.clone(),
                });
                (self.on_utterance)(&utterance);

                // Restart immediately after a result. The handler above is
                // fire-and-forget, so this does not wait on any gesture.
                if self.active {
                    self.restart_turn(false);
                }
            }
            RecognitionEvent::Error(error) => {
                self.diagnostics.emit(DiagnosticEvent::RecognitionError {
                    code: error.code(),
                });
                // Give the audio channel a moment to settle, then retry.
                self.restart_at = Some(Instant::now() + self.delay);
            }
        }
    }

    /// Restarts the recognition turn on the existing handle. Restarts never
    /// recreate the handle; only `handle_start` does.
    fn restart_turn(&mut self, after_error: bool) {
        let Some(engine) = self.engine.as_mut() else {
            return;
        };
        engine.cancel();
        self.diagnostics
            .emit(DiagnosticEvent::TurnRestarted { after_error });
        self.begin_turn();
    }

    fn begin_turn(&mut self) {
        let Some(engine) = self.engine.as_mut() else {
            return;
        };
        if let Err(err) = engine.begin_listening() {
            // Same recovery as an in-turn error: retry after the delay.
            log::warn!("cannot begin listening: {err:#}");
            self.restart_at = Some(Instant::now() + self.delay);
        }
    }
}
