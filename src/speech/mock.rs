//! Scripted speech recognizer for builds without native support.
//!
//! Cycles through a small demo script so the pipeline can be exercised end
//! to end without a microphone: scroll commands, unmatched chatter, and
//! periodic recognizer errors to drive the delayed-restart path.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::Result;

use super::{EngineConfig, EngineError, EngineEvents, SpeechEngine};

const TURN_DELAY: Duration = Duration::from_millis(900);

enum Step {
    Say(&'static str),
    Fail(EngineError),
}

const SCRIPT: [Step; 6] = [
    Step::Say("scroll down"),
    Step::Fail(EngineError::SpeechTimeout),
    Step::Say("scroll down"),
    Step::Say("scroll up"),
    Step::Fail(EngineError::NoMatch),
    Step::Say("nothing to see here"),
];

pub struct EngineImpl {
    events: EngineEvents,
    /// Stamp of the live turn; zeroed on delivery or cancellation.
    turn: Arc<AtomicU64>,
    next_turn: u64,
    cursor: Arc<AtomicUsize>,
}

impl EngineImpl {
    pub fn new(_config: &EngineConfig, events: EngineEvents) -> Result<Self> {
        Ok(Self {
            events,
            turn: Arc::new(AtomicU64::new(0)),
            next_turn: 0,
            cursor: Arc::new(AtomicUsize::new(0)),
        })
    }
}

impl SpeechEngine for EngineImpl {
    fn begin_listening(&mut self) -> Result<()> {
        self.next_turn += 1;
        let id = self.next_turn;
        self.turn.store(id, Ordering::SeqCst);

        let events = self.events.clone();
        let turn = Arc::clone(&self.turn);
        let cursor = Arc::clone(&self.cursor);

        thread::spawn(move || {
            if turn.load(Ordering::SeqCst) == id {
                events.ready();
            }
            thread::sleep(TURN_DELAY);
            if turn
                .compare_exchange(id, 0, Ordering::SeqCst, Ordering::SeqCst)
                .is_err()
            {
                return;
            }
            let step = &SCRIPT[cursor.fetch_add(1, Ordering::SeqCst) % SCRIPT.len()];
            match step {
                Step::Say(text) => events.result((*text).to_string()),
                Step::Fail(error) => events.error(*error),
            }
        });

        Ok(())
    }

    fn cancel(&mut self) {
        self.turn.store(0, Ordering::SeqCst);
    }
}
