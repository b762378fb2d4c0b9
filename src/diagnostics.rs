//! Structured diagnostics for the listening loop and gesture pipeline.
//!
//! Every restart, recognition error, heard utterance, and gesture outcome is
//! emitted as a typed event. Events are always mirrored to the `log` facade;
//! a subscriber channel can additionally be attached, which is how the tests
//! observe the pipeline. A capability fault ("heard but nothing scrolls",
//! [`DiagnosticEvent::GestureRejected`]) is a different event from a session
//! that never came up ([`DiagnosticEvent::EngineUnavailable`]).

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::command::ScrollDirection;
use crate::gesture::DispatchOutcome;

/// One observable step of the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum DiagnosticEvent {
    /// A fresh engine handle was created and the session began listening.
    ListeningStarted,
    /// The session was explicitly stopped and the engine handle destroyed.
    ListeningStopped,
    /// The speech engine could not be created at all (missing model,
    /// no recognizer on this host). The session is idle, not retrying.
    EngineUnavailable,
    /// The recognition turn was restarted on the existing engine handle.
    TurnRestarted { after_error: bool },
    /// The engine reported a recoverable error for the current turn.
    RecognitionError { code: i32 },
    /// A completed recognition turn produced this (lowercased) transcript.
    UtteranceHeard { text: String },
    /// The transcript matched a scroll command.
    CommandMatched { direction: ScrollDirection },
    /// A swipe was accepted by the input-synthesis boundary.
    GestureSubmitted { direction: ScrollDirection },
    /// The input-synthesis boundary refused the swipe outright. This is a
    /// host capability/configuration fault, not a transient error.
    GestureRejected,
    /// The asynchronous outcome of a previously accepted swipe.
    GestureFinished { outcome: DispatchOutcome },
}

/// Cloneable emitter handle shared by the session, dispatcher, and router.
#[derive(Clone)]
pub struct Diagnostics {
    subscriber: Option<Sender<DiagnosticEvent>>,
}

impl Diagnostics {
    /// Diagnostics that only mirror to the `log` facade.
    pub fn log_only() -> Self {
        Self { subscriber: None }
    }

    /// Diagnostics with an attached subscriber channel.
    pub fn channel() -> (Self, Receiver<DiagnosticEvent>) {
        let (tx, rx) = unbounded();
        (Self { subscriber: Some(tx) }, rx)
    }

    /// Emits one event: logs it, then forwards it to the subscriber if any.
    pub fn emit(&self, event: DiagnosticEvent) {
        match &event {
            DiagnosticEvent::ListeningStarted => log::info!("listening started"),
            DiagnosticEvent::ListeningStopped => log::info!("listening stopped"),
            DiagnosticEvent::EngineUnavailable => {
                log::error!("speech engine unavailable; not listening")
            }
            DiagnosticEvent::TurnRestarted { after_error } => {
                log::debug!("recognition turn restarted (after_error: {after_error})")
            }
            DiagnosticEvent::RecognitionError { code } => {
                log::debug!("recognition error code {code}, restarting shortly")
            }
            DiagnosticEvent::UtteranceHeard { text } => log::info!("heard: {text:?}"),
            DiagnosticEvent::CommandMatched { direction } => {
                log::info!("command: scroll {}", direction.label())
            }
            DiagnosticEvent::GestureSubmitted { direction } => {
                log::debug!("swipe {} submitted", direction.label())
            }
            DiagnosticEvent::GestureRejected => {
                // The listening loop is unaffected; commands keep being heard
                // but nothing scrolls until the helper is fixed.
                log::error!("swipe rejected: input helper missing or not permitted")
            }
            DiagnosticEvent::GestureFinished { outcome } => match outcome {
                DispatchOutcome::Completed => log::debug!("swipe completed"),
                DispatchOutcome::Cancelled => log::warn!("swipe cancelled by the host"),
                DispatchOutcome::FailedToSubmit => log::error!("swipe failed to submit"),
            },
        }

        if let Some(tx) = &self.subscriber {
            let _ = tx.send(event);
        }
    }
}
