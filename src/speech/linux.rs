//! Linux speech recognition using Vosk offline speech recognition.
//!
//! Requires a Vosk model to be downloaded and available. The model path
//! is resolved from:
//! 1. The configured model path
//! 2. `VOSK_MODEL_PATH` environment variable
//! 3. `~/.local/share/vosk/model` (default)
//!
//! Download models from: https://alphacephei.com/vosk/models
//!
//! The offline recognizer has no host-driven turn lifecycle, so the turn
//! boundary is synthesized here: an utterance ends once its partial
//! hypothesis has been stable for a short hold window, and a turn with no
//! speech at all ends in the timeout error.

use std::env;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{unbounded, Receiver, Sender};
use vosk::{Model, Recognizer};

use super::{EngineConfig, EngineError, EngineEvents, SpeechEngine};

/// Window of unchanged partial hypothesis treated as the utterance end.
const ENDPOINT_HOLD: Duration = Duration::from_millis(700);
const POLL_INTERVAL: Duration = Duration::from_millis(50);

enum WorkerMsg {
    Begin { turn: u64 },
    Shutdown,
}

/// Vosk-backed engine handle.
///
/// The model is owned by a dedicated worker thread that lives as long as
/// the handle; each turn opens a fresh capture stream and recognizer on
/// that thread. `cancel` invalidates the turn stamp, which both stops the
/// capture loop and suppresses any in-flight delivery.
pub struct EngineImpl {
    worker_tx: Sender<WorkerMsg>,
    worker: Option<JoinHandle<()>>,
    turn: Arc<AtomicU64>,
    next_turn: u64,
}

impl EngineImpl {
    pub fn new(config: &EngineConfig, events: EngineEvents) -> Result<Self> {
        let model_path = resolve_model_path(config)?;
        if !model_path.exists() {
            return Err(anyhow!(
                "speech model not found at: {}\n\
                 Download a model from https://alphacephei.com/vosk/models\n\
                 and extract it to ~/.local/share/vosk/model,\n\
                 or set VOSK_MODEL_PATH / the model_path preference",
                model_path.display()
            ));
        }

        let turn = Arc::new(AtomicU64::new(0));
        let (worker_tx, worker_rx) = unbounded();
        let worker = {
            let turn = Arc::clone(&turn);
            let timeout = config.turn_timeout;
            thread::spawn(move || worker_loop(model_path, timeout, events, worker_rx, turn))
        };

        Ok(Self {
            worker_tx,
            worker: Some(worker),
            turn,
            next_turn: 0,
        })
    }
}

impl SpeechEngine for EngineImpl {
    fn begin_listening(&mut self) -> Result<()> {
        self.next_turn += 1;
        self.turn.store(self.next_turn, Ordering::SeqCst);
        self.worker_tx
            .send(WorkerMsg::Begin {
                turn: self.next_turn,
            })
            .map_err(|_| anyhow!("recognition worker is gone"))?;
        Ok(())
    }

    fn cancel(&mut self) {
        self.turn.store(0, Ordering::SeqCst);
    }
}

impl Drop for EngineImpl {
    fn drop(&mut self) {
        self.turn.store(0, Ordering::SeqCst);
        let _ = self.worker_tx.send(WorkerMsg::Shutdown);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn resolve_model_path(config: &EngineConfig) -> Result<PathBuf> {
    if let Some(path) = &config.model_path {
        return Ok(path.clone());
    }
    if let Ok(path) = env::var("VOSK_MODEL_PATH") {
        return Ok(PathBuf::from(path));
    }
    let home = env::var("HOME").map_err(|_| anyhow!("HOME environment variable not set"))?;
    Ok(PathBuf::from(home).join(".local/share/vosk/model"))
}

fn worker_loop(
    model_path: PathBuf,
    turn_timeout: Duration,
    events: EngineEvents,
    rx: Receiver<WorkerMsg>,
    turn: Arc<AtomicU64>,
) {
    // Loaded lazily on the first turn so handle creation stays fast.
    let mut model: Option<Model> = None;

    while let Ok(msg) = rx.recv() {
        let id = match msg {
            WorkerMsg::Shutdown => break,
            WorkerMsg::Begin { turn } => turn,
        };
        if turn.load(Ordering::SeqCst) != id {
            continue;
        }

        if model.is_none() {
            match Model::new(model_path.to_string_lossy()) {
                Some(loaded) => model = Some(loaded),
                None => {
                    log::error!("failed to load speech model from {}", model_path.display());
                    if turn.load(Ordering::SeqCst) == id {
                        events.error(EngineError::AudioUnavailable);
                    }
                    continue;
                }
            }
        }
        let Some(model) = model.as_ref() else {
            continue;
        };

        run_turn(model, id, &turn, &events, turn_timeout);
    }
}

fn run_turn(
    model: &Model,
    id: u64,
    turn: &AtomicU64,
    events: &EngineEvents,
    turn_timeout: Duration,
) {
    let deliver_error = |error: EngineError| {
        if turn.load(Ordering::SeqCst) == id {
            events.error(error);
        }
    };

    let host = cpal::default_host();
    let Some(device) = host.default_input_device() else {
        log::warn!("no audio input device available");
        deliver_error(EngineError::AudioUnavailable);
        return;
    };

    let stream_config = match device.default_input_config() {
        Ok(config) => config,
        Err(err) => {
            log::warn!("cannot query audio input config: {err}");
            deliver_error(EngineError::AudioUnavailable);
            return;
        }
    };
    let sample_rate = stream_config.sample_rate().0 as f32;
    let channels = stream_config.channels() as usize;

    let Some(mut recognizer) = Recognizer::new(model, sample_rate) else {
        log::warn!("cannot create recognizer at {sample_rate} Hz");
        deliver_error(EngineError::RecognizerBusy);
        return;
    };

    // Audio callback pushes mono i16 samples; the loop below drains them.
    let captured: Arc<Mutex<Vec<i16>>> = Arc::new(Mutex::new(Vec::new()));
    let capture_sink = Arc::clone(&captured);

    let stream = match device.build_input_stream(
        &stream_config.into(),
        move |data: &[f32], _: &cpal::InputCallbackInfo| {
            let mono = data.chunks(channels).map(|frame| {
                let sum: f32 = frame.iter().sum();
                (sum / channels as f32 * 32767.0) as i16
            });
            if let Ok(mut buffer) = capture_sink.lock() {
                buffer.extend(mono);
            }
        },
        |err| log::warn!("audio stream error: {err}"),
        None,
    ) {
        Ok(stream) => stream,
        Err(err) => {
            log::warn!("cannot open audio input stream: {err}");
            deliver_error(EngineError::AudioUnavailable);
            return;
        }
    };

    if stream.play().is_err() {
        deliver_error(EngineError::AudioUnavailable);
        return;
    }
    if turn.load(Ordering::SeqCst) == id {
        events.ready();
    }

    let started = Instant::now();
    let mut last_partial = String::new();
    let mut settled_since = Instant::now();

    loop {
        if turn.load(Ordering::SeqCst) != id {
            // Cancelled; tear down capture without delivering anything.
            return;
        }

        let samples: Vec<i16> = {
            let mut buffer = match captured.lock() {
                Ok(buffer) => buffer,
                Err(_) => return,
            };
            std::mem::take(&mut *buffer)
        };
        if !samples.is_empty() {
            let _ = recognizer.accept_waveform(&samples);
        }

        let partial = recognizer.partial_result().partial.to_string();
        if partial != last_partial {
            last_partial = partial;
            settled_since = Instant::now();
        }

        if !last_partial.is_empty() && settled_since.elapsed() >= ENDPOINT_HOLD {
            // The hypothesis stopped changing: that is the utterance end.
            let text = recognizer
                .final_result()
                .single()
                .map(|result| result.text.to_string())
                .unwrap_or_default();
            if turn.load(Ordering::SeqCst) == id {
                if text.trim().is_empty() {
                    events.error(EngineError::NoMatch);
                } else {
                    events.result(text);
                }
            }
            return;
        }

        if last_partial.is_empty() && started.elapsed() >= turn_timeout {
            deliver_error(EngineError::SpeechTimeout);
            return;
        }

        thread::sleep(POLL_INTERVAL);
    }
}
