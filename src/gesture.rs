//! Swipe geometry and gesture dispatch.
//!
//! A scroll direction becomes a vertical swipe along the screen midline:
//! scrolling down swipes from 70% to 30% of the screen height (finger moves
//! up, content moves down), scrolling up is the mirror image. The path is
//! recomputed from live display metrics on every dispatch since the screen
//! may rotate or change resolution between commands.

use std::time::Duration;

use anyhow::Result;

use crate::command::ScrollDirection;
use crate::diagnostics::{DiagnosticEvent, Diagnostics};

/// Fixed swipe duration. Independent of distance and of the persisted
/// scroll-rate preference; the two are not wired together.
pub const SWIPE_DURATION: Duration = Duration::from_millis(400);

const SWIPE_START_FRACTION: f32 = 0.7;
const SWIPE_END_FRACTION: f32 = 0.3;

/// A point in screen pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

/// A single-stroke swipe: straight line from `start` to `end` over `duration`.
#[derive(Debug, Clone, PartialEq)]
pub struct SwipePath {
    pub start: Point,
    pub end: Point,
    pub duration: Duration,
}

/// How a submitted gesture ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The host played the full stroke.
    Completed,
    /// The host started but abandoned the stroke.
    Cancelled,
    /// The submission itself was refused; no stroke was ever played and no
    /// asynchronous outcome will follow.
    FailedToSubmit,
}

/// Builds the swipe for `direction` on a `width` x `height` screen.
pub fn swipe_path(direction: ScrollDirection, width: u32, height: u32) -> SwipePath {
    let x = width as f32 / 2.0;
    let height = height as f32;
    let (from, to) = match direction {
        ScrollDirection::Down => (SWIPE_START_FRACTION, SWIPE_END_FRACTION),
        ScrollDirection::Up => (SWIPE_END_FRACTION, SWIPE_START_FRACTION),
    };
    SwipePath {
        start: Point { x, y: height * from },
        end: Point { x, y: height * to },
        duration: SWIPE_DURATION,
    }
}

/// Live screen dimensions, read fresh for every gesture.
pub trait DisplayMetrics: Send + Sync {
    fn screen_size(&self) -> Result<(u32, u32)>;
}

/// Callback invoked with the asynchronous outcome of an accepted swipe.
pub type OutcomeHandler = Box<dyn FnOnce(DispatchOutcome) + Send>;

/// The host input-synthesis boundary.
///
/// `submit` returns immediately with whether the stroke was accepted for
/// dispatch. When it returns `true`, exactly one of `Completed` or
/// `Cancelled` is later delivered through `on_outcome`, on another thread.
/// When it returns `false`, `on_outcome` is never called.
pub trait GestureSink: Send + Sync {
    fn submit(&self, path: &SwipePath, on_outcome: OutcomeHandler) -> bool;
}

/// Turns scroll directions into swipes and hands them to the sink.
///
/// Dispatch is fire-and-forget: outcomes surface on the diagnostics stream
/// and are never fed back into the recognition loop.
pub struct GestureDispatcher {
    metrics: Box<dyn DisplayMetrics>,
    sink: Box<dyn GestureSink>,
    diagnostics: Diagnostics,
}

impl GestureDispatcher {
    pub fn new(
        metrics: Box<dyn DisplayMetrics>,
        sink: Box<dyn GestureSink>,
        diagnostics: Diagnostics,
    ) -> Self {
        Self {
            metrics,
            sink,
            diagnostics,
        }
    }

    /// Submits one swipe in `direction`. Never blocks on the outcome.
    pub fn scroll(&self, direction: ScrollDirection) {
        let (width, height) = match self.metrics.screen_size() {
            Ok(size) => size,
            Err(err) => {
                log::error!("cannot read display metrics: {err:#}");
                return;
            }
        };

        let path = swipe_path(direction, width, height);
        let diagnostics = self.diagnostics.clone();
        let accepted = self.sink.submit(
            &path,
            Box::new(move |outcome| {
                diagnostics.emit(DiagnosticEvent::GestureFinished { outcome });
            }),
        );

        if accepted {
            self.diagnostics
                .emit(DiagnosticEvent::GestureSubmitted { direction });
        } else {
            self.diagnostics.emit(DiagnosticEvent::GestureRejected);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::thread;
    use std::time::Duration;

    use super::*;

    #[test]
    fn swipe_down_runs_from_lower_to_upper_screen() {
        let path = swipe_path(ScrollDirection::Down, 1080, 1920);
        assert_eq!(path.start, Point { x: 540.0, y: 1344.0 });
        assert_eq!(path.end, Point { x: 540.0, y: 576.0 });
        assert_eq!(path.duration, Duration::from_millis(400));
    }

    #[test]
    fn swipe_up_is_the_mirror_image() {
        let path = swipe_path(ScrollDirection::Up, 1080, 1920);
        assert_eq!(path.start, Point { x: 540.0, y: 576.0 });
        assert_eq!(path.end, Point { x: 540.0, y: 1344.0 });
        assert_eq!(path.duration, Duration::from_millis(400));
    }

    #[test]
    fn duration_does_not_depend_on_screen_size() {
        let small = swipe_path(ScrollDirection::Down, 320, 480);
        let large = swipe_path(ScrollDirection::Down, 2160, 3840);
        assert_eq!(small.duration, large.duration);
    }

    /// Metrics stub that counts reads and can change size between them.
    struct MutableMetrics {
        size: Mutex<(u32, u32)>,
        reads: AtomicUsize,
    }

    impl DisplayMetrics for Arc<MutableMetrics> {
        fn screen_size(&self) -> Result<(u32, u32)> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            Ok(*self.size.lock().unwrap())
        }
    }

    /// Sink stub that records submitted paths and resolves outcomes from a
    /// background thread after an optional delay.
    struct RecordingSink {
        accept: bool,
        outcome_delay: Duration,
        paths: Mutex<Vec<SwipePath>>,
    }

    impl GestureSink for Arc<RecordingSink> {
        fn submit(&self, path: &SwipePath, on_outcome: OutcomeHandler) -> bool {
            self.paths.lock().unwrap().push(path.clone());
            if !self.accept {
                return false;
            }
            let delay = self.outcome_delay;
            thread::spawn(move || {
                thread::sleep(delay);
                on_outcome(DispatchOutcome::Completed);
            });
            true
        }
    }

    fn recording_sink(accept: bool, outcome_delay: Duration) -> Arc<RecordingSink> {
        Arc::new(RecordingSink {
            accept,
            outcome_delay,
            paths: Mutex::new(Vec::new()),
        })
    }

    #[test]
    fn metrics_are_read_fresh_on_every_dispatch() {
        let metrics = Arc::new(MutableMetrics {
            size: Mutex::new((1080, 1920)),
            reads: AtomicUsize::new(0),
        });
        let sink = recording_sink(true, Duration::ZERO);
        let (diagnostics, _events) = Diagnostics::channel();
        let dispatcher = GestureDispatcher::new(
            Box::new(Arc::clone(&metrics)),
            Box::new(Arc::clone(&sink)),
            diagnostics,
        );

        dispatcher.scroll(ScrollDirection::Down);
        *metrics.size.lock().unwrap() = (1920, 1080);
        dispatcher.scroll(ScrollDirection::Down);

        assert_eq!(metrics.reads.load(Ordering::SeqCst), 2);
        let paths = sink.paths.lock().unwrap();
        assert_eq!(paths[0].start.x, 540.0);
        assert_eq!(paths[1].start.x, 960.0);
    }

    #[test]
    fn rejection_is_distinguishable_from_cancellation() {
        let metrics = Arc::new(MutableMetrics {
            size: Mutex::new((1080, 1920)),
            reads: AtomicUsize::new(0),
        });
        let sink = recording_sink(false, Duration::ZERO);
        let (diagnostics, events) = Diagnostics::channel();
        let dispatcher =
            GestureDispatcher::new(Box::new(metrics), Box::new(sink), diagnostics);

        dispatcher.scroll(ScrollDirection::Up);

        let event = events.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(event, DiagnosticEvent::GestureRejected);
        // A rejected submission never produces an asynchronous outcome.
        assert!(events
            .recv_timeout(Duration::from_millis(100))
            .is_err());
    }

    #[test]
    fn scroll_returns_before_the_outcome_arrives() {
        let metrics = Arc::new(MutableMetrics {
            size: Mutex::new((1080, 1920)),
            reads: AtomicUsize::new(0),
        });
        let sink = recording_sink(true, Duration::from_millis(200));
        let (diagnostics, events) = Diagnostics::channel();
        let dispatcher =
            GestureDispatcher::new(Box::new(metrics), Box::new(sink), diagnostics);

        let started = std::time::Instant::now();
        dispatcher.scroll(ScrollDirection::Down);
        assert!(started.elapsed() < Duration::from_millis(100));

        assert_eq!(
            events.recv_timeout(Duration::from_secs(1)).unwrap(),
            DiagnosticEvent::GestureSubmitted {
                direction: ScrollDirection::Down
            }
        );
        assert_eq!(
            events.recv_timeout(Duration::from_secs(1)).unwrap(),
            DiagnosticEvent::GestureFinished {
                outcome: DispatchOutcome::Completed
            }
        );
    }
}
