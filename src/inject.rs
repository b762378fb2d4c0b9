//! Host input-synthesis adapter.
//!
//! Swipes are injected by spawning a helper program with the stroke as
//! arguments: `<helper> <x1> <y1> <x2> <y2> <duration_ms>`. A helper that
//! cannot be spawned means the host has no injection capability at all; the
//! submission is rejected outright and no outcome ever follows. An accepted
//! swipe resolves to Completed on exit status 0 and Cancelled on anything
//! else, watched from a detached thread.

use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::thread;

use anyhow::Result;

use crate::config::Preferences;
use crate::gesture::{DispatchOutcome, DisplayMetrics, GestureSink, OutcomeHandler, SwipePath};

/// Production gesture sink: one helper invocation per stroke.
pub struct SwipeInjector {
    helper: PathBuf,
}

impl SwipeInjector {
    pub fn new(helper: impl Into<PathBuf>) -> Self {
        Self {
            helper: helper.into(),
        }
    }
}

impl GestureSink for SwipeInjector {
    fn submit(&self, path: &SwipePath, on_outcome: OutcomeHandler) -> bool {
        let mut command = Command::new(&self.helper);
        command
            .arg((path.start.x.round() as i64).to_string())
            .arg((path.start.y.round() as i64).to_string())
            .arg((path.end.x.round() as i64).to_string())
            .arg((path.end.y.round() as i64).to_string())
            .arg(path.duration.as_millis().to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(err) => {
                log::debug!(
                    "swipe helper {} could not be spawned: {err}",
                    self.helper.display()
                );
                return false;
            }
        };

        thread::spawn(move || {
            let outcome = match child.wait() {
                Ok(status) if status.success() => DispatchOutcome::Completed,
                _ => DispatchOutcome::Cancelled,
            };
            on_outcome(outcome);
        });

        true
    }
}

/// Screen dimensions served from the preferences file, re-read on every
/// dispatch so a dimension change is picked up without a restart.
pub struct ConfiguredMetrics {
    path: PathBuf,
}

impl ConfiguredMetrics {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl DisplayMetrics for ConfiguredMetrics {
    fn screen_size(&self) -> Result<(u32, u32)> {
        let prefs = Preferences::load(&self.path)?;
        Ok((prefs.screen.width, prefs.screen.height))
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::time::Duration;

    use crossbeam_channel::bounded;

    use super::*;
    use crate::command::ScrollDirection;
    use crate::gesture::swipe_path;

    fn submit_and_wait(injector: &SwipeInjector, path: &SwipePath) -> Option<DispatchOutcome> {
        let (tx, rx) = bounded(1);
        let accepted = injector.submit(
            path,
            Box::new(move |outcome| {
                let _ = tx.send(outcome);
            }),
        );
        if !accepted {
            return None;
        }
        Some(rx.recv_timeout(Duration::from_secs(5)).unwrap())
    }

    #[test]
    fn missing_helper_is_rejected_without_an_outcome() {
        let injector = SwipeInjector::new("/definitely/not/a/real/helper");
        let path = swipe_path(ScrollDirection::Down, 1080, 1920);

        let (tx, rx) = bounded(1);
        let accepted = injector.submit(
            &path,
            Box::new(move |outcome| {
                let _ = tx.send(outcome);
            }),
        );

        assert!(!accepted);
        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn successful_helper_completes() {
        let injector = SwipeInjector::new("true");
        let path = swipe_path(ScrollDirection::Down, 1080, 1920);
        assert_eq!(
            submit_and_wait(&injector, &path),
            Some(DispatchOutcome::Completed)
        );
    }

    #[cfg(unix)]
    #[test]
    fn failing_helper_is_cancelled_not_rejected() {
        let injector = SwipeInjector::new("false");
        let path = swipe_path(ScrollDirection::Up, 1080, 1920);
        assert_eq!(
            submit_and_wait(&injector, &path),
            Some(DispatchOutcome::Cancelled)
        );
    }

    #[cfg(unix)]
    #[test]
    fn helper_receives_rounded_stroke_arguments() {
        use std::os::unix::fs::PermissionsExt;

        let dir = std::env::temp_dir().join(format!("voicescroll-inject-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let script = dir.join("record-args.sh");
        let output = dir.join("args.txt");
        fs::write(
            &script,
            format!("#!/bin/sh\necho \"$@\" > {}\n", output.display()),
        )
        .unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

        let injector = SwipeInjector::new(&script);
        let path = swipe_path(ScrollDirection::Down, 1080, 1920);
        assert_eq!(
            submit_and_wait(&injector, &path),
            Some(DispatchOutcome::Completed)
        );

        let recorded = fs::read_to_string(&output).unwrap();
        assert_eq!(recorded.trim(), "540 1344 540 576 400");
    }

    #[test]
    fn configured_metrics_track_the_preferences_file() {
        let dir = std::env::temp_dir().join(format!("voicescroll-metrics-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");

        let mut prefs = Preferences::default();
        prefs.store(&path).unwrap();

        let metrics = ConfiguredMetrics::new(&path);
        assert_eq!(metrics.screen_size().unwrap(), (1080, 1920));

        prefs.screen.width = 1440;
        prefs.screen.height = 2560;
        prefs.store(&path).unwrap();
        assert_eq!(metrics.screen_size().unwrap(), (1440, 2560));
    }
}
