//! Persisted preferences.
//!
//! Stored as TOML, resolved via:
//! 1. `VOICESCROLL_CONFIG` environment variable
//! 2. `~/.config/voicescroll/config.toml` (default)
//!
//! The scroll rate is the value the settings surface edits; the gesture path
//! loads it but does not consume it. Screen dimensions describe the
//! coordinate space the swipe helper injects into.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

/// Bounds of the scroll-rate preference, matching the settings slider.
pub const MIN_RATE: f32 = 1.0;
pub const MAX_RATE: f32 = 5.0;

const DEFAULT_SWIPE_HELPER: &str = "voicescroll-swipe";

/// Injected coordinate space, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreenSize {
    pub width: u32,
    pub height: u32,
}

impl Default for ScreenSize {
    fn default() -> Self {
        Self {
            width: 1080,
            height: 1920,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    /// Scrolling intensity in [`MIN_RATE`, `MAX_RATE`]. Persisted for the
    /// settings surface; not wired into gesture timing.
    pub rate: f32,
    /// Screen dimensions used to lay out swipe coordinates.
    pub screen: ScreenSize,
    /// Program invoked to inject the swipe (looked up on PATH or absolute).
    pub swipe_helper: String,
    /// Override for the speech model location, where the backend needs one.
    pub model_path: Option<PathBuf>,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            rate: MIN_RATE,
            screen: ScreenSize::default(),
            swipe_helper: DEFAULT_SWIPE_HELPER.to_string(),
            model_path: None,
        }
    }
}

impl Preferences {
    /// Resolves the preferences file location.
    pub fn path() -> Result<PathBuf> {
        if let Ok(path) = env::var("VOICESCROLL_CONFIG") {
            return Ok(PathBuf::from(path));
        }
        let home = env::var("HOME").map_err(|_| anyhow!("HOME environment variable not set"))?;
        Ok(PathBuf::from(home).join(".config/voicescroll/config.toml"))
    }

    /// Loads preferences, falling back to defaults when the file does not
    /// exist yet. The rate is clamped into range on the way in.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path)
            .with_context(|| format!("cannot read preferences at {}", path.display()))?;
        let mut prefs: Preferences = toml::from_str(&raw)
            .with_context(|| format!("malformed preferences at {}", path.display()))?;
        prefs.rate = prefs.rate.clamp(MIN_RATE, MAX_RATE);
        Ok(prefs)
    }

    /// Writes the preferences, creating parent directories as needed.
    pub fn store(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("cannot create {}", parent.display()))?;
        }
        let raw = toml::to_string_pretty(self).context("cannot serialize preferences")?;
        fs::write(path, raw)
            .with_context(|| format!("cannot write preferences to {}", path.display()))?;
        Ok(())
    }

    /// Sets the scroll rate, clamped into the slider range.
    pub fn set_rate(&mut self, rate: f32) {
        self.rate = rate.clamp(MIN_RATE, MAX_RATE);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_file(name: &str) -> PathBuf {
        let dir = env::temp_dir().join(format!("voicescroll-test-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir.join(name)
    }

    #[test]
    fn missing_file_loads_defaults() {
        let path = temp_file("missing.toml");
        let _ = fs::remove_file(&path);
        let prefs = Preferences::load(&path).unwrap();
        assert_eq!(prefs, Preferences::default());
        assert_eq!(prefs.rate, MIN_RATE);
    }

    #[test]
    fn round_trips_through_disk() {
        let path = temp_file("roundtrip.toml");
        let mut prefs = Preferences::default();
        prefs.set_rate(3.5);
        prefs.screen = ScreenSize {
            width: 1440,
            height: 2560,
        };
        prefs.store(&path).unwrap();

        let loaded = Preferences::load(&path).unwrap();
        assert_eq!(loaded, prefs);
    }

    #[test]
    fn rate_is_clamped_on_load() {
        let path = temp_file("clamped.toml");
        fs::write(&path, "rate = 99.0\n").unwrap();
        let prefs = Preferences::load(&path).unwrap();
        assert_eq!(prefs.rate, MAX_RATE);

        fs::write(&path, "rate = 0.25\n").unwrap();
        let prefs = Preferences::load(&path).unwrap();
        assert_eq!(prefs.rate, MIN_RATE);
    }

    #[test]
    fn set_rate_clamps() {
        let mut prefs = Preferences::default();
        prefs.set_rate(7.0);
        assert_eq!(prefs.rate, MAX_RATE);
        prefs.set_rate(-1.0);
        assert_eq!(prefs.rate, MIN_RATE);
        prefs.set_rate(2.5);
        assert_eq!(prefs.rate, 2.5);
    }

    #[test]
    fn partial_files_fill_in_defaults() {
        let path = temp_file("partial.toml");
        fs::write(&path, "rate = 2.0\n").unwrap();
        let prefs = Preferences::load(&path).unwrap();
        assert_eq!(prefs.rate, 2.0);
        assert_eq!(prefs.screen, ScreenSize::default());
        assert_eq!(prefs.swipe_helper, DEFAULT_SWIPE_HELPER);
    }

    #[test]
    fn malformed_files_are_an_error() {
        let path = temp_file("malformed.toml");
        fs::write(&path, "rate = \"fast\"\n").unwrap();
        assert!(Preferences::load(&path).is_err());
    }
}
