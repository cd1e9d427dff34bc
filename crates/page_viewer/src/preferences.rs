//! User preferences persisted as JSON.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_PREFERENCES_PATH: &str = "./preference.json";
pub const MIN_TURN_SPEED: f32 = 0.1;
pub const MAX_TURN_SPEED: f32 = 10.0;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    pub auto_turn_page_speed: f32,
    pub eye_protection: bool,
    pub eye_protection_color: [f32; 3],
    pub background_color: [f32; 3],
    /// Pages turn from right to left, like a western book.
    pub page_flow_rtl: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            auto_turn_page_speed: 1.0,
            eye_protection: false,
            eye_protection_color: [0.93, 0.90, 0.78],
            background_color: [0.28, 0.0, 0.12],
            page_flow_rtl: true,
        }
    }
}

impl Preferences {
    pub fn read(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let mut prefs: Self = serde_json::from_str(&text)
            .with_context(|| format!("parsing {}", path.display()))?;
        prefs.auto_turn_page_speed = prefs
            .auto_turn_page_speed
            .clamp(MIN_TURN_SPEED, MAX_TURN_SPEED);
        Ok(prefs)
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text + "\n").with_context(|| format!("writing {}", path.display()))
    }

    /// Saves the current settings, logging instead of failing.
    pub fn save(&self, path: &Path) {
        match self.write(path) {
            Ok(()) => log::info!("saved preferences to {}", path.display()),
            Err(err) => log::error!("failed to save preferences: {:#}", err),
        }
    }

    /// Replaces the current settings with the file at `path`.
    ///
    /// A missing file is created from the current settings; an unreadable one is
    /// reported and leaves the settings untouched.
    pub fn load(&mut self, path: &Path) {
        if !path.exists() {
            log::warn!(
                "no preferences at {}, writing the current settings",
                path.display()
            );
            self.save(path);
            return;
        }
        match Self::read(path) {
            Ok(prefs) => {
                *self = prefs;
                log::info!("loaded preferences from {}", path.display());
            }
            Err(err) => log::error!("failed to load preferences: {:#}", err),
        }
    }

    /// Tint multiplied into every page; white when eye protection is off.
    pub fn eye_color(&self) -> [f32; 3] {
        if self.eye_protection {
            self.eye_protection_color
        } else {
            [1.0; 3]
        }
    }
}
