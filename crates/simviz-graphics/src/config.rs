//! Graphics configuration: struct defaults, an optional YAML/JSON file, and
//! environment overrides.

use crate::error::{GraphicsError, Result};
use crate::mode::{ModePreference, MODE_ENV};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_ENV: &str = "SIMVIZ_GRAPHICS_CONFIG";
pub const BLOCKING_ENV: &str = "SIMVIZ_GRAPHICS_BLOCKING";
pub const LIVE_REFRESH_ENV: &str = "SIMVIZ_GRAPHICS_LIVE_REFRESH_MS";
pub const EXPORT_DIR_ENV: &str = "SIMVIZ_GRAPHICS_EXPORT_DIR";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphicsConfig {
    pub mode: ModePreference,
    /// Render synchronously in the caller's thread regardless of host
    pub blocking: bool,
    /// Longest the rendering thread sleeps between event pumps
    pub pump_interval_ms: u64,
    /// Period of the live-refresh callback; `None` disables it
    pub live_refresh_ms: Option<u64>,
    pub export_dir: Option<PathBuf>,
    pub animation_dir: Option<PathBuf>,
    pub thread_name: String,
}

impl Default for GraphicsConfig {
    fn default() -> Self {
        Self {
            mode: ModePreference::Auto,
            blocking: false,
            pump_interval_ms: 16,
            live_refresh_ms: None,
            export_dir: None,
            animation_dir: None,
            thread_name: "simviz-render".to_string(),
        }
    }
}

impl GraphicsConfig {
    /// Configuration file named by `SIMVIZ_GRAPHICS_CONFIG` (or defaults),
    /// then environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = match env::var(CONFIG_ENV) {
            Ok(path) if !path.trim().is_empty() => {
                let path = PathBuf::from(path);
                info!("loading graphics configuration from {}", path.display());
                Self::load_from_file(&path)?
            }
            _ => {
                debug!("no graphics configuration file, using defaults");
                Self::default()
            }
        };
        config.apply_overrides(|key| env::var(key).ok());
        Ok(config)
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|err| {
            GraphicsError::Config(format!("failed to read {}: {err}", path.display()))
        })?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => serde_yaml::from_str(&content).map_err(|err| {
                GraphicsError::Config(format!("invalid YAML in {}: {err}", path.display()))
            }),
            Some("json") => serde_json::from_str(&content).map_err(|err| {
                GraphicsError::Config(format!("invalid JSON in {}: {err}", path.display()))
            }),
            _ => serde_yaml::from_str(&content)
                .or_else(|_| serde_json::from_str(&content))
                .map_err(|_| {
                    GraphicsError::Config(format!(
                        "could not parse {} (tried YAML, JSON)",
                        path.display()
                    ))
                }),
        }
    }

    /// Apply environment overrides read through `lookup`. Unparseable values
    /// are logged and ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(MODE_ENV) {
            match ModePreference::parse(&raw) {
                Some(mode) => self.mode = mode,
                None => warn!("ignoring {MODE_ENV}={raw:?}: expected auto, inline or window"),
            }
        }
        if let Some(raw) = lookup(BLOCKING_ENV) {
            match parse_bool(&raw) {
                Some(flag) => self.blocking = flag,
                None => warn!("ignoring {BLOCKING_ENV}={raw:?}: expected a boolean"),
            }
        }
        if let Some(raw) = lookup(LIVE_REFRESH_ENV) {
            match raw.trim().parse::<u64>() {
                Ok(0) => self.live_refresh_ms = None,
                Ok(ms) => self.live_refresh_ms = Some(ms),
                Err(_) => warn!("ignoring {LIVE_REFRESH_ENV}={raw:?}: expected milliseconds"),
            }
        }
        if let Some(dir) = lookup(EXPORT_DIR_ENV).filter(|dir| !dir.trim().is_empty()) {
            self.export_dir = Some(PathBuf::from(dir));
        }
    }

    pub fn pump_interval(&self) -> Duration {
        Duration::from_millis(self.pump_interval_ms.max(1))
    }

    pub fn live_refresh(&self) -> Option<Duration> {
        self.live_refresh_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }

    pub fn export_dir(&self) -> PathBuf {
        self.export_dir
            .clone()
            .unwrap_or_else(|| env::temp_dir().join("simviz"))
    }

    pub fn animation_dir(&self) -> PathBuf {
        self.animation_dir
            .clone()
            .unwrap_or_else(|| self.export_dir().join("animations"))
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}
