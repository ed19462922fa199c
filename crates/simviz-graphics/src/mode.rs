//! Inline vs. rendering-thread presentation.
//!
//! [`renders_inline`] is a pure predicate over the host environment and the
//! blocking flag. A manager evaluates it once at construction and keeps the
//! answer for its whole lifetime; windows are never moved between modes.

use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;

/// Environment variable forcing a presentation mode (`auto`, `inline`, `window`).
pub const MODE_ENV: &str = "SIMVIZ_GRAPHICS_MODE";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PresentationMode {
    /// Toolkit driven synchronously from the caller's thread
    Inline,
    /// Toolkit owned by a dedicated rendering thread
    Window,
}

impl fmt::Display for PresentationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PresentationMode::Inline => f.write_str("inline"),
            PresentationMode::Window => f.write_str("window"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModePreference {
    /// Detect from the host environment
    #[default]
    Auto,
    Inline,
    Window,
}

impl ModePreference {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "auto" | "" => Some(ModePreference::Auto),
            "inline" | "notebook" | "jupyter" => Some(ModePreference::Inline),
            "window" | "gui" | "interactive" => Some(ModePreference::Window),
            _ => None,
        }
    }
}

/// What the process knows about the host it is embedded in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HostEnvironment {
    /// Running under a notebook kernel
    pub embedded: bool,
    /// Mode forced through [`MODE_ENV`]
    pub forced: Option<ModePreference>,
}

impl HostEnvironment {
    pub fn detect() -> Self {
        let embedded =
            env::var_os("JPY_PARENT_PID").is_some() || env::var_os("JUPYTER_RUNTIME_DIR").is_some();
        let forced = env::var(MODE_ENV)
            .ok()
            .and_then(|raw| ModePreference::parse(&raw))
            .filter(|pref| *pref != ModePreference::Auto);
        Self { embedded, forced }
    }
}

/// True when rendering should happen synchronously in the caller's thread.
pub fn renders_inline(host: &HostEnvironment, preference: ModePreference, blocking: bool) -> bool {
    if blocking {
        return true;
    }
    match host.forced.unwrap_or(preference) {
        ModePreference::Inline => true,
        ModePreference::Window => false,
        ModePreference::Auto => host.embedded,
    }
}

pub fn resolve_mode(
    host: &HostEnvironment,
    preference: ModePreference,
    blocking: bool,
) -> PresentationMode {
    if renders_inline(host, preference, blocking) {
        PresentationMode::Inline
    } else {
        PresentationMode::Window
    }
}
