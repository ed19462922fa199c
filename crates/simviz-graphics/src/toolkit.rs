//! Boundary to the GUI/plotting toolkit that performs the actual drawing.
//!
//! In window mode the toolkit value is moved onto the rendering thread and
//! every method below runs there. In inline mode the methods run on the
//! calling thread while the manager lock is held.

use crate::drawable::Drawable;
use crate::mode::PresentationMode;
use crate::window::WindowId;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolkitError {
    /// The handle no longer refers to a usable window; recreate and retry.
    #[error("toolkit handle is stale")]
    StaleHandle,
    #[error("format '{0}' rejected by toolkit")]
    UnsupportedFormat(String),
    #[error("frame capture is unavailable")]
    CaptureUnavailable,
    #[error("{0}")]
    Backend(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// What a toolkit can do in a given presentation mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolkitCapabilities {
    /// Lower-case export format names accepted by [`Toolkit::save`]
    pub export_formats: Vec<String>,
    /// Whether frame-capture streams are available
    pub frame_capture: bool,
}

impl ToolkitCapabilities {
    pub fn supports_format(&self, format: &str) -> bool {
        let normalized = normalize_format(format);
        self.export_formats.iter().any(|f| *f == normalized)
    }
}

/// Lower-case a format name and strip a leading dot (`".PNG"` -> `"png"`).
pub fn normalize_format(format: &str) -> String {
    format.trim().trim_start_matches('.').to_ascii_lowercase()
}

pub trait Toolkit: Send + 'static {
    /// Toolkit window or plotter. Lives in the registry between operations.
    type Handle: Send + 'static;

    fn capabilities(&self, mode: PresentationMode) -> ToolkitCapabilities;

    /// Create a new window. The one GUI-thread-affine operation.
    fn create_handle(
        &mut self,
        window_id: &WindowId,
        mode: PresentationMode,
    ) -> Result<Self::Handle, ToolkitError>;

    fn is_closed(&self, handle: &Self::Handle) -> bool;

    /// Upload and draw `drawable` into the window.
    fn draw(&mut self, handle: &mut Self::Handle, drawable: &dyn Drawable)
        -> Result<(), ToolkitError>;

    fn close(&mut self, handle: Self::Handle) -> Result<(), ToolkitError>;

    fn save(
        &mut self,
        handle: &mut Self::Handle,
        path: &Path,
        format: &str,
    ) -> Result<(), ToolkitError>;

    fn open_frame_capture(
        &mut self,
        _handle: &mut Self::Handle,
        _path: &Path,
    ) -> Result<(), ToolkitError> {
        Err(ToolkitError::CaptureUnavailable)
    }

    /// Append the window's current contents to its capture stream.
    fn capture_frame(&mut self, _handle: &mut Self::Handle) -> Result<(), ToolkitError> {
        Err(ToolkitError::CaptureUnavailable)
    }

    /// Process pending native events. Must return promptly; `budget` is a
    /// hint for how long the toolkit may block.
    fn pump_events(&mut self, _budget: Duration) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_matching_is_case_and_dot_insensitive() {
        let caps = ToolkitCapabilities {
            export_formats: vec!["png".to_string(), "svg".to_string()],
            frame_capture: false,
        };
        assert!(caps.supports_format(".PNG"));
        assert!(caps.supports_format("svg"));
        assert!(!caps.supports_format("tiff"));
    }
}
