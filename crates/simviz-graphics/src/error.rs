//! Error taxonomy for the window lifecycle API.

use crate::mode::PresentationMode;
use crate::toolkit::ToolkitError;
use crate::window::WindowId;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, GraphicsError>;

#[derive(Debug, Error)]
pub enum GraphicsError {
    #[error("objects of kind '{kind}' cannot be shown in a graphics window")]
    UnsupportedObjectKind { kind: String },
    #[error("export format '{format}' is not supported")]
    UnsupportedFormat { format: String },
    #[error("{operation} is not supported in {mode} mode")]
    NotSupported {
        operation: &'static str,
        mode: PresentationMode,
    },
    #[error("window '{0}' has no live toolkit handle")]
    UnknownWindow(WindowId),
    #[error("rendering thread is not running")]
    RenderThreadUnavailable,
    #[error("failed to spawn rendering thread: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("toolkit failure: {0}")]
    Toolkit(#[from] ToolkitError),
    #[error("configuration error: {0}")]
    Config(String),
}

/// Coarse classification used by hosts that map failures onto their own
/// status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Object passed to plot is not graphics-capable
    InvalidObject,
    /// Export format rejected
    InvalidFormat,
    /// Operation unavailable for the active mode or toolkit
    Unsupported,
    /// Operation targets a window without a handle
    InvalidState,
    /// Rendering thread is gone or could not be started
    ThreadCommunicationFailed,
    /// Toolkit reported a non-transient failure
    PlatformError,
    /// Configuration could not be loaded
    ConfigurationError,
}

impl GraphicsError {
    pub fn code(&self) -> ErrorCode {
        match self {
            GraphicsError::UnsupportedObjectKind { .. } => ErrorCode::InvalidObject,
            GraphicsError::UnsupportedFormat { .. } => ErrorCode::InvalidFormat,
            GraphicsError::NotSupported { .. } => ErrorCode::Unsupported,
            GraphicsError::UnknownWindow(_) => ErrorCode::InvalidState,
            GraphicsError::RenderThreadUnavailable | GraphicsError::Spawn(_) => {
                ErrorCode::ThreadCommunicationFailed
            }
            GraphicsError::Toolkit(_) => ErrorCode::PlatformError,
            GraphicsError::Config(_) => ErrorCode::ConfigurationError,
        }
    }

    /// Whether the caller can retry or correct the request without
    /// rebuilding the manager.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            GraphicsError::RenderThreadUnavailable | GraphicsError::Spawn(_)
        )
    }
}
