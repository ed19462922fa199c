//! SimViz Graphics - window lifecycle manager for simulation graphics.
//!
//! Callers on any thread open, plot, refresh, animate, close and export
//! windows through a [`WindowManager`]. The GUI toolkit behind it demands a
//! single owning thread, so in window mode every toolkit call is handed to a
//! dedicated rendering thread through a single-slot mailbox and the caller
//! blocks until it is acknowledged. In inline mode (notebooks, blocking
//! hosts) the same operations run synchronously on the caller's thread.

pub mod config;
pub mod drawable;
pub mod error;
pub mod events;
pub mod headless;
pub mod health;
pub mod manager;
pub mod mode;
pub mod toolkit;
pub mod window;

mod executor;
mod monitor;
mod painter;
mod registry;
mod render_thread;

pub use config::GraphicsConfig;
pub use drawable::{Drawable, DrawableKind, DrawableRef, GraphicsObject, SessionId};
pub use error::{ErrorCode, GraphicsError, Result};
pub use events::{WindowEvent, WindowEventKind, WindowObserver};
pub use headless::{HeadlessProbe, HeadlessToolkit, HeadlessWindow, WindowCounters};
pub use health::HealthReport;
pub use manager::WindowManager;
pub use mode::{renders_inline, resolve_mode, HostEnvironment, ModePreference, PresentationMode};
pub use toolkit::{Toolkit, ToolkitCapabilities, ToolkitError};
pub use window::{WindowId, WindowInfo};
