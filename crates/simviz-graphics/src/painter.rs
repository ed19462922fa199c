//! Toolkit-facing half of every lifecycle operation.
//!
//! Both executors move a window's handle out of the registry into a
//! [`Checkout`], run the toolkit work here, and move it back. In window mode
//! this happens on the rendering thread with the lock released; in inline
//! mode it happens on the caller's thread with the lock held. Lifecycle
//! events are buffered and handed to observers by the executor once no lock
//! is held.

use crate::drawable::DrawableRef;
use crate::error::GraphicsError;
use crate::events::{WindowEvent, WindowEventKind};
use crate::mode::PresentationMode;
use crate::registry::WindowRegistry;
use crate::toolkit::{Toolkit, ToolkitError};
use crate::window::{WindowId, WindowState};
use log::{debug, error, info, warn};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// A window's handle and flags, moved out of the registry while the toolkit
/// works on them.
pub(crate) struct Checkout<H> {
    pub id: WindowId,
    pub handle: Option<H>,
    pub bound: Option<DrawableRef>,
    pub animate: bool,
    pub capturing: bool,
    /// Opening a capture stream failed; animation is switched off on restore
    pub capture_failed: bool,
    /// The toolkit reports the handle closed
    pub handle_closed: bool,
}

impl<H> Checkout<H> {
    pub fn take(state: &mut WindowState<H>) -> Self {
        Self {
            id: state.id().clone(),
            handle: state.handle.take(),
            bound: state.drawable.clone(),
            animate: state.animate,
            capturing: state.capturing,
            capture_failed: false,
            handle_closed: state.handle_closed,
        }
    }

    /// Put the handle back, rebinding `binding` if given. A successful draw
    /// consumes the pending-update flag.
    pub fn restore(self, state: &mut WindowState<H>, binding: Option<DrawableRef>, drawn: bool) {
        state.handle = self.handle;
        state.capturing = self.capturing;
        state.handle_closed = self.handle_closed;
        if self.capture_failed {
            state.animate = false;
        }
        if let Some(drawable) = binding {
            state.bind(drawable);
        }
        if drawn {
            state.update = false;
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum PaintMode {
    /// Create or recreate the handle as needed
    Plot,
    /// Redraw without recreating: a handle that was closed stays closed,
    /// one that never existed is created
    Refresh,
}

#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct PaintOutcome {
    pub created: bool,
    pub drawn: bool,
    /// Failures recovered or swallowed along the way
    pub errors: u64,
}

pub(crate) struct Painter<T: Toolkit> {
    toolkit: T,
    mode: PresentationMode,
    animation_dir: PathBuf,
    events: Vec<WindowEvent>,
}

impl<T: Toolkit> Painter<T> {
    pub fn new(toolkit: T, mode: PresentationMode, animation_dir: PathBuf) -> Self {
        Self {
            toolkit,
            mode,
            animation_dir,
            events: Vec::new(),
        }
    }

    fn emit(&mut self, id: &WindowId, kind: WindowEventKind) {
        self.events.push(WindowEvent {
            window_id: id.clone(),
            kind,
        });
    }

    /// Events produced since the last call, oldest first.
    pub fn take_events(&mut self) -> Vec<WindowEvent> {
        std::mem::take(&mut self.events)
    }

    fn handle_alive(&self, handle: &Option<T::Handle>) -> bool {
        handle
            .as_ref()
            .map(|h| !self.toolkit.is_closed(h))
            .unwrap_or(false)
    }

    /// Record whether the toolkit still considers the checked-out handle
    /// open. Called before every restore.
    pub fn note_liveness(&self, co: &mut Checkout<T::Handle>) {
        co.handle_closed = co.handle.is_some() && !self.handle_alive(&co.handle);
    }

    /// Mark every registered handle the toolkit reports closed. Returns how
    /// many were newly found closed.
    pub fn sweep_closed(&self, registry: &mut WindowRegistry<T::Handle>) -> usize {
        let mut found = 0;
        for state in registry.iter_mut() {
            if state.handle_closed {
                continue;
            }
            let closed = state
                .handle
                .as_ref()
                .is_some_and(|handle| self.toolkit.is_closed(handle));
            if closed {
                debug!("window '{}' was closed outside the manager", state.id());
                state.handle_closed = true;
                found += 1;
            }
        }
        found
    }

    /// Make the checkout hold a live handle. Returns whether one was created.
    pub fn ensure_handle(&mut self, co: &mut Checkout<T::Handle>) -> Result<bool, ToolkitError> {
        if self.handle_alive(&co.handle) {
            return Ok(false);
        }
        if let Some(dead) = co.handle.take() {
            debug!("window '{}' reported closed, recreating", co.id);
            self.release(&co.id, dead);
        }
        self.create(co)?;
        Ok(true)
    }

    fn create(&mut self, co: &mut Checkout<T::Handle>) -> Result<(), ToolkitError> {
        let handle = self.toolkit.create_handle(&co.id, self.mode)?;
        co.handle = Some(handle);
        co.capturing = false;
        info!("created window '{}' ({} mode)", co.id, self.mode);
        self.emit(&co.id, WindowEventKind::Created);
        Ok(())
    }

    /// Draw `drawable` (if any) into the window.
    ///
    /// A stale handle is replaced and the draw retried once; a second failure
    /// is logged and swallowed. Creation failures and other toolkit errors
    /// are returned.
    pub fn paint(
        &mut self,
        co: &mut Checkout<T::Handle>,
        drawable: Option<&DrawableRef>,
        mode: PaintMode,
    ) -> Result<PaintOutcome, ToolkitError> {
        let mut outcome = PaintOutcome::default();
        match mode {
            PaintMode::Plot => outcome.created = self.ensure_handle(co)?,
            PaintMode::Refresh => {
                if co.handle.is_none() {
                    outcome.created = self.ensure_handle(co)?;
                } else if !self.handle_alive(&co.handle) {
                    debug!("refresh of '{}' skipped: window was closed", co.id);
                    return Ok(outcome);
                }
            }
        }

        let Some(drawable) = drawable else {
            return Ok(outcome);
        };

        let drawn = self.draw_with_retry(co, drawable, &mut outcome)?;
        outcome.drawn = drawn;
        if outcome.drawn {
            self.emit(&co.id, WindowEventKind::Drawn);
            if co.animate {
                self.capture(co, &mut outcome);
            }
        }
        Ok(outcome)
    }

    fn draw_with_retry(
        &mut self,
        co: &mut Checkout<T::Handle>,
        drawable: &DrawableRef,
        outcome: &mut PaintOutcome,
    ) -> Result<bool, ToolkitError> {
        let Some(handle) = co.handle.as_mut() else {
            return Ok(false);
        };
        match self.toolkit.draw(handle, drawable.as_ref()) {
            Ok(()) => return Ok(true),
            Err(ToolkitError::StaleHandle) => {
                warn!("window '{}' handle went stale during draw, recreating", co.id);
                outcome.errors += 1;
            }
            Err(err) => return Err(err),
        }

        if let Some(stale) = co.handle.take() {
            self.release(&co.id, stale);
        }
        self.create(co)?;
        outcome.created = true;
        let Some(handle) = co.handle.as_mut() else {
            return Ok(false);
        };
        match self.toolkit.draw(handle, drawable.as_ref()) {
            Ok(()) => Ok(true),
            Err(err) => {
                error!("window '{}' draw failed after recreation: {err}", co.id);
                outcome.errors += 1;
                Ok(false)
            }
        }
    }

    /// Append a frame to the window's capture stream, opening it first if
    /// needed. Failures are logged; an unopenable stream turns animation off.
    fn capture(&mut self, co: &mut Checkout<T::Handle>, outcome: &mut PaintOutcome) {
        if !co.capturing && !self.start_capture(co) {
            outcome.errors += 1;
            return;
        }
        if let Some(handle) = co.handle.as_mut() {
            if let Err(err) = self.toolkit.capture_frame(handle) {
                warn!("window '{}' frame capture failed: {err}", co.id);
                outcome.errors += 1;
            }
        }
    }

    /// Open a frame-capture stream for an animating window.
    pub fn start_capture(&mut self, co: &mut Checkout<T::Handle>) -> bool {
        let path = self.animation_dir.join(co.id.as_str());
        let Some(handle) = co.handle.as_mut() else {
            return false;
        };
        match self.toolkit.open_frame_capture(handle, &path) {
            Ok(()) => {
                co.capturing = true;
                info!(
                    "window '{}' capturing frames to {}",
                    co.id,
                    path.display()
                );
                self.emit(&co.id, WindowEventKind::CaptureStarted);
                true
            }
            Err(err) => {
                warn!("window '{}' could not start frame capture: {err}", co.id);
                co.animate = false;
                co.capture_failed = true;
                false
            }
        }
    }

    /// Export the window. A stale handle is recreated, redrawn with the
    /// bound drawable and the export retried once.
    pub fn save(
        &mut self,
        co: &mut Checkout<T::Handle>,
        path: &Path,
        format: &str,
    ) -> Result<(), GraphicsError> {
        if !self.handle_alive(&co.handle) {
            return Err(GraphicsError::UnknownWindow(co.id.clone()));
        }
        let first = match co.handle.as_mut() {
            Some(handle) => self.toolkit.save(handle, path, format),
            None => return Err(GraphicsError::UnknownWindow(co.id.clone())),
        };
        let result = match first {
            Err(ToolkitError::StaleHandle) => {
                warn!("window '{}' handle went stale during export, recreating", co.id);
                if let Some(stale) = co.handle.take() {
                    self.release(&co.id, stale);
                }
                self.create(co)?;
                let bound = co.bound.clone();
                let handle = co
                    .handle
                    .as_mut()
                    .ok_or_else(|| GraphicsError::UnknownWindow(co.id.clone()))?;
                if let Some(drawable) = bound {
                    self.toolkit.draw(handle, drawable.as_ref())?;
                }
                self.toolkit.save(handle, path, format)
            }
            other => other,
        };
        match result {
            Ok(()) => {
                info!("window '{}' saved to {}", co.id, path.display());
                self.emit(&co.id, WindowEventKind::Saved);
                Ok(())
            }
            Err(ToolkitError::UnsupportedFormat(format)) => {
                Err(GraphicsError::UnsupportedFormat { format })
            }
            Err(err) => Err(GraphicsError::Toolkit(err)),
        }
    }

    /// Release a handle without touching the registry. Failures are logged.
    pub fn release(&mut self, id: &WindowId, handle: T::Handle) {
        if let Err(err) = self.toolkit.close(handle) {
            warn!("window '{id}' did not close cleanly: {err}");
        }
    }

    /// Release the handle of a window whose pending teardown was cancelled by
    /// a new plot. Observers see it closed before the replacement is created.
    pub fn retire(&mut self, id: &WindowId, handle: T::Handle) {
        self.release(id, handle);
        info!("window '{id}' closed before being plotted again");
        self.emit(id, WindowEventKind::Closed);
    }

    /// Final teardown of a window removed from the registry.
    pub fn teardown(&mut self, mut state: WindowState<T::Handle>) {
        if let Some(handle) = state.handle.take() {
            self.release(state.id(), handle);
        }
        debug!("window '{}' torn down", state.id());
        self.emit(state.id(), WindowEventKind::Closed);
    }

    pub fn pump_events(&mut self, budget: Duration) {
        self.toolkit.pump_events(budget);
    }
}
