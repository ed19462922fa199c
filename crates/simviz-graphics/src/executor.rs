//! Execution strategies behind the window manager façade.
//!
//! The strategy is chosen once per manager. [`InlineExecutor`] drives the
//! toolkit from the calling thread; the rendering-thread strategy lives in
//! [`crate::render_thread`].

use crate::drawable::DrawableRef;
use crate::error::{GraphicsError, Result};
use crate::events::WindowObservers;
use crate::health::HealthState;
use crate::monitor::{Monitor, Shared};
use crate::painter::{Checkout, PaintMode, PaintOutcome, Painter};
use crate::toolkit::{Toolkit, ToolkitError};
use crate::window::WindowId;
use log::{debug, error, info};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

pub(crate) trait Executor: Send + Sync {
    /// Create (or revive) the window's handle without drawing.
    fn open(&self, window_id: Option<WindowId>) -> Result<WindowId>;

    /// Draw `drawable` into the window. With `refresh` a window whose handle
    /// was closed is left alone instead of being recreated.
    fn plot(
        &self,
        window_id: Option<WindowId>,
        drawable: DrawableRef,
        refresh: bool,
    ) -> Result<WindowId>;

    /// Tear down every window flagged for close.
    fn close(&self) -> Result<()>;

    /// Open capture streams for windows flagged for animation.
    fn start_animation(&self) -> Result<()>;

    fn save(&self, window_id: &WindowId, path: &Path, format: &str) -> Result<()>;

    /// Bring the registry's view of which handles the toolkit closed up to
    /// date, ahead of a selection.
    fn sync_liveness(&self) -> Result<()>;

    /// Return once work submitted before the call has been processed.
    fn flush(&self) -> Result<()>;

    /// Release every window and stop accepting work.
    fn shutdown(&mut self) -> Result<()>;
}

/// Fold a paint result into the health counters.
pub(crate) fn record_paint(
    health: &mut HealthState,
    result: &std::result::Result<PaintOutcome, ToolkitError>,
) -> bool {
    match result {
        Ok(outcome) => {
            health.errors += outcome.errors;
            if outcome.drawn {
                health.record_draw();
            }
            outcome.drawn
        }
        Err(_) => {
            health.record_error();
            false
        }
    }
}

/// Drop a record whose first render failed, so a failed `open_window` leaves
/// nothing behind and a generated id is handed out again.
fn discard_record<T: Toolkit>(
    shared: &mut Shared<T::Handle>,
    painter: &mut Painter<T>,
    id: &WindowId,
) {
    if let Some(state) = shared.registry.remove(id) {
        if state.handle.is_some() {
            painter.teardown(state);
        }
    }
    shared.registry.reclaim_id(id);
}

/// Runs every operation synchronously on the caller's thread while holding
/// the manager lock, so the toolkit is never entered by two threads at once.
pub(crate) struct InlineExecutor<T: Toolkit> {
    monitor: Arc<Monitor<T::Handle>>,
    painter: Mutex<Painter<T>>,
    observers: Arc<WindowObservers>,
}

impl<T: Toolkit> InlineExecutor<T> {
    pub fn new(
        painter: Painter<T>,
        monitor: Arc<Monitor<T::Handle>>,
        observers: Arc<WindowObservers>,
    ) -> Self {
        info!("graphics running inline on the calling thread");
        Self {
            monitor,
            painter: Mutex::new(painter),
            observers,
        }
    }

    /// Run `op` with the lock and the toolkit, then hand any lifecycle
    /// events to observers once both are released.
    fn with_toolkit<R>(&self, op: impl FnOnce(&mut Shared<T::Handle>, &mut Painter<T>) -> R) -> R {
        let (result, events) = {
            let mut shared = self.monitor.lock();
            let mut painter = self.painter.lock().unwrap_or_else(PoisonError::into_inner);
            let result = op(&mut *shared, &mut *painter);
            shared.health.record_pass();
            (result, painter.take_events())
        };
        self.observers.dispatch(events);
        result
    }

    fn render(
        &self,
        requested: Option<WindowId>,
        drawable: Option<DrawableRef>,
        refresh: bool,
    ) -> Result<WindowId> {
        self.with_toolkit(|shared, painter| {
            if !shared.running {
                return Err(GraphicsError::RenderThreadUnavailable);
            }
            let (id, created) = shared.claim(requested);
            let Some(state) = shared.registry.get_mut(&id) else {
                return Err(GraphicsError::UnknownWindow(id));
            };
            state.refresh = false;
            if state.close {
                if refresh {
                    debug!("refresh of '{id}' skipped: window is closing");
                    return Ok(id);
                }
                if let Some(old) = state.reopen() {
                    painter.retire(&id, old);
                }
            }
            let mode = if refresh {
                PaintMode::Refresh
            } else {
                PaintMode::Plot
            };
            let mut co = Checkout::take(state);
            let result = painter.paint(&mut co, drawable.as_ref(), mode);
            let drawn = record_paint(&mut shared.health, &result);
            let binding = if refresh { None } else { drawable };
            painter.note_liveness(&mut co);
            co.restore(state, binding, drawn);
            match result {
                Ok(_) => Ok(id),
                Err(err) => {
                    error!("window '{id}' could not be rendered: {err}");
                    if created {
                        discard_record(shared, painter, &id);
                    }
                    Err(GraphicsError::Toolkit(err))
                }
            }
        })
    }
}

impl<T: Toolkit> Executor for InlineExecutor<T> {
    fn open(&self, window_id: Option<WindowId>) -> Result<WindowId> {
        self.render(window_id, None, false)
    }

    fn plot(
        &self,
        window_id: Option<WindowId>,
        drawable: DrawableRef,
        refresh: bool,
    ) -> Result<WindowId> {
        self.render(window_id, Some(drawable), refresh)
    }

    fn close(&self) -> Result<()> {
        self.with_toolkit(|shared, painter| {
            for state in shared.registry.take_closing() {
                painter.teardown(state);
            }
            Ok(())
        })
    }

    fn start_animation(&self) -> Result<()> {
        self.with_toolkit(|shared, painter| {
            let pending: Vec<WindowId> = shared
                .registry
                .iter()
                .filter(|s| s.animate && !s.capturing && s.is_selectable() && s.handle.is_some())
                .map(|s| s.id().clone())
                .collect();
            for id in pending {
                if let Some(state) = shared.registry.get_mut(&id) {
                    let mut co = Checkout::take(state);
                    if !painter.start_capture(&mut co) {
                        shared.health.record_error();
                    }
                    painter.note_liveness(&mut co);
                    co.restore(state, None, false);
                }
            }
            Ok(())
        })
    }

    fn save(&self, window_id: &WindowId, path: &Path, format: &str) -> Result<()> {
        self.with_toolkit(|shared, painter| {
            if !shared.running {
                return Err(GraphicsError::RenderThreadUnavailable);
            }
            let state = shared
                .registry
                .get_mut(window_id)
                .ok_or_else(|| GraphicsError::UnknownWindow(window_id.clone()))?;
            let mut co = Checkout::take(state);
            let result = painter.save(&mut co, path, format);
            painter.note_liveness(&mut co);
            co.restore(state, None, false);
            if matches!(result, Err(GraphicsError::Toolkit(_))) {
                shared.health.record_error();
            }
            result
        })
    }

    fn sync_liveness(&self) -> Result<()> {
        self.with_toolkit(|shared, painter| {
            painter.sweep_closed(&mut shared.registry);
            Ok(())
        })
    }

    fn flush(&self) -> Result<()> {
        Ok(())
    }

    fn shutdown(&mut self) -> Result<()> {
        self.with_toolkit(|shared, painter| {
            shared.running = false;
            shared.exit = true;
            let windows = shared.registry.drain();
            debug!("inline shutdown releasing {} window(s)", windows.len());
            for state in windows {
                painter.teardown(state);
            }
        });
        self.monitor.notify();
        Ok(())
    }
}
