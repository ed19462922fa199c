//! Public façade: the window lifecycle operations callers use.
//!
//! A manager is an ordinary value. Hosts that want one per process keep it
//! in their own context and pass it around; tests build as many isolated
//! managers as they like.

use crate::config::GraphicsConfig;
use crate::drawable::{DrawableRef, SessionId};
use crate::error::{GraphicsError, Result};
use crate::events::{WindowEvent, WindowObservers};
use crate::executor::{Executor, InlineExecutor};
use crate::health::HealthReport;
use crate::mode::{resolve_mode, HostEnvironment, PresentationMode};
use crate::monitor::Monitor;
use crate::painter::Painter;
use crate::render_thread::{BackgroundExecutor, LoopTiming, RenderLoop};
use crate::toolkit::{normalize_format, Toolkit, ToolkitCapabilities};
use crate::window::{WindowId, WindowInfo};
use log::{debug, error, info, warn};
use std::path::PathBuf;
use std::sync::Arc;

pub struct WindowManager<T: Toolkit> {
    monitor: Arc<Monitor<T::Handle>>,
    executor: Box<dyn Executor>,
    observers: Arc<WindowObservers>,
    capabilities: ToolkitCapabilities,
    mode: PresentationMode,
    export_dir: PathBuf,
    shut_down: bool,
}

fn ensure_graphics(drawable: &DrawableRef) -> Result<()> {
    let kind = drawable.kind();
    if kind.is_graphics() {
        Ok(())
    } else {
        Err(GraphicsError::UnsupportedObjectKind {
            kind: kind.name().to_string(),
        })
    }
}

impl<T: Toolkit> WindowManager<T> {
    /// Build a manager, choosing the presentation mode from the host
    /// environment and `config`. The choice is fixed for the manager's
    /// lifetime.
    pub fn new(toolkit: T, config: GraphicsConfig) -> Result<Self> {
        let mode = resolve_mode(&HostEnvironment::detect(), config.mode, config.blocking);
        Self::with_mode(toolkit, config, mode)
    }

    pub fn with_mode(toolkit: T, config: GraphicsConfig, mode: PresentationMode) -> Result<Self> {
        let capabilities = toolkit.capabilities(mode);
        let monitor = Arc::new(Monitor::new());
        let observers = Arc::new(WindowObservers::default());
        let painter = Painter::new(toolkit, mode, config.animation_dir());

        let executor: Box<dyn Executor> = match mode {
            PresentationMode::Inline => Box::new(InlineExecutor::new(
                painter,
                Arc::clone(&monitor),
                Arc::clone(&observers),
            )),
            PresentationMode::Window => {
                let timing = LoopTiming {
                    pump_interval: config.pump_interval(),
                    live_refresh: config.live_refresh(),
                };
                let render_loop = RenderLoop::new(
                    painter,
                    Arc::clone(&monitor),
                    Arc::clone(&observers),
                    timing,
                );
                Box::new(BackgroundExecutor::spawn(render_loop, &config.thread_name)?)
            }
        };
        info!("window manager ready ({mode} mode)");

        Ok(Self {
            monitor,
            executor,
            observers,
            capabilities,
            mode,
            export_dir: config.export_dir(),
            shut_down: false,
        })
    }

    pub fn mode(&self) -> PresentationMode {
        self.mode
    }

    pub fn capabilities(&self) -> &ToolkitCapabilities {
        &self.capabilities
    }

    /// Open a window, generating a `window-<n>` id when none is given.
    /// Opening an existing window is a no-op unless its handle died, in
    /// which case a new one is created under the same id.
    pub fn open_window(&self, window_id: Option<WindowId>) -> Result<WindowId> {
        self.executor.open(window_id)
    }

    /// Bind `drawable` to a window without creating or drawing it.
    pub fn set_object_for_window(&self, drawable: DrawableRef, window_id: &WindowId) -> Result<()> {
        ensure_graphics(&drawable)?;
        {
            let mut shared = self.monitor.lock();
            if !shared.running {
                return Err(GraphicsError::RenderThreadUnavailable);
            }
            let (state, created) = shared.registry.ensure(window_id);
            state.bind(drawable);
            if created {
                debug!("window '{window_id}' registered without a handle");
            }
        }
        self.monitor.notify();
        Ok(())
    }

    /// Draw `drawable`, creating the window (or replacing a dead handle) if
    /// needed.
    pub fn plot(&self, drawable: DrawableRef, window_id: Option<WindowId>) -> Result<WindowId> {
        ensure_graphics(&drawable)?;
        self.executor.plot(window_id, drawable, false)
    }

    /// Redraw the selected windows with their bound drawables. Windows the
    /// toolkit reports closed are not selected.
    pub fn refresh_windows(
        &self,
        session: Option<&SessionId>,
        window_ids: Option<&[WindowId]>,
    ) -> Result<Vec<WindowId>> {
        self.executor.sync_liveness()?;
        let targets: Vec<(WindowId, DrawableRef)> = {
            let mut shared = self.monitor.lock();
            let selected = shared.registry.select(session, window_ids);
            let mut targets = Vec::with_capacity(selected.len());
            for id in selected {
                let Some(state) = shared.registry.get_mut(&id) else {
                    continue;
                };
                if let Some(drawable) = state.drawable.clone() {
                    state.refresh = true;
                    targets.push((id, drawable));
                }
            }
            targets
        };

        let mut refreshed = Vec::with_capacity(targets.len());
        for (id, drawable) in targets {
            refreshed.push(self.executor.plot(Some(id), drawable, true)?);
        }
        Ok(refreshed)
    }

    /// Start recording frames for the selected windows.
    pub fn animate_windows(
        &self,
        session: Option<&SessionId>,
        window_ids: Option<&[WindowId]>,
    ) -> Result<Vec<WindowId>> {
        if !self.capabilities.frame_capture {
            return Err(GraphicsError::NotSupported {
                operation: "animate_windows",
                mode: self.mode,
            });
        }
        self.executor.sync_liveness()?;
        let selected = {
            let mut shared = self.monitor.lock();
            if !shared.running {
                return Err(GraphicsError::RenderThreadUnavailable);
            }
            let selected = shared.registry.select(session, window_ids);
            for id in &selected {
                if let Some(state) = shared.registry.get_mut(id) {
                    state.animate = true;
                }
            }
            selected
        };
        self.executor.start_animation()?;
        Ok(selected)
    }

    /// Flag the selected windows for teardown. Inline managers release the
    /// handles before returning; window-mode managers do it on the next
    /// rendering pass (see [`WindowManager::flush`]).
    pub fn close_windows(
        &self,
        session: Option<&SessionId>,
        window_ids: Option<&[WindowId]>,
    ) -> Result<Vec<WindowId>> {
        let selected = {
            let mut shared = self.monitor.lock();
            if !shared.running {
                return Err(GraphicsError::RenderThreadUnavailable);
            }
            let selected = shared.registry.select_closable(session, window_ids);
            for id in &selected {
                if let Some(state) = shared.registry.get_mut(id) {
                    state.close = true;
                }
            }
            selected
        };
        if !selected.is_empty() {
            debug!("closing {} window(s)", selected.len());
        }
        self.executor.close()?;
        Ok(selected)
    }

    /// Export a window to `<export_dir>/<window_id>.<format>`.
    pub fn save_graphic(&self, window_id: &WindowId, format: &str) -> Result<PathBuf> {
        if !self.capabilities.supports_format(format) {
            return Err(GraphicsError::UnsupportedFormat {
                format: format.to_string(),
            });
        }
        let format = normalize_format(format);
        let path = self.export_dir.join(format!("{window_id}.{format}"));
        self.executor.save(window_id, &path, &format)?;
        Ok(path)
    }

    /// Block until work submitted before this call has been processed.
    pub fn flush(&self) -> Result<()> {
        self.executor.flush()
    }

    pub fn health(&self) -> HealthReport {
        let shared = self.monitor.lock();
        HealthReport::new(
            &shared.health,
            shared.running,
            shared.mailbox.coalesced(),
            shared.mailbox.is_pending(),
        )
    }

    /// Live windows (neither flagged for teardown nor closed by the toolkit),
    /// sorted.
    pub fn window_ids(&self) -> Vec<WindowId> {
        self.monitor.lock().registry.open_ids()
    }

    pub fn window_info(&self, window_id: &WindowId) -> Option<WindowInfo> {
        self.monitor.lock().registry.get(window_id).map(|s| s.info())
    }

    /// Observers run on the thread that drove the toolkit, after the manager
    /// lock is released. In window mode that is the rendering thread, so an
    /// observer must not call back into a blocking operation.
    pub fn add_observer<F>(&self, observer: F)
    where
        F: Fn(&WindowEvent) + Send + Sync + 'static,
    {
        self.observers.install(Arc::new(observer));
    }

    /// Close every window, stop the rendering thread and join it.
    pub fn shutdown(mut self) -> Result<()> {
        self.stop()
    }

    fn stop(&mut self) -> Result<()> {
        if self.shut_down {
            return Ok(());
        }
        self.shut_down = true;
        let result = self.executor.shutdown();
        info!("window manager shut down");
        result
    }
}

impl<T: Toolkit> Drop for WindowManager<T> {
    fn drop(&mut self) {
        if !self.shut_down {
            warn!("WindowManager dropped without explicit shutdown");
            if let Err(err) = self.stop() {
                error!("shutdown during drop failed: {err}");
            }
        }
    }
}
