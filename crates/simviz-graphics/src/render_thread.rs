//! Dedicated rendering thread: the only thread that touches the toolkit in
//! window mode.
//!
//! Callers post to the mailbox (or the job queue) under the shared lock and
//! block on the condition variable; the loop below consumes the work, runs the
//! toolkit without holding the lock, writes the results back and notifies.
//! Each pass runs, in order: pending closes, the mailbox request, queued
//! jobs, new capture streams, the live-refresh timer, and an event pump.

use crate::drawable::DrawableRef;
use crate::error::{GraphicsError, Result};
use crate::events::WindowObservers;
use crate::executor::{record_paint, Executor};
use crate::monitor::{JobAction, Monitor, Shared};
use crate::painter::{Checkout, PaintMode, Painter};
use crate::toolkit::Toolkit;
use crate::window::{WindowId, WindowState};
use log::{debug, error, info, warn};
use std::path::Path;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Timing knobs for the rendering loop.
#[derive(Debug, Clone, Copy)]
pub(crate) struct LoopTiming {
    pub pump_interval: Duration,
    pub live_refresh: Option<Duration>,
}

pub(crate) struct RenderLoop<T: Toolkit> {
    painter: Painter<T>,
    monitor: Arc<Monitor<T::Handle>>,
    observers: Arc<WindowObservers>,
    timing: LoopTiming,
    next_live: Option<Instant>,
}

/// Marks the manager stopped when the rendering thread ends, including by
/// panic, so that no caller stays blocked on the condition variable.
struct StopGuard<H> {
    monitor: Arc<Monitor<H>>,
}

impl<H> Drop for StopGuard<H> {
    fn drop(&mut self) {
        if thread::panicking() {
            error!("rendering thread panicked; releasing blocked callers");
        }
        let mut shared = self.monitor.lock();
        shared.running = false;
        shared.exit = true;
        shared.mailbox.discard();
        drop(shared);
        self.monitor.notify();
    }
}

/// Put a checked-out handle back into its registry record.
fn put_back<T: Toolkit>(
    painter: &mut Painter<T>,
    shared: &mut Shared<T::Handle>,
    mut co: Checkout<T::Handle>,
    binding: Option<DrawableRef>,
    drawn: bool,
) {
    painter.note_liveness(&mut co);
    match shared.registry.get_mut(&co.id) {
        Some(state) => co.restore(state, binding, drawn),
        None => {
            let Checkout { id, handle, .. } = co;
            warn!("window '{id}' vanished while being drawn");
            if let Some(handle) = handle {
                painter.release(&id, handle);
            }
        }
    }
}

impl<T: Toolkit> RenderLoop<T> {
    pub fn new(
        painter: Painter<T>,
        monitor: Arc<Monitor<T::Handle>>,
        observers: Arc<WindowObservers>,
        timing: LoopTiming,
    ) -> Self {
        Self {
            painter,
            monitor,
            observers,
            timing,
            next_live: None,
        }
    }

    fn run(mut self) {
        let _guard = StopGuard {
            monitor: Arc::clone(&self.monitor),
        };
        info!("rendering thread started");
        if let Some(period) = self.timing.live_refresh {
            self.next_live = Some(Instant::now() + period);
        }

        loop {
            let timeout = self.idle_timeout();
            let exit = {
                let shared = self.monitor.lock();
                let mut shared =
                    self.monitor
                        .wait_timeout_while(shared, timeout, |s| !s.has_work());
                shared.wake = false;
                shared.exit
            };
            if exit {
                info!("rendering thread received shutdown signal");
                break;
            }
            self.pass();
        }

        self.teardown_all();
        info!("rendering thread exiting");
    }

    fn idle_timeout(&self) -> Duration {
        match self.next_live {
            Some(at) => at
                .saturating_duration_since(Instant::now())
                .min(self.timing.pump_interval),
            None => self.timing.pump_interval,
        }
    }

    fn pass(&mut self) {
        self.close_pending();
        self.serve_request();
        self.run_jobs();
        self.start_captures();
        self.live_refresh();
        self.painter.pump_events(Duration::ZERO);

        let mut shared = self.monitor.lock();
        self.painter.sweep_closed(&mut shared.registry);
        shared.health.record_pass();
        drop(shared);
        self.monitor.notify();
    }

    fn dispatch_events(&mut self) {
        let events = self.painter.take_events();
        self.observers.dispatch(events);
    }

    fn close_pending(&mut self) {
        let closing = self.monitor.lock().registry.take_closing();
        if closing.is_empty() {
            return;
        }
        debug!("closing {} window(s)", closing.len());
        for state in closing {
            self.painter.teardown(state);
        }
        self.dispatch_events();
    }

    /// DRAW, REGISTER, NOTIFY for the request in the mailbox, if any.
    ///
    /// A plot or open aimed at a window flagged for teardown cancels the
    /// teardown: the old handle is released and a fresh one created. A
    /// refresh of such a window is acknowledged without drawing.
    fn serve_request(&mut self) {
        let (request, mut co, refresh, retired) = {
            let mut shared = self.monitor.lock();
            let Some(request) = shared.mailbox.take() else {
                return;
            };
            let (state, _) = shared.registry.ensure(&request.window_id);
            let refresh = std::mem::take(&mut state.refresh) && request.drawable.is_some();
            let closing = state.close;
            if closing && refresh {
                debug!("refresh of '{}' skipped: window is closing", request.window_id);
                shared.mailbox.acknowledge(request.ticket);
                drop(shared);
                self.monitor.notify();
                return;
            }
            let retired = if closing { state.reopen() } else { None };
            (request, Checkout::take(state), refresh, retired)
        };
        if let Some(old) = retired {
            self.painter.retire(&co.id, old);
        }

        let mode = if refresh {
            PaintMode::Refresh
        } else {
            PaintMode::Plot
        };
        let result = self.painter.paint(&mut co, request.drawable.as_ref(), mode);
        if let Err(err) = &result {
            error!("window '{}' could not be rendered: {err}", co.id);
        }
        self.dispatch_events();

        let mut shared = self.monitor.lock();
        let drawn = record_paint(&mut shared.health, &result);
        let binding = if refresh { None } else { request.drawable };
        put_back(&mut self.painter, &mut shared, co, binding, drawn);
        shared.mailbox.acknowledge(request.ticket);
        drop(shared);
        self.monitor.notify();
    }

    fn run_jobs(&mut self) {
        loop {
            let (job, co) = {
                let mut shared = self.monitor.lock();
                let Some(job) = shared.jobs.pop() else {
                    return;
                };
                let co = shared
                    .registry
                    .get_mut(&job.window_id)
                    .filter(|state| !state.close)
                    .map(Checkout::take);
                (job, co)
            };

            let (result, co) = match (&job.action, co) {
                (JobAction::Save { path, format }, Some(mut co)) => {
                    let result = self.painter.save(&mut co, path, format);
                    (result, Some(co))
                }
                (JobAction::Save { .. }, None) => {
                    (Err(GraphicsError::UnknownWindow(job.window_id.clone())), None)
                }
            };
            if let Err(err) = &result {
                warn!("job for window '{}' failed: {err}", job.window_id);
            }
            self.dispatch_events();

            let mut shared = self.monitor.lock();
            if let Some(co) = co {
                put_back(&mut self.painter, &mut shared, co, None, false);
            }
            if matches!(result, Err(GraphicsError::Toolkit(_))) {
                shared.health.record_error();
            }
            shared.jobs.complete(job.ticket, result);
            drop(shared);
            self.monitor.notify();
        }
    }

    /// Check out every open window with a handle that matches `wanted`.
    fn checkout_where(
        &self,
        wanted: impl Fn(&WindowState<T::Handle>) -> bool,
    ) -> Vec<Checkout<T::Handle>> {
        let mut shared = self.monitor.lock();
        let ids: Vec<WindowId> = shared
            .registry
            .iter()
            .filter(|state| state.is_selectable() && state.handle.is_some() && wanted(state))
            .map(|state| state.id().clone())
            .collect();
        let mut batch = Vec::with_capacity(ids.len());
        for id in &ids {
            if let Some(state) = shared.registry.get_mut(id) {
                batch.push(Checkout::take(state));
            }
        }
        batch
    }

    fn start_captures(&mut self) {
        let mut batch = self.checkout_where(|state| state.animate && !state.capturing);
        if batch.is_empty() {
            return;
        }
        let mut failures = 0;
        for co in &mut batch {
            if !self.painter.start_capture(co) {
                failures += 1;
            }
        }
        self.dispatch_events();

        let mut shared = self.monitor.lock();
        shared.health.errors += failures;
        for co in batch {
            put_back(&mut self.painter, &mut shared, co, None, false);
        }
    }

    /// Periodic redraw of windows whose bound drawable changed since their
    /// last draw. Never creates handles.
    fn live_refresh(&mut self) {
        let Some(period) = self.timing.live_refresh else {
            return;
        };
        let now = Instant::now();
        if self.next_live.is_some_and(|at| now < at) {
            return;
        }
        self.next_live = Some(now + period);

        let batch = self.checkout_where(|state| state.update && state.drawable.is_some());
        if batch.is_empty() {
            return;
        }
        let mut painted = Vec::with_capacity(batch.len());
        for mut co in batch {
            let drawable = co.bound.clone();
            let result = self.painter.paint(&mut co, drawable.as_ref(), PaintMode::Refresh);
            if let Err(err) = &result {
                warn!("live refresh of '{}' failed: {err}", co.id);
            }
            painted.push((co, result));
        }
        self.dispatch_events();

        let mut shared = self.monitor.lock();
        for (co, result) in painted {
            let drawn = record_paint(&mut shared.health, &result);
            put_back(&mut self.painter, &mut shared, co, None, drawn);
        }
    }

    /// Release every window, fail outstanding work and stop accepting more.
    fn teardown_all(&mut self) {
        let windows = {
            let mut shared = self.monitor.lock();
            shared.running = false;
            shared.mailbox.discard();
            while let Some(job) = shared.jobs.pop() {
                shared
                    .jobs
                    .complete(job.ticket, Err(GraphicsError::RenderThreadUnavailable));
            }
            shared.registry.drain()
        };
        debug!("rendering thread releasing {} window(s)", windows.len());
        for state in windows {
            self.painter.teardown(state);
        }
        self.dispatch_events();
        self.monitor.notify();
    }
}

/// Hands every operation to the rendering thread and blocks until it is
/// acknowledged.
pub(crate) struct BackgroundExecutor<H> {
    monitor: Arc<Monitor<H>>,
    thread: Option<JoinHandle<()>>,
}

impl<H: Send + 'static> BackgroundExecutor<H> {
    pub fn spawn<T>(render_loop: RenderLoop<T>, thread_name: &str) -> Result<Self>
    where
        T: Toolkit<Handle = H>,
    {
        let monitor = Arc::clone(&render_loop.monitor);
        let thread = thread::Builder::new()
            .name(thread_name.to_string())
            .spawn(move || render_loop.run())
            .map_err(GraphicsError::Spawn)?;
        Ok(Self {
            monitor,
            thread: Some(thread),
        })
    }

    /// Post to the mailbox and wait for the rendering thread to acknowledge
    /// this request or one that replaced it.
    fn submit(
        &self,
        requested: Option<WindowId>,
        drawable: Option<DrawableRef>,
        refresh: bool,
    ) -> Result<WindowId> {
        let mut shared = self.monitor.lock();
        if !shared.running {
            return Err(GraphicsError::RenderThreadUnavailable);
        }
        let (id, _) = shared.claim(requested);
        if let Some(state) = shared.registry.get_mut(&id) {
            state.refresh = refresh;
        }
        let ticket = shared.mailbox.post(id.clone(), drawable);
        self.monitor.notify();

        let shared = self
            .monitor
            .wait_while(shared, |s| s.running && !s.mailbox.is_acknowledged(ticket));
        if shared.mailbox.is_acknowledged(ticket) {
            Ok(id)
        } else {
            Err(GraphicsError::RenderThreadUnavailable)
        }
    }
}

impl<H: Send + 'static> Executor for BackgroundExecutor<H> {
    fn open(&self, window_id: Option<WindowId>) -> Result<WindowId> {
        self.submit(window_id, None, false)
    }

    fn plot(
        &self,
        window_id: Option<WindowId>,
        drawable: DrawableRef,
        refresh: bool,
    ) -> Result<WindowId> {
        self.submit(window_id, Some(drawable), refresh)
    }

    /// Teardown happens on the next pass; callers wanting to observe it use
    /// `flush`.
    fn close(&self) -> Result<()> {
        if !self.monitor.lock().running {
            return Err(GraphicsError::RenderThreadUnavailable);
        }
        self.monitor.notify();
        Ok(())
    }

    fn start_animation(&self) -> Result<()> {
        self.flush()
    }

    /// Every pass sweeps for closed handles, so one full pass is enough.
    fn sync_liveness(&self) -> Result<()> {
        self.flush()
    }

    fn save(&self, window_id: &WindowId, path: &Path, format: &str) -> Result<()> {
        let mut shared = self.monitor.lock();
        if !shared.running {
            return Err(GraphicsError::RenderThreadUnavailable);
        }
        let ticket = shared.jobs.submit(
            window_id.clone(),
            JobAction::Save {
                path: path.to_path_buf(),
                format: format.to_string(),
            },
        );
        self.monitor.notify();

        let mut shared = self
            .monitor
            .wait_while(shared, |s| s.running && !s.jobs.has_result(ticket));
        shared
            .jobs
            .take_result(ticket)
            .unwrap_or(Err(GraphicsError::RenderThreadUnavailable))
    }

    /// Wait for two completed passes: the one possibly in flight when called
    /// began earlier and does not count.
    fn flush(&self) -> Result<()> {
        let mut shared = self.monitor.lock();
        if !shared.running {
            return Err(GraphicsError::RenderThreadUnavailable);
        }
        let target = shared.health.passes + 2;
        shared.wake = true;
        self.monitor.notify();
        let shared = self
            .monitor
            .wait_while(shared, |s| s.running && s.health.passes < target);
        if shared.health.passes >= target {
            Ok(())
        } else {
            Err(GraphicsError::RenderThreadUnavailable)
        }
    }

    fn shutdown(&mut self) -> Result<()> {
        let Some(thread) = self.thread.take() else {
            return Ok(());
        };
        {
            let mut shared = self.monitor.lock();
            shared.exit = true;
            self.monitor.notify();
            let _stopped = self.monitor.wait_while(shared, |s| s.running);
        }
        match thread.join() {
            Ok(()) => {
                info!("rendering thread joined");
                Ok(())
            }
            Err(_) => {
                error!("rendering thread panicked before shutdown");
                Err(GraphicsError::RenderThreadUnavailable)
            }
        }
    }
}
