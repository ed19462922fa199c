//! Mailbox and monitor shared between calling threads and the toolkit owner.
//!
//! One mutex guards everything (registry, mailbox, job queue, lifecycle
//! flags) and one condition variable carries both directions of signalling:
//! callers announce work, the rendering thread announces completion. Every
//! waiter re-checks its own predicate, so `notify_all` is always used.
//!
//! The render mailbox is a single slot. A write that lands before the
//! previous one was consumed replaces it (last writer wins); the overwritten
//! caller is released when the request that replaced it is acknowledged.

use crate::drawable::DrawableRef;
use crate::error::Result;
use crate::health::HealthState;
use crate::registry::WindowRegistry;
use crate::window::WindowId;
use log::debug;
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

pub(crate) struct RenderRequest {
    pub window_id: WindowId,
    /// `None` for a bare `open_window`
    pub drawable: Option<DrawableRef>,
    pub ticket: u64,
}

#[derive(Default)]
pub(crate) struct Mailbox {
    slot: Option<RenderRequest>,
    posted: u64,
    acknowledged: u64,
    coalesced: u64,
}

impl Mailbox {
    /// Store a request, replacing any unconsumed one. Returns the ticket the
    /// caller waits on.
    pub fn post(&mut self, window_id: WindowId, drawable: Option<DrawableRef>) -> u64 {
        self.posted += 1;
        let ticket = self.posted;
        let request = RenderRequest {
            window_id,
            drawable,
            ticket,
        };
        if let Some(replaced) = self.slot.replace(request) {
            self.coalesced += 1;
            debug!(
                "mailbox request for '{}' (ticket {}) replaced by ticket {ticket}",
                replaced.window_id, replaced.ticket
            );
        }
        ticket
    }

    pub fn take(&mut self) -> Option<RenderRequest> {
        self.slot.take()
    }

    pub fn is_pending(&self) -> bool {
        self.slot.is_some()
    }

    pub fn acknowledge(&mut self, ticket: u64) {
        self.acknowledged = self.acknowledged.max(ticket);
    }

    pub fn is_acknowledged(&self, ticket: u64) -> bool {
        self.acknowledged >= ticket
    }

    /// Drop a pending request that will never be served.
    pub fn discard(&mut self) {
        if let Some(dropped) = self.slot.take() {
            debug!(
                "discarding request for '{}' (ticket {})",
                dropped.window_id, dropped.ticket
            );
        }
    }

    pub fn coalesced(&self) -> u64 {
        self.coalesced
    }
}

pub(crate) enum JobAction {
    Save { path: PathBuf, format: String },
}

pub(crate) struct Job {
    pub ticket: u64,
    pub window_id: WindowId,
    pub action: JobAction,
}

/// Non-draw toolkit work executed by the toolkit owner, answered per ticket.
#[derive(Default)]
pub(crate) struct JobQueue {
    pending: VecDeque<Job>,
    results: HashMap<u64, Result<()>>,
    next_ticket: u64,
}

impl JobQueue {
    pub fn submit(&mut self, window_id: WindowId, action: JobAction) -> u64 {
        self.next_ticket += 1;
        let ticket = self.next_ticket;
        self.pending.push_back(Job {
            ticket,
            window_id,
            action,
        });
        ticket
    }

    pub fn pop(&mut self) -> Option<Job> {
        self.pending.pop_front()
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn complete(&mut self, ticket: u64, result: Result<()>) {
        self.results.insert(ticket, result);
    }

    pub fn has_result(&self, ticket: u64) -> bool {
        self.results.contains_key(&ticket)
    }

    pub fn take_result(&mut self, ticket: u64) -> Option<Result<()>> {
        self.results.remove(&ticket)
    }
}

pub(crate) struct Shared<H> {
    pub registry: WindowRegistry<H>,
    pub mailbox: Mailbox,
    pub jobs: JobQueue,
    /// Shutdown requested
    pub exit: bool,
    /// The toolkit owner still accepts work
    pub running: bool,
    /// Someone wants a pass even though nothing else is pending
    pub wake: bool,
    pub health: HealthState,
}

impl<H> Shared<H> {
    /// Resolve the target window of an open/plot, generating an id when the
    /// caller gave none, and make sure a registry record exists. The flag
    /// reports whether the record was created by this call.
    pub fn claim(&mut self, requested: Option<WindowId>) -> (WindowId, bool) {
        let id = requested.unwrap_or_else(|| self.registry.generate_id());
        let (_, created) = self.registry.ensure(&id);
        (id, created)
    }

    /// Anything the rendering thread should act on right now.
    pub fn has_work(&self) -> bool {
        self.exit
            || self.wake
            || self.mailbox.is_pending()
            || self.jobs.has_pending()
            || self.registry.has_closing()
            || self
                .registry
                .iter()
                .any(|state| {
                    state.animate
                        && !state.capturing
                        && !state.handle_closed
                        && state.handle.is_some()
                })
    }
}

pub(crate) struct Monitor<H> {
    state: Mutex<Shared<H>>,
    signal: Condvar,
}

impl<H> Monitor<H> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(Shared {
                registry: WindowRegistry::default(),
                mailbox: Mailbox::default(),
                jobs: JobQueue::default(),
                exit: false,
                running: true,
                wake: false,
                health: HealthState::default(),
            }),
            signal: Condvar::new(),
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, Shared<H>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn notify(&self) {
        self.signal.notify_all();
    }

    pub fn wait_while<'a, F>(
        &self,
        guard: MutexGuard<'a, Shared<H>>,
        condition: F,
    ) -> MutexGuard<'a, Shared<H>>
    where
        F: FnMut(&mut Shared<H>) -> bool,
    {
        self.signal
            .wait_while(guard, condition)
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn wait_timeout_while<'a, F>(
        &self,
        guard: MutexGuard<'a, Shared<H>>,
        timeout: Duration,
        condition: F,
    ) -> MutexGuard<'a, Shared<H>>
    where
        F: FnMut(&mut Shared<H>) -> bool,
    {
        match self.signal.wait_timeout_while(guard, timeout, condition) {
            Ok((guard, _)) => guard,
            Err(poisoned) => poisoned.into_inner().0,
        }
    }
}
