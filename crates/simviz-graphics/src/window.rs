//! Per-window lifecycle record.

use crate::drawable::{DrawableKind, DrawableRef};
use std::fmt;

/// Opaque window identity, unique within one manager.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WindowId(String);

impl WindowId {
    pub fn new(id: impl Into<String>) -> Self {
        WindowId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for WindowId {
    fn from(value: &str) -> Self {
        WindowId(value.to_string())
    }
}

impl From<String> for WindowId {
    fn from(value: String) -> Self {
        WindowId(value)
    }
}

/// State of one window. Owned by the registry; the toolkit handle is only
/// touched by whichever executor owns the toolkit.
pub(crate) struct WindowState<H> {
    id: WindowId,
    pub(crate) drawable: Option<DrawableRef>,
    pub(crate) handle: Option<H>,
    pub(crate) close: bool,
    pub(crate) refresh: bool,
    pub(crate) animate: bool,
    pub(crate) update: bool,
    /// A frame-capture stream is open on the current handle.
    pub(crate) capturing: bool,
    /// The toolkit reported the handle closed (e.g. the user closed it).
    pub(crate) handle_closed: bool,
}

impl<H> WindowState<H> {
    pub(crate) fn new(id: WindowId) -> Self {
        Self {
            id,
            drawable: None,
            handle: None,
            close: false,
            refresh: false,
            animate: false,
            update: false,
            capturing: false,
            handle_closed: false,
        }
    }

    pub fn id(&self) -> &WindowId {
        &self.id
    }

    /// Rebind the drawable and flag the window for redraw.
    pub(crate) fn bind(&mut self, drawable: DrawableRef) {
        self.drawable = Some(drawable);
        self.update = true;
    }

    /// Whether the record is a candidate for refresh and animation: not
    /// flagged for teardown and its handle, if any, not closed by the toolkit.
    pub(crate) fn is_selectable(&self) -> bool {
        !self.close && !self.handle_closed
    }

    /// Cancel a pending teardown because the window is being plotted again.
    /// The old handle is returned for release; the next paint creates a
    /// fresh one.
    pub(crate) fn reopen(&mut self) -> Option<H> {
        self.close = false;
        self.refresh = false;
        self.animate = false;
        self.capturing = false;
        self.handle_closed = false;
        self.handle.take()
    }

    pub(crate) fn info(&self) -> WindowInfo {
        WindowInfo {
            id: self.id.clone(),
            has_handle: self.handle.is_some(),
            drawable_kind: self.drawable.as_ref().map(|d| d.kind()),
            close: self.close,
            refresh: self.refresh,
            animate: self.animate,
            update: self.update,
            capturing: self.capturing,
            handle_closed: self.handle_closed,
        }
    }
}

impl<H> fmt::Debug for WindowState<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WindowState")
            .field("id", &self.id)
            .field("drawable", &self.drawable)
            .field("has_handle", &self.handle.is_some())
            .field("close", &self.close)
            .field("refresh", &self.refresh)
            .field("animate", &self.animate)
            .field("update", &self.update)
            .field("handle_closed", &self.handle_closed)
            .finish()
    }
}

/// Snapshot of a window's state for callers; carries no toolkit types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowInfo {
    pub id: WindowId,
    pub has_handle: bool,
    pub drawable_kind: Option<DrawableKind>,
    pub close: bool,
    pub refresh: bool,
    pub animate: bool,
    pub update: bool,
    pub capturing: bool,
    /// The toolkit reported the window closed; `plot` recreates it
    pub handle_closed: bool,
}
