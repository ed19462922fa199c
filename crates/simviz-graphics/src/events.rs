//! Window lifecycle notifications.

use crate::window::WindowId;
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WindowEventKind {
    /// A toolkit handle was created (first open, or recreation of a dead one)
    Created,
    /// A drawable was drawn into the window
    Drawn,
    /// The handle was released and the window removed from the registry
    Closed,
    /// The window was exported through `save_graphic`
    Saved,
    /// A frame-capture stream was opened
    CaptureStarted,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WindowEvent {
    pub window_id: WindowId,
    pub kind: WindowEventKind,
}

pub type WindowObserver = dyn Fn(&WindowEvent) + Send + Sync + 'static;

/// Observers run on whichever thread touched the toolkit, never while the
/// manager lock is held.
#[derive(Default)]
pub(crate) struct WindowObservers {
    observers: Mutex<Vec<Arc<WindowObserver>>>,
}

impl WindowObservers {
    pub fn install(&self, observer: Arc<WindowObserver>) {
        self.observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(observer);
    }

    fn snapshot(&self) -> Vec<Arc<WindowObserver>> {
        self.observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Deliver buffered events in order.
    pub fn dispatch(&self, events: Vec<WindowEvent>) {
        if events.is_empty() {
            return;
        }
        let observers = self.snapshot();
        if observers.is_empty() {
            return;
        }
        for event in &events {
            for observer in &observers {
                observer(event);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn observers_receive_events_in_install_order() {
        let observers = WindowObservers::default();
        let seen = Arc::new(Mutex::new(Vec::new()));
        for tag in ["first", "second"] {
            let seen = Arc::clone(&seen);
            observers.install(Arc::new(move |event: &WindowEvent| {
                seen.lock().unwrap().push((tag, event.kind));
            }));
        }
        observers.dispatch(vec![WindowEvent {
            window_id: WindowId::from("w"),
            kind: WindowEventKind::Created,
        }]);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                ("first", WindowEventKind::Created),
                ("second", WindowEventKind::Created)
            ]
        );
    }
}
