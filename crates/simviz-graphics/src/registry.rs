//! Window registry: window id -> [`WindowState`].
//!
//! Only ever accessed through the manager lock.

use crate::drawable::SessionId;
use crate::window::{WindowId, WindowState};
use std::collections::hash_map::Entry;
use std::collections::HashMap;

pub(crate) struct WindowRegistry<H> {
    windows: HashMap<WindowId, WindowState<H>>,
    next_index: u64,
}

impl<H> Default for WindowRegistry<H> {
    fn default() -> Self {
        Self {
            windows: HashMap::new(),
            next_index: 0,
        }
    }
}

impl<H> WindowRegistry<H> {
    /// Next free `window-<n>` id. The counter only moves forward, so ids are
    /// never handed out twice by the same registry.
    pub fn generate_id(&mut self) -> WindowId {
        loop {
            let id = WindowId::new(format!("window-{}", self.next_index));
            self.next_index += 1;
            if !self.windows.contains_key(&id) {
                return id;
            }
        }
    }

    pub fn get(&self, id: &WindowId) -> Option<&WindowState<H>> {
        self.windows.get(id)
    }

    pub fn get_mut(&mut self, id: &WindowId) -> Option<&mut WindowState<H>> {
        self.windows.get_mut(id)
    }

    /// Get the state for `id`, creating an empty record on first use.
    /// The flag reports whether the record was created by this call.
    pub fn ensure(&mut self, id: &WindowId) -> (&mut WindowState<H>, bool) {
        match self.windows.entry(id.clone()) {
            Entry::Occupied(entry) => (entry.into_mut(), false),
            Entry::Vacant(vacant) => (vacant.insert(WindowState::new(id.clone())), true),
        }
    }

    /// Windows eligible for refresh and animation.
    ///
    /// A window qualifies when it is not already closed (neither flagged for
    /// teardown nor reported closed by the toolkit), its bound drawable
    /// belongs to `session` (if given), and it is listed in `ids` (if given).
    pub fn select(&self, session: Option<&SessionId>, ids: Option<&[WindowId]>) -> Vec<WindowId> {
        self.matching(session, ids, WindowState::is_selectable)
    }

    /// Windows eligible for `close_windows`. Windows the user already closed
    /// are included so their records get cleaned up.
    pub fn select_closable(
        &self,
        session: Option<&SessionId>,
        ids: Option<&[WindowId]>,
    ) -> Vec<WindowId> {
        self.matching(session, ids, |state| !state.close)
    }

    fn matching(
        &self,
        session: Option<&SessionId>,
        ids: Option<&[WindowId]>,
        eligible: impl Fn(&WindowState<H>) -> bool,
    ) -> Vec<WindowId> {
        let mut selected: Vec<WindowId> = self
            .windows
            .values()
            .filter(|state| eligible(*state))
            .filter(|state| match session {
                None => true,
                Some(wanted) => state
                    .drawable
                    .as_ref()
                    .and_then(|d| d.owning_session())
                    .is_some_and(|owner| owner == *wanted),
            })
            .filter(|state| ids.map_or(true, |ids| ids.contains(state.id())))
            .map(|state| state.id().clone())
            .collect();
        selected.sort();
        selected
    }

    pub fn remove(&mut self, id: &WindowId) -> Option<WindowState<H>> {
        self.windows.remove(id)
    }

    /// Give back `id` if it is the most recently generated one, so a window
    /// that failed to materialize does not burn a number.
    pub fn reclaim_id(&mut self, id: &WindowId) {
        let Some(last) = self.next_index.checked_sub(1) else {
            return;
        };
        if id.as_str() == format!("window-{last}") && !self.windows.contains_key(id) {
            self.next_index = last;
        }
    }

    /// Remove every window flagged for teardown and hand them back so their
    /// handles can be released outside the lock.
    pub fn take_closing(&mut self) -> Vec<WindowState<H>> {
        let closing: Vec<WindowId> = self
            .windows
            .values()
            .filter(|state| state.close)
            .map(|state| state.id().clone())
            .collect();
        closing
            .iter()
            .filter_map(|id| self.windows.remove(id))
            .collect()
    }

    pub fn has_closing(&self) -> bool {
        self.windows.values().any(|state| state.close)
    }

    pub fn drain(&mut self) -> Vec<WindowState<H>> {
        self.windows.drain().map(|(_, state)| state).collect()
    }

    /// Ids of live windows, sorted.
    pub fn open_ids(&self) -> Vec<WindowId> {
        self.select(None, None)
    }

    pub fn iter(&self) -> impl Iterator<Item = &WindowState<H>> {
        self.windows.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut WindowState<H>> {
        self.windows.values_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drawable::{DrawableKind, GraphicsObject};

    type Registry = WindowRegistry<()>;

    #[test]
    fn generated_ids_are_monotonic() {
        let mut reg = Registry::default();
        let first = reg.generate_id();
        reg.ensure(&first);
        let second = reg.generate_id();
        assert_eq!(first.as_str(), "window-0");
        assert_eq!(second.as_str(), "window-1");
    }

    #[test]
    fn generated_ids_skip_caller_supplied_names() {
        let mut reg = Registry::default();
        reg.ensure(&WindowId::from("window-0"));
        reg.ensure(&WindowId::from("window-1"));
        assert_eq!(reg.generate_id().as_str(), "window-2");
    }

    #[test]
    fn ensure_is_idempotent() {
        let mut reg = Registry::default();
        let id = WindowId::from("w1");
        assert!(reg.ensure(&id).1);
        assert!(!reg.ensure(&id).1);
        assert_eq!(reg.iter().count(), 1);
    }

    #[test]
    fn select_applies_session_and_ids() {
        let mut reg = Registry::default();
        let a = WindowId::from("a");
        let b = WindowId::from("b");
        let c = WindowId::from("c");
        let s1 = SessionId::new("s1");
        reg.ensure(&a).0.bind(
            GraphicsObject::new(DrawableKind::Mesh, "m")
                .with_session(s1.clone())
                .into_ref(),
        );
        reg.ensure(&b).0.bind(
            GraphicsObject::new(DrawableKind::Mesh, "m")
                .with_session(SessionId::new("s2"))
                .into_ref(),
        );
        reg.ensure(&c);

        assert_eq!(reg.select(None, None), vec![a.clone(), b.clone(), c.clone()]);
        assert_eq!(reg.select(Some(&s1), None), vec![a.clone()]);
        assert_eq!(reg.select(None, Some(&[b.clone(), c.clone()])), vec![b, c]);
        assert!(reg.select(Some(&s1), Some(&[WindowId::from("zzz")])).is_empty());
    }

    #[test]
    fn closing_windows_are_excluded_and_taken() {
        let mut reg = Registry::default();
        let a = WindowId::from("a");
        reg.ensure(&a).0.close = true;
        reg.ensure(&WindowId::from("b"));
        assert_eq!(reg.open_ids(), vec![WindowId::from("b")]);
        assert!(reg.has_closing());
        let taken = reg.take_closing();
        assert_eq!(taken.len(), 1);
        assert_eq!(taken[0].id(), &a);
        assert!(reg.get(&a).is_none());
        assert!(!reg.has_closing());
    }

    #[test]
    fn user_closed_windows_are_only_closable() {
        let mut reg = Registry::default();
        let a = WindowId::from("a");
        reg.ensure(&a).0.handle_closed = true;
        reg.ensure(&WindowId::from("b"));
        assert_eq!(reg.select(None, None), vec![WindowId::from("b")]);
        assert_eq!(
            reg.select_closable(None, None),
            vec![a, WindowId::from("b")]
        );
    }

    #[test]
    fn reclaim_only_rewinds_the_last_generated_id() {
        let mut reg = Registry::default();
        let first = reg.generate_id();
        reg.ensure(&first);
        let failed = reg.generate_id();
        reg.reclaim_id(&first);
        reg.reclaim_id(&failed);
        assert_eq!(reg.generate_id(), failed);
        assert_eq!(reg.generate_id().as_str(), "window-2");
    }
}
