//! FocusRing — keyboard focus cycling between the panes of the current view.

use crate::action::ComponentId;

#[derive(Debug, Default)]
pub struct FocusRing {
    items: Vec<ComponentId>,
    current: usize,
}

impl FocusRing {
    #[cfg(test)]
    pub fn new(items: Vec<ComponentId>) -> Self {
        Self { items, current: 0 }
    }

    pub fn current(&self) -> Option<ComponentId> {
        self.items.get(self.current).copied()
    }

    /// Move `step` places around the ring (negative goes backwards).
    pub fn cycle(&mut self, step: isize) -> Option<ComponentId> {
        let len = self.items.len() as isize;
        if len == 0 {
            return None;
        }
        self.current = (self.current as isize + step).rem_euclid(len) as usize;
        self.current()
    }

    /// Focus `id` if it is part of the ring. Returns whether it is.
    pub fn set(&mut self, id: ComponentId) -> bool {
        match self.items.iter().position(|&x| x == id) {
            Some(pos) => {
                self.current = pos;
                true
            }
            None => false,
        }
    }

    #[cfg(test)]
    pub fn is_focused(&self, id: ComponentId) -> bool {
        self.current() == Some(id)
    }

    /// Replace the ring, keeping focus on the same component when it survives.
    pub fn set_items(&mut self, items: Vec<ComponentId>) {
        let old = self.current();
        self.items = items;
        self.current = 0;
        if let Some(id) = old {
            self.set(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_wraps_both_ways() {
        let mut ring = FocusRing::new(vec![ComponentId::LocoList, ComponentId::CabPanel]);
        assert_eq!(ring.cycle(1), Some(ComponentId::CabPanel));
        assert_eq!(ring.cycle(1), Some(ComponentId::LocoList));
        assert_eq!(ring.cycle(-1), Some(ComponentId::CabPanel));
        assert_eq!(FocusRing::default().cycle(1), None);
    }

    #[test]
    fn test_set_items_keeps_surviving_focus() {
        let mut ring = FocusRing::new(vec![ComponentId::LocoList, ComponentId::CabPanel]);
        ring.set(ComponentId::CabPanel);
        ring.set_items(vec![ComponentId::SwitchGrid]);
        assert!(ring.is_focused(ComponentId::SwitchGrid));
        ring.set_items(vec![ComponentId::LocoList, ComponentId::SwitchGrid]);
        assert!(ring.is_focused(ComponentId::SwitchGrid));
        assert!(!ring.set(ComponentId::HelpOverlay));
    }
}
