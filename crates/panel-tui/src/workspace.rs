//! WorkspaceManager — which view is shown and which overlays are open.
//!
//! Tracks:
//! - The active view (control = locomotive list + cab, keyboard = switch grid)
//! - Help and info overlays, and the footer key hints
//! - The FocusRing for the active view

use crate::action::ComponentId;
use crate::focus::FocusRing;
use crate::selection::View;

pub struct WorkspaceManager {
    pub view: View,
    pub show_help: bool,
    pub show_info: bool,
    pub show_keys_bar: bool,
    pub focus: FocusRing,
}

impl WorkspaceManager {
    pub fn new(view: View) -> Self {
        let mut wm = Self {
            view,
            show_help: false,
            show_info: false,
            show_keys_bar: true,
            focus: FocusRing::default(),
        };
        wm.rebuild_focus_ring();
        wm
    }

    fn rebuild_focus_ring(&mut self) {
        let items = match self.view {
            View::Control => vec![ComponentId::CabPanel, ComponentId::LocoList],
            View::Keyboard => vec![ComponentId::SwitchGrid],
        };
        self.focus.set_items(items);
    }

    pub fn set_view(&mut self, view: View) {
        if self.view != view {
            self.view = view;
            self.rebuild_focus_ring();
        }
    }

    pub fn focused(&self) -> Option<ComponentId> {
        if self.show_help {
            Some(ComponentId::HelpOverlay)
        } else if self.show_info {
            Some(ComponentId::InfoOverlay)
        } else {
            self.focus.current()
        }
    }

    pub fn focus_next(&mut self) {
        self.focus.cycle(1);
    }

    pub fn focus_prev(&mut self) {
        self.focus.cycle(-1);
    }

    pub fn focus_pane(&mut self, id: ComponentId) {
        self.focus.set(id);
    }

    /// Overlays are exclusive; opening one closes the other.
    pub fn toggle_help(&mut self) {
        self.show_help = !self.show_help;
        if self.show_help {
            self.show_info = false;
        }
    }

    pub fn toggle_info(&mut self) {
        self.show_info = !self.show_info;
        if self.show_info {
            self.show_help = false;
        }
    }

    #[cfg(test)]
    pub fn overlay_open(&self) -> bool {
        self.show_help || self.show_info
    }
}
