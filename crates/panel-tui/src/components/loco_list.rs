//! LocoList component — left pane of the control view.
//!
//! Mirrors the registry's catalog. Moving the cursor is local; Enter or a
//! click selects the locomotive for the cab.

use ratatui::crossterm::event::{
    KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};
use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use panel_proto::protocol::{LocoId, Locomotive};

use crate::{
    action::Action,
    app_state::AppState,
    component::Component,
    theme::{C_MUTED, C_NUMBER_HINT, C_PRIMARY, C_RUNNING, C_SECONDARY, C_SELECTION_BG},
    widgets::{
        filter_input::{FilterEvent, FilterInput},
        pane_chrome::{pane_chrome, Badge},
        scrollable_list::ScrollableList,
    },
};

pub struct LocoList {
    list: ScrollableList<Locomotive>,
    filter: FilterInput,
    generation: Option<u64>,
    badge: String,
}

fn loco_matches(loco: &Locomotive, query: &str) -> bool {
    let text = format!("{} {}", loco.display_name(), loco.uid).to_lowercase();
    query
        .to_lowercase()
        .split_whitespace()
        .all(|term| text.contains(term))
}

impl LocoList {
    pub fn new() -> Self {
        Self {
            list: ScrollableList::new(loco_matches),
            filter: FilterInput::new("name or uid…"),
            generation: None,
            badge: String::new(),
        }
    }

    /// Pick up a newly accepted catalog. The cursor lands on the selected
    /// locomotive.
    pub fn sync(&mut self, state: &AppState) {
        let generation = state.registry.accepted_generation();
        if self.generation == Some(generation) {
            return;
        }
        self.generation = Some(generation);
        let selected = state.selection.loco;
        self.list.set_items(
            state.registry.locos().iter().cloned().collect(),
            |l| Some(l.uid) == selected,
        );
        self.badge = format!("{}", state.registry.locos().len());
    }

    /// Move the cursor to `uid` without changing the cab.
    pub fn follow(&mut self, uid: LocoId) {
        self.list.select_where(|l| l.uid == uid);
    }

    fn choose(&self) -> Vec<Action> {
        match self.list.selected_item() {
            Some(loco) => vec![Action::SelectLoco(loco.uid)],
            None => vec![],
        }
    }
}

impl Default for LocoList {
    fn default() -> Self {
        Self::new()
    }
}

impl Component for LocoList {
    fn handle_key(&mut self, key: KeyEvent, _state: &AppState) -> Vec<Action> {
        if key.kind == KeyEventKind::Release {
            return vec![];
        }

        if self.filter.is_active() {
            match key.code {
                KeyCode::Up => self.list.select_up(1),
                KeyCode::Down => self.list.select_down(1),
                _ => match self.filter.handle_key(key) {
                    FilterEvent::Changed(q) => self.list.set_filter(&q),
                    FilterEvent::Confirmed => {
                        let mut actions = vec![Action::CloseFilter];
                        actions.extend(self.choose());
                        return actions;
                    }
                    FilterEvent::Cancelled => {
                        self.list.set_filter("");
                        return vec![Action::CloseFilter];
                    }
                },
            }
            return vec![];
        }

        let step = if key.modifiers.contains(KeyModifiers::SHIFT) { 5 } else { 1 };
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => self.list.select_up(step),
            KeyCode::Down | KeyCode::Char('j') => self.list.select_down(step),
            KeyCode::PageUp => self.list.select_up(10),
            KeyCode::PageDown => self.list.select_down(10),
            KeyCode::Home | KeyCode::Char('g') => self.list.select_first(),
            KeyCode::End | KeyCode::Char('G') => self.list.select_last(),
            KeyCode::Enter | KeyCode::Char(' ') => return self.choose(),
            KeyCode::Char('/') => {
                self.filter.activate();
                return vec![Action::OpenFilter];
            }
            _ => {}
        }
        vec![]
    }

    fn handle_mouse(&mut self, event: MouseEvent, area: Rect, _state: &AppState) -> Vec<Action> {
        match event.kind {
            MouseEventKind::ScrollUp => self.list.select_up(1),
            MouseEventKind::ScrollDown => self.list.select_down(1),
            MouseEventKind::Down(MouseButton::Left) => {
                if event.row <= area.y {
                    return vec![];
                }
                let row = (event.row - area.y - 1) as usize;
                if self.list.click(row) {
                    return self.choose();
                }
            }
            _ => {}
        }
        vec![]
    }

    fn on_action(&mut self, action: &Action, state: &AppState) -> Vec<Action> {
        if let Action::SelectLoco(uid) = action {
            self.follow(*uid);
        }
        self.sync(state);
        vec![]
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect, focused: bool, state: &AppState) {
        self.sync(state);
        let block = pane_chrome(
            "locomotives",
            Some('1'),
            focused,
            Some(Badge { text: &self.badge, color: C_NUMBER_HINT }),
        );
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let message = if !state.registry.is_loaded() {
            Some("  loading locomotives…")
        } else if self.list.total_len() == 0 {
            Some("  no locomotives on the server")
        } else if self.list.is_empty() {
            Some("  nothing matches the filter")
        } else {
            None
        };

        let list_h = if self.filter.is_active() {
            inner.height.saturating_sub(1)
        } else {
            inner.height
        };

        if let Some(msg) = message {
            frame.render_widget(
                Paragraph::new(Span::styled(msg, Style::default().fg(C_MUTED))),
                inner,
            );
        } else {
            self.list.ensure_visible(list_h as usize);
            let lines: Vec<Line> = self
                .list
                .window(list_h as usize)
                .map(|(is_cursor, loco)| {
                    let chosen = state.is_selected(loco.uid);
                    let marker = if chosen {
                        Span::styled(" ▶ ", Style::default().fg(C_RUNNING))
                    } else {
                        Span::raw("   ")
                    };
                    let name_style = match (chosen, is_cursor) {
                        (true, _) => Style::default().fg(C_PRIMARY).add_modifier(Modifier::BOLD),
                        (false, true) => Style::default().fg(C_PRIMARY),
                        (false, false) => Style::default().fg(C_SECONDARY),
                    };
                    let line = Line::from(vec![
                        marker,
                        Span::styled(loco.display_name(), name_style),
                        Span::styled(format!("  #{}", loco.uid), Style::default().fg(C_MUTED)),
                    ]);
                    if is_cursor && focused {
                        line.style(Style::default().bg(C_SELECTION_BG))
                    } else {
                        line
                    }
                })
                .collect();
            frame.render_widget(
                Paragraph::new(lines),
                Rect { height: list_h, ..inner },
            );
        }

        if self.filter.is_active() && inner.height > 0 {
            let filter_area = Rect {
                y: inner.y + inner.height - 1,
                height: 1,
                ..inner
            };
            self.filter.draw(frame, filter_area);
        }
    }
}
