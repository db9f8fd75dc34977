//! InfoOverlay component — the control server's list-management actions.
//!
//! Each entry is sent as a custom event on locomotive 1. Number keys pick an
//! entry directly; arrows + Enter or a click work too.

use ratatui::crossterm::event::{
    KeyCode, KeyEvent, KeyEventKind, MouseButton, MouseEvent, MouseEventKind,
};
use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

use panel_proto::protocol::InfoAction;

use crate::{
    action::Action,
    app_state::AppState,
    component::Component,
    components::help_overlay::{centered_rect, C_POPUP_BG},
    theme::{C_MUTED, C_NUMBER_HINT, C_PANEL_BORDER, C_PRIMARY, C_SECONDARY, C_SELECTION_BG},
};

pub struct InfoOverlay {
    pub visible: bool,
    cursor: usize,
    rows: Vec<(Rect, usize)>,
}

impl InfoOverlay {
    pub fn new() -> Self {
        Self {
            visible: false,
            cursor: 0,
            rows: Vec::new(),
        }
    }

    fn send(&self, idx: usize) -> Vec<Action> {
        match InfoAction::ALL.get(idx) {
            Some(&info) => vec![Action::SendInfo(info), Action::ToggleInfo],
            None => vec![],
        }
    }
}

impl Default for InfoOverlay {
    fn default() -> Self {
        Self::new()
    }
}

impl Component for InfoOverlay {
    fn handle_key(&mut self, key: KeyEvent, _state: &AppState) -> Vec<Action> {
        if key.kind == KeyEventKind::Release || !self.visible {
            return vec![];
        }
        let n = InfoAction::ALL.len();
        match key.code {
            KeyCode::Esc | KeyCode::Char('i') | KeyCode::Char('q') => vec![Action::ToggleInfo],
            KeyCode::Up | KeyCode::Char('k') => {
                self.cursor = (self.cursor + n - 1) % n;
                vec![]
            }
            KeyCode::Down | KeyCode::Char('j') => {
                self.cursor = (self.cursor + 1) % n;
                vec![]
            }
            KeyCode::Enter => self.send(self.cursor),
            KeyCode::Char(c @ '1'..='9') => self.send(c as usize - '1' as usize),
            _ => vec![],
        }
    }

    fn handle_mouse(&mut self, event: MouseEvent, _area: Rect, _state: &AppState) -> Vec<Action> {
        if !self.visible {
            return vec![];
        }
        if let MouseEventKind::Down(MouseButton::Left) = event.kind {
            let found = self.rows.iter().find(|(r, _)| {
                event.column >= r.x
                    && event.column < r.x + r.width
                    && event.row >= r.y
                    && event.row < r.y + r.height
            });
            if let Some(&(_, idx)) = found {
                self.cursor = idx;
                return self.send(idx);
            }
        }
        vec![]
    }

    fn on_action(&mut self, action: &Action, _state: &AppState) -> Vec<Action> {
        match action {
            Action::ToggleInfo => {
                self.visible = !self.visible;
                self.cursor = 0;
            }
            Action::ToggleHelp => self.visible = false,
            _ => {}
        }
        vec![]
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect, _focused: bool, _state: &AppState) {
        self.rows.clear();
        if !self.visible {
            return;
        }
        let height = InfoAction::ALL.len() as u16 + 6;
        let popup = centered_rect(56, height, area);
        frame.render_widget(Clear, popup);
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(C_PANEL_BORDER))
            .style(Style::default().bg(C_POPUP_BG))
            .title(Span::styled(
                " list actions ",
                Style::default().fg(C_PRIMARY).add_modifier(Modifier::BOLD),
            ));
        let inner = block.inner(popup);
        frame.render_widget(block, popup);

        let mut lines = vec![Line::from("")];
        for (idx, info) in InfoAction::ALL.iter().enumerate() {
            let style = if idx == self.cursor {
                Style::default().fg(C_PRIMARY).bg(C_SELECTION_BG).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(C_SECONDARY)
            };
            lines.push(Line::from(vec![
                Span::styled(format!(" {} ", idx + 1), Style::default().fg(C_NUMBER_HINT)),
                Span::styled(info.label(), style),
            ]));
            let y = inner.y + 1 + idx as u16;
            if y < inner.y + inner.height {
                self.rows.push((Rect { x: inner.x, y, width: inner.width, height: 1 }, idx));
            }
        }
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            " 1-4 or enter to send, esc to close",
            Style::default().fg(C_MUTED),
        )));
        frame.render_widget(Paragraph::new(lines), inner);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::SwitchMatrix;
    use crate::selection::Selection;
    use ratatui::crossterm::event::KeyModifiers;

    fn state() -> AppState {
        AppState::new(SwitchMatrix::new(8, 64, 4), Selection::default(), "http://x/static", 50)
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn test_number_key_sends_and_closes() {
        let s = state();
        let mut o = InfoOverlay::new();
        o.on_action(&Action::ToggleInfo, &s);
        assert_eq!(
            o.handle_key(key(KeyCode::Char('3')), &s),
            vec![Action::SendInfo(InfoAction::ALL[2]), Action::ToggleInfo]
        );
        assert!(o.handle_key(key(KeyCode::Char('9')), &s).is_empty());
    }

    #[test]
    fn test_cursor_wraps_and_enter_sends() {
        let s = state();
        let mut o = InfoOverlay::new();
        o.on_action(&Action::ToggleInfo, &s);
        o.handle_key(key(KeyCode::Up), &s);
        assert_eq!(
            o.handle_key(key(KeyCode::Enter), &s),
            vec![Action::SendInfo(InfoAction::ALL[3]), Action::ToggleInfo]
        );
    }

    #[test]
    fn test_hidden_overlay_ignores_input() {
        let s = state();
        let mut o = InfoOverlay::new();
        assert!(o.handle_key(key(KeyCode::Enter), &s).is_empty());
    }
}
