//! SwitchGrid component — the paged switch keyboard.
//!
//! One page shows `group_size` groups laid out in `columns` columns. Each
//! group is a label over a red/green button pair. Exactly one button of a
//! pair is lit; pressing one sends the command and waits for the push.

use ratatui::crossterm::event::{
    KeyCode, KeyEvent, KeyEventKind, MouseButton, MouseEvent, MouseEventKind,
};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};
use unicode_width::UnicodeWidthChar;

use crate::{
    action::Action,
    app_state::AppState,
    component::Component,
    icons::switch_icon,
    matrix::{PairState, Side},
    theme::{
        C_MUTED, C_NUMBER_HINT, C_PRIMARY, C_SECONDARY, C_SELECTION_BG, C_SWITCH_GREEN,
        C_SWITCH_IDLE, C_SWITCH_RED,
    },
    widgets::pane_chrome::{pane_chrome, Badge},
};

const CELL_HEIGHT: u16 = 3;

pub struct SwitchGrid {
    cursor: usize,
    buttons: Vec<(Rect, usize, Side)>,
    labels: Vec<(Rect, usize)>,
    page_tabs: Vec<(Rect, usize)>,
    badge: String,
}

fn hit(r: Rect, col: u16, row: u16) -> bool {
    col >= r.x && col < r.x + r.width && row >= r.y && row < r.y + r.height
}

/// Cut `label` to `width` terminal cells, marking the cut with `…`.
pub fn fit(label: &str, width: usize) -> String {
    let total: usize = label.chars().map(|c| c.width().unwrap_or(0)).sum();
    if total <= width {
        return label.to_string();
    }
    if width == 0 {
        return String::new();
    }
    let mut out = String::new();
    let mut used = 0;
    for c in label.chars() {
        let w = c.width().unwrap_or(0);
        if used + w > width - 1 {
            break;
        }
        out.push(c);
        used += w;
    }
    out.push('…');
    out
}

fn side_color(side: Side) -> Color {
    match side {
        Side::Straight => C_SWITCH_RED,
        Side::Diverging => C_SWITCH_GREEN,
    }
}

/// The lit side of an unconfirmed pair is drawn on the muted background.
fn button_style(side: Side, pair: PairState) -> Style {
    match (pair.is_active(side), pair.confirmed) {
        (true, true) => Style::default().fg(Color::Black).bg(side_color(side)).add_modifier(Modifier::BOLD),
        (true, false) => Style::default().fg(side_color(side)).bg(C_MUTED).add_modifier(Modifier::BOLD),
        (false, _) => Style::default().fg(side_color(side)).bg(C_SWITCH_IDLE),
    }
}

impl SwitchGrid {
    pub fn new() -> Self {
        Self {
            cursor: 0,
            buttons: Vec::new(),
            labels: Vec::new(),
            page_tabs: Vec::new(),
            badge: String::new(),
        }
    }

    /// Group under the keyboard cursor on the current page.
    #[cfg(test)]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    fn move_cursor(&mut self, state: &AppState, d_row: isize, d_col: isize) {
        let m = &state.matrix;
        let (row, col) = m.cell(self.cursor);
        let rows = m.rows() as isize;
        let cols = m.columns() as isize;
        let row = (row as isize + d_row).rem_euclid(rows) as usize;
        let col = (col as isize + d_col).rem_euclid(cols) as usize;
        let group = row * m.columns() + col;
        if group < m.group_size() {
            self.cursor = group;
        }
    }

    fn press(&self, state: &AppState, side: Side) -> Vec<Action> {
        let address = state.matrix.address(state.selection.page, self.cursor);
        vec![Action::SetSwitch { address, side }]
    }

    fn draw_cell(&mut self, frame: &mut Frame, area: Rect, group: usize, focused: bool, state: &AppState) {
        let address = state.matrix.address(state.selection.page, group);
        let pair = state.switches.pair(address);
        let is_cursor = focused && group == self.cursor;

        let label_area = Rect { height: 1, ..area };
        let label_style = if is_cursor {
            Style::default().fg(C_PRIMARY).bg(C_SELECTION_BG).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(C_SECONDARY)
        };
        let label = fit(&state.registry.switch_label(address), area.width.saturating_sub(1) as usize);
        frame.render_widget(Paragraph::new(Span::styled(format!(" {}", label), label_style)), label_area);
        self.labels.push((label_area, group));

        if area.height < 2 {
            return;
        }
        let half = area.width.saturating_sub(1) / 2;
        for (i, side) in [Side::Straight, Side::Diverging].into_iter().enumerate() {
            let rect = Rect {
                x: area.x + 1 + i as u16 * half,
                y: area.y + 1,
                width: half.saturating_sub(1),
                height: 1,
            };
            let style = button_style(side, pair);
            let text = match side {
                Side::Straight => "─",
                Side::Diverging => "╱",
            };
            frame.render_widget(Paragraph::new(Span::styled(text, style)).centered().style(style), rect);
            self.buttons.push((rect, address, side));
        }
    }

    fn draw_page_bar(&mut self, frame: &mut Frame, area: Rect, state: &AppState) {
        self.page_tabs.clear();
        let mut spans = vec![Span::styled(" page ", Style::default().fg(C_MUTED))];
        let mut x = area.x + 6;
        for page in 0..state.matrix.page_count() {
            let text = format!(" {} ", state.matrix.page_label(page));
            let w = text.chars().count() as u16;
            if x + w > area.x + area.width {
                break;
            }
            let style = if page == state.selection.page {
                Style::default().fg(C_PRIMARY).bg(C_SELECTION_BG).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(C_SECONDARY)
            };
            self.page_tabs.push((Rect { x, y: area.y, width: w, height: 1 }, page));
            spans.push(Span::styled(text, style));
            x += w;
        }
        frame.render_widget(Paragraph::new(Line::from(spans)), area);
    }
}

impl Default for SwitchGrid {
    fn default() -> Self {
        Self::new()
    }
}

impl Component for SwitchGrid {
    fn handle_key(&mut self, key: KeyEvent, state: &AppState) -> Vec<Action> {
        if key.kind == KeyEventKind::Release {
            return vec![];
        }
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => self.move_cursor(state, -1, 0),
            KeyCode::Down | KeyCode::Char('j') => self.move_cursor(state, 1, 0),
            KeyCode::Left | KeyCode::Char('h') => self.move_cursor(state, 0, -1),
            KeyCode::Right | KeyCode::Char('l') => self.move_cursor(state, 0, 1),
            KeyCode::Char('r') => return self.press(state, Side::Straight),
            KeyCode::Char('g') => return self.press(state, Side::Diverging),
            KeyCode::Enter | KeyCode::Char(' ') => {
                let address = state.matrix.address(state.selection.page, self.cursor);
                let side = state.switches.pair(address).active.opposite();
                return self.press(state, side);
            }
            KeyCode::PageUp | KeyCode::Char('[') => return vec![Action::PageStep(-1)],
            KeyCode::PageDown | KeyCode::Char(']') => return vec![Action::PageStep(1)],
            _ => {}
        }
        vec![]
    }

    fn handle_mouse(&mut self, event: MouseEvent, _area: Rect, _state: &AppState) -> Vec<Action> {
        match event.kind {
            MouseEventKind::Down(MouseButton::Left) => {
                let (col, row) = (event.column, event.row);
                if let Some(&(_, address, side)) = self.buttons.iter().find(|(r, ..)| hit(*r, col, row)) {
                    return vec![Action::SetSwitch { address, side }];
                }
                if let Some(&(_, group)) = self.labels.iter().find(|(r, _)| hit(*r, col, row)) {
                    self.cursor = group;
                    return vec![];
                }
                if let Some(&(_, page)) = self.page_tabs.iter().find(|(r, _)| hit(*r, col, row)) {
                    return vec![Action::SelectPage(page)];
                }
                vec![]
            }
            MouseEventKind::ScrollUp => vec![Action::PageStep(-1)],
            MouseEventKind::ScrollDown => vec![Action::PageStep(1)],
            _ => vec![],
        }
    }

    fn on_action(&mut self, _action: &Action, state: &AppState) -> Vec<Action> {
        if self.cursor >= state.matrix.group_size() {
            self.cursor = 0;
        }
        vec![]
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect, focused: bool, state: &AppState) {
        self.badge = format!("keyboard page {}", state.matrix.page_label(state.selection.page));
        let block = pane_chrome(
            "switches",
            Some('3'),
            focused,
            Some(Badge { text: &self.badge, color: C_NUMBER_HINT }),
        );
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let parts = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(CELL_HEIGHT), Constraint::Length(1), Constraint::Length(1)])
            .split(inner);

        self.buttons.clear();
        self.labels.clear();
        let m = state.matrix;
        let cols = m.columns().max(1) as u16;
        let cell_w = parts[0].width / cols;
        for group in 0..m.group_size() {
            let (row, col) = m.cell(group);
            let y = parts[0].y + row as u16 * CELL_HEIGHT;
            if y + 1 >= parts[0].y + parts[0].height || cell_w < 4 {
                continue;
            }
            let cell = Rect {
                x: parts[0].x + col as u16 * cell_w,
                y,
                width: cell_w,
                height: (CELL_HEIGHT - 1).min(parts[0].y + parts[0].height - y),
            };
            self.draw_cell(frame, cell, group, focused, state);
        }

        // Cursor detail: address, label and the artwork each side would show.
        let address = m.address(state.selection.page, self.cursor);
        let pair = state.switches.pair(address);
        let detail = format!(
            " #{}  {}  {} | {}",
            address,
            state.registry.switch_label(address),
            switch_icon(Side::Straight, pair.is_active(Side::Straight)),
            switch_icon(Side::Diverging, pair.is_active(Side::Diverging)),
        );
        frame.render_widget(
            Paragraph::new(Span::styled(detail, Style::default().fg(C_MUTED))),
            parts[1],
        );
        self.draw_page_bar(frame, parts[2], state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selection::Selection;
    use crate::matrix::SwitchMatrix;
    use ratatui::crossterm::event::KeyModifiers;

    fn state() -> AppState {
        AppState::new(SwitchMatrix::new(8, 64, 4), Selection::default(), "http://x/static", 50)
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn test_unconfirmed_pair_is_muted() {
        let fresh = PairState { active: Side::Diverging, confirmed: true };
        let stale = PairState { active: Side::Diverging, confirmed: false };
        assert_eq!(button_style(Side::Diverging, fresh).bg, Some(C_SWITCH_GREEN));
        assert_eq!(button_style(Side::Diverging, stale).bg, Some(C_MUTED));
        assert_eq!(button_style(Side::Straight, stale).bg, Some(C_SWITCH_IDLE));
        assert_eq!(button_style(Side::Straight, fresh), button_style(Side::Straight, stale));
    }

    #[test]
    fn test_fit_respects_display_width() {
        assert_eq!(fit("Weiche 1", 10), "Weiche 1");
        assert_eq!(fit("Bahnhofseinfahrt", 6), "Bahnh…");
        assert_eq!(fit("日本語テキスト", 5), "日本…");
        assert_eq!(fit("abc", 0), "");
    }

    #[test]
    fn test_keys_address_current_page() {
        let mut s = state();
        s.select_page(1);
        let mut grid = SwitchGrid::new();
        grid.handle_key(key(KeyCode::Right), &s);
        grid.handle_key(key(KeyCode::Down), &s);
        assert_eq!(grid.cursor(), 5);
        assert_eq!(
            grid.handle_key(key(KeyCode::Char('g')), &s),
            vec![Action::SetSwitch { address: 13, side: Side::Diverging }]
        );
        // Straight is lit by default, so Enter asks for the other side.
        assert_eq!(
            grid.handle_key(key(KeyCode::Enter), &s),
            vec![Action::SetSwitch { address: 13, side: Side::Diverging }]
        );
        assert_eq!(grid.handle_key(key(KeyCode::PageDown), &s), vec![Action::PageStep(1)]);
    }

    #[test]
    fn test_cursor_wraps_inside_group() {
        let s = state();
        let mut grid = SwitchGrid::new();
        grid.handle_key(key(KeyCode::Up), &s);
        assert_eq!(grid.cursor(), 4);
        grid.handle_key(key(KeyCode::Left), &s);
        assert_eq!(grid.cursor(), 7);
    }

    #[test]
    fn test_button_and_page_clicks() {
        let s = state();
        let mut grid = SwitchGrid::new();
        grid.buttons = vec![(Rect::new(1, 2, 5, 1), 9, Side::Straight)];
        grid.page_tabs = vec![(Rect::new(10, 20, 4, 1), 3)];
        let click = |column, row| MouseEvent {
            kind: MouseEventKind::Down(MouseButton::Left),
            column,
            row,
            modifiers: KeyModifiers::NONE,
        };
        assert_eq!(
            grid.handle_mouse(click(3, 2), Rect::default(), &s),
            vec![Action::SetSwitch { address: 9, side: Side::Straight }]
        );
        assert_eq!(grid.handle_mouse(click(11, 20), Rect::default(), &s), vec![Action::SelectPage(3)]);
        assert!(grid.handle_mouse(click(40, 40), Rect::default(), &s).is_empty());
    }
}
