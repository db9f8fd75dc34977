//! Header — one-row top bar: view tabs, STOP/GO button, INFO button.
//!
//! Not focusable. Remembers where it drew its buttons so clicks can be mapped
//! back to actions.

use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use crate::{
    action::Action,
    app_state::AppState,
    intent::RenderHint,
    selection::View,
    theme::{C_ACCENT, C_MUTED, C_PENDING, C_PRIMARY, C_RUNNING, C_SECONDARY, C_STOPPED},
};

const TITLE: &str = " mspanel ";

#[derive(Default)]
pub struct Header {
    tabs: Vec<(Rect, View)>,
    run_button: Rect,
    info_button: Rect,
}

/// Label and colour of the STOP/GO button. The label follows the confirmed
/// run state only; a pending press just recolours it.
pub fn run_button(running: bool, hint: RenderHint) -> (&'static str, Color) {
    let label = if running { " ■ STOP " } else { " ▶ GO " };
    let base = if running { C_STOPPED } else { C_RUNNING };
    let color = match hint {
        RenderHint::Normal => base,
        RenderHint::PendingVisible => C_PENDING,
        RenderHint::PendingHidden => C_MUTED,
        RenderHint::TimedOut => C_ACCENT,
    };
    (label, color)
}

impl Header {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn click(&self, col: u16, row: u16) -> Option<Action> {
        let hit = |r: &Rect| col >= r.x && col < r.x + r.width && row >= r.y && row < r.y + r.height;
        if let Some((_, view)) = self.tabs.iter().find(|(r, _)| hit(r)) {
            return Some(Action::SwitchView(*view));
        }
        if hit(&self.run_button) {
            return Some(Action::ToggleRunState);
        }
        if hit(&self.info_button) {
            return Some(Action::ToggleInfo);
        }
        None
    }

    pub fn draw(&mut self, frame: &mut Frame, area: Rect, state: &AppState) {
        let mut spans = vec![Span::styled(
            TITLE,
            Style::default().fg(C_PRIMARY).add_modifier(Modifier::BOLD),
        )];
        let mut x = area.x + TITLE.chars().count() as u16;

        self.tabs.clear();
        for view in [View::Control, View::Keyboard] {
            let text = format!(" {} ", view.label());
            let width = text.chars().count() as u16;
            let style = if state.selection.view == view {
                Style::default().fg(C_PRIMARY).add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
            } else {
                Style::default().fg(C_SECONDARY)
            };
            self.tabs.push((Rect { x, y: area.y, width, height: 1 }, view));
            spans.push(Span::styled(text, style));
            x += width;
        }

        if state.selection.view == View::Keyboard {
            spans.push(Span::styled(
                format!("  keyboard page {}", state.matrix.page_label(state.selection.page)),
                Style::default().fg(C_MUTED),
            ));
        }

        let (label, color) = run_button(*state.run_state.confirmed(), state.run_state.render_state());
        let suffix = if state.run_state.is_timed_out() { "?" } else { "" };
        let run_text = format!("{}{}", label, suffix);
        let info_text = " INFO ";
        let run_w = run_text.chars().count() as u16;
        let info_w = info_text.len() as u16;
        let right_w = run_w + 1 + info_w + 1;

        frame.render_widget(Paragraph::new(Line::from(spans)), area);

        if area.width > right_w + x.saturating_sub(area.x) {
            let run_x = area.x + area.width - right_w;
            self.run_button = Rect { x: run_x, y: area.y, width: run_w, height: 1 };
            self.info_button = Rect { x: run_x + run_w + 1, y: area.y, width: info_w, height: 1 };
            frame.render_widget(
                Paragraph::new(Span::styled(
                    run_text,
                    Style::default().fg(Color::Black).bg(color).add_modifier(Modifier::BOLD),
                )),
                self.run_button,
            );
            frame.render_widget(
                Paragraph::new(Span::styled(
                    info_text,
                    Style::default().fg(C_PRIMARY).add_modifier(Modifier::REVERSED),
                )),
                self.info_button,
            );
        } else {
            self.run_button = Rect::default();
            self.info_button = Rect::default();
        }
    }
}
