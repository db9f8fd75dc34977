//! Status bar — bottom line with connection state, last push, mode, and keybindings.

use chrono::{DateTime, Local};
use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use crate::selection::View;
use crate::theme::{C_ACCENT, C_MODE_FILTER, C_MODE_NORMAL, C_MUTED, C_RUNNING, C_SECONDARY};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Filter,
}

impl InputMode {
    pub fn label(self) -> &'static str {
        match self {
            Self::Normal => "NORMAL",
            Self::Filter => "FILTER",
        }
    }

    pub fn color(self) -> ratatui::style::Color {
        match self {
            Self::Normal => C_MODE_NORMAL,
            Self::Filter => C_MODE_FILTER,
        }
    }
}

/// Everything the footer shows.
pub struct StatusLine {
    pub connected: bool,
    pub last_event_at: Option<DateTime<Local>>,
    pub mode: InputMode,
    pub view: View,
    pub show_keys: bool,
}

/// Draw the footer: `● 14:02:11  CONTROL  keys...`.
pub fn draw_status_bar(frame: &mut Frame, area: Rect, status: &StatusLine) {
    let conn_span = if status.connected {
        Span::styled(" ●", Style::default().fg(C_RUNNING))
    } else {
        Span::styled(" ○", Style::default().fg(C_ACCENT))
    };
    let last = match status.last_event_at {
        Some(ts) => ts.format("%H:%M:%S").to_string(),
        None => "--:--:--".to_string(),
    };

    let label = match status.mode {
        InputMode::Filter => status.mode.label(),
        InputMode::Normal => match status.view {
            View::Control => "CONTROL",
            View::Keyboard => "KEYBOARD",
        },
    };

    let mut spans = vec![
        conn_span,
        Span::styled(format!(" {} ", last), Style::default().fg(C_SECONDARY)),
        Span::styled(
            format!(" {} ", label),
            Style::default()
                .fg(status.mode.color())
                .add_modifier(Modifier::BOLD),
        ),
    ];

    if status.show_keys {
        spans.push(Span::styled(
            keys_for(status.mode, status.view),
            Style::default().fg(C_MUTED),
        ));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn keys_for(mode: InputMode, view: View) -> &'static str {
    match (mode, view) {
        (InputMode::Filter, _) => " type to filter  ↑↓ move  Enter select  Esc clear+close",
        (InputMode::Normal, View::Control) => {
            " ↑↓ speed  0 halt  ←→ direction  [ ] function  Enter toggle  / filter  s stop/go  v keyboard  i info  Tab panes  K keys  ? help  q quit"
        }
        (InputMode::Normal, View::Keyboard) => {
            " ←→↑↓ switch  r/g side  Enter flip  PgUp/PgDn page  s stop/go  v control  i info  K keys  ? help  q quit"
        }
    }
}
