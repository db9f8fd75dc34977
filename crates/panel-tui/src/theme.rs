//! Color palette and style constants for the control panel.

use ratatui::style::{Color, Style};

// ── Color palette ─────────────────────────────────────────────────────────────

pub const C_BG: Color = Color::Rgb(18, 18, 18);
pub const C_ACCENT: Color = Color::Rgb(255, 95, 95);
pub const C_RUNNING: Color = Color::Rgb(80, 200, 120);
pub const C_STOPPED: Color = Color::Rgb(255, 80, 80);
pub const C_PENDING: Color = Color::Rgb(255, 184, 80);
pub const C_MUTED: Color = Color::Rgb(72, 72, 88);
pub const C_SECONDARY: Color = Color::Rgb(115, 115, 138);
pub const C_PRIMARY: Color = Color::Rgb(210, 210, 225);
pub const C_SELECTION_BG: Color = Color::Rgb(28, 28, 40);
pub const C_PANEL_BORDER: Color = Color::Rgb(40, 40, 52);
pub const C_PANEL_BORDER_FOCUSED: Color = Color::Rgb(120, 100, 200);
pub const C_NUMBER_HINT: Color = Color::Rgb(90, 90, 115);
pub const C_FILTER_BG: Color = Color::Rgb(20, 20, 32);
pub const C_FILTER_FG: Color = Color::Rgb(255, 200, 80);
pub const C_SPEED: Color = Color::Rgb(80, 160, 220);
pub const C_FUNCTION_ON: Color = Color::Rgb(255, 210, 50);
// Switch pair: red = straight, green = diverging.
pub const C_SWITCH_RED: Color = Color::Rgb(230, 70, 70);
pub const C_SWITCH_GREEN: Color = Color::Rgb(70, 200, 100);
pub const C_SWITCH_IDLE: Color = Color::Rgb(52, 52, 64);
pub const C_SEPARATOR_BAR: Color = Color::Rgb(30, 30, 42);
pub const C_TOAST_INFO: Color = Color::Rgb(80, 160, 220);
pub const C_TOAST_SUCCESS: Color = Color::Rgb(80, 200, 120);
pub const C_TOAST_WARNING: Color = Color::Rgb(255, 184, 80);
pub const C_MODE_NORMAL: Color = Color::Rgb(115, 115, 138);
pub const C_MODE_FILTER: Color = Color::Rgb(255, 200, 80);

// ── Predefined styles ─────────────────────────────────────────────────────────

pub fn style_focused_border() -> Style {
    Style::default().fg(C_PANEL_BORDER_FOCUSED)
}

pub fn style_unfocused_border() -> Style {
    Style::default().fg(C_PANEL_BORDER)
}

pub fn style_filter() -> Style {
    Style::default().fg(C_FILTER_FG).bg(C_FILTER_BG)
}
