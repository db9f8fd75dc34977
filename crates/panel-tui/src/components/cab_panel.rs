//! CabPanel component — drives the selected locomotive.
//!
//! Layout (inside the pane border):
//!   name / portrait line
//!   speed bar | 28 function buttons in two columns
//!   km/h + direction under the bar
//!   detail line with the cursor function's icon
//!
//! The speed bar owns a `SpeedGesture`; while a press is in progress the App
//! routes every mouse event here.

use std::time::{Duration, Instant};

use ratatui::crossterm::event::{
    KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};
use ratatui::{
    layout::{Constraint, Direction as LayoutDirection, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use panel_proto::protocol::{kmh, Direction, FUNCTION_COUNT};

use crate::{
    action::Action,
    app_state::AppState,
    component::Component,
    gesture::{BarGeometry, SpeedGesture},
    icons::IconSlot,
    intent::RenderHint,
    theme::{
        C_ACCENT, C_FUNCTION_ON, C_MUTED, C_PENDING, C_PRIMARY, C_SECONDARY, C_SELECTION_BG,
        C_SPEED,
    },
    widgets::{pane_chrome::pane_chrome, speed_bar::draw_speed_bar},
};

const FUNCTIONS_PER_COLUMN: u8 = 14;
const BAR_WIDTH: u16 = 9;

pub struct CabPanel {
    gesture: SpeedGesture,
    cursor: u8,
    bar_area: Rect,
    direction_area: Rect,
    function_areas: Vec<(Rect, u8)>,
}

fn hit(r: Rect, col: u16, row: u16) -> bool {
    col >= r.x && col < r.x + r.width && row >= r.y && row < r.y + r.height
}

fn hint_color(hint: RenderHint, normal: Color) -> Color {
    match hint {
        RenderHint::Normal => normal,
        RenderHint::PendingVisible => C_PENDING,
        RenderHint::PendingHidden => C_MUTED,
        RenderHint::TimedOut => C_ACCENT,
    }
}

impl CabPanel {
    pub fn new(drag_threshold: Duration) -> Self {
        Self {
            gesture: SpeedGesture::new(drag_threshold),
            cursor: 0,
            bar_area: Rect::default(),
            direction_area: Rect::default(),
            function_areas: Vec::new(),
        }
    }

    /// A speed-bar gesture holds the pointer.
    pub fn is_capturing(&self) -> bool {
        self.gesture.is_captured()
    }

    /// End a gesture without committing anything.
    pub fn cancel_gesture(&mut self) {
        self.gesture.cancel();
    }

    /// Function under the keyboard cursor.
    #[cfg(test)]
    pub fn cursor(&self) -> u8 {
        self.cursor
    }

    fn move_cursor(&mut self, delta: i16) {
        let n = i16::from(FUNCTION_COUNT);
        self.cursor = (i16::from(self.cursor) + delta).rem_euclid(n) as u8;
    }

    fn handle_bar_pointer(&mut self, event: MouseEvent, now: Instant) -> Vec<Action> {
        let y = f64::from(event.row);
        let committed = match event.kind {
            MouseEventKind::Down(MouseButton::Left) => {
                self.gesture.pointer_down(
                    BarGeometry::for_rows(self.bar_area.y, self.bar_area.height),
                    now,
                );
                None
            }
            MouseEventKind::Drag(MouseButton::Left) | MouseEventKind::Moved => {
                self.gesture.pointer_move(y, now)
            }
            MouseEventKind::Up(MouseButton::Left) => self.gesture.pointer_up(y, now),
            _ => None,
        };
        committed.map(Action::SetSpeed).into_iter().collect()
    }

    fn draw_functions(&mut self, frame: &mut Frame, area: Rect, focused: bool, state: &AppState) {
        self.function_areas.clear();
        let col_w = area.width / 2;
        for index in 0..FUNCTION_COUNT {
            let col = u16::from(index / FUNCTIONS_PER_COLUMN);
            let row = u16::from(index % FUNCTIONS_PER_COLUMN);
            if row >= area.height || col_w == 0 {
                continue;
            }
            let rect = Rect {
                x: area.x + col * col_w,
                y: area.y + row,
                width: col_w,
                height: 1,
            };
            self.function_areas.push((rect, index));

            let active = state.cab.function(index);
            let base = if active { C_FUNCTION_ON } else { C_SECONDARY };
            let color = hint_color(state.cab.function_hint(index), base);
            let lamp = if active { "●" } else { "○" };
            let mut style = Style::default().fg(color);
            if index == self.cursor && focused {
                style = style.bg(C_SELECTION_BG).add_modifier(Modifier::BOLD);
            }
            frame.render_widget(
                Paragraph::new(Line::from(Span::styled(
                    format!(" F{:<2} {}", index, lamp),
                    style,
                ))),
                rect,
            );
        }
    }
}

impl Component for CabPanel {
    fn handle_key(&mut self, key: KeyEvent, state: &AppState) -> Vec<Action> {
        if key.kind == KeyEventKind::Release {
            return vec![];
        }
        if key.code == KeyCode::Esc && self.gesture.is_captured() {
            self.gesture.cancel();
            return vec![];
        }
        if state.selection.loco.is_none() {
            return vec![];
        }
        let coarse = key.modifiers.contains(KeyModifiers::SHIFT);
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => vec![Action::StepSpeed(if coarse { 5 } else { 1 })],
            KeyCode::Down | KeyCode::Char('j') => {
                vec![Action::StepSpeed(if coarse { -5 } else { -1 })]
            }
            KeyCode::PageUp => vec![Action::StepSpeed(5)],
            KeyCode::PageDown => vec![Action::StepSpeed(-5)],
            KeyCode::Char('0') | KeyCode::Home => vec![Action::SetSpeed(0)],
            KeyCode::Left => vec![Action::SetDirection(Direction::Reverse)],
            KeyCode::Right => vec![Action::SetDirection(Direction::Forward)],
            KeyCode::Char('d') => vec![Action::ToggleDirection],
            KeyCode::Char('[') => {
                self.move_cursor(-1);
                vec![]
            }
            KeyCode::Char(']') => {
                self.move_cursor(1);
                vec![]
            }
            KeyCode::Enter | KeyCode::Char(' ') => vec![Action::ToggleFunction(self.cursor)],
            _ => vec![],
        }
    }

    fn handle_mouse(&mut self, event: MouseEvent, _area: Rect, state: &AppState) -> Vec<Action> {
        let now = Instant::now();
        if self.gesture.is_captured() {
            return self.handle_bar_pointer(event, now);
        }
        if state.selection.loco.is_none() {
            return vec![];
        }
        match event.kind {
            MouseEventKind::Down(MouseButton::Left) => {
                if hit(self.bar_area, event.column, event.row) {
                    return self.handle_bar_pointer(event, now);
                }
                if hit(self.direction_area, event.column, event.row) {
                    return vec![Action::ToggleDirection];
                }
                if let Some(&(_, index)) = self
                    .function_areas
                    .iter()
                    .find(|(r, _)| hit(*r, event.column, event.row))
                {
                    self.cursor = index;
                    return vec![Action::ToggleFunction(index)];
                }
                vec![]
            }
            MouseEventKind::ScrollUp if hit(self.bar_area, event.column, event.row) => {
                vec![Action::StepSpeed(1)]
            }
            MouseEventKind::ScrollDown if hit(self.bar_area, event.column, event.row) => {
                vec![Action::StepSpeed(-1)]
            }
            _ => vec![],
        }
    }

    fn tick(&mut self, _state: &AppState) -> Vec<Action> {
        self.gesture.poll(Instant::now());
        vec![]
    }

    fn on_action(&mut self, action: &Action, _state: &AppState) -> Vec<Action> {
        match action {
            Action::Resize(..)
            | Action::FocusNext
            | Action::FocusPrev
            | Action::FocusPane(_)
            | Action::SwitchView(_)
            | Action::SelectLoco(_) => self.gesture.cancel(),
            _ => {}
        }
        vec![]
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect, focused: bool, state: &AppState) {
        let block = pane_chrome("cab", Some('2'), focused, None);
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let Some(loco) = state.selected_loco() else {
            self.bar_area = Rect::default();
            self.direction_area = Rect::default();
            self.function_areas.clear();
            let msg = if state.registry.is_loaded() {
                "  no locomotive selected"
            } else {
                "  waiting for the locomotive list…"
            };
            frame.render_widget(
                Paragraph::new(Span::styled(msg, Style::default().fg(C_MUTED))),
                inner,
            );
            return;
        };

        let rows = Layout::default()
            .direction(LayoutDirection::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Length(1),
                Constraint::Min(3),
                Constraint::Length(1),
            ])
            .split(inner);

        let portrait = state
            .icons
            .display_path(IconSlot::Portrait)
            .unwrap_or("…");
        frame.render_widget(
            Paragraph::new(Line::from(vec![
                Span::styled(
                    format!(" {}", loco.display_name()),
                    Style::default().fg(C_PRIMARY).add_modifier(Modifier::BOLD),
                ),
                Span::styled(format!("  #{}", loco.uid), Style::default().fg(C_MUTED)),
                Span::styled(format!("  {}", portrait), Style::default().fg(C_SECONDARY)),
            ])),
            rows[0],
        );

        let body = Layout::default()
            .direction(LayoutDirection::Horizontal)
            .constraints([Constraint::Length(BAR_WIDTH), Constraint::Min(10)])
            .split(rows[2]);

        // Bar column: bar, km/h, direction.
        let bar_col = body[0];
        let bar_h = bar_col.height.saturating_sub(2);
        self.bar_area = Rect {
            x: bar_col.x + 2,
            y: bar_col.y,
            width: BAR_WIDTH.saturating_sub(4).min(bar_col.width),
            height: bar_h,
        };
        let speed = state.cab.speed();
        draw_speed_bar(frame, self.bar_area, speed, state.cab.speed.render_state());

        let kmh_area = Rect { y: bar_col.y + bar_h, height: 1, ..bar_col };
        frame.render_widget(
            Paragraph::new(Span::styled(
                format!("{} km/h", kmh(speed, state.tachomax())),
                Style::default().fg(C_SPEED).add_modifier(Modifier::BOLD),
            ))
            .centered(),
            kmh_area,
        );

        self.direction_area = Rect { y: kmh_area.y + 1, height: 1, ..bar_col };
        let arrow = match state.cab.direction() {
            Direction::Forward => "fwd ▶",
            Direction::Reverse => "◀ rev",
        };
        frame.render_widget(
            Paragraph::new(Span::styled(
                arrow,
                Style::default().fg(hint_color(state.cab.direction.render_state(), C_PRIMARY)),
            ))
            .centered(),
            self.direction_area,
        );

        self.draw_functions(frame, body[1], focused, state);

        let slot = IconSlot::Function(self.cursor);
        let detail = match state.icons.display_path(slot) {
            Some(path) => format!(" F{}  {}", self.cursor, path),
            None => format!(" F{}  resolving icon…", self.cursor),
        };
        frame.render_widget(
            Paragraph::new(Span::styled(detail, Style::default().fg(C_MUTED))),
            rows[3],
        );
    }
}
