//! Vertical speed bar with eighth-block fill.

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::Style,
    Frame,
};

use panel_proto::protocol::SPEED_MAX;

use crate::intent::RenderHint;
use crate::theme::{C_PENDING, C_SEPARATOR_BAR, C_SPEED};

const BLOCKS: [char; 9] = [' ', '▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// Fill of `speed` as a fraction of full scale.
pub fn fill_fraction(speed: u16) -> f64 {
    f64::from(speed.min(SPEED_MAX)) / f64::from(SPEED_MAX)
}

/// Column glyphs from top to bottom for a bar `rows` tall.
pub fn column(speed: u16, rows: u16) -> Vec<char> {
    let rows = usize::from(rows);
    let eighths = (fill_fraction(speed) * rows as f64 * 8.0).round() as usize;
    let full = eighths / 8;
    let partial = eighths % 8;
    (0..rows)
        .map(|r| {
            let from_bottom = rows - 1 - r;
            if from_bottom < full {
                '█'
            } else if from_bottom == full {
                BLOCKS[partial]
            } else {
                ' '
            }
        })
        .collect()
}

/// Draw the bar into `area`; every column of the area is filled alike.
pub fn draw_speed_bar(frame: &mut Frame, area: Rect, speed: u16, hint: RenderHint) {
    if area.width == 0 || area.height == 0 {
        return;
    }
    let color = match hint {
        RenderHint::Normal | RenderHint::PendingHidden => C_SPEED,
        RenderHint::PendingVisible | RenderHint::TimedOut => C_PENDING,
    };
    render_column(frame.buffer_mut(), area, &column(speed, area.height), color);
}

fn render_column(buf: &mut Buffer, area: Rect, glyphs: &[char], color: ratatui::style::Color) {
    for (dy, glyph) in glyphs.iter().enumerate() {
        let y = area.y + dy as u16;
        for x in area.x..area.x + area.width {
            if let Some(cell) = buf.cell_mut((x, y)) {
                let style = if *glyph == ' ' {
                    Style::default().bg(C_SEPARATOR_BAR)
                } else {
                    Style::default().fg(color).bg(C_SEPARATOR_BAR)
                };
                cell.set_char(*glyph).set_style(style);
            }
        }
    }
}
