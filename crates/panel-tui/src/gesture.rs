//! Click-versus-drag recognition on the vertical speed bar.
//!
//! A press starts a hold timer.  Releasing before it fires is a click and
//! commits the release position once.  Once the timer fires the gesture is a
//! drag: every move commits, release commits nothing more.  From press to
//! release (or cancel) the gesture owns the pointer, so moves outside the bar
//! still land here.
//!
//! Time is passed in by the caller; the controller never reads the clock.

use std::time::{Duration, Instant};

use panel_proto::protocol::SPEED_MAX;

/// Vertical extent of the bar. The top edge is full speed, the bottom is 0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BarGeometry {
    pub top: f64,
    pub height: f64,
}

impl BarGeometry {
    /// Geometry of a bar drawn on terminal rows `y .. y + rows`.
    pub fn for_rows(y: u16, rows: u16) -> Self {
        Self {
            top: f64::from(y),
            height: f64::from(rows.saturating_sub(1).max(1)),
        }
    }

    /// `round(clamp(1 - (y - top) / height, 0, 1) * 1000)`.
    pub fn value_at(&self, y: f64) -> u16 {
        if self.height <= 0.0 {
            return 0;
        }
        let fraction = (1.0 - (y - self.top) / self.height).clamp(0.0, 1.0);
        (fraction * f64::from(SPEED_MAX)).round() as u16
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Phase {
    Idle,
    Pressed { deadline: Instant, bar: BarGeometry },
    Dragging { bar: BarGeometry },
}

#[derive(Debug, Clone)]
pub struct SpeedGesture {
    threshold: Duration,
    phase: Phase,
}

impl SpeedGesture {
    pub fn new(threshold: Duration) -> Self {
        Self {
            threshold,
            phase: Phase::Idle,
        }
    }

    /// True between press and release; all pointer events belong to the gesture.
    pub fn is_captured(&self) -> bool {
        !matches!(self.phase, Phase::Idle)
    }

    #[cfg(test)]
    pub fn is_dragging(&self) -> bool {
        matches!(self.phase, Phase::Dragging { .. })
    }

    pub fn pointer_down(&mut self, bar: BarGeometry, now: Instant) {
        self.phase = Phase::Pressed {
            deadline: now + self.threshold,
            bar,
        };
    }

    /// Fire the hold timer if its deadline has passed. Returns `true` on the
    /// transition into dragging.
    pub fn poll(&mut self, now: Instant) -> bool {
        if let Phase::Pressed { deadline, bar } = self.phase {
            if now >= deadline {
                self.phase = Phase::Dragging { bar };
                return true;
            }
        }
        false
    }

    /// A move while captured. Commits only once the gesture is a drag.
    pub fn pointer_move(&mut self, y: f64, now: Instant) -> Option<u16> {
        self.poll(now);
        match self.phase {
            Phase::Dragging { bar } => Some(bar.value_at(y)),
            _ => None,
        }
    }

    /// Release. A click commits the release position, a drag commits nothing.
    pub fn pointer_up(&mut self, y: f64, now: Instant) -> Option<u16> {
        self.poll(now);
        let committed = match self.phase {
            Phase::Pressed { bar, .. } => Some(bar.value_at(y)),
            _ => None,
        };
        self.phase = Phase::Idle;
        committed
    }

    /// Pointer lost (focus change, resize). Nothing is committed.
    pub fn cancel(&mut self) {
        self.phase = Phase::Idle;
    }
}
