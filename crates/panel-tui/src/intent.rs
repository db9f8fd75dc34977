//! Pending-intent tracking for values the control server owns.
//!
//! A gesture sends a command and records what the operator asked for; the
//! server later pushes the authoritative value.  `IntentState` keeps both so
//! each screen element can pick its policy: optimistic elements (speed,
//! direction, functions) render `intended()`, strictly confirmed ones (the
//! STOP/GO button) render `confirmed()` plus a pending hint.
//!
//! # States
//! ```text
//!  Confirmed(T)          server value; render normally
//!  Pending { ... }       command sent, nothing pushed back yet; pulse
//!  TimedOut { ... }      waited too long; warning colour + "?"
//! ```
//!
//! Only authoritative writes (`on_confirmed`) ever touch the
//! confirmed half.  Whatever the server pushes wins, even when it differs
//! from the intent.

use std::time::{Duration, Instant};

/// Timeout before a pending intent becomes `TimedOut`.
pub const INTENT_TIMEOUT: Duration = Duration::from_millis(3000);

#[derive(Debug, Clone, PartialEq)]
pub enum IntentState<T: Clone + PartialEq> {
    Confirmed(T),
    Pending {
        intended: T,
        confirmed: T,
        since: Instant,
    },
    TimedOut {
        intended: T,
        confirmed: T,
    },
}

impl<T: Clone + PartialEq> IntentState<T> {
    pub fn new(value: T) -> Self {
        Self::Confirmed(value)
    }

    /// The value the operator asked for (what optimistic elements show).
    pub fn intended(&self) -> &T {
        match self {
            Self::Confirmed(v) => v,
            Self::Pending { intended, .. } => intended,
            Self::TimedOut { intended, .. } => intended,
        }
    }

    /// Last value the server confirmed.
    pub fn confirmed(&self) -> &T {
        match self {
            Self::Confirmed(v) => v,
            Self::Pending { confirmed, .. } => confirmed,
            Self::TimedOut { confirmed, .. } => confirmed,
        }
    }

    #[cfg(test)]
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending { .. })
    }

    pub fn is_timed_out(&self) -> bool {
        matches!(self, Self::TimedOut { .. })
    }

    /// Record a sent command. No-op transition when it matches the confirmed value.
    pub fn set_intent(&mut self, intended: T) {
        self.set_intent_at(intended, Instant::now());
    }

    pub fn set_intent_at(&mut self, intended: T, now: Instant) {
        let confirmed = self.confirmed().clone();
        if intended == confirmed {
            *self = Self::Confirmed(intended);
        } else {
            *self = Self::Pending {
                intended,
                confirmed,
                since: now,
            };
        }
    }

    /// Check for timeout. Returns `true` if the state changed.
    pub fn tick(&mut self) -> bool {
        self.tick_at(Instant::now())
    }

    pub fn tick_at(&mut self, now: Instant) -> bool {
        if let Self::Pending {
            intended,
            confirmed,
            since,
        } = self
        {
            if now.saturating_duration_since(*since) >= INTENT_TIMEOUT {
                *self = Self::TimedOut {
                    intended: intended.clone(),
                    confirmed: confirmed.clone(),
                };
                return true;
            }
        }
        false
    }

    /// An authoritative value arrived. It replaces both halves.
    /// Returns `true` if the displayed (intended) value changed.
    pub fn on_confirmed(&mut self, value: T) -> bool {
        let changed = *self.intended() != value;
        *self = Self::Confirmed(value);
        changed
    }

    pub fn render_state(&self) -> RenderHint {
        self.render_state_at(Instant::now())
    }

    pub fn render_state_at(&self, now: Instant) -> RenderHint {
        match self {
            Self::Confirmed(_) => RenderHint::Normal,
            Self::Pending { since, .. } => {
                // Pulse on/off every 400ms
                let pulsing = (now.saturating_duration_since(*since).as_millis() / 400) % 2 == 0;
                if pulsing {
                    RenderHint::PendingVisible
                } else {
                    RenderHint::PendingHidden
                }
            }
            Self::TimedOut { .. } => RenderHint::TimedOut,
        }
    }
}

impl<T: Clone + PartialEq + Default> Default for IntentState<T> {
    fn default() -> Self {
        Self::Confirmed(T::default())
    }
}

/// How to render a value that may be pending confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderHint {
    #[default]
    Normal,
    /// Pending, pulse-on frame.
    PendingVisible,
    /// Pending, pulse-off frame.
    PendingHidden,
    TimedOut,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intent_matching_confirmed_stays_confirmed() {
        let mut s = IntentState::new(false);
        s.set_intent(false);
        assert_eq!(s, IntentState::Confirmed(false));
    }

    #[test]
    fn test_pending_until_confirmed() {
        let t0 = Instant::now();
        let mut s = IntentState::new(0u16);
        s.set_intent_at(500, t0);
        assert!(s.is_pending());
        assert_eq!(*s.intended(), 500);
        assert_eq!(*s.confirmed(), 0);

        assert!(!s.on_confirmed(500));
        assert_eq!(s, IntentState::Confirmed(500));
    }

    #[test]
    fn test_authoritative_value_overrides_intent() {
        let mut s = IntentState::new(false);
        s.set_intent(true);
        assert!(*s.intended());
        assert!(s.on_confirmed(false));
        assert_eq!(s, IntentState::Confirmed(false));
    }

    #[test]
    fn test_timeout_and_hints() {
        let t0 = Instant::now();
        let mut s = IntentState::new(true);
        s.set_intent_at(false, t0);
        assert_eq!(s.render_state_at(t0), RenderHint::PendingVisible);
        assert_eq!(
            s.render_state_at(t0 + Duration::from_millis(450)),
            RenderHint::PendingHidden
        );
        assert!(!s.tick_at(t0 + Duration::from_millis(2999)));
        assert!(s.tick_at(t0 + INTENT_TIMEOUT));
        assert!(s.is_timed_out());
        assert_eq!(s.render_state_at(t0 + INTENT_TIMEOUT), RenderHint::TimedOut);
        assert!(*s.confirmed());

        s.on_confirmed(false);
        assert_eq!(s.render_state(), RenderHint::Normal);
    }
}
