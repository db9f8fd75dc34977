//! Action enum — all user-initiated intents and internal events.

use panel_proto::protocol::{Direction, InfoAction, LocoId};

use crate::matrix::Side;
use crate::selection::View;

/// Unique identifier for a focusable component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentId {
    LocoList,
    CabPanel,
    SwitchGrid,
    InfoOverlay,
    HelpOverlay,
}

/// All actions that can flow through the system.
/// Components produce Actions; the App dispatches them.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    // ── Cab ──────────────────────────────────────────────────────────────────
    SelectLoco(LocoId),
    SetSpeed(u16),
    StepSpeed(i32),
    SetDirection(Direction),
    ToggleDirection,
    ToggleFunction(u8),

    // ── Switch keyboard ──────────────────────────────────────────────────────
    SetSwitch { address: usize, side: Side },
    SelectPage(usize),
    PageStep(i32),

    // ── System ───────────────────────────────────────────────────────────────
    ToggleRunState,
    SendInfo(InfoAction),

    // ── Navigation ───────────────────────────────────────────────────────────
    FocusNext,
    FocusPrev,
    FocusPane(ComponentId),
    SwitchView(View),

    // ── Filter/search ────────────────────────────────────────────────────────
    OpenFilter,
    CloseFilter,

    // ── UI toggles ───────────────────────────────────────────────────────────
    ToggleHelp,
    ToggleInfo,
    ToggleKeys,

    Quit,
    Resize(u16, u16),
    Noop,
}
