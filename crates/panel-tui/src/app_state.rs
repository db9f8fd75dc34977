//! AppState — the one application-state object.
//!
//! Components read it while drawing and handling input, but never mutate it.
//! The App event loop is the only writer, through the named operations below
//! and through `SyncEngine`.  Operator gestures only ever move the *intended*
//! half of an `IntentState`; confirmed values come from fetches and pushes.

use chrono::{DateTime, Local};

use panel_proto::protocol::{
    Direction, LocoId, LocoSnapshot, Locomotive, DEFAULT_TACHOMAX, FUNCTION_COUNT, SPEED_MAX,
};

use crate::icons::{IconKind, IconResolver, IconSlot};
use crate::intent::{IntentState, RenderHint};
use crate::matrix::{Side, SwitchBoard, SwitchMatrix};
use crate::registry::EntityRegistry;
use crate::selection::{Selection, View};
use crate::widgets::status_bar::InputMode;

/// Displayed state of the selected locomotive.
#[derive(Debug, Clone, PartialEq)]
pub struct CabState {
    pub loco: Option<LocoId>,
    pub speed: IntentState<u16>,
    pub direction: IntentState<Direction>,
    pub functions: Vec<IntentState<bool>>,
}

impl CabState {
    pub fn new(loco: Option<LocoId>) -> Self {
        Self {
            loco,
            speed: IntentState::new(0),
            direction: IntentState::new(Direction::Forward),
            functions: vec![IntentState::new(false); usize::from(FUNCTION_COUNT)],
        }
    }

    /// A state fetch is authoritative for every field.
    pub fn apply_snapshot(&mut self, snap: &LocoSnapshot) {
        self.speed.on_confirmed(snap.speed);
        self.direction.on_confirmed(snap.direction);
        for (idx, f) in self.functions.iter_mut().enumerate() {
            f.on_confirmed(snap.function(idx as u8));
        }
    }

    pub fn speed(&self) -> u16 {
        *self.speed.intended()
    }

    pub fn direction(&self) -> Direction {
        *self.direction.intended()
    }

    pub fn function(&self, index: u8) -> bool {
        self.functions
            .get(usize::from(index))
            .map(|f| *f.intended())
            .unwrap_or(false)
    }

    pub fn function_hint(&self, index: u8) -> RenderHint {
        self.functions
            .get(usize::from(index))
            .map(IntentState::render_state)
            .unwrap_or_default()
    }

    fn tick(&mut self) -> bool {
        let mut changed = self.speed.tick();
        changed |= self.direction.tick();
        for f in &mut self.functions {
            changed |= f.tick();
        }
        changed
    }
}

pub struct AppState {
    // ── Catalogs / geometry ─────────────────────────────────────────────────
    pub registry: EntityRegistry,
    pub matrix: SwitchMatrix,

    // ── Selection ───────────────────────────────────────────────────────────
    pub selection: Selection,

    // ── Live state ──────────────────────────────────────────────────────────
    pub cab: CabState,
    pub switches: SwitchBoard,
    /// STOP/GO. The label uses `confirmed()` only.
    pub run_state: IntentState<bool>,
    pub icons: IconResolver,

    // ── Connection ──────────────────────────────────────────────────────────
    pub connected: bool,
    pub last_event_at: Option<DateTime<Local>>,

    // ── UI mode ─────────────────────────────────────────────────────────────
    pub input_mode: InputMode,
    pub speed_step: u16,
}

impl AppState {
    pub fn new(matrix: SwitchMatrix, selection: Selection, assets_url: &str, speed_step: u16) -> Self {
        Self {
            registry: EntityRegistry::new(),
            matrix,
            selection,
            cab: CabState::new(None),
            switches: SwitchBoard::new(matrix.total()),
            run_state: IntentState::new(false),
            icons: IconResolver::new(assets_url),
            connected: false,
            last_event_at: None,
            input_mode: InputMode::Normal,
            speed_step,
        }
    }

    pub fn selected_loco(&self) -> Option<&Locomotive> {
        self.registry.loco(self.selection.loco?)
    }

    pub fn tachomax(&self) -> u32 {
        self.selected_loco()
            .map(Locomotive::tachomax)
            .unwrap_or(DEFAULT_TACHOMAX)
    }

    pub fn is_selected(&self, uid: LocoId) -> bool {
        self.selection.loco == Some(uid)
    }

    // ── Selection ───────────────────────────────────────────────────────────

    /// Returns `true` when the selection actually changed. The cab starts
    /// over from defaults until the new locomotive's state arrives.
    pub fn select_loco(&mut self, uid: Option<LocoId>) -> bool {
        if self.selection.loco == uid {
            return false;
        }
        self.selection.loco = uid;
        self.cab = CabState::new(uid);
        true
    }

    pub fn select_page(&mut self, page: usize) -> bool {
        if page >= self.matrix.page_count() || page == self.selection.page {
            return false;
        }
        self.selection.page = page;
        true
    }

    pub fn set_view(&mut self, view: View) -> bool {
        if self.selection.view == view {
            return false;
        }
        self.selection.view = view;
        true
    }

    // ── Operator intents ────────────────────────────────────────────────────
    // Each shows the intent immediately (except STOP/GO) and returns what the
    // App should hand to `CommandChannel`. `None` means there is nothing to
    // control.

    pub fn commit_speed(&mut self, speed: u16) -> Option<(LocoId, u16)> {
        let loco = self.selection.loco?;
        let speed = speed.min(SPEED_MAX);
        self.cab.speed.set_intent(speed);
        Some((loco, speed))
    }

    pub fn step_speed(&mut self, steps: i32) -> Option<(LocoId, u16)> {
        let target = i64::from(self.cab.speed()) + i64::from(steps) * i64::from(self.speed_step);
        let target = target.clamp(0, i64::from(SPEED_MAX)) as u16;
        self.commit_speed(target)
    }

    pub fn set_direction(&mut self, direction: Direction) -> Option<(LocoId, Direction)> {
        let loco = self.selection.loco?;
        self.cab.direction.set_intent(direction);
        Some((loco, direction))
    }

    pub fn toggle_direction(&mut self) -> Option<(LocoId, Direction)> {
        let next = self.cab.direction().toggled();
        self.set_direction(next)
    }

    /// Returns the locomotive and the requested flag.
    pub fn toggle_function(&mut self, index: u8) -> Option<(LocoId, bool)> {
        let loco = self.selection.loco?;
        let slot = self.cab.functions.get_mut(usize::from(index))?;
        let active = !*slot.intended();
        slot.set_intent(active);
        Some((loco, active))
    }

    /// Wire value for pressing `side` of the group at `address`. Switches are
    /// not optimistic; the grid changes when the push arrives.
    pub fn switch_value(&self, address: usize, side: Side) -> Option<u8> {
        self.matrix.contains(address).then(|| side.value())
    }

    /// Asks for the opposite of the confirmed run state and only marks the
    /// button pending. Returns the requested state.
    pub fn toggle_run_state(&mut self) -> bool {
        let running = !*self.run_state.confirmed();
        self.run_state.set_intent(running);
        running
    }

    // ── Icons ───────────────────────────────────────────────────────────────

    pub fn icon_kind(&self, slot: IconSlot) -> Option<IconKind> {
        let loco = self.selected_loco()?;
        Some(match slot {
            IconSlot::Portrait => IconKind::Portrait {
                key: loco.icon_key().to_string(),
            },
            IconSlot::Function(index) => IconKind::Function {
                id: loco.function_icon_id(index),
                index,
                active: self.cab.function(index),
            },
        })
    }

    /// Expire pending intents. Returns `true` if anything changed.
    pub fn tick(&mut self) -> bool {
        let cab = self.cab.tick();
        self.run_state.tick() || cab
    }
}
