//! SyncEngine — folds the push stream and fetch results into `AppState`.
//!
//! The engine never performs I/O itself.  Everything that needs the network
//! comes back as a `Fetch` for the App to run in a background task; the
//! result returns through the App's message channel tagged with its subject
//! (locomotive uid, switch page, catalog generation) and is checked against
//! the current selection before it is applied.

use chrono::Local;
use tracing::{debug, info};

use panel_proto::client::StreamEvent;
use panel_proto::protocol::{LocoCatalog, LocoId, LocoSnapshot, PushEvent, SwitchCatalog, SwitchStates};

use crate::app_state::AppState;
use crate::selection::preserve_selection;

/// Background read the App should start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fetch {
    Catalog { generation: u64 },
    LocoState { uid: LocoId },
    SwitchStates { page: usize },
    RunState,
}

/// The single screen element an applied push event changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refresh {
    Nothing,
    RunState,
    Speed,
    Direction,
    Function(u8),
    /// Group index within the visible page.
    SwitchGroup(usize),
    Catalog,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Applied {
    pub refresh: Refresh,
    pub fetch: Option<Fetch>,
}

impl Applied {
    fn refresh(refresh: Refresh) -> Self {
        Self {
            refresh,
            fetch: None,
        }
    }

    fn nothing() -> Self {
        Self::refresh(Refresh::Nothing)
    }
}

#[derive(Debug, Default)]
pub struct SyncEngine {
    /// Last locomotive written to the selection file.
    persisted_loco: Option<LocoId>,
}

impl SyncEngine {
    pub fn new(persisted_loco: Option<LocoId>) -> Self {
        Self { persisted_loco }
    }

    pub fn remember(&mut self, uid: Option<LocoId>) {
        if uid.is_some() {
            self.persisted_loco = uid;
        }
    }

    /// Initial reads at startup.
    pub fn start(&mut self, state: &mut AppState) -> Vec<Fetch> {
        vec![
            self.reload_catalog(state),
            Fetch::RunState,
            Fetch::SwitchStates {
                page: state.selection.page,
            },
        ]
    }

    pub fn reload_catalog(&mut self, state: &mut AppState) -> Fetch {
        Fetch::Catalog {
            generation: state.registry.begin_load(),
        }
    }

    /// One authoritative read per piece of live state.
    pub fn resync(&mut self, state: &mut AppState) -> Vec<Fetch> {
        let mut fetches = Vec::new();
        if state.registry.locos().is_empty() {
            fetches.push(self.reload_catalog(state));
        }
        fetches.push(Fetch::RunState);
        if let Some(uid) = state.selection.loco {
            fetches.push(Fetch::LocoState { uid });
        }
        fetches.push(Fetch::SwitchStates {
            page: state.selection.page,
        });
        fetches
    }

    // ── Push stream ─────────────────────────────────────────────────────────

    pub fn on_stream(&mut self, state: &mut AppState, event: StreamEvent) -> (Refresh, Vec<Fetch>) {
        match event {
            StreamEvent::Connected { resumed } => {
                state.connected = true;
                if resumed {
                    info!("event stream resumed, resynchronizing");
                    return (Refresh::Nothing, self.resync(state));
                }
                (Refresh::Nothing, Vec::new())
            }
            StreamEvent::Disconnected => {
                state.connected = false;
                (Refresh::Nothing, Vec::new())
            }
            StreamEvent::Data(payload) => {
                state.last_event_at = Some(Local::now());
                let applied = self.apply_payload(state, &payload);
                (applied.refresh, applied.fetch.into_iter().collect())
            }
        }
    }

    pub fn apply_payload(&mut self, state: &mut AppState, payload: &str) -> Applied {
        match PushEvent::decode(payload) {
            Ok(event) => self.apply(state, event),
            Err(e) => {
                debug!("dropping push payload {:?}: {}", payload, e);
                Applied::nothing()
            }
        }
    }

    pub fn apply(&mut self, state: &mut AppState, event: PushEvent) -> Applied {
        if let Some(uid) = event.loco() {
            if !state.is_selected(uid) {
                return Applied::nothing();
            }
        }
        match event {
            PushEvent::System { running } => {
                state.run_state.on_confirmed(running);
                Applied::refresh(Refresh::RunState)
            }
            PushEvent::CatalogReloaded => {
                info!("server reloaded its locomotive list");
                Applied {
                    refresh: Refresh::Catalog,
                    fetch: Some(self.reload_catalog(state)),
                }
            }
            PushEvent::Speed { speed, .. } => {
                state.cab.speed.on_confirmed(speed);
                Applied::refresh(Refresh::Speed)
            }
            PushEvent::Direction { direction, .. } => {
                state.cab.direction.on_confirmed(direction);
                Applied::refresh(Refresh::Direction)
            }
            PushEvent::Function { index, active, .. } => {
                state.cab.functions[usize::from(index)].on_confirmed(active);
                Applied::refresh(Refresh::Function(index))
            }
            PushEvent::Switch { address, value } => {
                if !state.matrix.contains(address) {
                    debug!("switch event for unknown address {}", address);
                    return Applied::nothing();
                }
                if state.matrix.page_of(address) != state.selection.page {
                    return Applied::nothing();
                }
                state.switches.set(address, value);
                Applied::refresh(Refresh::SwitchGroup(state.matrix.group_of(address)))
            }
        }
    }

    // ── Selection ───────────────────────────────────────────────────────────

    pub fn select_loco(&mut self, state: &mut AppState, uid: Option<LocoId>) -> Vec<Fetch> {
        if !state.select_loco(uid) {
            return Vec::new();
        }
        uid.map(|uid| Fetch::LocoState { uid }).into_iter().collect()
    }

    pub fn select_page(&mut self, state: &mut AppState, page: usize) -> Vec<Fetch> {
        if !state.select_page(page) {
            return Vec::new();
        }
        // Pushes for other pages were skipped while this one was hidden.
        state.switches.unconfirm(state.matrix.page_addresses(page));
        vec![Fetch::SwitchStates { page }]
    }

    // ── Fetch results ───────────────────────────────────────────────────────

    /// Install a catalog load and re-establish the selection. Stale loads
    /// change nothing.
    pub fn catalog_loaded(
        &mut self,
        state: &mut AppState,
        generation: u64,
        locos: LocoCatalog,
        switches: SwitchCatalog,
    ) -> Vec<Fetch> {
        if !state.registry.accept(generation, locos, switches) {
            debug!("catalog load {} superseded", generation);
            return Vec::new();
        }
        let previous = state.selection.loco;
        let next = preserve_selection(state.registry.locos(), previous, self.persisted_loco);
        state.select_loco(next);
        // The kept locomotive may have changed while the list was reloading.
        next.map(|uid| Fetch::LocoState { uid }).into_iter().collect()
    }

    pub fn loco_state_loaded(&mut self, state: &mut AppState, uid: LocoId, snap: &LocoSnapshot) -> bool {
        if !state.is_selected(uid) {
            debug!("stale state for loco {} dropped", uid);
            return false;
        }
        state.cab.apply_snapshot(snap);
        true
    }

    pub fn switch_states_loaded(&mut self, state: &mut AppState, page: usize, states: &SwitchStates) -> bool {
        if page != state.selection.page {
            debug!("stale switch snapshot for page {} dropped", page);
            return false;
        }
        state.switches.replace(states);
        true
    }

    pub fn run_state_loaded(&mut self, state: &mut AppState, running: bool) {
        state.run_state.on_confirmed(running);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use panel_proto::protocol::{kmh, Direction, Locomotive};

    use crate::matrix::{Side, SwitchMatrix};
    use crate::selection::Selection;

    fn catalog(entries: &[(LocoId, Option<u32>)]) -> LocoCatalog {
        entries
            .iter()
            .map(|&(uid, tachomax)| Locomotive {
                uid,
                tachomax,
                ..Default::default()
            })
            .collect()
    }

    /// State with `locos` loaded and the first one selected.
    fn setup(locos: LocoCatalog) -> (SyncEngine, AppState) {
        let mut engine = SyncEngine::new(None);
        let mut state = AppState::new(SwitchMatrix::new(8, 64, 4), Selection::default(), "http://x/static", 50);
        let fetches = engine.start(&mut state);
        let Fetch::Catalog { generation } = fetches[0] else {
            panic!("first fetch should load the catalog");
        };
        engine.catalog_loaded(&mut state, generation, locos, SwitchCatalog::default());
        (engine, state)
    }

    #[test]
    fn test_start_requests_catalog_run_state_and_page() {
        let mut engine = SyncEngine::new(None);
        let mut state = AppState::new(
            SwitchMatrix::new(8, 64, 4),
            Selection {
                loco: None,
                page: 3,
                view: Default::default(),
            },
            "http://x/static",
            50,
        );
        assert_eq!(
            engine.start(&mut state),
            vec![
                Fetch::Catalog { generation: 1 },
                Fetch::RunState,
                Fetch::SwitchStates { page: 3 }
            ]
        );
    }

    #[test]
    fn test_speed_event_for_selected_loco() {
        let (mut engine, mut state) = setup(catalog(&[(1, Some(200))]));
        assert_eq!(state.selection.loco, Some(1));

        let applied = engine.apply_payload(&mut state, r#"{"type":"speed","loc_id":1,"value":500}"#);
        assert_eq!(applied.refresh, Refresh::Speed);
        assert_eq!(state.cab.speed(), 500);
        assert_eq!(kmh(state.cab.speed(), state.tachomax()), 100);
    }

    #[test]
    fn test_events_for_other_locos_change_nothing() {
        let (mut engine, mut state) = setup(catalog(&[(1, None), (2, None)]));
        let before = state.cab.clone();
        for payload in [
            r#"{"type":"speed","loc_id":2,"value":700}"#,
            r#"{"type":"direction","loc_id":2,"value":2}"#,
            r#"{"type":"function","loc_id":2,"fn":0,"value":true}"#,
        ] {
            assert_eq!(engine.apply_payload(&mut state, payload), Applied::nothing());
        }
        assert_eq!(state.cab, before);
    }

    #[test]
    fn test_switch_event_on_visible_page() {
        let (mut engine, mut state) = setup(catalog(&[(1, None)]));
        engine.select_page(&mut state, 1);

        let applied = engine.apply_payload(&mut state, r#"{"type":"switch","idx":13,"value":1}"#);
        assert_eq!(applied.refresh, Refresh::SwitchGroup(5));
        let pair = state.switches.pair(state.matrix.address(1, 5));
        assert!(pair.is_active(Side::Diverging));
        assert!(!pair.is_active(Side::Straight));

        // Another page, or beyond the matrix: dropped.
        let applied = engine.apply_payload(&mut state, r#"{"type":"switch","idx":2,"value":1}"#);
        assert_eq!(applied.refresh, Refresh::Nothing);
        assert_eq!(state.switches.value(2), 0);
        let applied = engine.apply_payload(&mut state, r#"{"type":"switch","idx":640,"value":1}"#);
        assert_eq!(applied.refresh, Refresh::Nothing);
    }

    #[test]
    fn test_system_event_confirms_run_state() {
        let (mut engine, mut state) = setup(catalog(&[]));
        state.toggle_run_state();
        assert!(state.run_state.is_pending());
        let applied = engine.apply_payload(&mut state, r#"{"type":"system","status":true}"#);
        assert_eq!(applied.refresh, Refresh::RunState);
        assert!(*state.run_state.confirmed());
        assert!(!state.run_state.is_pending());
    }

    #[test]
    fn test_malformed_payloads_are_dropped() {
        let (mut engine, mut state) = setup(catalog(&[(1, None)]));
        for payload in [
            "{",
            r#"{"type":"warp","loc_id":1}"#,
            r#"{"type":"speed","value":3}"#,
            r#"{"type":"function","loc_id":1,"fn":99,"value":1}"#,
        ] {
            assert_eq!(engine.apply_payload(&mut state, payload), Applied::nothing());
        }
        assert_eq!(state.cab, crate::app_state::CabState::new(Some(1)));
    }

    #[test]
    fn test_function_toggle_optimistic_then_confirmed() {
        let (mut engine, mut state) = setup(catalog(&[(1, None)]));
        state.toggle_function(3);
        assert!(state.cab.function(3));

        let applied = engine.apply_payload(&mut state, r#"{"type":"function","loc_id":1,"fn":3,"value":true}"#);
        assert_eq!(applied.refresh, Refresh::Function(3));
        assert!(state.cab.function(3));
        assert!(!state.cab.functions[3].is_pending());
    }

    #[test]
    fn test_function_toggle_overwritten_by_authoritative_event() {
        let (mut engine, mut state) = setup(catalog(&[(1, None)]));
        state.toggle_function(3);
        engine.apply_payload(&mut state, r#"{"type":"function","loc_id":1,"fn":3,"value":0}"#);
        assert!(!state.cab.function(3));
        assert!(!state.cab.functions[3].is_pending());
    }

    #[test]
    fn test_reload_keeps_selection_when_still_present() {
        let (mut engine, mut state) = setup(catalog(&[(3, None), (7, None)]));
        engine.select_loco(&mut state, Some(7));

        let applied = engine.apply_payload(&mut state, r#"{"type":"loco_list_reloaded"}"#);
        assert_eq!(applied.refresh, Refresh::Catalog);
        let Some(Fetch::Catalog { generation }) = applied.fetch else {
            panic!("reload should fetch the catalog");
        };
        let fetches = engine.catalog_loaded(&mut state, generation, catalog(&[(1, None), (7, None)]), SwitchCatalog::default());
        assert_eq!(state.selection.loco, Some(7));
        assert_eq!(fetches, vec![Fetch::LocoState { uid: 7 }]);
    }

    #[test]
    fn test_reload_falls_back_to_persisted_then_first() {
        let (mut engine, mut state) = setup(catalog(&[(3, None), (7, None)]));
        engine.select_loco(&mut state, Some(7));
        engine.remember(Some(9));

        let g = engine.reload_catalog(&mut state);
        let Fetch::Catalog { generation } = g else { unreachable!() };
        engine.catalog_loaded(&mut state, generation, catalog(&[(2, None), (9, None)]), SwitchCatalog::default());
        assert_eq!(state.selection.loco, Some(9));

        let Fetch::Catalog { generation } = engine.reload_catalog(&mut state) else { unreachable!() };
        engine.catalog_loaded(&mut state, generation, catalog(&[(4, None), (5, None)]), SwitchCatalog::default());
        assert_eq!(state.selection.loco, Some(4));
    }

    #[test]
    fn test_superseded_catalog_load_is_ignored() {
        let (mut engine, mut state) = setup(catalog(&[(3, None)]));
        let Fetch::Catalog { generation: old } = engine.reload_catalog(&mut state) else { unreachable!() };
        let Fetch::Catalog { generation: new } = engine.reload_catalog(&mut state) else { unreachable!() };
        assert!(engine
            .catalog_loaded(&mut state, old, catalog(&[(8, None)]), SwitchCatalog::default())
            .is_empty());
        assert_eq!(state.selection.loco, Some(3));
        engine.catalog_loaded(&mut state, new, catalog(&[(3, None), (8, None)]), SwitchCatalog::default());
        assert_eq!(state.registry.locos().len(), 2);
    }

    #[test]
    fn test_stale_loco_state_never_applied() {
        let (mut engine, mut state) = setup(catalog(&[(1, None), (2, None)]));
        assert_eq!(engine.select_loco(&mut state, Some(2)), vec![Fetch::LocoState { uid: 2 }]);

        let old = LocoSnapshot {
            speed: 900,
            direction: Direction::Reverse,
            ..Default::default()
        };
        assert!(!engine.loco_state_loaded(&mut state, 1, &old));
        assert_eq!(state.cab.speed(), 0);

        let fresh = LocoSnapshot {
            speed: 250,
            ..Default::default()
        };
        assert!(engine.loco_state_loaded(&mut state, 2, &fresh));
        assert_eq!(state.cab.speed(), 250);
        assert_eq!(state.cab.direction(), Direction::Forward);
    }

    #[test]
    fn test_stale_switch_snapshot_dropped() {
        let (mut engine, mut state) = setup(catalog(&[]));
        assert_eq!(engine.select_page(&mut state, 2), vec![Fetch::SwitchStates { page: 2 }]);
        assert!(engine.select_page(&mut state, 2).is_empty());
        assert!(!engine.switch_states_loaded(&mut state, 0, &SwitchStates(vec![1; 64])));
        assert_eq!(state.switches.value(0), 0);
        assert!(engine.switch_states_loaded(&mut state, 2, &SwitchStates(vec![1; 64])));
        assert_eq!(state.switches.value(17), 1);
    }

    #[test]
    fn test_page_change_unconfirms_until_snapshot() {
        let (mut engine, mut state) = setup(catalog(&[]));
        assert!(engine.switch_states_loaded(&mut state, 0, &SwitchStates(vec![1; 64])));
        assert!(state.switches.pair(9).confirmed);

        engine.select_page(&mut state, 1);
        assert!(!state.switches.pair(9).confirmed);
        assert!(state.switches.pair(9).is_active(Side::Diverging));
        assert!(state.switches.pair(2).confirmed);

        // Failed or superseded snapshot: the page stays unconfirmed.
        assert!(!engine.switch_states_loaded(&mut state, 0, &SwitchStates(vec![0; 64])));
        assert!(!state.switches.pair(9).confirmed);

        assert!(engine.switch_states_loaded(&mut state, 1, &SwitchStates(vec![0; 64])));
        let pair = state.switches.pair(9);
        assert!(pair.confirmed);
        assert!(pair.is_active(Side::Straight));
    }

    #[test]
    fn test_reconnect_resynchronizes() {
        let (mut engine, mut state) = setup(catalog(&[(1, None)]));
        let (_, fetches) = engine.on_stream(&mut state, StreamEvent::Connected { resumed: false });
        assert!(fetches.is_empty());
        assert!(state.connected);

        engine.on_stream(&mut state, StreamEvent::Disconnected);
        assert!(!state.connected);

        let (_, fetches) = engine.on_stream(&mut state, StreamEvent::Connected { resumed: true });
        assert_eq!(
            fetches,
            vec![
                Fetch::RunState,
                Fetch::LocoState { uid: 1 },
                Fetch::SwitchStates { page: 0 }
            ]
        );
    }

    #[test]
    fn test_reconnect_with_empty_catalog_reloads_it() {
        let (mut engine, mut state) = setup(catalog(&[]));
        let (_, fetches) = engine.on_stream(&mut state, StreamEvent::Connected { resumed: true });
        assert!(matches!(fetches[0], Fetch::Catalog { .. }));
        assert_eq!(state.selection.loco, None);
    }

    #[test]
    fn test_data_stamps_last_event_time() {
        let (mut engine, mut state) = setup(catalog(&[(1, None)]));
        assert!(state.last_event_at.is_none());
        let (refresh, _) = engine.on_stream(
            &mut state,
            StreamEvent::Data(r#"{"type":"direction","loc_id":1,"value":"reverse"}"#.into()),
        );
        assert_eq!(refresh, Refresh::Direction);
        assert_eq!(state.cab.direction(), Direction::Reverse);
        assert!(state.last_event_at.is_some());
    }
}
