//! App — component-based event loop.
//!
//! Architecture:
//! - `App` owns all components and `AppState` (read-only for components).
//! - A `tokio::mpsc` channel carries `AppMessage`s in from background tasks:
//!   terminal input, the push stream, fetch results and icon lookups.
//! - The event loop draws when something changed, then awaits the next message.
//! - Components return `Vec<Action>`; App dispatches each Action.
//! - Commands to the control server go out through `CommandChannel`.

use std::io;
use std::iter;
use std::time::Duration;

use ratatui::crossterm::{
    event::{
        self, DisableFocusChange, DisableMouseCapture, EnableFocusChange, EnableMouseCapture,
        Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseEvent, MouseEventKind,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::Style,
    widgets::Block,
    Terminal,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use panel_proto::client::{run_event_stream, Backoff, ControlClient, StreamEvent};
use panel_proto::config::Config;
use panel_proto::protocol::{
    LocoCatalog, LocoId, LocoSnapshot, SwitchCatalog, SwitchStates, FUNCTION_COUNT,
};

use crate::{
    action::{Action, ComponentId},
    app_state::AppState,
    commands::CommandChannel,
    component::Component,
    components::{
        cab_panel::CabPanel, header::Header, help_overlay::HelpOverlay,
        info_overlay::InfoOverlay, loco_list::LocoList, switch_grid::SwitchGrid,
    },
    icons::{self, IconSlot, LookupOutcome},
    matrix::SwitchMatrix,
    registry::{load_locomotives, load_switch_catalog},
    selection::{SelectionStore, View},
    sync::{Fetch, Refresh, SyncEngine},
    theme::C_BG,
    widgets::{
        status_bar::{draw_status_bar, InputMode, StatusLine},
        toast::ToastManager,
    },
    workspace::WorkspaceManager,
};

// ── Internal event bus ────────────────────────────────────────────────────────

enum AppMessage {
    Event(Event),
    Stream(StreamEvent),
    CatalogLoaded {
        generation: u64,
        locos: LocoCatalog,
        switches: SwitchCatalog,
    },
    LocoState {
        uid: LocoId,
        snapshot: LocoSnapshot,
    },
    SwitchStates {
        page: usize,
        states: SwitchStates,
    },
    RunState(bool),
    IconResolved(LookupOutcome),
}

/// Last-drawn layout rects, for mouse hit-testing without redoing the layout.
#[derive(Default, Clone)]
struct PaneAreas {
    header: Rect,
    loco_list: Rect,
    cab: Rect,
    switch_grid: Rect,
    overlay: Rect,
}

fn hit(r: Rect, col: u16, row: u16) -> bool {
    r.width > 0
        && r.height > 0
        && col >= r.x
        && col < r.x + r.width
        && row >= r.y
        && row < r.y + r.height
}

fn all_icon_slots() -> impl Iterator<Item = IconSlot> {
    iter::once(IconSlot::Portrait).chain((0..FUNCTION_COUNT).map(IconSlot::Function))
}

fn function_slots() -> impl Iterator<Item = IconSlot> {
    (0..FUNCTION_COUNT).map(IconSlot::Function)
}

// ── App ───────────────────────────────────────────────────────────────────────

pub struct App {
    state: AppState,
    engine: SyncEngine,
    store: SelectionStore,

    // ── Server ────────────────────────────────────────────────────────────────
    client: ControlClient,
    commands: CommandChannel,
    backoff: Backoff,
    cancel: CancellationToken,
    tx: Option<mpsc::Sender<AppMessage>>,

    // ── Components ────────────────────────────────────────────────────────────
    header: Header,
    loco_list: LocoList,
    cab: CabPanel,
    switch_grid: SwitchGrid,
    info: InfoOverlay,
    help: HelpOverlay,

    wm: WorkspaceManager,
    pane_areas: PaneAreas,
    toast: ToastManager,
    should_quit: bool,
}

impl App {
    pub fn new(config: &Config, client: ControlClient, store: SelectionStore) -> Self {
        let matrix = SwitchMatrix::from_config(&config.keyboard);
        let persisted = store.load();
        let selection = persisted.restore(matrix.page_count());
        info!(
            "restored selection: loco {:?}, page {}, view {}",
            persisted.loco_uid,
            selection.page,
            selection.view.label()
        );

        Self {
            state: AppState::new(matrix, selection, &config.assets_url(), config.input.speed_step),
            engine: SyncEngine::new(persisted.loco_uid),
            store,
            commands: CommandChannel::new(client.clone()),
            client,
            backoff: Backoff::from_config(&config.server),
            cancel: CancellationToken::new(),
            tx: None,
            header: Header::new(),
            loco_list: LocoList::new(),
            cab: CabPanel::new(config.input.drag_threshold()),
            switch_grid: SwitchGrid::new(),
            info: InfoOverlay::new(),
            help: HelpOverlay::new(),
            wm: WorkspaceManager::new(selection.view),
            pane_areas: PaneAreas::default(),
            toast: ToastManager::new(),
            should_quit: false,
        }
    }

    pub async fn run(mut self) -> anyhow::Result<()> {
        debug!("run(): enabling raw mode");
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture, EnableFocusChange)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        debug!("run(): terminal created, size={:?}", terminal.size());

        let (tx, mut rx) = mpsc::channel::<AppMessage>(1024);
        self.tx = Some(tx.clone());

        // ── Background task: keyboard/mouse events ────────────────────────────
        let event_tx = tx.clone();
        tokio::task::spawn_blocking(move || loop {
            match event::read() {
                Ok(ev) => {
                    if event_tx.blocking_send(AppMessage::Event(ev)).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        });

        // ── Background task: push subscription → AppMessage ───────────────────
        let (stream_tx, mut stream_rx) = mpsc::channel::<StreamEvent>(256);
        tokio::spawn(run_event_stream(
            self.client.clone(),
            self.backoff.clone(),
            stream_tx,
            self.cancel.clone(),
        ));
        let fwd_tx = tx.clone();
        tokio::spawn(async move {
            while let Some(ev) = stream_rx.recv().await {
                if fwd_tx.send(AppMessage::Stream(ev)).await.is_err() {
                    break;
                }
            }
        });

        let fetches = self.engine.start(&mut self.state);
        self.run_fetches(fetches);

        // Toast expiry, intent timeouts, hint pulse and the drag threshold.
        let mut ui_tick = tokio::time::interval(Duration::from_millis(100));
        ui_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        // ── Main loop ─────────────────────────────────────────────────────────
        let mut needs_redraw = true;
        loop {
            if needs_redraw {
                terminal.draw(|f| self.draw(f))?;
            }

            if self.should_quit {
                break;
            }

            needs_redraw = tokio::select! {
                Some(msg) = rx.recv() => {
                    const MAX_DRAIN: usize = 256;
                    let mut redraw = self.handle_message(msg);
                    let mut drained = 0usize;
                    while drained < MAX_DRAIN {
                        let Ok(next) = rx.try_recv() else { break };
                        drained += 1;
                        redraw |= self.handle_message(next);
                    }
                    redraw
                }

                _ = ui_tick.tick() => {
                    self.toast.tick();
                    self.state.tick();
                    let actions = self.cab.tick(&self.state);
                    for action in actions {
                        self.dispatch(action);
                    }
                    true
                }
            };
        }

        // ── Teardown ──────────────────────────────────────────────────────────
        self.cancel.cancel();
        self.save_selection();
        disable_raw_mode()?;
        execute!(
            terminal.backend_mut(),
            LeaveAlternateScreen,
            DisableMouseCapture,
            DisableFocusChange
        )?;
        terminal.show_cursor()?;
        info!("mspanel stopped");

        Ok(())
    }

    // ── Messages ──────────────────────────────────────────────────────────────

    /// Returns whether the screen needs a redraw.
    fn handle_message(&mut self, msg: AppMessage) -> bool {
        match msg {
            AppMessage::Event(ev) => match ev {
                Event::Key(key) => {
                    if key.kind == KeyEventKind::Release {
                        return false;
                    }
                    for a in self.handle_key(key) {
                        self.dispatch(a);
                    }
                }
                Event::Mouse(mouse) => {
                    for a in self.handle_mouse(mouse) {
                        self.dispatch(a);
                    }
                }
                Event::Resize(w, h) => self.dispatch(Action::Resize(w, h)),
                Event::FocusLost => self.cab.cancel_gesture(),
                _ => return false,
            },

            AppMessage::Stream(ev) => {
                match &ev {
                    StreamEvent::Connected { resumed: true } => {
                        self.toast.success("control server reconnected")
                    }
                    StreamEvent::Disconnected => {
                        self.toast.warning("control server connection lost")
                    }
                    _ => {}
                }
                let resumed = ev == StreamEvent::Connected { resumed: true };
                let (refresh, fetches) = self.engine.on_stream(&mut self.state, ev);
                if resumed {
                    // Icons that fell back during the outage get another try.
                    self.refresh_icons(all_icon_slots());
                }
                self.run_fetches(fetches);
                match refresh {
                    Refresh::Function(index) => self.refresh_icons(iter::once(IconSlot::Function(index))),
                    Refresh::Catalog => self.toast.info("locomotive list reloaded"),
                    _ => {}
                }
            }

            AppMessage::CatalogLoaded {
                generation,
                locos,
                switches,
            } => {
                let before = self.state.selection.loco;
                let fetches = self.engine.catalog_loaded(&mut self.state, generation, locos, switches);
                if self.state.registry.accepted_generation() != generation {
                    return false;
                }
                self.run_fetches(fetches);
                if self.state.selection.loco != before {
                    self.save_selection();
                }
                self.refresh_icons(all_icon_slots());
            }

            AppMessage::LocoState { uid, snapshot } => {
                if !self.engine.loco_state_loaded(&mut self.state, uid, &snapshot) {
                    return false;
                }
                self.refresh_icons(function_slots());
            }

            AppMessage::SwitchStates { page, states } => {
                return self.engine.switch_states_loaded(&mut self.state, page, &states);
            }

            AppMessage::RunState(running) => {
                self.engine.run_state_loaded(&mut self.state, running);
            }

            AppMessage::IconResolved(outcome) => {
                return self.state.icons.complete(outcome);
            }
        }
        true
    }

    // ── Background work ───────────────────────────────────────────────────────

    fn run_fetches(&self, fetches: Vec<Fetch>) {
        for fetch in fetches {
            self.run_fetch(fetch);
        }
    }

    /// Spawn one read. Failures are logged and produce no message, so the
    /// last good state stays on screen.
    fn run_fetch(&self, fetch: Fetch) {
        let Some(tx) = self.tx.clone() else {
            return;
        };
        let client = self.client.clone();
        debug!("fetch {:?}", fetch);
        tokio::spawn(async move {
            let msg = match fetch {
                Fetch::Catalog { generation } => {
                    let (locos, switches) =
                        tokio::join!(load_locomotives(&client), load_switch_catalog(&client));
                    Some(AppMessage::CatalogLoaded {
                        generation,
                        locos,
                        switches,
                    })
                }
                Fetch::LocoState { uid } => match client.loco_state(uid).await {
                    Ok(snapshot) => Some(AppMessage::LocoState { uid, snapshot }),
                    Err(e) => {
                        warn!("state of loco {} unavailable: {}", uid, e);
                        None
                    }
                },
                Fetch::SwitchStates { page } => match client.switch_states().await {
                    Ok(states) => Some(AppMessage::SwitchStates { page, states }),
                    Err(e) => {
                        warn!("switch states unavailable: {}", e);
                        None
                    }
                },
                Fetch::RunState => match client.run_state().await {
                    Ok(snap) => Some(AppMessage::RunState(snap.running)),
                    Err(e) => {
                        warn!("run state unavailable: {}", e);
                        None
                    }
                },
            };
            if let Some(msg) = msg {
                let _ = tx.send(msg).await;
            }
        });
    }

    /// Start lookups for `slots`. Each slot keeps at most one lookup in flight.
    fn refresh_icons(&mut self, slots: impl Iterator<Item = IconSlot>) {
        let Some(tx) = self.tx.clone() else {
            return;
        };
        for slot in slots {
            let Some(kind) = self.state.icon_kind(slot) else {
                continue;
            };
            let Some(request) = self.state.icons.request(slot, &kind) else {
                continue;
            };
            let ticket = request.ticket;
            let client = self.client.clone();
            let tx = tx.clone();
            let handle = tokio::spawn(async move {
                let outcome = icons::lookup(client, request).await;
                let _ = tx.send(AppMessage::IconResolved(outcome)).await;
            });
            self.state.icons.track(slot, ticket, handle.abort_handle());
        }
    }

    fn save_selection(&mut self) {
        self.engine.remember(self.state.selection.loco);
        if let Err(e) = self.store.save(&self.state.selection) {
            warn!("could not save selection to {}: {}", self.store.path().display(), e);
        }
    }

    // ── Key handling ──────────────────────────────────────────────────────────

    fn handle_key(&mut self, key: KeyEvent) -> Vec<Action> {
        if key.code == KeyCode::Char('c') && key.modifiers == KeyModifiers::CONTROL {
            return vec![Action::Quit];
        }
        if key.code == KeyCode::Esc && self.cab.is_capturing() {
            self.cab.cancel_gesture();
            return vec![];
        }

        // Overlays capture all keys while visible.
        if self.wm.show_help {
            return self.help.handle_key(key, &self.state);
        }
        if self.wm.show_info {
            return self.info.handle_key(key, &self.state);
        }

        if self.state.input_mode == InputMode::Filter {
            return self.loco_list.handle_key(key, &self.state);
        }

        match key.code {
            KeyCode::Char('q') => return vec![Action::Quit],
            KeyCode::Char('?') => return vec![Action::ToggleHelp],
            KeyCode::Char('i') => return vec![Action::ToggleInfo],
            KeyCode::Char('K') => return vec![Action::ToggleKeys],
            KeyCode::Char('s') => return vec![Action::ToggleRunState],
            KeyCode::Char('v') => return vec![Action::SwitchView(self.wm.view.toggled())],
            KeyCode::Tab => return vec![Action::FocusNext],
            KeyCode::BackTab => return vec![Action::FocusPrev],
            KeyCode::Char('1') => {
                return vec![
                    Action::SwitchView(View::Control),
                    Action::FocusPane(ComponentId::LocoList),
                ]
            }
            KeyCode::Char('2') => {
                return vec![
                    Action::SwitchView(View::Control),
                    Action::FocusPane(ComponentId::CabPanel),
                ]
            }
            KeyCode::Char('3') => return vec![Action::SwitchView(View::Keyboard)],
            _ => {}
        }

        let s = &self.state;
        match self.wm.focused() {
            Some(ComponentId::LocoList) => self.loco_list.handle_key(key, s),
            Some(ComponentId::CabPanel) => self.cab.handle_key(key, s),
            Some(ComponentId::SwitchGrid) => self.switch_grid.handle_key(key, s),
            Some(ComponentId::InfoOverlay) => self.info.handle_key(key, s),
            Some(ComponentId::HelpOverlay) => self.help.handle_key(key, s),
            None => vec![],
        }
    }

    // ── Mouse handling ────────────────────────────────────────────────────────

    fn handle_mouse(&mut self, event: MouseEvent) -> Vec<Action> {
        let areas = self.pane_areas.clone();
        let s = &self.state;

        // A speed-bar gesture owns the pointer until release.
        if self.cab.is_capturing() {
            return self.cab.handle_mouse(event, areas.cab, s);
        }

        let is_click = matches!(
            event.kind,
            MouseEventKind::Down(_) | MouseEventKind::ScrollUp | MouseEventKind::ScrollDown
        );
        if !is_click {
            return vec![];
        }
        let (col, row) = (event.column, event.row);

        if self.wm.show_help {
            return match event.kind {
                MouseEventKind::Down(_) => vec![Action::ToggleHelp],
                _ => vec![],
            };
        }
        if self.wm.show_info {
            if hit(areas.overlay, col, row) {
                return self.info.handle_mouse(event, areas.overlay, s);
            }
            return match event.kind {
                MouseEventKind::Down(_) => vec![Action::ToggleInfo],
                _ => vec![],
            };
        }

        if hit(areas.header, col, row) {
            if let MouseEventKind::Down(_) = event.kind {
                return self.header.click(col, row).into_iter().collect();
            }
            return vec![];
        }

        // Dispatch to the clicked pane; focus follows the click.
        macro_rules! click_pane {
            ($id:expr, $component:expr, $area:expr) => {{
                let mut actions = $component.handle_mouse(event, $area, s);
                if self.wm.focused() != Some($id) {
                    actions.insert(0, Action::FocusPane($id));
                }
                return actions;
            }};
        }

        match self.wm.view {
            View::Control => {
                if hit(areas.loco_list, col, row) {
                    click_pane!(ComponentId::LocoList, self.loco_list, areas.loco_list);
                }
                if hit(areas.cab, col, row) {
                    click_pane!(ComponentId::CabPanel, self.cab, areas.cab);
                }
            }
            View::Keyboard => {
                if hit(areas.switch_grid, col, row) {
                    click_pane!(ComponentId::SwitchGrid, self.switch_grid, areas.switch_grid);
                }
            }
        }
        vec![]
    }

    // ── Action dispatcher ─────────────────────────────────────────────────────

    fn dispatch(&mut self, action: Action) {
        let secondary: Vec<Action> = {
            let s = &self.state;
            let mut out = Vec::new();
            out.extend(self.loco_list.on_action(&action, s));
            out.extend(self.cab.on_action(&action, s));
            out.extend(self.switch_grid.on_action(&action, s));
            out.extend(self.info.on_action(&action, s));
            out.extend(self.help.on_action(&action, s));
            out
        };

        self.apply_action(action);

        for a in secondary {
            self.apply_action(a);
        }
    }

    fn apply_action(&mut self, action: Action) {
        if action != Action::Noop {
            debug!("apply_action: {:?}", action);
        }
        match action {
            // ── Cab ───────────────────────────────────────────────────────────
            Action::SelectLoco(uid) => {
                let fetches = self.engine.select_loco(&mut self.state, Some(uid));
                if !fetches.is_empty() {
                    self.run_fetches(fetches);
                    self.save_selection();
                    self.refresh_icons(all_icon_slots());
                }
            }
            Action::SetSpeed(speed) => {
                if let Some((loco, speed)) = self.state.commit_speed(speed) {
                    self.commands.set_speed(loco, i64::from(speed));
                }
            }
            Action::StepSpeed(steps) => {
                if let Some((loco, speed)) = self.state.step_speed(steps) {
                    self.commands.set_speed(loco, i64::from(speed));
                }
            }
            Action::SetDirection(direction) => {
                if let Some((loco, direction)) = self.state.set_direction(direction) {
                    self.commands.set_direction(loco, direction);
                }
            }
            Action::ToggleDirection => {
                if let Some((loco, direction)) = self.state.toggle_direction() {
                    self.commands.set_direction(loco, direction);
                }
            }
            Action::ToggleFunction(index) => {
                if let Some((loco, active)) = self.state.toggle_function(index) {
                    self.commands.set_function(loco, i64::from(index), active);
                    self.refresh_icons(iter::once(IconSlot::Function(index)));
                }
            }

            // ── Switch keyboard ───────────────────────────────────────────────
            Action::SetSwitch { address, side } => {
                if let Some(value) = self.state.switch_value(address, side) {
                    self.commands.set_switch(address, i64::from(value));
                }
            }
            Action::SelectPage(page) => self.select_page(page),
            Action::PageStep(step) => {
                let count = self.state.matrix.page_count() as i64;
                if count > 0 {
                    let page = (self.state.selection.page as i64 + i64::from(step)).rem_euclid(count);
                    self.select_page(page as usize);
                }
            }

            // ── System ────────────────────────────────────────────────────────
            Action::ToggleRunState => {
                let running = self.state.toggle_run_state();
                self.commands.set_run_state(running);
            }
            Action::SendInfo(info) => {
                self.commands.send_info(info);
                self.toast.success(format!("sent: {}", info.label()));
            }

            // ── Navigation ────────────────────────────────────────────────────
            Action::FocusNext => self.wm.focus_next(),
            Action::FocusPrev => self.wm.focus_prev(),
            Action::FocusPane(id) => self.wm.focus_pane(id),
            Action::SwitchView(view) => {
                self.wm.set_view(view);
                if self.state.set_view(view) {
                    self.save_selection();
                }
            }

            // ── Filter ────────────────────────────────────────────────────────
            Action::OpenFilter => self.state.input_mode = InputMode::Filter,
            Action::CloseFilter => self.state.input_mode = InputMode::Normal,

            // ── UI toggles ────────────────────────────────────────────────────
            Action::ToggleHelp => self.wm.toggle_help(),
            Action::ToggleInfo => self.wm.toggle_info(),
            Action::ToggleKeys => self.wm.show_keys_bar = !self.wm.show_keys_bar,

            Action::Quit => self.should_quit = true,
            Action::Resize(..) | Action::Noop => {}
        }
    }

    fn select_page(&mut self, page: usize) {
        let fetches = self.engine.select_page(&mut self.state, page);
        if !fetches.is_empty() {
            self.run_fetches(fetches);
            self.save_selection();
        }
    }

    // ── Drawing ───────────────────────────────────────────────────────────────

    fn draw(&mut self, frame: &mut ratatui::Frame) {
        let area = frame.area();
        frame.render_widget(Block::default().style(Style::default().bg(C_BG)), area);

        let outer = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(1), Constraint::Min(0), Constraint::Length(1)])
            .split(area);

        self.header.draw(frame, outer[0], &self.state);
        self.pane_areas.header = outer[0];

        let focused = self.wm.focused();
        match self.wm.view {
            View::Control => {
                let cols = Layout::default()
                    .direction(Direction::Horizontal)
                    .constraints([Constraint::Percentage(32), Constraint::Min(30)])
                    .split(outer[1]);
                self.loco_list.draw(
                    frame,
                    cols[0],
                    focused == Some(ComponentId::LocoList),
                    &self.state,
                );
                self.cab.draw(frame, cols[1], focused == Some(ComponentId::CabPanel), &self.state);
                self.pane_areas.loco_list = cols[0];
                self.pane_areas.cab = cols[1];
                self.pane_areas.switch_grid = Rect::default();
            }
            View::Keyboard => {
                self.switch_grid.draw(
                    frame,
                    outer[1],
                    focused == Some(ComponentId::SwitchGrid),
                    &self.state,
                );
                self.pane_areas.switch_grid = outer[1];
                self.pane_areas.loco_list = Rect::default();
                self.pane_areas.cab = Rect::default();
            }
        }

        draw_status_bar(
            frame,
            outer[2],
            &StatusLine {
                connected: self.state.connected,
                last_event_at: self.state.last_event_at,
                mode: self.state.input_mode,
                view: self.wm.view,
                show_keys: self.wm.show_keys_bar,
            },
        );

        self.pane_areas.overlay = Rect::default();
        if self.wm.show_info {
            self.info.draw(frame, area, true, &self.state);
            self.pane_areas.overlay = area;
        }
        if self.wm.show_help {
            self.help.draw(frame, area, true, &self.state);
        }

        self.toast.draw(frame, area);
    }
}
