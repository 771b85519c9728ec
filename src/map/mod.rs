//! Interactive map screen: the run loop tying the viewport, markers,
//! readiness gating, location, centering and mutations together.
//!
//! Everything asynchronous (pin fetches, mutations, geolocation) runs on
//! worker threads and is drained through channels once per frame; the frame
//! loop itself never blocks on the network.

pub mod centering;
pub mod markers;
pub mod readiness;
pub mod view;

use crate::api::{ApiClient, ApiError, Vibe, VibePayload};
use crate::demo;
use crate::forms::{
    ConfirmEvent, DeleteConfirm, FormEvent, FormMode, PendingPinLocation, PinDraft, PinForm,
};
use crate::identity::{Identity, Session};
use crate::location::{
    IpLocationProvider, LocationService, LocationStatus, StaticLocationProvider, UserLocation,
};
use crate::overlay::{draw_banner, draw_centered_panel, draw_panel, PanelLine};
use crate::pins::{adapt_vibes, Pin, PinStore};
use crate::settings::Settings;
use crate::terminal::{Input, Terminal};
use centering::{center_on_selected, CenterAction, SelectedPin, JUST_CREATED_SUPPRESS};
use chrono::Local;
use crossterm::event::KeyCode;
use crossterm::style::Color;
use markers::{build_markers, zoom_band, Marker, ZoomBand};
use readiness::{ReadinessGate, ReadySignal, TransitionOverlay};
use std::collections::VecDeque;
use std::io;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use view::{MapView, SELECTED_ZOOM};

const FRAME_MS: u64 = 30;

/// Zoom adopted when centering on the user's own location.
const LOCATION_ZOOM: f64 = 13.0;

const DENIED_BANNER: &str = "Location access denied. Using default map view.";
const UNAVAILABLE_BANNER: &str = "Location unavailable. Using default map view.";
const SIGN_IN_PROMPT: &str = "Sign in to drop a vibe pin.";

const SPINNER: [char; 10] = ['⠋', '⠙', '⠹', '⠸', '⠼', '⠴', '⠦', '⠧', '⠇', '⠏'];

pub struct MapRunConfig {
    pub selected: Option<SelectedPin>,
    pub from_profile: bool,
    pub demo: bool,
    pub demo_seed: u64,
}

/// How the map screen was left; main routes accordingly.
pub enum MapExit {
    Quit,
    OpenProfile(String),
}

// ============================================================================
// Session log
// ============================================================================

/// Bounded in-memory diagnostics; raw mode rules out stderr mid-frame.
pub struct SessionLog {
    lines: VecDeque<String>,
}

impl SessionLog {
    const CAP: usize = 100;

    pub fn new() -> Self {
        Self { lines: VecDeque::new() }
    }

    fn push(&mut self, level: &str, message: &str) {
        if self.lines.len() >= Self::CAP {
            self.lines.pop_front();
        }
        self.lines
            .push_back(format!("{} {} {}", Local::now().format("%H:%M:%S"), level, message));
    }

    pub fn info(&mut self, message: &str) {
        self.push("INFO", message);
    }

    pub fn warn(&mut self, message: &str) {
        self.push("WARN", message);
    }

    pub fn recent(&self, n: usize) -> impl Iterator<Item = &String> {
        self.lines.iter().rev().take(n)
    }
}

// ============================================================================
// Location completion policy
// ============================================================================

struct LocationDecision {
    recenter: Option<(f64, f64)>,
    banner: Option<&'static str>,
}

/// Policy applied when a geolocation attempt completes. Centering is skipped
/// while a pin selection owns the camera and for ~1 s after a pin was just
/// created; the readiness gate is signalled by the caller in every case so
/// the loading screen can never hang on a denied read.
fn decide_location_outcome(
    status: LocationStatus,
    location: Option<UserLocation>,
    selection_pending: bool,
    suppressed: bool,
) -> LocationDecision {
    match status {
        LocationStatus::Granted => LocationDecision {
            recenter: location
                .filter(|_| !selection_pending && !suppressed)
                .map(|loc| (loc.lat, loc.lng)),
            banner: None,
        },
        LocationStatus::Denied => LocationDecision {
            recenter: None,
            banner: Some(DENIED_BANNER),
        },
        LocationStatus::Unavailable => LocationDecision {
            recenter: None,
            banner: Some(UNAVAILABLE_BANNER),
        },
        LocationStatus::Requesting => LocationDecision {
            recenter: None,
            banner: None,
        },
    }
}

/// Wire a finished geolocation attempt into the readiness gate and the
/// viewport. Both gate signals fire on every outcome, denied included, so
/// the initial loading screen can never hang on a failed read. A manual
/// refresh recenters with an animation; the initial read jumps.
fn apply_location_completion(
    gate: &mut ReadinessGate,
    view: &mut MapView,
    decision: LocationDecision,
    was_refresh: bool,
) -> Option<&'static str> {
    gate.signal(ReadySignal::LocationProcessed);
    if let Some((lat, lng)) = decision.recenter {
        if was_refresh {
            view.fly_to(lat, lng, LOCATION_ZOOM, view::FLY_DURATION);
        } else {
            view.jump_to(lat, lng, LOCATION_ZOOM);
        }
    }
    gate.signal(ReadySignal::MapCentered);
    decision.banner
}

// ============================================================================
// Worker channels
// ============================================================================

fn spawn_fetch(api: &ApiClient) -> Receiver<Result<Vec<Vibe>, ApiError>> {
    let api = api.clone();
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let _ = tx.send(api.get_all_vibes());
    });
    rx
}

#[derive(Clone)]
enum MutationKind {
    Create(PinDraft),
    Update(u64, PinDraft),
    Delete(u64),
}

fn draft_payload(draft: &PinDraft) -> VibePayload {
    VibePayload {
        name: draft.name.clone(),
        description: draft.description.clone(),
        music_link: draft.music_link.clone(),
        latitude: format!("{:.6}", draft.lat),
        longitude: format!("{:.6}", draft.lng),
        is_private: draft.is_private,
        mood: draft.mood.map(|m| m.tag().to_string()),
    }
}

fn spawn_mutation(api: &ApiClient, kind: MutationKind) -> Receiver<Result<(), ApiError>> {
    let api = api.clone();
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let result = match &kind {
            MutationKind::Create(draft) => api.create_vibe(&draft_payload(draft)),
            MutationKind::Update(id, draft) => api.update_vibe(*id, &draft_payload(draft)),
            MutationKind::Delete(id) => api.delete_vibe(*id),
        };
        let _ = tx.send(result);
    });
    rx
}

fn draft_to_pin(draft: &PinDraft, id: u64, owner: &Identity) -> Pin {
    let keep = |s: &str| {
        let t = s.trim();
        (!t.is_empty()).then(|| t.to_string())
    };
    Pin {
        id,
        lat: draft.lat,
        lng: draft.lng,
        timestamp: chrono::Utc::now(),
        name: keep(&draft.name),
        description: keep(&draft.description),
        music_link: keep(&draft.music_link),
        is_private: draft.is_private,
        is_owner: true,
        owner: owner.clone(),
        mood: draft.mood,
    }
}

// ============================================================================
// Run state
// ============================================================================

#[derive(Default)]
struct MoveEndPlan {
    open_popup: Option<u64>,
    open_detail: Option<u64>,
    centering_done: bool,
}

struct MapApp {
    settings_narrow_columns: u16,
    identity: Option<Identity>,
    api: Option<ApiClient>,
    demo_mode: bool,

    view: MapView,
    gate: ReadinessGate,
    transition: TransitionOverlay,
    location: LocationService,
    store: PinStore,
    log: SessionLog,

    selected: Option<SelectedPin>,
    from_profile: bool,
    centering_consumed: bool,
    just_created_at: Option<Instant>,
    move_end_plan: Option<MoveEndPlan>,

    markers: Vec<Marker>,
    markers_version: u64,
    markers_band: Option<ZoomBand>,
    marker_cursor: Option<usize>,

    open_popup: Option<u64>,
    detail_page: Option<u64>,
    form: Option<PinForm>,
    confirm: Option<DeleteConfirm>,
    alert: Option<String>,
    banner: Option<&'static str>,
    show_log: bool,
    show_help: bool,

    fetch_rx: Option<Receiver<Result<Vec<Vibe>, ApiError>>>,
    mutation: Option<(MutationKind, Receiver<Result<(), ApiError>>)>,
    vibes_ever_loaded: bool,

    frame: usize,
    exit: Option<MapExit>,
}

impl MapApp {
    fn narrow(&self, cols: u16) -> bool {
        cols < self.settings_narrow_columns
    }

    fn selection_pending(&self) -> bool {
        self.selected.is_some() || self.move_end_plan.as_ref().is_some_and(|p| p.centering_done)
    }

    fn suppressed_by_recent_create(&self, now: Instant) -> bool {
        self.just_created_at
            .is_some_and(|at| now.duration_since(at) < JUST_CREATED_SUPPRESS)
    }

    fn force_logout(&mut self) {
        Session::clear();
        self.identity = None;
        if let Some(api) = &self.api {
            self.api = Some(api.without_token());
        }
        self.alert = Some("Session expired, please sign in again.".to_string());
        self.log.warn("session signature rejected, forced logout");
    }

    fn start_refetch(&mut self) {
        if self.demo_mode {
            return;
        }
        if let Some(api) = &self.api {
            if self.fetch_rx.is_none() {
                self.fetch_rx = Some(spawn_fetch(api));
            }
        }
    }

    fn displayed_pins(&self) -> Vec<Pin> {
        self.store.displayed()
    }

    fn rebuild_markers_if_stale(&mut self) {
        let band = zoom_band(self.view.zoom);
        if self.markers_version != self.store.version() || self.markers_band != Some(band) {
            self.markers = build_markers(&self.displayed_pins(), self.view.zoom);
            self.markers_version = self.store.version();
            self.markers_band = Some(band);
            if self
                .marker_cursor
                .is_some_and(|idx| idx >= self.markers.len())
            {
                self.marker_cursor = None;
            }
        }
    }
}

// ============================================================================
// Entry point
// ============================================================================

pub fn run(settings: &Settings, cfg: MapRunConfig) -> io::Result<MapExit> {
    let session = if cfg.demo { None } else { Session::load() };

    let identity = if cfg.demo {
        Some(Identity::new(demo::DEMO_PRINCIPAL))
    } else {
        session.as_ref().map(|s| s.principal.clone())
    };

    let api = if cfg.demo {
        None
    } else {
        Some(ApiClient::new(
            &settings.backend.url,
            session.map(|s| s.token),
        ))
    };

    let provider: Option<Arc<dyn crate::location::LocationProvider>> = if cfg.demo {
        Some(Arc::new(StaticLocationProvider(UserLocation {
            lat: 40.7306,
            lng: -73.9866,
            accuracy: 500.0,
        })))
    } else if settings.location.enabled {
        Some(Arc::new(IpLocationProvider::new(
            &settings.location.provider_url,
        )))
    } else {
        None
    };

    let mut location = LocationService::new(provider);
    location.request(false);

    let mut app = MapApp {
        settings_narrow_columns: settings.ui.narrow_columns,
        identity,
        api,
        demo_mode: cfg.demo,
        view: MapView::new(),
        gate: ReadinessGate::new(),
        transition: TransitionOverlay::new(),
        location,
        store: PinStore::new(),
        log: SessionLog::new(),
        selected: cfg.selected,
        from_profile: cfg.from_profile,
        centering_consumed: false,
        just_created_at: None,
        move_end_plan: None,
        markers: Vec::new(),
        markers_version: u64::MAX,
        markers_band: None,
        marker_cursor: None,
        open_popup: None,
        detail_page: None,
        form: None,
        confirm: None,
        alert: None,
        banner: None,
        show_log: false,
        show_help: false,
        fetch_rx: None,
        mutation: None,
        vibes_ever_loaded: false,
        frame: 0,
        exit: None,
    };

    // A pending selection during the loading transition starts the viewport
    // on the pin; otherwise the default view waits for the location read.
    if let Some(sel) = &app.selected {
        app.transition.begin(Instant::now());
        app.view.jump_to(sel.lat, sel.lng, SELECTED_ZOOM);
    }

    if cfg.demo {
        let (pins, warnings) = adapt_vibes(
            &demo::sample_vibes(24, cfg.demo_seed),
            app.identity.as_ref(),
        );
        for w in &warnings {
            app.log.warn(w);
        }
        app.store.reconcile(pins);
        app.gate.signal(ReadySignal::VibesLoaded);
        app.vibes_ever_loaded = true;
        app.log.info("demo data loaded");
    } else {
        app.start_refetch();
    }

    let mut term = Terminal::new(true)?;
    let (cols, rows) = term.size();
    if app.view.resize(cols, rows.saturating_sub(2)) {
        app.gate.signal(ReadySignal::MapInitialized);
    }

    loop {
        if let Some(input) = term.poll_input(FRAME_MS)? {
            match input {
                Input::Resized(w, h) => {
                    if app.view.resize(w, h.saturating_sub(2)) {
                        app.gate.signal(ReadySignal::MapInitialized);
                    }
                }
                Input::Key(code, _mods) => {
                    let narrow = app.narrow(term.size().0);
                    handle_key(&mut app, code, narrow);
                }
            }
        }

        step(&mut app, Instant::now());

        if let Some(exit) = app.exit.take() {
            return Ok(exit);
        }

        render(&mut app, &mut term)?;
        app.frame = app.frame.wrapping_add(1);
    }
}

// ============================================================================
// Per-frame logic
// ============================================================================

fn step(app: &mut MapApp, now: Instant) {
    // Geolocation completion.
    if let Some(status) = app.location.poll() {
        let was_refresh = app.gate.has(ReadySignal::LocationProcessed);
        let decision = decide_location_outcome(
            status,
            app.location.location,
            app.selection_pending(),
            app.suppressed_by_recent_create(now),
        );
        let banner = apply_location_completion(&mut app.gate, &mut app.view, decision, was_refresh);
        if let Some(text) = banner {
            app.banner = Some(text);
            app.log.warn(text);
        }
    }

    // Pin fetch completion.
    let fetch_result = match &app.fetch_rx {
        Some(rx) => match rx.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                Some(Err(ApiError::Network("fetch worker died".to_string())))
            }
        },
        None => None,
    };
    if let Some(result) = fetch_result {
        app.fetch_rx = None;
        match result {
            Ok(vibes) => {
                let (pins, warnings) = adapt_vibes(&vibes, app.identity.as_ref());
                for w in &warnings {
                    app.log.warn(w);
                }
                app.store.reconcile(pins);
                app.log.info(&format!("loaded {} vibes", app.store.displayed().len()));
            }
            Err(err) if err.is_session_expired() => app.force_logout(),
            Err(err) => {
                // Query failures degrade to the empty state, logged only.
                app.log.warn(&format!("vibe fetch failed: {}", err));
            }
        }
        app.gate.signal(ReadySignal::VibesLoaded);
        app.vibes_ever_loaded = true;
    }

    // Mutation completion.
    let mutation_result = match &app.mutation {
        Some((_, rx)) => match rx.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                Some(Err(ApiError::Network("mutation worker died".to_string())))
            }
        },
        None => None,
    };
    if let Some(result) = mutation_result {
        if let Some((kind, _)) = app.mutation.take() {
            match result {
                Ok(()) => {
                    apply_mutation_success(app, kind, now);
                    app.start_refetch();
                }
                Err(err) => {
                    if err.is_session_expired() {
                        app.force_logout();
                    } else {
                        app.alert = Some(format!("Could not save: {}", err));
                    }
                    // The form/modal stays open for retry.
                    if let Some(form) = &mut app.form {
                        form.submitting = false;
                    }
                    if let Some(confirm) = &mut app.confirm {
                        confirm.submitting = false;
                    }
                }
            }
        }
    }

    // Selected-pin centering, once the pin list has had a chance to load.
    if !app.centering_consumed && app.vibes_ever_loaded && app.view.is_initialized() {
        if let Some(selected) = app.selected.take() {
            app.centering_consumed = true;
            let pins = app.displayed_pins();
            let narrow = app.view.dot_size().0 < app.settings_narrow_columns as i32 * 2;
            match center_on_selected(&mut app.view, &pins, &selected, app.from_profile, narrow) {
                CenterAction::Jumped { pin_id } => {
                    if narrow {
                        app.detail_page = Some(pin_id);
                    } else {
                        app.open_popup = Some(pin_id);
                    }
                    app.transition.finish();
                    app.gate.signal(ReadySignal::MapCentered);
                }
                CenterAction::Flying { pin_id, popup_on_end } => {
                    app.move_end_plan = Some(MoveEndPlan {
                        open_popup: popup_on_end.then_some(pin_id),
                        open_detail: (!popup_on_end).then_some(pin_id),
                        centering_done: true,
                    });
                }
                CenterAction::NotFound => {
                    app.log.warn(&format!("selected pin {} not in view data", selected.id));
                    app.transition.finish();
                    app.gate.signal(ReadySignal::MapCentered);
                }
            }
        }
    }

    // Animation move-end.
    if app.view.tick() {
        if let Some(plan) = app.move_end_plan.take() {
            if plan.centering_done {
                app.transition.finish();
                app.gate.signal(ReadySignal::MapCentered);
            }
            if let Some(id) = plan.open_popup {
                app.open_popup = Some(id);
            }
            if let Some(id) = plan.open_detail {
                app.detail_page = Some(id);
            }
        }
    }

    app.rebuild_markers_if_stale();
}

fn apply_mutation_success(app: &mut MapApp, kind: MutationKind, now: Instant) {
    let owner = app
        .identity
        .clone()
        .unwrap_or_else(|| Identity::new("anonymous"));
    match kind {
        MutationKind::Create(draft) => {
            let pin = draft_to_pin(&draft, 0, &owner);
            let local_id = app.store.apply_create(pin);
            app.just_created_at = Some(now);
            app.form = None;
            app.log.info(&format!("created pin (local {})", local_id));
        }
        MutationKind::Update(id, draft) => {
            let pin = draft_to_pin(&draft, id, &owner);
            app.store.apply_update(pin);
            app.form = None;
            app.log.info(&format!("updated pin {}", id));
        }
        MutationKind::Delete(id) => {
            app.store.apply_delete(id);
            app.confirm = None;
            if app.open_popup == Some(id) {
                app.open_popup = None;
            }
            if app.detail_page == Some(id) {
                app.detail_page = None;
            }
            app.log.info(&format!("deleted pin {}", id));
        }
    }
}

// ============================================================================
// Key routing
// ============================================================================

fn handle_key(app: &mut MapApp, code: KeyCode, narrow: bool) {
    // Blocking layers first, outermost on top.
    if app.alert.is_some() {
        app.alert = None;
        return;
    }
    if app.show_help {
        app.show_help = false;
        return;
    }

    if let Some(form) = &mut app.form {
        match form.handle_key(code) {
            FormEvent::Cancelled => app.form = None,
            FormEvent::Submit(draft) => submit_form(app, draft),
            FormEvent::None => {}
        }
        return;
    }

    if let Some(confirm) = &mut app.confirm {
        match confirm.handle_key(code) {
            ConfirmEvent::Cancelled => app.confirm = None,
            ConfirmEvent::Confirmed => submit_delete(app),
            ConfirmEvent::None => {}
        }
        return;
    }

    if let Some(pin_id) = app.detail_page {
        handle_pin_actions(app, code, pin_id, true);
        return;
    }

    if let Some(pin_id) = app.open_popup {
        // A popup never auto-closes on background map input; only Esc or an
        // action dismisses it, and pan/zoom keys pass through.
        match code {
            KeyCode::Esc
            | KeyCode::Char('e')
            | KeyCode::Char('d')
            | KeyCode::Char('p') => {
                handle_pin_actions(app, code, pin_id, false);
                return;
            }
            _ => {}
        }
    }

    handle_map_key(app, code, narrow);
}

fn handle_map_key(app: &mut MapApp, code: KeyCode, narrow: bool) {
    match code {
        KeyCode::Char('q') => app.exit = Some(MapExit::Quit),
        KeyCode::Esc => app.exit = Some(MapExit::Quit),
        KeyCode::Up => app.view.pan_dots(0, -8),
        KeyCode::Down => app.view.pan_dots(0, 8),
        KeyCode::Left => app.view.pan_dots(-8, 0),
        KeyCode::Right => app.view.pan_dots(8, 0),
        KeyCode::Char('+') | KeyCode::Char('=') => app.view.zoom_by(1.0),
        KeyCode::Char('-') | KeyCode::Char('_') => app.view.zoom_by(-1.0),
        KeyCode::Enter => place_pin(app),
        KeyCode::Tab | KeyCode::Char('n') => cycle_marker(app, narrow, true),
        KeyCode::BackTab | KeyCode::Char('N') => cycle_marker(app, narrow, false),
        KeyCode::Char('g') => {
            if let Some(loc) = app.location.location {
                app.view.fly_to(loc.lat, loc.lng, LOCATION_ZOOM, view::FLY_DURATION);
            }
        }
        KeyCode::Char('r') => {
            if !app.location.pending() {
                app.location.request(true);
                app.log.info("refreshing location");
            }
        }
        KeyCode::Char('l') => app.show_log = !app.show_log,
        KeyCode::Char('?') => app.show_help = true,
        _ => {}
    }
}

/// Shared edit/delete/profile actions for an open popup or detail page.
fn handle_pin_actions(app: &mut MapApp, code: KeyCode, pin_id: u64, is_detail: bool) {
    let Some(pin) = app.store.find(pin_id) else {
        app.open_popup = None;
        app.detail_page = None;
        return;
    };
    match code {
        KeyCode::Esc => {
            if is_detail {
                app.detail_page = None;
            } else {
                app.open_popup = None;
            }
        }
        KeyCode::Char('e') if pin.is_owner => {
            app.form = Some(PinForm::edit(&pin));
        }
        KeyCode::Char('d') if pin.is_owner => {
            app.confirm = Some(DeleteConfirm::new(&pin));
        }
        KeyCode::Char('p') => {
            app.exit = Some(MapExit::OpenProfile(pin.owner.as_str().to_string()));
        }
        _ => {}
    }
}

/// Marker "tap": wide terminals open the popup in place (exclusively); a
/// narrow terminal pans to the marker and opens its detail page once the
/// pan completes.
fn cycle_marker(app: &mut MapApp, narrow: bool, forward: bool) {
    if app.markers.is_empty() {
        return;
    }
    let next = match app.marker_cursor {
        Some(idx) if forward => (idx + 1) % app.markers.len(),
        Some(idx) => (idx + app.markers.len() - 1) % app.markers.len(),
        None => 0,
    };
    app.marker_cursor = Some(next);
    let marker = app.markers[next].clone();

    if narrow {
        app.open_popup = None;
        let zoom = app.view.zoom;
        app.view
            .fly_to(marker.lat, marker.lng, zoom, view::FLY_DURATION);
        app.move_end_plan = Some(MoveEndPlan {
            open_popup: None,
            open_detail: Some(marker.pin_id),
            centering_done: false,
        });
    } else {
        // Exclusive popups: opening one closes the other.
        app.open_popup = Some(marker.pin_id);
    }
}

fn place_pin(app: &mut MapApp) {
    if app.identity.is_none() {
        app.alert = Some(SIGN_IN_PROMPT.to_string());
        return;
    }
    let (dw, dh) = app.view.dot_size();
    let (lat, lng) = app.view.dot_to_geo(dw / 2, dh / 2);
    app.form = Some(PinForm::create(PendingPinLocation { lat, lng }));
}

fn submit_form(app: &mut MapApp, draft: PinDraft) {
    let Some(form) = &mut app.form else { return };
    form.submitting = true;

    let kind = match form.mode {
        FormMode::Create(_) => MutationKind::Create(draft),
        FormMode::Edit { pin_id, .. } => MutationKind::Update(pin_id, draft),
    };

    if app.demo_mode {
        // No backend: apply the optimistic patch directly.
        apply_mutation_success(app, kind, Instant::now());
        return;
    }
    let Some(api) = &app.api else { return };
    let rx = spawn_mutation(api, kind.clone());
    app.mutation = Some((kind, rx));
}

fn submit_delete(app: &mut MapApp) {
    let Some(confirm) = &mut app.confirm else { return };
    confirm.submitting = true;
    let kind = MutationKind::Delete(confirm.pin_id);

    if app.demo_mode {
        apply_mutation_success(app, kind, Instant::now());
        return;
    }
    let Some(api) = &app.api else { return };
    let rx = spawn_mutation(api, kind.clone());
    app.mutation = Some((kind, rx));
}

// ============================================================================
// Rendering
// ============================================================================

fn render(app: &mut MapApp, term: &mut Terminal) -> io::Result<()> {
    term.clear();
    let (cols, rows) = term.size();
    let now = Instant::now();

    if let Some(pin_id) = app.detail_page {
        render_detail_page(app, term, pin_id, cols);
        term.render()?;
        return Ok(());
    }

    draw_base_map(app, term, rows);
    draw_markers(app, term);
    draw_crosshair(app, term);
    draw_hud(app, term, rows);

    if app.show_log {
        draw_log_overlay(app, term);
    }
    if let Some(pin_id) = app.open_popup {
        draw_popup(app, term, pin_id);
    }
    if let Some(form) = &app.form {
        form.render(term);
    }
    if let Some(confirm) = &app.confirm {
        confirm.render(term);
    }
    if app.show_help {
        draw_centered_panel(term, &help_lines());
    }

    if app.transition.is_active(now) {
        let spinner = SPINNER[app.frame % SPINNER.len()];
        draw_centered_panel(
            term,
            &[
                PanelLine::title(format!("{} Finding your vibe...", spinner)),
                PanelLine::new("hang tight while the map settles"),
            ],
        );
    }

    if app.gate.is_initial_loading(now) {
        draw_loading_screen(app, term);
    }

    if let Some(alert) = &app.alert {
        let mut lines = vec![PanelLine::title("Notice"), PanelLine::new("")];
        for line in crate::overlay::wrap_text(alert, 44) {
            lines.push(PanelLine::new(line));
        }
        lines.push(PanelLine::new(""));
        lines.push(PanelLine::colored("press any key", Color::DarkGrey));
        draw_centered_panel(term, &lines);
    }

    term.render()
}

/// Graticule rendered as braille dots; the cheap stand-in for a tile layer,
/// which is an external collaborator here.
fn draw_base_map(app: &MapApp, term: &mut Terminal, rows: u16) {
    let (dw, dh) = app.view.dot_size();
    if dw <= 0 || dh <= 0 {
        return;
    }
    let mut dots = vec![vec![0u8; dw as usize]; dh as usize];

    let (lat_min, lat_max, lng_min, lng_max) = app.view.bounds();
    let step = graticule_step(lng_max - lng_min);

    let mut lng = (lng_min / step).floor() * step;
    let mut guard = 0;
    while lng <= lng_max && guard < 200 {
        let (dx, _) = app.view.geo_to_dot(app.view.center_lat, lng);
        if dx >= 0 && dx < dw {
            for row in dots.iter_mut() {
                row[dx as usize] = 1;
            }
        }
        lng += step;
        guard += 1;
    }

    let mut lat = (lat_min / step).floor() * step;
    let mut guard = 0;
    while lat <= lat_max && guard < 200 {
        let (_, dy) = app.view.geo_to_dot(lat, app.view.center_lng);
        if dy >= 0 && dy < dh {
            for x in 0..dw as usize {
                dots[dy as usize][x] = 1;
            }
        }
        lat += step;
        guard += 1;
    }

    // Marker halos land in the dot layer under the glyphs.
    for marker in &app.markers {
        if !marker.halo {
            continue;
        }
        let (mx, my) = app.view.geo_to_dot(marker.lat, marker.lng);
        for (ox, oy) in [(-2, 0), (2, 0), (0, -2), (0, 2), (-1, -1), (1, -1), (-1, 1), (1, 1)] {
            let (px, py) = (mx + ox, my + oy);
            if px >= 0 && px < dw && py >= 0 && py < dh {
                dots[py as usize][px as usize] = 2;
            }
        }
    }

    // Merge 2x4 dot blocks into braille cells, offset one row down for the
    // banner line.
    let map_rows = rows.saturating_sub(2) as usize;
    for cy in 0..map_rows {
        let by = cy * 4;
        if by + 3 >= dh as usize {
            continue;
        }
        for cx in 0..(dw / 2) as usize {
            let bx = cx * 2;

            let positions = [
                (by, bx),
                (by + 1, bx),
                (by + 2, bx),
                (by, bx + 1),
                (by + 1, bx + 1),
                (by + 2, bx + 1),
                (by + 3, bx),
                (by + 3, bx + 1),
            ];
            let dot_bits = [0x01, 0x02, 0x04, 0x08, 0x10, 0x20, 0x40, 0x80];

            let mut bits: u8 = 0;
            let mut max_val: u8 = 0;
            for (i, &(py, px)) in positions.iter().enumerate() {
                let val = dots[py][px];
                if val > 0 {
                    bits |= dot_bits[i];
                    max_val = max_val.max(val);
                }
            }

            if bits > 0 {
                let ch = char::from_u32(0x2800 + bits as u32).unwrap_or(' ');
                let color = if max_val >= 2 { Color::Yellow } else { Color::DarkGrey };
                term.set(cx as i32, cy as i32 + 1, ch, Some(color), max_val >= 2);
            }
        }
    }
}

/// Degree spacing for graticule lines, tuned to keep a handful of lines in
/// view at any zoom.
fn graticule_step(lng_span: f64) -> f64 {
    const STEPS: [f64; 13] = [
        0.01, 0.02, 0.05, 0.1, 0.2, 0.5, 1.0, 2.0, 5.0, 10.0, 15.0, 30.0, 45.0,
    ];
    let target = (lng_span / 6.0).abs().max(1e-6);
    for step in STEPS {
        if step >= target {
            return step;
        }
    }
    45.0
}

fn draw_markers(app: &MapApp, term: &mut Terminal) {
    for marker in &app.markers {
        let (dx, dy) = app.view.geo_to_dot(marker.lat, marker.lng);
        if !app.view.dot_visible(dx, dy) {
            continue;
        }
        let (cx, cy) = (dx / 2, dy / 4 + 1);
        term.set(cx, cy, marker.glyph, Some(marker.color), marker.bold);
    }
}

fn draw_crosshair(app: &MapApp, term: &mut Terminal) {
    let (dw, dh) = app.view.dot_size();
    let (cx, cy) = (dw / 4, dh / 8 + 1);
    term.set(cx, cy, '+', Some(Color::White), true);
}

fn draw_hud(app: &MapApp, term: &mut Terminal, rows: u16) {
    if let Some(banner) = app.banner {
        draw_banner(term, banner, Color::Yellow);
    }

    let auth = match &app.identity {
        Some(identity) => identity.as_str().to_string(),
        None => "not signed in".to_string(),
    };
    let status = format!(
        " {} | z{:.1} ({:.4}, {:.4}) | {} pins | {} | ? help",
        auth,
        app.view.zoom,
        app.view.center_lat,
        app.view.center_lng,
        app.markers.len(),
        app.location.status.describe(),
    );
    let y = rows as i32 - 1;
    term.fill_row(y, ' ', None);
    term.set_str(0, y, &status, Some(Color::DarkGrey), false);
}

fn draw_popup(app: &MapApp, term: &mut Terminal, pin_id: u64) {
    let Some(pin) = app.store.find(pin_id) else {
        return;
    };
    let lines = markers::popup_lines(&pin);
    let (dx, dy) = app.view.geo_to_dot(pin.lat, pin.lng);
    draw_panel(term, dx / 2 + 2, dy / 4 - 1, &lines);
}

fn render_detail_page(app: &MapApp, term: &mut Terminal, pin_id: u64, cols: u16) {
    let Some(pin) = app.store.find(pin_id) else {
        return;
    };
    let lines = markers::detail_lines(&pin, cols as usize);
    for (i, line) in lines.iter().enumerate() {
        term.set_str(2, i as i32 + 1, &line.text, Some(line.fg), line.bold);
    }
}

fn draw_log_overlay(app: &MapApp, term: &mut Terminal) {
    let mut lines = vec![PanelLine::title("Session log")];
    let recent: Vec<&String> = app.log.recent(12).collect();
    if recent.is_empty() {
        lines.push(PanelLine::new("(empty)"));
    }
    for entry in recent.iter().rev() {
        let color = if entry.contains("WARN") { Color::Yellow } else { Color::DarkGrey };
        lines.push(PanelLine::colored((*entry).clone(), color));
    }
    draw_panel(term, 1, 1, &lines);
}

fn draw_loading_screen(app: &mut MapApp, term: &mut Terminal) {
    let spinner = SPINNER[app.frame % SPINNER.len()];
    let check = |ready: bool| if ready { '✓' } else { '…' };
    let lines = [
        PanelLine::title(format!("{} Loading vibes", spinner)),
        PanelLine::new(""),
        PanelLine::new(format!("  map      {}", check(app.gate.has(ReadySignal::MapInitialized)))),
        PanelLine::new(format!("  pins     {}", check(app.gate.has(ReadySignal::VibesLoaded)))),
        PanelLine::new(format!("  location {}", check(app.gate.has(ReadySignal::LocationProcessed)))),
        PanelLine::new(format!("  centered {}", check(app.gate.has(ReadySignal::MapCentered)))),
    ];
    draw_centered_panel(term, &lines);
}

fn help_lines() -> Vec<PanelLine> {
    [
        ("VIBEMAP", true),
        ("", false),
        ("arrows   pan", false),
        ("+/-      zoom", false),
        ("Enter    drop a pin here", false),
        ("Tab/n    next pin (popup)", false),
        ("g        go to my location", false),
        ("r        refresh location", false),
        ("l        session log", false),
        ("?        this help", false),
        ("q/Esc    quit", false),
    ]
    .iter()
    .map(|(text, title)| {
        if *title {
            PanelLine::title(*text)
        } else {
            PanelLine::new(*text)
        }
    })
    .collect()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn denied_location_keeps_default_view_and_banners() {
        // Scenario: geolocation denied on a fresh map.
        let decision = decide_location_outcome(LocationStatus::Denied, None, false, false);
        assert!(decision.recenter.is_none());
        assert_eq!(decision.banner, Some(DENIED_BANNER));
    }

    #[test]
    fn granted_location_recenters() {
        let loc = UserLocation { lat: 51.5, lng: -0.1, accuracy: 100.0 };
        let decision = decide_location_outcome(LocationStatus::Granted, Some(loc), false, false);
        assert_eq!(decision.recenter, Some((51.5, -0.1)));
        assert!(decision.banner.is_none());
    }

    #[test]
    fn pending_selection_owns_the_camera() {
        let loc = UserLocation { lat: 51.5, lng: -0.1, accuracy: 100.0 };
        let decision = decide_location_outcome(LocationStatus::Granted, Some(loc), true, false);
        assert!(decision.recenter.is_none());
    }

    #[test]
    fn fresh_create_suppresses_recenter() {
        let loc = UserLocation { lat: 51.5, lng: -0.1, accuracy: 100.0 };
        let decision = decide_location_outcome(LocationStatus::Granted, Some(loc), false, true);
        assert!(decision.recenter.is_none());
    }

    #[test]
    fn unavailable_location_banners_too() {
        let decision = decide_location_outcome(LocationStatus::Unavailable, None, false, false);
        assert!(decision.recenter.is_none());
        assert_eq!(decision.banner, Some(UNAVAILABLE_BANNER));
    }

    #[test]
    fn denied_location_still_releases_the_gate() {
        // Denial must not hang the loading screen: both gate signals fire
        // and the default view survives untouched.
        let mut gate = ReadinessGate::new();
        let mut view = MapView::new();
        view.resize(80, 24);
        let before = (view.center_lat, view.center_lng, view.zoom);

        let decision = decide_location_outcome(LocationStatus::Denied, None, false, false);
        let banner = apply_location_completion(&mut gate, &mut view, decision, false);

        assert_eq!(banner, Some(DENIED_BANNER));
        assert!(gate.has(ReadySignal::LocationProcessed));
        assert!(gate.has(ReadySignal::MapCentered));
        assert_eq!(before, (view.center_lat, view.center_lng, view.zoom));
    }

    #[test]
    fn initial_read_jumps_but_refresh_flies() {
        let mut gate = ReadinessGate::new();
        let mut view = MapView::new();
        view.resize(80, 24);
        let loc = UserLocation { lat: 51.5, lng: -0.1, accuracy: 10.0 };

        let decision = decide_location_outcome(LocationStatus::Granted, Some(loc), false, false);
        apply_location_completion(&mut gate, &mut view, decision, false);
        assert!((view.center_lat - 51.5).abs() < 1e-9);
        assert!(!view.is_animating());

        let decision = decide_location_outcome(LocationStatus::Granted, Some(loc), false, false);
        apply_location_completion(&mut gate, &mut view, decision, true);
        assert!(view.is_animating());
    }

    #[test]
    fn graticule_step_scales_with_span() {
        assert!(graticule_step(0.05) < graticule_step(10.0));
        assert!(graticule_step(300.0) <= 45.0);
        // Always a positive spacing, even for degenerate spans.
        assert!(graticule_step(0.0) > 0.0);
    }

    #[test]
    fn session_log_is_bounded() {
        let mut log = SessionLog::new();
        for i in 0..250 {
            log.info(&format!("entry {}", i));
        }
        assert_eq!(log.lines.len(), SessionLog::CAP);
        let newest = log.recent(1).next().unwrap();
        assert!(newest.contains("entry 249"));
    }

    #[test]
    fn draft_pin_marks_owner() {
        let draft = PinDraft {
            name: "Coffee Shop".into(),
            description: "".into(),
            music_link: "".into(),
            lat: 40.0,
            lng: -73.0,
            is_private: false,
            mood: None,
        };
        let pin = draft_to_pin(&draft, 7, &Identity::new("me"));
        assert!(pin.is_owner);
        assert_eq!(pin.display_name(), "Coffee Shop");
        assert!(pin.description.is_none());
    }

    #[test]
    fn payload_formats_coordinates_as_strings() {
        let draft = PinDraft {
            name: "Coffee Shop".into(),
            description: "".into(),
            music_link: "https://open.spotify.com/track/x".into(),
            lat: 40.0,
            lng: -73.0,
            is_private: false,
            mood: None,
        };
        let payload = draft_payload(&draft);
        assert_eq!(payload.latitude, "40.000000");
        assert_eq!(payload.longitude, "-73.000000");
        assert_eq!(payload.music_link, "https://open.spotify.com/track/x");
        assert!(!payload.is_private);
    }
}
