//! Loading-readiness gating for the map screen.
//!
//! Four independent signals gate the initial loading overlay; arrival order
//! never matters, only the conjunction. A short settle delay after the last
//! signal avoids a flash of half-laid-out frames. The separate transition
//! overlay covers selected-pin centering and clears itself on a hard timeout
//! so a lost move-end event cannot wedge the screen.

use std::time::{Duration, Instant};

/// Settle delay between all-ready and dismissing the initial overlay.
pub const SETTLE_DELAY: Duration = Duration::from_millis(200);

/// Hard ceiling on the centering transition overlay.
pub const TRANSITION_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadySignal {
    MapInitialized,
    VibesLoaded,
    LocationProcessed,
    MapCentered,
}

/// Monotone readiness record: each signal flips false to true at most once
/// per mount and only a fresh gate resets them.
pub struct ReadinessGate {
    map_initialized: bool,
    vibes_loaded: bool,
    location_processed: bool,
    map_centered: bool,
    settled_at: Option<Instant>,
    initial_done: bool,
}

impl ReadinessGate {
    pub fn new() -> Self {
        Self {
            map_initialized: false,
            vibes_loaded: false,
            location_processed: false,
            map_centered: false,
            settled_at: None,
            initial_done: false,
        }
    }

    pub fn signal(&mut self, signal: ReadySignal) {
        match signal {
            ReadySignal::MapInitialized => self.map_initialized = true,
            ReadySignal::VibesLoaded => self.vibes_loaded = true,
            ReadySignal::LocationProcessed => self.location_processed = true,
            ReadySignal::MapCentered => self.map_centered = true,
        }
    }

    pub fn all_ready(&self) -> bool {
        self.map_initialized && self.vibes_loaded && self.location_processed && self.map_centered
    }

    pub fn has(&self, signal: ReadySignal) -> bool {
        match signal {
            ReadySignal::MapInitialized => self.map_initialized,
            ReadySignal::VibesLoaded => self.vibes_loaded,
            ReadySignal::LocationProcessed => self.location_processed,
            ReadySignal::MapCentered => self.map_centered,
        }
    }

    /// Whether the initial loading overlay is still up at `now`. Once it
    /// drops it never comes back for this gate.
    pub fn is_initial_loading(&mut self, now: Instant) -> bool {
        if self.initial_done {
            return false;
        }
        if !self.all_ready() {
            return true;
        }
        let settled = *self.settled_at.get_or_insert(now);
        if now.duration_since(settled) >= SETTLE_DELAY {
            self.initial_done = true;
            return false;
        }
        true
    }
}

/// Overlay shown while a selected-pin centering transition runs. Cleared on
/// completion, or forcibly once the hard timeout passes.
pub struct TransitionOverlay {
    started: Option<Instant>,
}

impl TransitionOverlay {
    pub fn new() -> Self {
        Self { started: None }
    }

    pub fn begin(&mut self, now: Instant) {
        self.started = Some(now);
    }

    pub fn finish(&mut self) {
        self.started = None;
    }

    pub fn is_active(&mut self, now: Instant) -> bool {
        match self.started {
            Some(started) if now.duration_since(started) >= TRANSITION_TIMEOUT => {
                self.started = None;
                false
            }
            Some(_) => true,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ReadySignal::*;

    const ALL: [ReadySignal; 4] = [MapInitialized, VibesLoaded, LocationProcessed, MapCentered];

    #[test]
    fn all_ready_requires_every_signal() {
        for skip in 0..ALL.len() {
            let mut gate = ReadinessGate::new();
            for (i, signal) in ALL.iter().enumerate() {
                if i != skip {
                    gate.signal(*signal);
                }
            }
            assert!(!gate.all_ready(), "missing signal {:?} should block", ALL[skip]);
        }
    }

    #[test]
    fn arrival_order_is_irrelevant() {
        // All 24 permutations of the four signals converge to ready.
        let permutations = [
            [0, 1, 2, 3], [0, 1, 3, 2], [0, 2, 1, 3], [0, 2, 3, 1], [0, 3, 1, 2], [0, 3, 2, 1],
            [1, 0, 2, 3], [1, 0, 3, 2], [1, 2, 0, 3], [1, 2, 3, 0], [1, 3, 0, 2], [1, 3, 2, 0],
            [2, 0, 1, 3], [2, 0, 3, 1], [2, 1, 0, 3], [2, 1, 3, 0], [2, 3, 0, 1], [2, 3, 1, 0],
            [3, 0, 1, 2], [3, 0, 2, 1], [3, 1, 0, 2], [3, 1, 2, 0], [3, 2, 0, 1], [3, 2, 1, 0],
        ];
        for order in permutations {
            let mut gate = ReadinessGate::new();
            for idx in order {
                gate.signal(ALL[idx]);
            }
            assert!(gate.all_ready());
        }
    }

    #[test]
    fn duplicate_signals_are_harmless() {
        let mut gate = ReadinessGate::new();
        gate.signal(VibesLoaded);
        gate.signal(VibesLoaded);
        assert!(!gate.all_ready());
        for signal in ALL {
            gate.signal(signal);
        }
        assert!(gate.all_ready());
    }

    #[test]
    fn initial_overlay_waits_for_settle_delay() {
        let mut gate = ReadinessGate::new();
        let t0 = Instant::now();
        assert!(gate.is_initial_loading(t0));

        for signal in ALL {
            gate.signal(signal);
        }
        // All ready, but inside the settle window.
        assert!(gate.is_initial_loading(t0));
        // Past the settle window.
        assert!(!gate.is_initial_loading(t0 + SETTLE_DELAY));
        // And it never comes back.
        assert!(!gate.is_initial_loading(t0 + SETTLE_DELAY * 10));
    }

    #[test]
    fn transition_overlay_times_out() {
        let mut overlay = TransitionOverlay::new();
        let t0 = Instant::now();
        assert!(!overlay.is_active(t0));

        overlay.begin(t0);
        assert!(overlay.is_active(t0 + Duration::from_secs(1)));
        assert!(!overlay.is_active(t0 + TRANSITION_TIMEOUT));

        overlay.begin(t0);
        overlay.finish();
        assert!(!overlay.is_active(t0));
    }
}
