//! Web-Mercator viewport over the terminal's braille dot grid.
//!
//! The canvas is addressed in "dots": each terminal cell holds a 2x4 braille
//! block, so a cols x rows map area gives a (cols*2) x (rows*4) dot grid.
//! One dot corresponds to one world pixel at the current zoom, with the
//! standard 256 px tile scale.

use std::f64::consts::PI;
use std::time::{Duration, Instant};

/// Standard OSM tile size; world width in px at zoom z is 256 * 2^z.
pub const TILE_SIZE: f64 = 256.0;

/// Default viewport: New York City at zoom 10.
pub const DEFAULT_CENTER: (f64, f64) = (40.7128, -74.0060);
pub const DEFAULT_ZOOM: f64 = 10.0;

/// Zoom used when centering on a selected pin.
pub const SELECTED_ZOOM: f64 = 16.0;

pub const MIN_ZOOM: f64 = 1.0;
pub const MAX_ZOOM: f64 = 19.0;

/// Web-Mercator latitude clamp.
const MAX_LAT: f64 = 85.05112878;

pub const FLY_DURATION: Duration = Duration::from_millis(700);

/// Geographic coordinates to world pixels at the given zoom.
pub fn project(lat: f64, lng: f64, zoom: f64) -> (f64, f64) {
    let world = TILE_SIZE * 2f64.powf(zoom);
    let lat = lat.clamp(-MAX_LAT, MAX_LAT);
    let x = (lng + 180.0) / 360.0 * world;
    let lat_rad = lat.to_radians();
    let y = (1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / PI) / 2.0 * world;
    (x, y)
}

/// World pixels back to geographic coordinates.
pub fn unproject(x: f64, y: f64, zoom: f64) -> (f64, f64) {
    let world = TILE_SIZE * 2f64.powf(zoom);
    let lng = x / world * 360.0 - 180.0;
    let n = PI * (1.0 - 2.0 * y / world);
    let lat = n.sinh().atan().to_degrees();
    (lat, lng)
}

struct Fly {
    from: (f64, f64, f64),
    to: (f64, f64, f64),
    started: Instant,
    duration: Duration,
}

/// The single map viewport instance. All other map components borrow it;
/// none construct a second one for the same screen area.
pub struct MapView {
    pub center_lat: f64,
    pub center_lng: f64,
    pub zoom: f64,
    dot_w: i32,
    dot_h: i32,
    animation: Option<Fly>,
    initialized: bool,
}

impl MapView {
    pub fn new() -> Self {
        Self {
            center_lat: DEFAULT_CENTER.0,
            center_lng: DEFAULT_CENTER.1,
            zoom: DEFAULT_ZOOM,
            dot_w: 0,
            dot_h: 0,
            animation: None,
            initialized: false,
        }
    }

    /// Adopt the map area in terminal cells. Returns true the first time the
    /// area becomes non-zero (the "initialized" signal fires once).
    pub fn resize(&mut self, cols: u16, rows: u16) -> bool {
        self.dot_w = cols as i32 * 2;
        self.dot_h = rows as i32 * 4;
        if !self.initialized && cols > 0 && rows > 0 {
            self.initialized = true;
            return true;
        }
        false
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn dot_size(&self) -> (i32, i32) {
        (self.dot_w, self.dot_h)
    }

    /// Screen dot for a geographic position; may be outside the viewport.
    pub fn geo_to_dot(&self, lat: f64, lng: f64) -> (i32, i32) {
        let (cx, cy) = project(self.center_lat, self.center_lng, self.zoom);
        let (x, y) = project(lat, lng, self.zoom);
        (
            (x - cx + self.dot_w as f64 / 2.0).round() as i32,
            (y - cy + self.dot_h as f64 / 2.0).round() as i32,
        )
    }

    pub fn dot_visible(&self, dx: i32, dy: i32) -> bool {
        dx >= 0 && dx < self.dot_w && dy >= 0 && dy < self.dot_h
    }

    /// Geographic position of a screen dot.
    pub fn dot_to_geo(&self, dx: i32, dy: i32) -> (f64, f64) {
        let (cx, cy) = project(self.center_lat, self.center_lng, self.zoom);
        unproject(
            cx + dx as f64 - self.dot_w as f64 / 2.0,
            cy + dy as f64 - self.dot_h as f64 / 2.0,
            self.zoom,
        )
    }

    /// Geographic bounds of the viewport as (lat_min, lat_max, lng_min, lng_max).
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        let (top_lat, left_lng) = self.dot_to_geo(0, 0);
        let (bottom_lat, right_lng) = self.dot_to_geo(self.dot_w - 1, self.dot_h - 1);
        (
            bottom_lat.min(top_lat),
            bottom_lat.max(top_lat),
            left_lng.min(right_lng),
            left_lng.max(right_lng),
        )
    }

    /// Pan by a dot delta. Cancels any running animation.
    pub fn pan_dots(&mut self, dx: i32, dy: i32) {
        self.animation = None;
        let (cx, cy) = project(self.center_lat, self.center_lng, self.zoom);
        let (lat, lng) = unproject(cx + dx as f64, cy + dy as f64, self.zoom);
        self.center_lat = lat.clamp(-MAX_LAT, MAX_LAT);
        self.center_lng = wrap_lng(lng);
    }

    pub fn zoom_by(&mut self, delta: f64) {
        self.animation = None;
        self.zoom = (self.zoom + delta).clamp(MIN_ZOOM, MAX_ZOOM);
    }

    /// Instant view change, no animation.
    pub fn jump_to(&mut self, lat: f64, lng: f64, zoom: f64) {
        self.animation = None;
        self.center_lat = lat.clamp(-MAX_LAT, MAX_LAT);
        self.center_lng = wrap_lng(lng);
        self.zoom = zoom.clamp(MIN_ZOOM, MAX_ZOOM);
    }

    /// Animated view change; completion is reported by `tick`.
    pub fn fly_to(&mut self, lat: f64, lng: f64, zoom: f64, duration: Duration) {
        self.animation = Some(Fly {
            from: (self.center_lat, self.center_lng, self.zoom),
            to: (
                lat.clamp(-MAX_LAT, MAX_LAT),
                wrap_lng(lng),
                zoom.clamp(MIN_ZOOM, MAX_ZOOM),
            ),
            started: Instant::now(),
            duration,
        });
    }

    pub fn is_animating(&self) -> bool {
        self.animation.is_some()
    }

    /// Advance the animation. Returns true exactly once, on the tick the
    /// animation completes (the move-end event).
    pub fn tick(&mut self) -> bool {
        let Some(fly) = &self.animation else {
            return false;
        };

        let t = fly.started.elapsed().as_secs_f64() / fly.duration.as_secs_f64().max(1e-6);
        if t >= 1.0 {
            let (lat, lng, zoom) = fly.to;
            self.center_lat = lat;
            self.center_lng = lng;
            self.zoom = zoom;
            self.animation = None;
            return true;
        }

        // Ease-out cubic
        let eased = 1.0 - (1.0 - t).powi(3);
        let (flat, flng, fzoom) = fly.from;
        let (tlat, tlng, tzoom) = fly.to;
        self.center_lat = flat + (tlat - flat) * eased;
        self.center_lng = flng + lng_delta(flng, tlng) * eased;
        self.zoom = fzoom + (tzoom - fzoom) * eased;
        false
    }

    /// Center target that places (lat, lng) `dy_dots` above the viewport
    /// center at the given zoom, converted through the projection so the
    /// offset is exact at that zoom.
    pub fn offset_target(&self, lat: f64, lng: f64, zoom: f64, dy_dots: i32) -> (f64, f64) {
        let (x, y) = project(lat, lng, zoom);
        unproject(x, y + dy_dots as f64, zoom)
    }
}

fn wrap_lng(lng: f64) -> f64 {
    let mut lng = lng;
    while lng > 180.0 {
        lng -= 360.0;
    }
    while lng < -180.0 {
        lng += 360.0;
    }
    lng
}

/// Shortest signed longitude delta, so flights cross the antimeridian the
/// short way.
fn lng_delta(from: f64, to: f64) -> f64 {
    let mut delta = to - from;
    if delta > 180.0 {
        delta -= 360.0;
    } else if delta < -180.0 {
        delta += 360.0;
    }
    delta
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn project_unproject_round_trip() {
        for &(lat, lng) in &[(0.0, 0.0), (40.7128, -74.0060), (-33.9, 151.2), (60.2, 24.9)] {
            for zoom in [2.0, 10.0, 16.0] {
                let (x, y) = project(lat, lng, zoom);
                let (lat2, lng2) = unproject(x, y, zoom);
                assert!((lat - lat2).abs() < 1e-6, "lat {} vs {}", lat, lat2);
                assert!((lng - lng2).abs() < 1e-6, "lng {} vs {}", lng, lng2);
            }
        }
    }

    #[test]
    fn center_maps_to_viewport_middle() {
        let mut view = MapView::new();
        view.resize(80, 24);
        let (dx, dy) = view.geo_to_dot(view.center_lat, view.center_lng);
        assert_eq!((dx, dy), (80, 48));
    }

    #[test]
    fn initialized_fires_once() {
        let mut view = MapView::new();
        assert!(!view.is_initialized());
        assert!(view.resize(80, 24));
        assert!(!view.resize(100, 30));
        assert!(view.is_initialized());
    }

    #[test]
    fn pan_moves_center_east() {
        let mut view = MapView::new();
        view.resize(80, 24);
        let before = view.center_lng;
        view.pan_dots(10, 0);
        assert!(view.center_lng > before);
    }

    #[test]
    fn zoom_clamps_to_range() {
        let mut view = MapView::new();
        view.zoom_by(100.0);
        assert_eq!(view.zoom, MAX_ZOOM);
        view.zoom_by(-100.0);
        assert_eq!(view.zoom, MIN_ZOOM);
    }

    #[test]
    fn fly_completes_with_move_end() {
        let mut view = MapView::new();
        view.resize(80, 24);
        view.fly_to(10.0, 20.0, 12.0, Duration::from_millis(10));
        assert!(view.is_animating());

        let deadline = Instant::now() + Duration::from_secs(1);
        let mut ended = false;
        while Instant::now() < deadline {
            if view.tick() {
                ended = true;
                break;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        assert!(ended, "fly animation never completed");
        assert!(!view.is_animating());
        assert!((view.center_lat - 10.0).abs() < 1e-9);
        assert!((view.center_lng - 20.0).abs() < 1e-9);
        assert!((view.zoom - 12.0).abs() < 1e-9);
        // Move-end fires exactly once.
        assert!(!view.tick());
    }

    #[test]
    fn offset_target_lands_pin_above_center() {
        let view = MapView::new();
        let (clat, clng) = view.offset_target(40.0, -73.0, 16.0, 24);
        // Shifting the center south leaves the pin in the upper half.
        assert!(clat < 40.0);
        assert!((clng - -73.0).abs() < 1e-9);
    }
}
