//! Selected-pin centering.
//!
//! A selection arrives from outside the map (profile page, CLI flag) and is
//! consumed exactly once. Profile hand-offs center instantly; ordinary
//! selections fly to an off-center target so the pin clears the popup panel
//! or detail hand-off. A selection whose pin is missing from the current
//! list must not touch the viewport at all, only release the loading state.

use crate::map::view::{MapView, FLY_DURATION, SELECTED_ZOOM};
use crate::pins::Pin;
use std::time::Duration;

/// Suppression window after creating a pin, so a location-based recenter
/// does not fight the fresh pin's viewport.
pub const JUST_CREATED_SUPPRESS: Duration = Duration::from_secs(1);

/// Transient pointer requesting that the map center on one pin.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedPin {
    pub id: u64,
    pub lat: f64,
    pub lng: f64,
}

impl SelectedPin {
    /// Parse the CLI form "id,lat,lng".
    pub fn parse(s: &str) -> Option<Self> {
        let mut parts = s.split(',');
        let id = parts.next()?.trim().parse().ok()?;
        let lat = parts.next()?.trim().parse().ok()?;
        let lng = parts.next()?.trim().parse().ok()?;
        if parts.next().is_some() {
            return None;
        }
        Some(Self { id, lat, lng })
    }
}

/// What the protocol decided; the caller owns popup opening and the
/// map-ready signal so they sequence with the rest of the frame.
#[derive(Debug, Clone, PartialEq)]
pub enum CenterAction {
    /// Instant jump done; open this pin's popup and signal ready now.
    Jumped { pin_id: u64 },
    /// Fly started; on move-end open the popup (wide terminals only) and
    /// signal ready.
    Flying { pin_id: u64, popup_on_end: bool },
    /// Stale selection; signal ready immediately, viewport untouched.
    NotFound,
}

/// Vertical offset (in dots) pushing the centered pin into the upper part
/// of the view: a quarter of the viewport on narrow terminals, a tenth on
/// wide ones.
fn vertical_offset(view: &MapView, narrow: bool) -> i32 {
    let (_, dot_h) = view.dot_size();
    if narrow {
        dot_h / 4
    } else {
        dot_h / 10
    }
}

pub fn center_on_selected(
    view: &mut MapView,
    pins: &[Pin],
    selected: &SelectedPin,
    from_profile: bool,
    narrow: bool,
) -> CenterAction {
    let Some(pin) = pins.iter().find(|p| p.id == selected.id) else {
        return CenterAction::NotFound;
    };

    if from_profile {
        view.jump_to(pin.lat, pin.lng, SELECTED_ZOOM);
        return CenterAction::Jumped { pin_id: pin.id };
    }

    let dy = vertical_offset(view, narrow);
    let (target_lat, target_lng) = view.offset_target(pin.lat, pin.lng, SELECTED_ZOOM, dy);
    view.fly_to(target_lat, target_lng, SELECTED_ZOOM, FLY_DURATION);
    CenterAction::Flying {
        pin_id: pin.id,
        popup_on_end: !narrow,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Identity;
    use chrono::Utc;

    fn pin(id: u64, lat: f64, lng: f64) -> Pin {
        Pin {
            id,
            lat,
            lng,
            timestamp: Utc::now(),
            name: None,
            description: None,
            music_link: None,
            is_private: false,
            is_owner: false,
            owner: Identity::new("someone"),
            mood: None,
        }
    }

    fn three_pins() -> Vec<Pin> {
        vec![pin(1, 5.0, 5.0), pin(2, 10.0, 20.0), pin(3, -5.0, -5.0)]
    }

    #[test]
    fn profile_handoff_jumps_without_animation() {
        let mut view = MapView::new();
        view.resize(120, 40);
        let selected = SelectedPin { id: 2, lat: 10.0, lng: 20.0 };

        let action = center_on_selected(&mut view, &three_pins(), &selected, true, false);

        assert_eq!(action, CenterAction::Jumped { pin_id: 2 });
        assert!(!view.is_animating());
        assert!((view.center_lat - 10.0).abs() < 1e-9);
        assert!((view.center_lng - 20.0).abs() < 1e-9);
        assert!((view.zoom - SELECTED_ZOOM).abs() < 1e-9);
    }

    #[test]
    fn normal_selection_flies_offset() {
        let mut view = MapView::new();
        view.resize(120, 40);
        let selected = SelectedPin { id: 2, lat: 10.0, lng: 20.0 };

        let action = center_on_selected(&mut view, &three_pins(), &selected, false, false);

        assert_eq!(action, CenterAction::Flying { pin_id: 2, popup_on_end: true });
        assert!(view.is_animating());
    }

    #[test]
    fn narrow_selection_skips_popup_on_end() {
        let mut view = MapView::new();
        view.resize(60, 30);
        let selected = SelectedPin { id: 2, lat: 10.0, lng: 20.0 };

        let action = center_on_selected(&mut view, &three_pins(), &selected, false, true);

        assert_eq!(action, CenterAction::Flying { pin_id: 2, popup_on_end: false });
    }

    #[test]
    fn stale_selection_leaves_viewport_alone() {
        let mut view = MapView::new();
        view.resize(120, 40);
        let before = (view.center_lat, view.center_lng, view.zoom);
        let selected = SelectedPin { id: 99, lat: 1.0, lng: 1.0 };

        let action = center_on_selected(&mut view, &three_pins(), &selected, false, false);

        assert_eq!(action, CenterAction::NotFound);
        assert!(!view.is_animating());
        assert_eq!(before, (view.center_lat, view.center_lng, view.zoom));
    }

    #[test]
    fn narrow_offset_is_deeper_than_wide() {
        let mut view = MapView::new();
        view.resize(100, 40);
        assert!(vertical_offset(&view, true) > vertical_offset(&view, false));
        assert_eq!(vertical_offset(&view, true), 40 * 4 / 4);
        assert_eq!(vertical_offset(&view, false), 40 * 4 / 10);
    }

    #[test]
    fn selected_pin_cli_parse() {
        assert_eq!(
            SelectedPin::parse("2,10.5,-20.25"),
            Some(SelectedPin { id: 2, lat: 10.5, lng: -20.25 })
        );
        assert_eq!(SelectedPin::parse("2,10.5"), None);
        assert_eq!(SelectedPin::parse("x,1,2"), None);
        assert_eq!(SelectedPin::parse("1,2,3,4"), None);
    }
}
