//! Markers and popup content derived from the displayed pin set.
//!
//! The whole marker set is rebuilt on every pin-set change; nothing is
//! diffed. Marker appearance crosses 4 base variants (privacy x music) with
//! the 7 mood icons, and its footprint follows 4 zoom bands.

use crate::music;
use crate::overlay::{wrap_text, PanelLine};
use crate::pins::{Mood, Pin};
use crossterm::style::Color;

/// Zoom bands controlling marker density.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoomBand {
    /// zoom <= 5: continental overview, single dots
    Far,
    /// zoom <= 10: regional, plain glyphs
    Mid,
    /// zoom <= 14: city, colored glyphs
    Near,
    /// zoom > 14: street, glyph plus halo
    Close,
}

pub fn zoom_band(zoom: f64) -> ZoomBand {
    if zoom <= 5.0 {
        ZoomBand::Far
    } else if zoom <= 10.0 {
        ZoomBand::Mid
    } else if zoom <= 14.0 {
        ZoomBand::Near
    } else {
        ZoomBand::Close
    }
}

#[derive(Debug, Clone)]
pub struct Marker {
    pub pin_id: u64,
    pub lat: f64,
    pub lng: f64,
    pub glyph: char,
    pub color: Color,
    pub bold: bool,
    pub halo: bool,
}

pub fn mood_glyph(mood: Mood) -> char {
    match mood {
        Mood::Happy => '☼',
        Mood::Chill => '≈',
        Mood::Energetic => '↯',
        Mood::Melancholy => '☂',
        Mood::Romantic => '♥',
        Mood::Focused => '◎',
        Mood::Nostalgic => '✦',
    }
}

pub fn mood_color(mood: Mood) -> Color {
    match mood {
        Mood::Happy => Color::Yellow,
        Mood::Chill => Color::Cyan,
        Mood::Energetic => Color::Red,
        Mood::Melancholy => Color::DarkBlue,
        Mood::Romantic => Color::Magenta,
        Mood::Focused => Color::Green,
        Mood::Nostalgic => Color::DarkYellow,
    }
}

/// Base variant: privacy crossed with music presence.
fn base_glyph(pin: &Pin) -> char {
    match (pin.is_private, pin.music_link.is_some()) {
        (false, false) => '●',
        (false, true) => '♪',
        (true, false) => '◆',
        (true, true) => '♬',
    }
}

fn base_color(pin: &Pin) -> Color {
    if pin.is_private {
        Color::Magenta
    } else {
        Color::Cyan
    }
}

/// Rebuild the full marker set for the current zoom.
pub fn build_markers(pins: &[Pin], zoom: f64) -> Vec<Marker> {
    let band = zoom_band(zoom);
    pins.iter()
        .map(|pin| {
            let (glyph, color) = match pin.mood {
                Some(mood) => (mood_glyph(mood), mood_color(mood)),
                None => (base_glyph(pin), base_color(pin)),
            };
            match band {
                ZoomBand::Far => Marker {
                    pin_id: pin.id,
                    lat: pin.lat,
                    lng: pin.lng,
                    glyph: '·',
                    color: Color::DarkGrey,
                    bold: false,
                    halo: false,
                },
                ZoomBand::Mid => Marker {
                    pin_id: pin.id,
                    lat: pin.lat,
                    lng: pin.lng,
                    glyph,
                    color,
                    bold: false,
                    halo: false,
                },
                ZoomBand::Near => Marker {
                    pin_id: pin.id,
                    lat: pin.lat,
                    lng: pin.lng,
                    glyph,
                    color,
                    bold: true,
                    halo: false,
                },
                ZoomBand::Close => Marker {
                    pin_id: pin.id,
                    lat: pin.lat,
                    lng: pin.lng,
                    glyph,
                    color,
                    bold: true,
                    halo: true,
                },
            }
        })
        .collect()
}

// ============================================================================
// Popup content
// ============================================================================

const POPUP_TEXT_WIDTH: usize = 34;

/// Lines for a marker popup. Edit/delete actions appear only for the
/// owning identity; the backend re-validates ownership regardless.
pub fn popup_lines(pin: &Pin) -> Vec<PanelLine> {
    let mut lines = Vec::new();

    lines.push(PanelLine::title(pin.display_name()));

    if pin.is_private && pin.is_owner {
        lines.push(PanelLine::colored("Private", Color::Magenta));
    } else {
        lines.push(PanelLine::colored("Public", Color::Cyan));
    }

    if let Some(mood) = pin.mood {
        lines.push(PanelLine::colored(
            format!("{} {}", mood_glyph(mood), mood.label()),
            mood_color(mood),
        ));
    }

    if let Some(description) = &pin.description {
        for line in wrap_text(description, POPUP_TEXT_WIDTH) {
            lines.push(PanelLine::new(line));
        }
    }

    lines.push(PanelLine::colored(
        format!("by {}  [p] profile", pin.owner),
        Color::DarkGrey,
    ));

    if let Some(link) = &pin.music_link {
        lines.push(PanelLine::colored(
            format!("♫ {}", music::music_button_label(link)),
            Color::Green,
        ));
        for line in wrap_text(link, POPUP_TEXT_WIDTH) {
            lines.push(PanelLine::colored(line, Color::DarkGreen));
        }
    }

    if pin.is_owner {
        lines.push(PanelLine::new("[e] edit  [d] delete  [Esc] close"));
    } else {
        lines.push(PanelLine::new("[Esc] close"));
    }

    lines
}

/// Full-screen detail page content for narrow terminals.
pub fn detail_lines(pin: &Pin, width: usize) -> Vec<PanelLine> {
    let text_width = width.saturating_sub(6).clamp(16, 60);
    let mut lines = Vec::new();

    lines.push(PanelLine::title(pin.display_name()));

    if pin.is_private && pin.is_owner {
        lines.push(PanelLine::colored("Private", Color::Magenta));
    } else {
        lines.push(PanelLine::colored("Public", Color::Cyan));
    }

    if let Some(mood) = pin.mood {
        lines.push(PanelLine::colored(
            format!("{} {}", mood_glyph(mood), mood.label()),
            mood_color(mood),
        ));
    }

    lines.push(PanelLine::colored(
        format!("({:.5}, {:.5})", pin.lat, pin.lng),
        Color::DarkGrey,
    ));
    lines.push(PanelLine::new(""));

    if let Some(description) = &pin.description {
        for line in wrap_text(description, text_width) {
            lines.push(PanelLine::new(line));
        }
        lines.push(PanelLine::new(""));
    }

    lines.push(PanelLine::colored(
        format!("by {}  [p] profile", pin.owner),
        Color::DarkGrey,
    ));

    if let Some(link) = &pin.music_link {
        lines.push(PanelLine::colored(
            format!("♫ {}", music::music_button_label(link)),
            Color::Green,
        ));
        for line in wrap_text(link, text_width) {
            lines.push(PanelLine::colored(line, Color::DarkGreen));
        }
    }

    lines.push(PanelLine::new(""));
    if pin.is_owner {
        lines.push(PanelLine::new("[e] edit   [d] delete   [Esc] back to map"));
    } else {
        lines.push(PanelLine::new("[Esc] back to map"));
    }
    lines
}
