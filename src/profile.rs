//! Profile page: a user's record plus their pins, with a hand-off back to
//! the map that centers on a chosen pin instantly.

use crate::api::ApiClient;
use crate::identity::Session;
use crate::map::centering::SelectedPin;
use crate::map::markers::{mood_color, mood_glyph};
use crate::music;
use crate::overlay::{draw_centered_panel, PanelLine};
use crate::pins::{adapt_vibes, Pin};
use crate::settings::Settings;
use crate::terminal::{Input, Terminal};
use crossterm::event::KeyCode;
use crossterm::style::Color;
use std::io;

/// Show a profile. Returns the pin the user chose to open on the map, if
/// any; the caller re-enters the map with `from_profile` set.
pub fn run(settings: &Settings, principal_arg: Option<String>) -> io::Result<Option<SelectedPin>> {
    let session = Session::load();
    let viewer = session.as_ref().map(|s| s.principal.clone());

    let Some(principal) = principal_arg.or_else(|| viewer.as_ref().map(|v| v.as_str().to_string()))
    else {
        eprintln!("Sign in first, or name a principal: vibemap profile <principal>");
        return Ok(None);
    };

    let own_profile = viewer.as_ref().is_some_and(|v| v.as_str() == principal);
    let api = ApiClient::new(&settings.backend.url, session.map(|s| s.token));

    // Page-load fetches; the page is not interactive until they land.
    let profile = if own_profile {
        api.get_user_profile()
    } else {
        api.get_profile_by_principal(&principal)
    };
    let profile = match profile {
        Ok(p) => p,
        Err(e) => {
            eprintln!("could not load profile: {}", e);
            None
        }
    };

    let pins = match api.get_vibes_by_owner(&principal) {
        Ok(vibes) => {
            let (mut pins, warnings) = adapt_vibes(&vibes, viewer.as_ref());
            for w in warnings {
                eprintln!("{}", w);
            }
            pins.sort_by(|a, b| b.id.cmp(&a.id));
            pins
        }
        Err(e) => {
            eprintln!("could not load pins: {}", e);
            Vec::new()
        }
    };

    let mut term = Terminal::new(true)?;
    let mut cursor: usize = 0;

    loop {
        term.clear();
        let (cols, rows) = term.size();

        let title = profile
            .as_ref()
            .and_then(|p| p.display_name.clone())
            .unwrap_or_else(|| principal.clone());
        term.set_str(2, 1, &title, Some(Color::White), true);
        term.set_str(2, 2, &principal, Some(Color::DarkGrey), false);
        let mut row = 3;
        if let Some(bio) = profile.as_ref().and_then(|p| p.bio.as_deref()) {
            term.set_str(2, row, bio, Some(Color::Grey), false);
            row += 1;
        }
        row += 1;

        let header = format!("{} pins", pins.len());
        term.set_str(2, row, &header, Some(Color::Cyan), true);
        row += 1;

        let list_top = row;
        let visible = (rows as usize).saturating_sub(list_top as usize + 2).max(1);
        let offset = cursor.saturating_sub(visible.saturating_sub(1));

        for (i, pin) in pins.iter().enumerate().skip(offset).take(visible) {
            let y = list_top + (i - offset) as i32;
            let selected = i == cursor;
            let marker = if selected { '>' } else { ' ' };
            let line = format_pin_row(pin, cols as usize);
            let color = if selected { Color::White } else { Color::Grey };
            term.set(2, y, marker, Some(Color::Cyan), selected);
            term.set_str(4, y, &line, Some(color), selected);
            if let Some(mood) = pin.mood {
                term.set(cols as i32 - 4, y, mood_glyph(mood), Some(mood_color(mood)), false);
            }
        }

        if pins.is_empty() {
            draw_centered_panel(
                &mut term,
                &[
                    PanelLine::title("No pins yet"),
                    PanelLine::new("Drop one from the map with Enter."),
                ],
            );
        }

        let footer = " ↑/↓ select   Enter open on map   q back ";
        term.set_str(2, rows as i32 - 1, footer, Some(Color::DarkGrey), false);
        term.render()?;

        match term.poll_input(250)? {
            Some(Input::Key(code, _)) => match code {
                KeyCode::Char('q') | KeyCode::Esc => return Ok(None),
                KeyCode::Up => cursor = cursor.saturating_sub(1),
                KeyCode::Down => {
                    if cursor + 1 < pins.len() {
                        cursor += 1;
                    }
                }
                KeyCode::Enter => {
                    if let Some(pin) = pins.get(cursor) {
                        return Ok(Some(SelectedPin {
                            id: pin.id,
                            lat: pin.lat,
                            lng: pin.lng,
                        }));
                    }
                }
                _ => {}
            },
            Some(Input::Resized(..)) | None => {}
        }
    }
}

fn format_pin_row(pin: &Pin, cols: usize) -> String {
    let badge = if pin.is_private { "◆" } else { "●" };
    let music = match &pin.music_link {
        Some(link) => format!("  ♫ {}", music::music_button_label(link)),
        None => String::new(),
    };
    let mut line = format!(
        "{} {}  ({:.4}, {:.4}){}",
        badge,
        pin.display_name(),
        pin.lat,
        pin.lng,
        music
    );
    let budget = cols.saturating_sub(10).max(20);
    if line.chars().count() > budget {
        line = line.chars().take(budget - 1).collect::<String>() + "…";
    }
    line
}

#[cfg(test)]
mod tests {
    use super::format_pin_row;
    use crate::identity::Identity;
    use crate::pins::Pin;
    use chrono::Utc;

    #[test]
    fn pin_row_truncates_to_width() {
        let pin = Pin {
            id: 1,
            lat: 40.0,
            lng: -73.0,
            timestamp: Utc::now(),
            name: Some("A very long pin name that will not fit in a narrow terminal".into()),
            description: None,
            music_link: Some("https://open.spotify.com/track/x".into()),
            is_private: true,
            is_owner: true,
            owner: Identity::new("me"),
            mood: None,
        };
        let row = format_pin_row(&pin, 40);
        assert!(row.chars().count() <= 30);
        assert!(row.starts_with('◆'));
    }
}
