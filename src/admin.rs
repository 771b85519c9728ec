//! Admin dashboard: aggregate statistics over users and the public pin set.
//! Gated on the backend's admin check; the client never decides adminship.

use crate::api::ApiClient;
use crate::identity::Session;
use crate::pins::{adapt_vibes, Mood};
use crate::settings::Settings;
use crate::terminal::Terminal;
use crossterm::style::Color;
use std::io;

pub fn run(settings: &Settings) -> io::Result<()> {
    let Some(session) = Session::load() else {
        eprintln!("Sign in first: vibemap login <token>");
        return Ok(());
    };
    let viewer = session.principal.clone();
    let api = ApiClient::new(&settings.backend.url, Some(session.token));

    match api.is_current_user_admin() {
        Ok(true) => {}
        Ok(false) => {
            eprintln!("This account is not an admin.");
            return Ok(());
        }
        Err(e) => {
            eprintln!("could not check admin status: {}", e);
            return Ok(());
        }
    }

    let users = api.list_users().unwrap_or_else(|e| {
        eprintln!("could not list users: {}", e);
        Vec::new()
    });
    let vibes = api.get_all_vibes().unwrap_or_else(|e| {
        eprintln!("could not fetch vibes: {}", e);
        Vec::new()
    });
    let (pins, _) = adapt_vibes(&vibes, Some(&viewer));

    let private = pins.iter().filter(|p| p.is_private).count();
    let with_music = pins.iter().filter(|p| p.music_link.is_some()).count();
    let mut mood_counts: Vec<(Mood, usize)> = Mood::ALL
        .iter()
        .map(|m| (*m, pins.iter().filter(|p| p.mood == Some(*m)).count()))
        .collect();
    mood_counts.sort_by(|a, b| b.1.cmp(&a.1));
    let max_mood = mood_counts.first().map(|(_, n)| *n).unwrap_or(0).max(1);

    let mut term = Terminal::new(true)?;
    term.clear();

    term.set_str(2, 1, "VIBEMAP ADMIN", Some(Color::White), true);
    term.set_str(2, 3, &format!("users:      {}", users.len()), Some(Color::Grey), false);
    term.set_str(2, 4, &format!("pins:       {}", pins.len()), Some(Color::Grey), false);
    term.set_str(
        2,
        5,
        &format!(
            "private:    {} ({}%)",
            private,
            if pins.is_empty() { 0 } else { private * 100 / pins.len() }
        ),
        Some(Color::Grey),
        false,
    );
    term.set_str(2, 6, &format!("with music: {}", with_music), Some(Color::Grey), false);

    term.set_str(2, 8, "moods", Some(Color::Cyan), true);
    for (i, (mood, count)) in mood_counts.iter().enumerate() {
        let bar_len = count * 24 / max_mood;
        let bar: String = "█".repeat(bar_len);
        term.set_str(
            2,
            9 + i as i32,
            &format!("{:<11} {:>4}  {}", mood.label(), count, bar),
            Some(Color::Grey),
            false,
        );
    }

    let admins = users.iter().filter(|u| u.is_admin).count();
    term.set_str(2, 17, &format!("admins: {}", admins), Some(Color::DarkGrey), false);
    term.set_str(2, 19, "press any key to exit", Some(Color::DarkGrey), false);

    term.render()?;
    term.wait_any_key()?;
    Ok(())
}
