//! Pin creation/edit forms and the delete confirmation modal.
//!
//! Both forms validate the music link before submission, but differently:
//! the create form rejects an invalid link with an inline error, while the
//! edit form silently clears it and submits anyway. The two call sites are
//! intentionally distinct (see DESIGN.md).

use crate::music::is_valid_music_link;
use crate::overlay::{draw_centered_panel, PanelLine};
use crate::pins::{Mood, Pin};
use crate::terminal::Terminal;
use crossterm::event::KeyCode;
use crossterm::style::Color;

/// Map click capture, consumed by the creation form.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingPinLocation {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FormMode {
    Create(PendingPinLocation),
    Edit { pin_id: u64, lat: f64, lng: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FormField {
    Name,
    Description,
    MusicLink,
    Privacy,
    Mood,
}

const FIELD_ORDER: [FormField; 5] = [
    FormField::Name,
    FormField::Description,
    FormField::MusicLink,
    FormField::Privacy,
    FormField::Mood,
];

/// Everything the orchestrator needs to issue the backend mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct PinDraft {
    pub name: String,
    pub description: String,
    pub music_link: String,
    pub lat: f64,
    pub lng: f64,
    pub is_private: bool,
    pub mood: Option<Mood>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FormEvent {
    None,
    Cancelled,
    Submit(PinDraft),
}

pub struct PinForm {
    pub mode: FormMode,
    name: String,
    description: String,
    music_link: String,
    is_private: bool,
    mood: Option<Mood>,
    focus: FormField,
    pub error: Option<String>,
    pub submitting: bool,
}

impl PinForm {
    pub fn create(location: PendingPinLocation) -> Self {
        Self {
            mode: FormMode::Create(location),
            name: String::new(),
            description: String::new(),
            music_link: String::new(),
            is_private: false,
            mood: None,
            focus: FormField::Name,
            error: None,
            submitting: false,
        }
    }

    pub fn edit(pin: &Pin) -> Self {
        Self {
            mode: FormMode::Edit {
                pin_id: pin.id,
                lat: pin.lat,
                lng: pin.lng,
            },
            name: pin.name.clone().unwrap_or_default(),
            description: pin.description.clone().unwrap_or_default(),
            music_link: pin.music_link.clone().unwrap_or_default(),
            is_private: pin.is_private,
            mood: pin.mood,
            focus: FormField::Name,
            error: None,
            submitting: false,
        }
    }

    fn focus_index(&self) -> usize {
        FIELD_ORDER.iter().position(|f| *f == self.focus).unwrap_or(0)
    }

    fn focus_next(&mut self) {
        self.focus = FIELD_ORDER[(self.focus_index() + 1) % FIELD_ORDER.len()];
    }

    fn focus_prev(&mut self) {
        let idx = self.focus_index();
        self.focus = FIELD_ORDER[(idx + FIELD_ORDER.len() - 1) % FIELD_ORDER.len()];
    }

    fn cycle_mood(&mut self, forward: bool) {
        let moods = Mood::ALL;
        self.mood = match self.mood {
            None => {
                if forward {
                    Some(moods[0])
                } else {
                    Some(moods[moods.len() - 1])
                }
            }
            Some(current) => {
                let idx = moods.iter().position(|m| *m == current).unwrap_or(0);
                if forward {
                    if idx + 1 < moods.len() {
                        Some(moods[idx + 1])
                    } else {
                        None
                    }
                } else if idx == 0 {
                    None
                } else {
                    Some(moods[idx - 1])
                }
            }
        };
    }

    fn text_field_mut(&mut self) -> Option<&mut String> {
        match self.focus {
            FormField::Name => Some(&mut self.name),
            FormField::Description => Some(&mut self.description),
            FormField::MusicLink => Some(&mut self.music_link),
            _ => None,
        }
    }

    /// Attempt submission. The create/edit asymmetry for invalid music
    /// links lives here and is intentional.
    fn submit(&mut self) -> FormEvent {
        let mut music_link = self.music_link.trim().to_string();

        if !is_valid_music_link(&music_link) {
            match self.mode {
                FormMode::Create(_) => {
                    self.error = Some("Link is not valid".to_string());
                    return FormEvent::None;
                }
                FormMode::Edit { .. } => {
                    // Edit flow: clear silently and submit.
                    music_link.clear();
                    self.music_link.clear();
                }
            }
        }

        let (lat, lng) = match self.mode {
            FormMode::Create(loc) => (loc.lat, loc.lng),
            FormMode::Edit { lat, lng, .. } => (lat, lng),
        };

        self.error = None;
        FormEvent::Submit(PinDraft {
            name: self.name.trim().to_string(),
            description: self.description.trim().to_string(),
            music_link,
            lat,
            lng,
            is_private: self.is_private,
            mood: self.mood,
        })
    }

    pub fn handle_key(&mut self, code: KeyCode) -> FormEvent {
        if self.submitting {
            return FormEvent::None;
        }

        match code {
            KeyCode::Esc => FormEvent::Cancelled,
            KeyCode::Enter => self.submit(),
            KeyCode::Tab | KeyCode::Down => {
                self.focus_next();
                FormEvent::None
            }
            KeyCode::BackTab | KeyCode::Up => {
                self.focus_prev();
                FormEvent::None
            }
            KeyCode::Left | KeyCode::Right if self.focus == FormField::Mood => {
                self.cycle_mood(code == KeyCode::Right);
                FormEvent::None
            }
            KeyCode::Char(' ') if self.focus == FormField::Privacy => {
                self.is_private = !self.is_private;
                FormEvent::None
            }
            KeyCode::Char(c) => {
                if let Some(field) = self.text_field_mut() {
                    field.push(c);
                    self.error = None;
                }
                FormEvent::None
            }
            KeyCode::Backspace => {
                if let Some(field) = self.text_field_mut() {
                    field.pop();
                    self.error = None;
                }
                FormEvent::None
            }
            _ => FormEvent::None,
        }
    }

    pub fn render(&self, term: &mut Terminal) {
        let title = match self.mode {
            FormMode::Create(loc) => format!("Drop a vibe pin ({:.4}, {:.4})", loc.lat, loc.lng),
            FormMode::Edit { .. } => "Edit vibe pin".to_string(),
        };

        let marker = |field: FormField| if self.focus == field { '>' } else { ' ' };
        let mood_label = self.mood.map(|m| m.label()).unwrap_or("(none)");

        let mut lines = vec![
            PanelLine::title(title),
            PanelLine::new(""),
            PanelLine::new(format!("{} Name:        {}", marker(FormField::Name), self.name)),
            PanelLine::new(format!(
                "{} Description: {}",
                marker(FormField::Description),
                self.description
            )),
            PanelLine::new(format!(
                "{} Music link:  {}",
                marker(FormField::MusicLink),
                self.music_link
            )),
            PanelLine::new(format!(
                "{} Private:     {}",
                marker(FormField::Privacy),
                if self.is_private { "[x]" } else { "[ ]" }
            )),
            PanelLine::new(format!("{} Mood:        {}", marker(FormField::Mood), mood_label)),
            PanelLine::new(""),
        ];

        if let Some(error) = &self.error {
            lines.push(PanelLine::colored(error.clone(), Color::Red));
        }
        if self.submitting {
            lines.push(PanelLine::colored("Saving...", Color::Yellow));
        } else {
            lines.push(PanelLine::new(
                "Tab next field  Space toggle  ←/→ mood  Enter save  Esc cancel",
            ));
        }

        draw_centered_panel(term, &lines);
    }
}

// ============================================================================
// Delete confirmation
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum ConfirmEvent {
    None,
    Cancelled,
    Confirmed,
}

pub struct DeleteConfirm {
    pub pin_id: u64,
    pub pin_name: String,
    pub submitting: bool,
    pub error: Option<String>,
}

impl DeleteConfirm {
    pub fn new(pin: &Pin) -> Self {
        Self {
            pin_id: pin.id,
            pin_name: pin.display_name().to_string(),
            submitting: false,
            error: None,
        }
    }

    pub fn handle_key(&mut self, code: KeyCode) -> ConfirmEvent {
        if self.submitting {
            return ConfirmEvent::None;
        }
        match code {
            KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => ConfirmEvent::Confirmed,
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => ConfirmEvent::Cancelled,
            _ => ConfirmEvent::None,
        }
    }

    pub fn render(&self, term: &mut Terminal) {
        let mut lines = vec![
            PanelLine::title("Delete pin?"),
            PanelLine::new(format!("\"{}\" will be gone for good.", self.pin_name)),
            PanelLine::new(""),
        ];
        if let Some(error) = &self.error {
            lines.push(PanelLine::colored(error.clone(), Color::Red));
        }
        if self.submitting {
            lines.push(PanelLine::colored("Deleting...", Color::Yellow));
        } else {
            lines.push(PanelLine::new("[y] delete   [n] keep"));
        }
        draw_centered_panel(term, &lines);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Identity;
    use chrono::Utc;

    fn type_str(form: &mut PinForm, s: &str) {
        for c in s.chars() {
            form.handle_key(KeyCode::Char(c));
        }
    }

    fn sample_pin() -> Pin {
        Pin {
            id: 5,
            lat: 40.0,
            lng: -73.0,
            timestamp: Utc::now(),
            name: Some("Coffee Shop".into()),
            description: None,
            music_link: Some("https://example.com/song".into()),
            is_private: false,
            is_owner: true,
            owner: Identity::new("me"),
            mood: None,
        }
    }

    #[test]
    fn create_rejects_invalid_link_with_inline_error() {
        let mut form = PinForm::create(PendingPinLocation { lat: 40.0, lng: -73.0 });
        type_str(&mut form, "Coffee Shop");
        form.handle_key(KeyCode::Tab);
        form.handle_key(KeyCode::Tab);
        type_str(&mut form, "https://example.com/song");

        let event = form.handle_key(KeyCode::Enter);
        assert_eq!(event, FormEvent::None);
        assert_eq!(form.error.as_deref(), Some("Link is not valid"));
    }

    #[test]
    fn create_submits_valid_draft() {
        let mut form = PinForm::create(PendingPinLocation { lat: 40.0, lng: -73.0 });
        type_str(&mut form, "Coffee Shop");
        form.handle_key(KeyCode::Tab);
        form.handle_key(KeyCode::Tab);
        type_str(&mut form, "https://open.spotify.com/track/x");

        match form.handle_key(KeyCode::Enter) {
            FormEvent::Submit(draft) => {
                assert_eq!(draft.name, "Coffee Shop");
                assert_eq!(draft.music_link, "https://open.spotify.com/track/x");
                assert_eq!(draft.lat, 40.0);
                assert_eq!(draft.lng, -73.0);
                assert!(!draft.is_private);
            }
            other => panic!("expected submit, got {:?}", other),
        }
    }

    #[test]
    fn edit_clears_invalid_link_silently() {
        let mut form = PinForm::edit(&sample_pin());

        match form.handle_key(KeyCode::Enter) {
            FormEvent::Submit(draft) => {
                assert_eq!(draft.music_link, "");
                assert_eq!(draft.name, "Coffee Shop");
                assert_eq!(draft.lat, 40.0);
            }
            other => panic!("expected submit, got {:?}", other),
        }
        assert!(form.error.is_none());
    }

    #[test]
    fn privacy_toggles_on_space() {
        let mut form = PinForm::create(PendingPinLocation { lat: 0.0, lng: 0.0 });
        for _ in 0..3 {
            form.handle_key(KeyCode::Tab);
        }
        form.handle_key(KeyCode::Char(' '));
        match form.handle_key(KeyCode::Enter) {
            FormEvent::Submit(draft) => assert!(draft.is_private),
            other => panic!("expected submit, got {:?}", other),
        }
    }

    #[test]
    fn mood_cycles_through_all_and_back_to_none() {
        let mut form = PinForm::create(PendingPinLocation { lat: 0.0, lng: 0.0 });
        for _ in 0..4 {
            form.handle_key(KeyCode::Tab);
        }
        assert_eq!(form.mood, None);
        for expected in Mood::ALL {
            form.handle_key(KeyCode::Right);
            assert_eq!(form.mood, Some(expected));
        }
        form.handle_key(KeyCode::Right);
        assert_eq!(form.mood, None);
        form.handle_key(KeyCode::Left);
        assert_eq!(form.mood, Some(Mood::Nostalgic));
    }

    #[test]
    fn escape_cancels_unless_submitting() {
        let mut form = PinForm::create(PendingPinLocation { lat: 0.0, lng: 0.0 });
        assert_eq!(form.handle_key(KeyCode::Esc), FormEvent::Cancelled);
        form.submitting = true;
        assert_eq!(form.handle_key(KeyCode::Esc), FormEvent::None);
    }

    #[test]
    fn delete_confirm_keys() {
        let pin = sample_pin();
        let mut confirm = DeleteConfirm::new(&pin);
        assert_eq!(confirm.handle_key(KeyCode::Char('x')), ConfirmEvent::None);
        assert_eq!(confirm.handle_key(KeyCode::Char('y')), ConfirmEvent::Confirmed);
        assert_eq!(confirm.handle_key(KeyCode::Esc), ConfirmEvent::Cancelled);
        confirm.submitting = true;
        assert_eq!(confirm.handle_key(KeyCode::Char('y')), ConfirmEvent::None);
    }
}
