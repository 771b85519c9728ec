//! Display-side pin model: wire adaptation, ownership derivation, and the
//! optimistic mutation store.
//!
//! The backend owns the durable records. Everything here is a read
//! projection plus a local overlay that keeps the UI responsive while a
//! refetch is in flight. The displayed list is rebuilt wholesale on every
//! change; pins are never mutated in place.

use crate::api::Vibe;
use crate::identity::Identity;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};

// ============================================================================
// Mood
// ============================================================================

/// Categorical mood tag used to pick a themed marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mood {
    Happy,
    Chill,
    Energetic,
    Melancholy,
    Romantic,
    Focused,
    Nostalgic,
}

impl Mood {
    pub const ALL: [Mood; 7] = [
        Mood::Happy,
        Mood::Chill,
        Mood::Energetic,
        Mood::Melancholy,
        Mood::Romantic,
        Mood::Focused,
        Mood::Nostalgic,
    ];

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "happy" => Some(Mood::Happy),
            "chill" => Some(Mood::Chill),
            "energetic" => Some(Mood::Energetic),
            "melancholy" => Some(Mood::Melancholy),
            "romantic" => Some(Mood::Romantic),
            "focused" => Some(Mood::Focused),
            "nostalgic" => Some(Mood::Nostalgic),
            _ => None,
        }
    }

    /// Wire value for create/update payloads.
    pub fn tag(&self) -> &'static str {
        match self {
            Mood::Happy => "happy",
            Mood::Chill => "chill",
            Mood::Energetic => "energetic",
            Mood::Melancholy => "melancholy",
            Mood::Romantic => "romantic",
            Mood::Focused => "focused",
            Mood::Nostalgic => "nostalgic",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Mood::Happy => "Happy",
            Mood::Chill => "Chill",
            Mood::Energetic => "Energetic",
            Mood::Melancholy => "Melancholy",
            Mood::Romantic => "Romantic",
            Mood::Focused => "Focused",
            Mood::Nostalgic => "Nostalgic",
        }
    }
}

// ============================================================================
// Pin
// ============================================================================

/// Display entity adapted from a wire `Vibe`. `is_owner` is derived per
/// adaptation pass, never authoritative.
#[derive(Debug, Clone)]
pub struct Pin {
    pub id: u64,
    pub lat: f64,
    pub lng: f64,
    pub timestamp: DateTime<Utc>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub music_link: Option<String>,
    pub is_private: bool,
    pub is_owner: bool,
    pub owner: Identity,
    pub mood: Option<Mood>,
}

impl Pin {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("Unnamed Pin")
    }
}

fn none_if_empty(s: &str) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn parse_coord(s: &str, limit: f64) -> Option<f64> {
    let value: f64 = s.trim().parse().ok()?;
    if value.is_finite() && value.abs() <= limit {
        Some(value)
    } else {
        None
    }
}

/// Convert wire records into display pins. Records with unparseable or
/// out-of-range coordinates are skipped; a warning per skip is returned for
/// the session log. Never fails the batch.
pub fn adapt_vibes(vibes: &[Vibe], viewer: Option<&Identity>) -> (Vec<Pin>, Vec<String>) {
    let now = Utc::now();
    let mut pins = Vec::with_capacity(vibes.len());
    let mut warnings = Vec::new();

    for vibe in vibes {
        let lat = parse_coord(&vibe.latitude, 90.0);
        let lng = parse_coord(&vibe.longitude, 180.0);
        let (Some(lat), Some(lng)) = (lat, lng) else {
            warnings.push(format!(
                "skipped vibe {}: bad coordinates \"{}\",\"{}\"",
                vibe.id, vibe.latitude, vibe.longitude
            ));
            continue;
        };

        let owner = Identity::new(vibe.owner.clone());
        pins.push(Pin {
            id: vibe.id,
            lat,
            lng,
            timestamp: now,
            name: none_if_empty(&vibe.name),
            description: none_if_empty(&vibe.description),
            music_link: none_if_empty(&vibe.music_link),
            is_private: vibe.is_private,
            is_owner: viewer.is_some_and(|v| *v == owner),
            owner,
            mood: vibe.mood.as_deref().and_then(Mood::from_tag),
        });
    }

    (pins, warnings)
}

// ============================================================================
// PinStore
// ============================================================================

/// Synthetic id space for optimistic creates, far above anything the backend
/// hands out, so the overlays never collide with canonical ids.
const LOCAL_ID_BASE: u64 = 1 << 62;

/// Canonical pin list plus an optimistic overlay.
///
/// Mutations apply a local patch immediately; a forced refetch reconciles the
/// overlay against the authoritative list. Optimistic creates are correlated
/// with server records by coordinates + name, since the server assigns the id.
pub struct PinStore {
    canonical: Vec<Pin>,
    created: Vec<Pin>,
    updated: HashMap<u64, Pin>,
    deleted: HashSet<u64>,
    next_local_id: u64,
    version: u64,
}

impl PinStore {
    pub fn new() -> Self {
        Self {
            canonical: Vec::new(),
            created: Vec::new(),
            updated: HashMap::new(),
            deleted: HashSet::new(),
            next_local_id: LOCAL_ID_BASE,
            version: 0,
        }
    }

    /// Monotone counter bumped on every visible change; lets the marker
    /// layer rebuild only when the pin set actually changed.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Fresh snapshot of the displayed pin set.
    pub fn displayed(&self) -> Vec<Pin> {
        let mut out: Vec<Pin> = self
            .canonical
            .iter()
            .filter(|p| !self.deleted.contains(&p.id))
            .map(|p| self.updated.get(&p.id).unwrap_or(p).clone())
            .collect();
        out.extend(self.created.iter().cloned());
        out
    }

    pub fn find(&self, id: u64) -> Option<Pin> {
        self.displayed().into_iter().find(|p| p.id == id)
    }

    /// Optimistic create. Returns the synthetic local id the pin is
    /// displayed under until the refetch lands.
    pub fn apply_create(&mut self, mut pin: Pin) -> u64 {
        let id = self.next_local_id;
        self.next_local_id += 1;
        pin.id = id;
        self.created.push(pin);
        self.version += 1;
        id
    }

    /// Optimistic update: overlays the canonical record until reconciled.
    pub fn apply_update(&mut self, pin: Pin) {
        self.updated.insert(pin.id, pin);
        self.version += 1;
    }

    /// Optimistic delete: hides the pin until the refetch confirms.
    pub fn apply_delete(&mut self, id: u64) {
        if id >= LOCAL_ID_BASE {
            self.created.retain(|p| p.id != id);
        } else {
            self.deleted.insert(id);
        }
        self.version += 1;
    }

    /// Replace the canonical list with a fresh fetch and drop every overlay
    /// the server now reflects. An optimistic create survives only until a
    /// canonical record matches it by correlation key.
    pub fn reconcile(&mut self, canonical: Vec<Pin>) {
        self.created.retain(|local| {
            !canonical.iter().any(|c| correlates(local, c))
        });
        self.updated.clear();
        self.deleted.clear();
        self.canonical = canonical;
        self.version += 1;
    }

    pub fn is_empty(&self) -> bool {
        self.canonical.is_empty() && self.created.is_empty()
    }
}

/// Correlation key for optimistic creates: same spot (within ~0.1 m) and
/// same name.
fn correlates(local: &Pin, canonical: &Pin) -> bool {
    (local.lat - canonical.lat).abs() < 1e-6
        && (local.lng - canonical.lng).abs() < 1e-6
        && local.name == canonical.name
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wire(id: u64, lat: &str, lng: &str, owner: &str) -> Vibe {
        Vibe {
            id,
            latitude: lat.to_string(),
            longitude: lng.to_string(),
            owner: owner.to_string(),
            name: format!("pin-{}", id),
            description: String::new(),
            is_private: false,
            mood: None,
            music_link: String::new(),
        }
    }

    fn pin(id: u64, lat: f64, lng: f64, name: &str) -> Pin {
        Pin {
            id,
            lat,
            lng,
            timestamp: Utc::now(),
            name: none_if_empty(name),
            description: None,
            music_link: None,
            is_private: false,
            is_owner: true,
            owner: Identity::new("me"),
            mood: None,
        }
    }

    #[test]
    fn ownership_derived_from_viewer() {
        let vibes = vec![wire(1, "10.0", "20.0", "me"), wire(2, "11.0", "21.0", "them")];
        let me = Identity::new("me");
        let (pins, warnings) = adapt_vibes(&vibes, Some(&me));
        assert!(warnings.is_empty());
        assert!(pins[0].is_owner);
        assert!(!pins[1].is_owner);
    }

    #[test]
    fn unauthenticated_owns_nothing() {
        let vibes = vec![wire(1, "10.0", "20.0", "me"), wire(2, "11.0", "21.0", "them")];
        let (pins, _) = adapt_vibes(&vibes, None);
        assert!(pins.iter().all(|p| !p.is_owner));
    }

    #[test]
    fn bad_coordinates_skip_without_aborting() {
        let vibes = vec![
            wire(1, "10.0", "20.0", "a"),
            wire(2, "not-a-number", "20.0", "a"),
            wire(3, "95.0", "20.0", "a"),
            wire(4, "10.0", "-200.0", "a"),
            wire(5, "-45.5", "170.25", "a"),
        ];
        let (pins, warnings) = adapt_vibes(&vibes, None);
        assert_eq!(pins.len(), 2);
        assert_eq!(warnings.len(), 3);
        assert!(warnings[0].contains("vibe 2"));
    }

    #[test]
    fn empty_strings_adapt_to_none() {
        let mut v = wire(1, "0.0", "0.0", "a");
        v.name = "  ".to_string();
        let (pins, _) = adapt_vibes(&[v], None);
        assert!(pins[0].name.is_none());
        assert_eq!(pins[0].display_name(), "Unnamed Pin");
    }

    #[test]
    fn unknown_mood_adapts_to_none() {
        let mut v = wire(1, "0.0", "0.0", "a");
        v.mood = Some("grumpy".to_string());
        let (pins, _) = adapt_vibes(&[v], None);
        assert!(pins[0].mood.is_none());

        let mut v = wire(2, "0.0", "0.0", "a");
        v.mood = Some("Chill".to_string());
        let (pins, _) = adapt_vibes(&[v], None);
        assert_eq!(pins[0].mood, Some(Mood::Chill));
    }

    #[test]
    fn optimistic_create_then_reconcile() {
        let mut store = PinStore::new();
        store.reconcile(vec![pin(1, 1.0, 1.0, "old")]);

        let local_id = store.apply_create(pin(0, 40.0, -73.0, "Coffee Shop"));
        let shown = store.displayed();
        assert_eq!(shown.len(), 2);
        assert!(shown.iter().any(|p| p.id == local_id && p.lat == 40.0));

        // Refetch resolves with the server-assigned id for the same pin.
        store.reconcile(vec![pin(1, 1.0, 1.0, "old"), pin(9, 40.0, -73.0, "Coffee Shop")]);
        let shown = store.displayed();
        assert_eq!(shown.len(), 2);
        assert!(shown.iter().any(|p| p.id == 9));
        assert!(!shown.iter().any(|p| p.id == local_id));
    }

    #[test]
    fn unmatched_create_survives_stale_refetch() {
        let mut store = PinStore::new();
        let local_id = store.apply_create(pin(0, 40.0, -73.0, "New"));
        // Refetch raced ahead of the create becoming visible.
        store.reconcile(vec![pin(1, 1.0, 1.0, "old")]);
        assert!(store.displayed().iter().any(|p| p.id == local_id));
    }

    #[test]
    fn optimistic_update_overlays_until_reconciled() {
        let mut store = PinStore::new();
        store.reconcile(vec![pin(1, 1.0, 1.0, "old name")]);

        let mut patched = pin(1, 1.0, 1.0, "new name");
        patched.is_private = true;
        store.apply_update(patched);

        let shown = store.displayed();
        assert_eq!(shown[0].name.as_deref(), Some("new name"));
        assert!(shown[0].is_private);
    }

    #[test]
    fn optimistic_delete_hides_immediately() {
        let mut store = PinStore::new();
        store.reconcile(vec![pin(1, 1.0, 1.0, "a"), pin(2, 2.0, 2.0, "b")]);
        store.apply_delete(1);
        let shown = store.displayed();
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].id, 2);
    }

    #[test]
    fn version_bumps_on_every_change() {
        let mut store = PinStore::new();
        let v0 = store.version();
        store.apply_create(pin(0, 1.0, 1.0, "x"));
        assert!(store.version() > v0);
        let v1 = store.version();
        store.reconcile(Vec::new());
        assert!(store.version() > v1);
    }
}
