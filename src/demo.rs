//! Generated sample data for the component demo (`vibemap demo`).
//!
//! No backend involved: a seeded RNG scatters pins around the default
//! viewport so markers, popups, centering and the forms can be exercised
//! offline. One record is deliberately malformed to show the adapter's
//! skip-and-warn path in the session log.

use crate::api::Vibe;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub const DEMO_PRINCIPAL: &str = "demo-user";

const SAMPLE_NAMES: [&str; 8] = [
    "Coffee Shop",
    "Sunset Pier",
    "Record Store",
    "Rooftop",
    "Late Train",
    "Old Bridge",
    "Corner Bar",
    "",
];

const SAMPLE_DESCRIPTIONS: [&str; 4] = [
    "the song that was playing when we got here",
    "came back three summers in a row",
    "",
    "loud, crowded, perfect",
];

const SAMPLE_LINKS: [&str; 4] = [
    "https://open.spotify.com/track/4uLU6hMCjMI75M1A2tKUQC",
    "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
    "",
    "https://youtu.be/ZbZSe6N_BXs",
];

const MOOD_TAGS: [&str; 7] = [
    "happy",
    "chill",
    "energetic",
    "melancholy",
    "romantic",
    "focused",
    "nostalgic",
];

/// Sample pin set clustered around New York City.
pub fn sample_vibes(count: usize, seed: u64) -> Vec<Vibe> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut vibes = Vec::with_capacity(count + 1);

    for id in 0..count as u64 {
        let lat = 40.7128 + rng.gen_range(-0.35..0.35);
        let lng = -74.0060 + rng.gen_range(-0.45..0.45);
        let mine = rng.gen_bool(0.4);
        let is_private = mine && rng.gen_bool(0.3);

        vibes.push(Vibe {
            id: id + 1,
            latitude: format!("{:.6}", lat),
            longitude: format!("{:.6}", lng),
            owner: if mine {
                DEMO_PRINCIPAL.to_string()
            } else {
                format!("wanderer-{}", rng.gen_range(1..5))
            },
            name: SAMPLE_NAMES[rng.gen_range(0..SAMPLE_NAMES.len())].to_string(),
            description: SAMPLE_DESCRIPTIONS[rng.gen_range(0..SAMPLE_DESCRIPTIONS.len())]
                .to_string(),
            is_private,
            mood: if rng.gen_bool(0.7) {
                Some(MOOD_TAGS[rng.gen_range(0..MOOD_TAGS.len())].to_string())
            } else {
                None
            },
            music_link: SAMPLE_LINKS[rng.gen_range(0..SAMPLE_LINKS.len())].to_string(),
        });
    }

    // Malformed coordinates: exercises skip-and-warn in the adapter.
    vibes.push(Vibe {
        id: count as u64 + 1,
        latitude: "not-a-coordinate".to_string(),
        longitude: "-74.0".to_string(),
        owner: "wanderer-1".to_string(),
        name: "Ghost Pin".to_string(),
        description: String::new(),
        is_private: false,
        mood: None,
        music_link: String::new(),
    });

    vibes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Identity;
    use crate::pins::adapt_vibes;

    #[test]
    fn same_seed_same_pins() {
        let a = sample_vibes(10, 7);
        let b = sample_vibes(10, 7);
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(&b) {
            assert_eq!(x.latitude, y.latitude);
            assert_eq!(x.owner, y.owner);
        }
    }

    #[test]
    fn adapter_skips_exactly_the_ghost_pin() {
        let vibes = sample_vibes(12, 3);
        let me = Identity::new(DEMO_PRINCIPAL);
        let (pins, warnings) = adapt_vibes(&vibes, Some(&me));
        assert_eq!(pins.len(), 12);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("bad coordinates"));
        assert!(pins.iter().any(|p| p.is_owner) || vibes.iter().all(|v| v.owner != DEMO_PRINCIPAL));
    }
}
