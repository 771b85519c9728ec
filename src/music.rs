//! Music link validation and popup button labels.
//!
//! A pin may carry one optional music link. Only YouTube and Spotify URLs are
//! accepted; an empty link is always valid. Validation is a pure string
//! check with no network access.

/// Returns true for an empty/whitespace-only link or a syntactically valid
/// YouTube or Spotify URL.
pub fn is_valid_music_link(link: &str) -> bool {
    let trimmed = link.trim();
    if trimmed.is_empty() {
        return true;
    }

    let Some(rest) = strip_scheme(trimmed) else {
        return false;
    };
    let (host, path) = split_host(rest);
    let host = host.to_ascii_lowercase();

    let youtube = matches!(
        host.as_str(),
        "youtube.com" | "www.youtube.com" | "youtu.be" | "www.youtu.be"
    );
    let spotify = matches!(host.as_str(), "spotify.com" | "open.spotify.com");

    (youtube || spotify) && path.len() > 1
}

/// Label for the popup's music action, derived from the link hostname.
pub fn music_button_label(link: &str) -> &'static str {
    let host = host_of(link);
    if host.contains("youtube") {
        "Open YouTube"
    } else if host.contains("spotify") {
        "Open Spotify"
    } else {
        "Open Music Link"
    }
}

fn strip_scheme(s: &str) -> Option<&str> {
    s.strip_prefix("https://")
        .or_else(|| s.strip_prefix("http://"))
}

/// Split "host/path" into host and path ("/..." or "" when absent).
fn split_host(rest: &str) -> (&str, &str) {
    match rest.find('/') {
        Some(idx) => (&rest[..idx], &rest[idx..]),
        None => (rest, ""),
    }
}

fn host_of(link: &str) -> String {
    let rest = strip_scheme(link.trim()).unwrap_or_else(|| link.trim());
    let (host, _) = split_host(rest);
    host.split(':').next().unwrap_or("").to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_link_is_valid() {
        assert!(is_valid_music_link(""));
        assert!(is_valid_music_link("   "));
        assert!(is_valid_music_link("\t\n"));
    }

    #[test]
    fn accepts_youtube_urls() {
        assert!(is_valid_music_link("https://www.youtube.com/watch?v=abc123"));
        assert!(is_valid_music_link("http://youtube.com/watch?v=abc123"));
        assert!(is_valid_music_link("https://youtu.be/abc123"));
    }

    #[test]
    fn accepts_spotify_urls() {
        assert!(is_valid_music_link("https://open.spotify.com/track/xyz"));
        assert!(is_valid_music_link("http://spotify.com/album/xyz"));
    }

    #[test]
    fn rejects_other_urls() {
        assert!(!is_valid_music_link("https://example.com/song"));
        assert!(!is_valid_music_link("https://soundcloud.com/artist/track"));
        assert!(!is_valid_music_link("not a url"));
        assert!(!is_valid_music_link("youtube.com/watch?v=abc"));
        assert!(!is_valid_music_link("ftp://youtube.com/watch"));
    }

    #[test]
    fn rejects_bare_hosts_without_path() {
        assert!(!is_valid_music_link("https://youtube.com"));
        assert!(!is_valid_music_link("https://open.spotify.com/"));
    }

    #[test]
    fn validation_is_stable_across_calls() {
        let link = "https://open.spotify.com/track/xyz";
        let first = is_valid_music_link(link);
        assert_eq!(first, is_valid_music_link(link));
        assert!(first);
    }

    #[test]
    fn label_follows_hostname() {
        assert_eq!(
            music_button_label("https://www.youtube.com/watch?v=a"),
            "Open YouTube"
        );
        assert_eq!(
            music_button_label("https://open.spotify.com/track/x"),
            "Open Spotify"
        );
        assert_eq!(
            music_button_label("https://example.com/song"),
            "Open Music Link"
        );
    }
}
