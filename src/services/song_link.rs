use url::Url;

const CANONICAL_BASE: &str = "https://open.spotify.com";
const LINK_TYPES: [&str; 3] = ["track", "album", "playlist"];

/// Canonical `https://open.spotify.com/{type}/{id}` form of a pasted Spotify link or URI,
/// or `None` when the input is not recognised.
pub fn normalize(input: &str) -> Option<String> {
    let raw = input.trim();
    if raw.is_empty() {
        return None;
    }

    if let Some(uri) = raw.strip_prefix("spotify:") {
        let mut parts = uri.split(':');
        let kind = parts.next().filter(|kind| !kind.is_empty())?;
        let id = parts.next().filter(|id| !id.is_empty())?;
        return Some(format!("{CANONICAL_BASE}/{kind}/{id}"));
    }

    let url = Url::parse(raw).ok()?;
    let host = url.host_str()?;
    if host != "open.spotify.com" && !host.ends_with(".spotify.com") {
        return None;
    }

    let segments: Vec<&str> = url
        .path_segments()?
        .filter(|segment| !segment.is_empty())
        .collect();
    let type_index = segments
        .iter()
        .position(|segment| LINK_TYPES.contains(segment))?;
    let id = segments.get(type_index + 1)?;

    Some(format!("{CANONICAL_BASE}/{}/{id}", segments[type_index]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_uris_and_links() {
        assert_eq!(
            normalize("spotify:track:4uLU6hMCjMI75M1A2tKUQC").as_deref(),
            Some("https://open.spotify.com/track/4uLU6hMCjMI75M1A2tKUQC")
        );
        assert_eq!(
            normalize("  https://open.spotify.com/intl-de/track/4uLU6hMCjMI75M1A2tKUQC?si=abc#x ")
                .as_deref(),
            Some("https://open.spotify.com/track/4uLU6hMCjMI75M1A2tKUQC")
        );
        assert_eq!(
            normalize("https://play.spotify.com/album/1DFixLWuPkv3KT3TnV35m3").as_deref(),
            Some("https://open.spotify.com/album/1DFixLWuPkv3KT3TnV35m3")
        );
        assert_eq!(
            normalize("https://open.spotify.com/playlist/37i9dQZF1DXcBWIGoYBM5M/").as_deref(),
            Some("https://open.spotify.com/playlist/37i9dQZF1DXcBWIGoYBM5M")
        );
    }

    #[test]
    fn rejects_everything_else() {
        assert_eq!(normalize(""), None);
        assert_eq!(normalize("spotify:track"), None);
        assert_eq!(normalize("spotify::abc"), None);
        assert_eq!(normalize("https://youtube.com/watch?v=dQw4w9WgXcQ"), None);
        assert_eq!(normalize("https://evilspotify.com/track/abc"), None);
        assert_eq!(normalize("https://open.spotify.com/artist/abc"), None);
        assert_eq!(normalize("https://open.spotify.com/track/"), None);
        assert_eq!(normalize("not a link"), None);
    }
}
