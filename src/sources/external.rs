//! Links from streaming services that yt-dlp cannot download directly.
//! They are turned into a text search instead.

use regex::Regex;
use url::Url;

pub fn is_url(query: &str) -> bool {
    Url::parse(query)
        .map(|url| matches!(url.scheme(), "http" | "https") && url.host_str().is_some())
        .unwrap_or(false)
}

/// Spotify, JioSaavn, Apple Music y Amazon Music
pub fn is_external_link(query: &str) -> bool {
    let Ok(url) = Url::parse(query) else {
        return false;
    };
    let Some(host) = url.host_str() else {
        return false;
    };
    let host = host.to_ascii_lowercase();

    let matches_domain = |domain: &str| host == domain || host.ends_with(&format!(".{}", domain));

    matches_domain("spotify.com")
        || matches_domain("saavn.com")
        || matches_domain("jiosaavn.com")
        || matches_domain("music.apple.com")
        || host
            .split('.')
            .collect::<Vec<_>>()
            .windows(2)
            .any(|pair| pair == ["music", "amazon"])
}

/// Identificador que sigue a `track/` (o `tracks/` en Amazon) en la ruta
pub fn track_token(link: &str) -> Option<&str> {
    let re = Regex::new(r"tracks?/([a-zA-Z0-9]+)").ok()?;
    re.captures(link)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Search hint used when the service cannot describe the link.
pub fn fallback_hint(link: &str) -> String {
    match track_token(link) {
        Some(token) => format!("Track {}", token),
        None => link.to_string(),
    }
}
