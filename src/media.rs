//! Media reference resolution.
//!
//! Normalizes whatever callers hand us (watch-page URLs, short links,
//! embed links, or bare identifiers) into a canonical media id, and builds
//! the URL forms derived from one.

use anyhow::{bail, Result};

/// URL fragments that precede a media id in the known link shapes.
const ID_MARKERS: [&str; 4] = ["watch?v=", "youtu.be/", "/embed/", "/shorts/"];

/// Extract the canonical media id from a URL or raw identifier.
///
/// Tries the known URL shapes first, then falls back to treating the whole
/// trimmed input as a literal id when it is identifier-shaped (alphanumeric
/// plus `_` and `-`). Errors when nothing matches. Pure, no side effects.
pub fn resolve(input: &str) -> Result<String> {
    let input = input.trim();

    for marker in ID_MARKERS {
        if let Some(pos) = input.find(marker) {
            let id: String = input[pos + marker.len()..]
                .chars()
                .take_while(|c| is_id_char(*c))
                .collect();
            if !id.is_empty() {
                return Ok(id);
            }
        }
    }

    if !input.is_empty() && input.chars().all(is_id_char) {
        return Ok(input.to_string());
    }

    bail!("could not extract a media id from '{}'", input);
}

fn is_id_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

/// Canonical watch-page URL for a media id.
pub fn watch_url(media_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", media_id)
}

/// Short deep link into the media at `start_time` (whole seconds).
pub fn timestamp_url(media_id: &str, start_time: f64) -> String {
    format!("https://youtu.be/{}?t={}", media_id, start_time as i64)
}
