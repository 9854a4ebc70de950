//! HLS playlist rewriting
//!
//! Every URI in a playlist (segments, child playlists, `URI="..."` attributes
//! of `#EXT-X-KEY`, `#EXT-X-MAP`, `#EXT-X-MEDIA`, ...) is resolved against the
//! playlist URL and handed to a rewrite function, typically one that issues a
//! proxy URL for it.

/// Whether a response is an HLS playlist, judged by URL or content type
#[must_use]
pub fn is_playlist(url: &str, content_type: Option<&str>) -> bool {
    if content_type.is_some_and(|ct| ct.to_ascii_lowercase().contains("mpegurl")) {
        return true;
    }
    let path = url::Url::parse(url)
        .map(|u| u.path().to_ascii_lowercase())
        .unwrap_or_default();
    path.ends_with(".m3u8") || path.ends_with(".m3u")
}

/// Rewrite all URIs in `playlist`
///
/// `rewrite` receives absolute URLs; returning `None` keeps the original
/// reference (e.g. `skd://` key URIs the proxy cannot serve).
pub fn rewrite_playlist<F>(playlist: &str, source_url: &str, mut rewrite: F) -> String
where
    F: FnMut(&str) -> Option<String>,
{
    let base = url::Url::parse(source_url).ok();
    let mut output = String::with_capacity(playlist.len() * 2);

    for line in playlist.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with('#') {
            output.push_str(&rewrite_uri_attributes(line, base.as_ref(), &mut rewrite));
        } else if trimmed.is_empty() {
            output.push_str(line);
        } else {
            let absolute = make_absolute(trimmed, base.as_ref());
            match rewrite(&absolute) {
                Some(rewritten) => output.push_str(&rewritten),
                None => output.push_str(line),
            }
        }
        output.push('\n');
    }

    output
}

/// Resolve a possibly-relative URL against the playlist URL
fn make_absolute(raw: &str, base: Option<&url::Url>) -> String {
    if raw.starts_with("http://") || raw.starts_with("https://") {
        return raw.to_string();
    }
    if let Some(base) = base {
        if let Ok(joined) = base.join(raw) {
            return joined.to_string();
        }
    }
    raw.to_string()
}

/// Rewrite any `URI="..."` values found in a tag line
fn rewrite_uri_attributes<F>(line: &str, base: Option<&url::Url>, rewrite: &mut F) -> String
where
    F: FnMut(&str) -> Option<String>,
{
    let pattern = "URI=\"";
    let mut result = String::with_capacity(line.len());
    let mut remaining = line;

    while let Some(start) = remaining.find(pattern) {
        result.push_str(&remaining[..start + pattern.len()]);
        remaining = &remaining[start + pattern.len()..];

        if let Some(end) = remaining.find('"') {
            let uri = &remaining[..end];
            let absolute = make_absolute(uri, base);
            match rewrite(&absolute) {
                Some(rewritten) => result.push_str(&rewritten),
                None => result.push_str(uri),
            }
            result.push('"');
            remaining = &remaining[end + 1..];
        } else {
            result.push_str(remaining);
            remaining = "";
        }
    }

    result.push_str(remaining);
    result
}
