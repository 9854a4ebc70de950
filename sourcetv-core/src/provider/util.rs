//! Shared provider helpers
//!
//! Free functions composed into provider implementations: quality and format
//! inference, the common JSON payload external providers answer with, and
//! conversion of raw origin URLs into proxied [`Source`]/[`Subtitle`] values.

use serde::{Deserialize, Serialize};

use super::ProviderContext;
use crate::models::{
    AudioTrack, Diagnostic, DiagnosticCode, ProviderRef, ProviderResult, Quality, Source,
    StreamType, Subtitle,
};
use crate::proxy::{HeaderMapping, ProxyError};

/// Infer a quality tag from free text ("1080p", "FHD", "4K", a file name, ...)
#[must_use]
pub fn infer_quality(text: &str) -> Quality {
    let t = text.trim().to_ascii_lowercase();

    if t.contains("2160") || t.contains("4k") || t.contains("uhd") {
        Quality::P2160
    } else if t.contains("1440") || t.contains("2k") || t.contains("qhd") {
        Quality::P1440
    } else if t.contains("1080") || t.contains("fhd") || t.contains("full hd") {
        Quality::P1080
    } else if t.contains("720") || t == "hd" {
        Quality::P720
    } else if t.contains("480") || t == "sd" {
        Quality::P480
    } else if t.contains("360") {
        Quality::P360
    } else {
        Quality::Unknown
    }
}

/// Infer the stream type from a URL's file extension
#[must_use]
pub fn infer_stream_type(url: &str) -> StreamType {
    let path = url::Url::parse(url)
        .map(|u| u.path().to_ascii_lowercase())
        .unwrap_or_else(|_| url.to_ascii_lowercase());

    if path.ends_with(".m3u8") || path.ends_with(".m3u") {
        StreamType::Hls
    } else if path.ends_with(".mpd") {
        StreamType::Dash
    } else if path.ends_with(".mp4") || path.ends_with(".m4v") {
        StreamType::Mp4
    } else if path.ends_with(".mkv") {
        StreamType::Mkv
    } else if path.ends_with(".webm") {
        StreamType::Webm
    } else if url.to_ascii_lowercase().contains(".m3u8") {
        // Playlist URLs hidden behind a query (e.g. `/play?file=x.m3u8`)
        StreamType::Hls
    } else {
        StreamType::Embed
    }
}

/// Infer a subtitle format from its URL, defaulting to WebVTT
#[must_use]
pub fn infer_subtitle_format(url: &str) -> String {
    let path = url::Url::parse(url)
        .map(|u| u.path().to_ascii_lowercase())
        .unwrap_or_else(|_| url.to_ascii_lowercase());

    ["srt", "vtt", "ass", "ssa", "ttml"]
        .into_iter()
        .find(|ext| path.ends_with(&format!(".{ext}")))
        .unwrap_or("vtt")
        .to_string()
}

/// Default health probe: any HTTP answer below 500 means reachable
pub async fn probe_reachability(http: &reqwest::Client, url: &str) -> bool {
    let response = match http.head(url).send().await {
        // Some origins refuse HEAD; retry with GET before declaring them down
        Ok(resp) if resp.status() == reqwest::StatusCode::METHOD_NOT_ALLOWED => {
            http.get(url).send().await
        }
        other => other,
    };

    match response {
        Ok(resp) => {
            let reachable = !resp.status().is_server_error();
            tracing::debug!(url = %url, status = %resp.status(), reachable, "Reachability probe");
            reachable
        }
        Err(e) => {
            tracing::debug!(url = %url, error = %e, "Reachability probe failed");
            false
        }
    }
}

/// A stream URL as reported by an origin, before proxying
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSource {
    pub url: String,
    /// Headers the origin requires (Referer, Origin, cookies, ...)
    #[serde(default)]
    pub headers: HeaderMapping,
    #[serde(default)]
    pub quality: Option<String>,
    #[serde(default, rename = "type")]
    pub stream_type: Option<StreamType>,
    #[serde(default)]
    pub audio_tracks: Vec<AudioTrack>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSubtitle {
    pub url: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub headers: HeaderMapping,
}

fn default_language() -> String {
    "und".to_string()
}

/// JSON payload answered by `http_api` origins and `plugin` executables
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourcePayload {
    #[serde(default)]
    pub sources: Vec<RawSource>,
    #[serde(default)]
    pub subtitles: Vec<RawSubtitle>,
    #[serde(default)]
    pub diagnostics: Vec<Diagnostic>,
}

impl SourcePayload {
    /// Convert into a [`ProviderResult`], proxying every URL
    ///
    /// `stream_headers` are merged under each entry's own headers. Entries whose
    /// URL cannot be proxied are dropped with a warning diagnostic.
    #[must_use]
    pub fn into_result(
        self,
        ctx: &ProviderContext<'_>,
        provider: &ProviderRef,
        stream_headers: &HeaderMapping,
    ) -> ProviderResult {
        let mut result = ProviderResult {
            diagnostics: self.diagnostics,
            ..ProviderResult::default()
        };

        for raw in self.sources {
            match build_source(ctx, provider, raw, stream_headers) {
                Ok(source) => result.sources.push(source),
                Err(e) => result.diagnostics.push(dropped_entry(provider, "source", &e)),
            }
        }

        for raw in self.subtitles {
            match build_subtitle(ctx, provider, raw, stream_headers) {
                Ok(subtitle) => result.subtitles.push(subtitle),
                Err(e) => result.diagnostics.push(dropped_entry(provider, "subtitle", &e)),
            }
        }

        result
    }
}

fn dropped_entry(provider: &ProviderRef, what: &str, err: &ProxyError) -> Diagnostic {
    Diagnostic::warn(
        DiagnosticCode::ProviderError,
        format!("{} returned an unusable {what} URL: {err}", provider.name),
    )
    .with_field(provider.id.clone())
}

fn merged_headers(base: &HeaderMapping, own: HeaderMapping) -> HeaderMapping {
    let mut headers = base.clone();
    headers.extend(own);
    headers
}

/// Turn a raw origin stream into a proxied [`Source`]
pub fn build_source(
    ctx: &ProviderContext<'_>,
    provider: &ProviderRef,
    raw: RawSource,
    stream_headers: &HeaderMapping,
) -> Result<Source, ProxyError> {
    let stream_type = raw
        .stream_type
        .unwrap_or_else(|| infer_stream_type(&raw.url));
    let quality = raw
        .quality
        .as_deref()
        .map_or_else(|| infer_quality(&raw.url), infer_quality);
    let headers = merged_headers(stream_headers, raw.headers);

    Ok(Source {
        url: ctx.proxy.create_proxy_url(&raw.url, &headers)?,
        stream_type,
        quality,
        audio_tracks: raw.audio_tracks,
        provider: provider.clone(),
    })
}

/// Turn a raw origin subtitle into a proxied [`Subtitle`]
pub fn build_subtitle(
    ctx: &ProviderContext<'_>,
    provider: &ProviderRef,
    raw: RawSubtitle,
    stream_headers: &HeaderMapping,
) -> Result<Subtitle, ProxyError> {
    let format = raw
        .format
        .unwrap_or_else(|| infer_subtitle_format(&raw.url));
    let headers = merged_headers(stream_headers, raw.headers);

    Ok(Subtitle {
        language: raw.language,
        format,
        url: ctx.proxy.create_proxy_url(&raw.url, &headers)?,
        provider: provider.clone(),
    })
}
