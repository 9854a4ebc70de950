//! Streaming media proxy
//!
//! Fetches the origin behind a proxy token with the headers the token carries
//! and streams the answer back to the client. Byte ranges pass straight
//! through; HLS playlists are rewritten so every URI inside them is proxied
//! as well.

pub mod hls;

use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
};
use sourcetv_core::proxy::{ProxyService, ProxyTarget};

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Client request headers forwarded to the origin
const FORWARDED_REQUEST_HEADERS: [HeaderName; 4] = [
    header::RANGE,
    header::IF_RANGE,
    header::ACCEPT,
    header::ACCEPT_LANGUAGE,
];

/// Origin response headers mirrored to the client
const MIRRORED_RESPONSE_HEADERS: [HeaderName; 6] = [
    header::CONTENT_TYPE,
    header::CONTENT_LENGTH,
    header::CONTENT_RANGE,
    header::ACCEPT_RANGES,
    header::LAST_MODIFIED,
    header::ETAG,
];

/// Configuration for a single proxy fetch.
pub struct ForwardRequest<'a> {
    /// Decoded token: origin URL plus the headers it requires
    pub target: &'a ProxyTarget,
    /// `GET` or `HEAD`
    pub method: &'a Method,
    /// Original client request headers
    pub client_headers: &'a HeaderMap,
    /// Used when the token does not carry a User-Agent
    pub user_agent: &'a str,
}

/// Fetch the origin and forward its response
///
/// Errors mean the origin could not be reached or its answer could not be
/// relayed; callers answer those with 502.
pub async fn proxy_fetch_and_forward(
    client: &reqwest::Client,
    proxy: &ProxyService,
    req: ForwardRequest<'_>,
) -> Result<Response, anyhow::Error> {
    let target = req.target;
    let head_only = req.method == Method::HEAD;
    // Partial playlists cannot be rewritten
    let playlist_url = hls::is_playlist(&target.url, None);

    let mut upstream = send(client, &req, !playlist_url).await?;
    let mut content_type = content_type_of(&upstream);

    let playlist = !head_only && hls::is_playlist(&target.url, content_type.as_deref());
    if playlist && upstream.status() == StatusCode::PARTIAL_CONTENT {
        tracing::debug!(url = %target.url, "Range answered for a playlist, fetching it whole");
        upstream = send(client, &req, false).await?;
        content_type = content_type_of(&upstream);
    }
    let status = upstream.status();

    tracing::debug!(
        url = %target.url,
        status = %status,
        content_type = content_type.as_deref().unwrap_or(""),
        "Origin answered"
    );

    if playlist && status == StatusCode::OK {
        let text = upstream
            .text()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to read playlist body: {e}"))?;

        let rewritten = hls::rewrite_playlist(&text, &target.url, |uri| {
            proxy.create_proxy_url(uri, &target.headers).ok()
        });

        let response = Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "application/vnd.apple.mpegurl")
            .header(header::CACHE_CONTROL, "no-cache")
            .body(Body::from(rewritten))
            .map_err(|e| anyhow::anyhow!("Failed to build playlist response: {e}"))?;
        return Ok(with_cors(response));
    }

    let mut builder = Response::builder().status(status.as_u16());
    for name in &MIRRORED_RESPONSE_HEADERS {
        if let Some(value) = upstream.headers().get(name) {
            builder = builder.header(name, value.as_bytes());
        }
    }

    let body = if head_only {
        Body::empty()
    } else {
        Body::from_stream(upstream.bytes_stream())
    };

    let response = builder
        .body(body)
        .map_err(|e| anyhow::anyhow!("Failed to build response: {e}"))?;
    Ok(with_cors(response))
}

/// Preflight handler suitable for `OPTIONS` routes.
#[allow(clippy::unused_async)]
pub async fn proxy_options_preflight() -> impl IntoResponse {
    let mut response = StatusCode::NO_CONTENT.into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, HEAD, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Range, If-Range, Accept, Accept-Language"),
    );
    headers.insert(header::ACCESS_CONTROL_MAX_AGE, HeaderValue::from_static("86400"));
    with_cors(response)
}

/// Permissive CORS so browser players can read media and ranges
#[must_use]
pub fn with_cors(mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(
        header::ACCESS_CONTROL_EXPOSE_HEADERS,
        HeaderValue::from_static("Content-Length, Content-Range, Accept-Ranges, Content-Type"),
    );
    response
}

async fn send(
    client: &reqwest::Client,
    req: &ForwardRequest<'_>,
    with_range: bool,
) -> Result<reqwest::Response, anyhow::Error> {
    let url = &req.target.url;
    let request = if req.method == Method::HEAD {
        client.head(url)
    } else {
        client.get(url)
    };

    request
        .headers(outbound_headers(req, with_range))
        .send()
        .await
        .map_err(|e| anyhow::anyhow!("Proxy request failed: {e}"))
}

/// Forwarded client headers, then token headers replacing them, then defaults
fn outbound_headers(req: &ForwardRequest<'_>, with_range: bool) -> HeaderMap {
    let mut headers = HeaderMap::new();

    for name in &FORWARDED_REQUEST_HEADERS {
        if !with_range && (name == header::RANGE || name == header::IF_RANGE) {
            continue;
        }
        if let Some(value) = req.client_headers.get(name) {
            headers.insert(name.clone(), value.clone());
        }
    }

    for (name, value) in &req.target.headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            _ => tracing::warn!(header = %name, "Skipping invalid token header"),
        }
    }

    if !headers.contains_key(header::USER_AGENT) {
        if let Ok(value) = HeaderValue::from_str(req.user_agent) {
            headers.insert(header::USER_AGENT, value);
        }
    }
    if !headers.contains_key(header::REFERER) {
        if let Some(value) = default_referer(&req.target.url)
            .and_then(|referer| HeaderValue::from_str(&referer).ok())
        {
            headers.insert(header::REFERER, value);
        }
    }

    headers
}

fn content_type_of(response: &reqwest::Response) -> Option<String> {
    response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// `scheme://host[:port]/` of the origin URL
fn default_referer(origin_url: &str) -> Option<String> {
    let parsed = url::Url::parse(origin_url).ok()?;
    let host = parsed.host_str()?;
    Some(match parsed.port() {
        Some(port) => format!("{}://{host}:{port}/", parsed.scheme()),
        None => format!("{}://{host}/", parsed.scheme()),
    })
}
