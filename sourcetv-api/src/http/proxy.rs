//! Media proxy HTTP endpoint
//!
//! Streams origin media for a signed token. Clients never see origin URLs or
//! the headers the origin requires.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, Method},
    response::Response,
    routing::get,
    Router,
};
use sourcetv_proxy::{proxy_fetch_and_forward, proxy_options_preflight, ForwardRequest};

use crate::http::{AppError, AppResult, AppState};

/// GET|HEAD /proxy/{token}
pub async fn proxy_stream(
    State(state): State<AppState>,
    Path(token): Path<String>,
    method: Method,
    headers: HeaderMap,
) -> AppResult<Response> {
    let target = state.services.proxy.decode_token(&token)?;

    let request = ForwardRequest {
        target: &target,
        method: &method,
        client_headers: &headers,
        user_agent: &state.config.proxy.user_agent,
    };

    proxy_fetch_and_forward(&state.services.stream_http, &state.services.proxy, request)
        .await
        .map_err(|e| {
            tracing::warn!(url = %target.url, error = %e, "Origin fetch failed");
            AppError::bad_gateway("Origin unavailable")
        })
}

/// Create the media proxy router
pub fn create_proxy_router() -> Router<AppState> {
    Router::new().route(
        "/proxy/{token}",
        get(proxy_stream).options(proxy_options_preflight),
    )
}
