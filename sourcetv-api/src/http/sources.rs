//! Source resolution endpoints
//!
//! A resolution that finds nothing is still a 200 with diagnostics; only
//! malformed requests are errors.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use sourcetv_core::models::{MediaRequest, SourceResponse};

use crate::http::{AppResult, AppState};

/// Optional hints passed to providers
#[derive(Debug, Default, Deserialize)]
pub struct HintQuery {
    pub title: Option<String>,
    pub year: Option<u32>,
}

impl HintQuery {
    fn apply(self, mut media: MediaRequest) -> MediaRequest {
        if let Some(title) = self.title.filter(|t| !t.trim().is_empty()) {
            media = media.with_title_hint(title);
        }
        if let Some(year) = self.year {
            media = media.with_year_hint(year);
        }
        media
    }
}

/// GET /api/sources/movie/{id}
pub async fn movie_sources(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(hints): Query<HintQuery>,
) -> AppResult<Json<SourceResponse>> {
    let media = hints.apply(MediaRequest::movie(id));
    let response = state.services.resolution.resolve(&media).await?;
    Ok(Json(response))
}

/// GET /api/sources/tv/{id}/{season}/{episode}
pub async fn tv_sources(
    State(state): State<AppState>,
    Path((id, season, episode)): Path<(String, u32, u32)>,
    Query(hints): Query<HintQuery>,
) -> AppResult<Json<SourceResponse>> {
    let media = hints.apply(MediaRequest::tv(id, season, episode));
    let response = state.services.resolution.resolve(&media).await?;
    Ok(Json(response))
}
