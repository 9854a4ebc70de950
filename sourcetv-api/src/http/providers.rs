//! Provider administration endpoints

use axum::{
    extract::{Path, State},
    Json,
};
use sourcetv_core::models::ProviderDescriptor;

use crate::http::{AppError, AppResult, AppState};

/// GET /api/providers - all registered providers in merge order
pub async fn list_providers(State(state): State<AppState>) -> Json<Vec<ProviderDescriptor>> {
    Json(state.services.registry.list())
}

/// POST /api/providers/{id}/enable
pub async fn enable_provider(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<ProviderDescriptor>> {
    state.services.registry.enable(&id)?;
    tracing::info!(provider_id = %id, "Provider enabled");
    descriptor(&state, &id).map(Json)
}

/// POST /api/providers/{id}/disable
pub async fn disable_provider(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<ProviderDescriptor>> {
    state.services.registry.disable(&id)?;
    tracing::info!(provider_id = %id, "Provider disabled");
    descriptor(&state, &id).map(Json)
}

fn descriptor(state: &AppState, id: &str) -> AppResult<ProviderDescriptor> {
    state
        .services
        .registry
        .list()
        .into_iter()
        .find(|d| d.id == id)
        .ok_or_else(|| AppError::not_found(format!("Provider '{id}' is not registered")))
}
