//! Provider-key CRUD, spec.md §6. Listing is backed directly by the
//! `ProviderKeyRing` every request already shares; rotation is not wired in
//! this build because `ProviderKeyRing::set_credential` takes `&mut self`
//! and the key ring is constructed once into the shared, immutable
//! `GatewayContext` — mutating it at request time would need interior
//! mutability the core context intentionally doesn't carry. Rotation
//! requests are surfaced honestly as 501 rather than silently no-opping.

use std::sync::Arc;

use axum::extract::{Path, State};
use serde::Serialize;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ProviderStatus {
    pub provider: String,
    pub has_credential: bool,
}

pub async fn list_providers(State(state): State<Arc<AppState>>) -> axum::Json<Vec<ProviderStatus>> {
    let mut names: Vec<&String> = state.ctx.adapters.keys().collect();
    names.sort();
    let statuses = names
        .into_iter()
        .map(|provider| ProviderStatus { provider: provider.clone(), has_credential: state.ctx.has_credential(provider) })
        .collect();
    axum::Json(statuses)
}

pub async fn put_credential(Path(provider): Path<String>) -> ApiError {
    ApiError::NotImplemented(format!("credential rotation for '{provider}' requires a process restart in this build"))
}

pub async fn delete_credential(Path(provider): Path<String>) -> ApiError {
    ApiError::NotImplemented(format!("credential rotation for '{provider}' requires a process restart in this build"))
}
