use axum::{
    Extension, Json,
    extract::{Path, State},
};
use serde_json::{Value, json};

use crate::core::error::{DeckError, DeckResult};
use crate::core::store::{NewProvider, ProviderPatch};
use crate::interfaces::web::AppState;
use crate::interfaces::web::auth::Caller;
use crate::interfaces::web::error::ApiJson;

pub async fn list_providers(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> DeckResult<Json<Value>> {
    let providers = state.store.list_providers(&caller.user_id).await?;
    Ok(Json(json!({ "success": true, "providers": providers })))
}

pub async fn create_provider(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    ApiJson(payload): ApiJson<NewProvider>,
) -> DeckResult<Json<Value>> {
    payload.validate()?;
    let provider = state.store.create_provider(&caller.user_id, payload).await?;
    Ok(Json(json!({ "success": true, "provider": provider })))
}

pub async fn get_provider(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
) -> DeckResult<Json<Value>> {
    let provider = state
        .store
        .get_provider(&caller.user_id, &id)
        .await?
        .ok_or_else(|| DeckError::not_found("Provider"))?;
    Ok(Json(json!({ "success": true, "provider": provider })))
}

pub async fn update_provider(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
    ApiJson(patch): ApiJson<ProviderPatch>,
) -> DeckResult<Json<Value>> {
    patch.validate()?;
    let provider = state
        .store
        .update_provider(&caller.user_id, &id, patch)
        .await?
        .ok_or_else(|| DeckError::not_found("Provider"))?;
    Ok(Json(json!({ "success": true, "provider": provider })))
}

pub async fn delete_provider(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
) -> DeckResult<Json<Value>> {
    if !state.store.delete_provider(&caller.user_id, &id).await? {
        return Err(DeckError::not_found("Provider"));
    }
    Ok(Json(json!({ "success": true, "message": "Provider deleted" })))
}
