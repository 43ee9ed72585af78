use axum::{
    Extension, Json,
    extract::{Path, State},
};
use serde_json::{Value, json};

use crate::core::error::{DeckError, DeckResult};
use crate::interfaces::web::AppState;
use crate::interfaces::web::auth::Caller;
use crate::interfaces::web::error::ApiJson;

#[derive(serde::Deserialize)]
pub struct CreateTokenRequest {
    pub name: String,
}

pub async fn list_tokens(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> DeckResult<Json<Value>> {
    let tokens = state.store.list_api_tokens(&caller.user_id).await?;
    Ok(Json(json!({ "success": true, "tokens": tokens })))
}

pub async fn create_token(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    ApiJson(payload): ApiJson<CreateTokenRequest>,
) -> DeckResult<Json<Value>> {
    let name = payload.name.trim();
    if name.is_empty() {
        return Err(DeckError::validation("Token name is required"));
    }
    let (raw_token, record) = state.store.create_api_token(&caller.user_id, name).await?;
    Ok(Json(json!({
        "success": true,
        "token": raw_token,
        "record": record,
        "message": "Token created. Save the token value - it will not be shown again."
    })))
}

pub async fn delete_token(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(token_id): Path<String>,
) -> DeckResult<Json<Value>> {
    if !state.store.delete_api_token(&caller.user_id, &token_id).await? {
        return Err(DeckError::not_found("Token"));
    }
    Ok(Json(json!({ "success": true, "message": "Token revoked" })))
}
