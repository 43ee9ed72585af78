use axum::{
    Extension, Json,
    extract::{Path, State},
};
use serde_json::{Value, json};

use crate::core::error::{DeckError, DeckResult};
use crate::core::store::{ChatbotPatch, NewChatbot};
use crate::interfaces::web::AppState;
use crate::interfaces::web::auth::Caller;
use crate::interfaces::web::error::ApiJson;

pub async fn list_chatbots(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> DeckResult<Json<Value>> {
    let chatbots = state.store.list_chatbots(&caller.user_id).await?;
    Ok(Json(json!({ "success": true, "chatbots": chatbots })))
}

pub async fn create_chatbot(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    ApiJson(payload): ApiJson<NewChatbot>,
) -> DeckResult<Json<Value>> {
    payload.validate()?;
    let chatbot = state.store.create_chatbot(&caller.user_id, payload).await?;
    Ok(Json(json!({ "success": true, "chatbot": chatbot })))
}

pub async fn get_chatbot(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
) -> DeckResult<Json<Value>> {
    let chatbot = state
        .store
        .get_chatbot(&caller.user_id, &id)
        .await?
        .ok_or_else(|| DeckError::not_found("Chatbot"))?;
    Ok(Json(json!({ "success": true, "chatbot": chatbot })))
}

pub async fn update_chatbot(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
    ApiJson(patch): ApiJson<ChatbotPatch>,
) -> DeckResult<Json<Value>> {
    patch.validate()?;
    let chatbot = state
        .store
        .update_chatbot(&caller.user_id, &id, patch)
        .await?
        .ok_or_else(|| DeckError::not_found("Chatbot"))?;
    Ok(Json(json!({ "success": true, "chatbot": chatbot })))
}

pub async fn delete_chatbot(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
) -> DeckResult<Json<Value>> {
    if !state.store.delete_chatbot(&caller.user_id, &id).await? {
        return Err(DeckError::not_found("Chatbot"));
    }
    Ok(Json(json!({ "success": true, "message": "Chatbot deleted" })))
}
