use axum::{
    Extension, Json,
    extract::{Path, State},
};
use serde_json::{Value, json};

use crate::core::error::{DeckError, DeckResult};
use crate::core::store::{NewTool, ToolPatch};
use crate::interfaces::web::AppState;
use crate::interfaces::web::auth::Caller;
use crate::interfaces::web::error::ApiJson;

pub async fn list_tools(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> DeckResult<Json<Value>> {
    let tools = state.store.list_tools(&caller.user_id).await?;
    Ok(Json(json!({ "success": true, "tools": tools })))
}

pub async fn create_tool(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    ApiJson(payload): ApiJson<NewTool>,
) -> DeckResult<Json<Value>> {
    payload.validate()?;
    let tool = state.store.create_tool(&caller.user_id, payload).await?;
    Ok(Json(json!({ "success": true, "tool": tool })))
}

pub async fn get_tool(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
) -> DeckResult<Json<Value>> {
    let tool = state
        .store
        .get_tool(&caller.user_id, &id)
        .await?
        .ok_or_else(|| DeckError::not_found("Tool"))?;
    Ok(Json(json!({ "success": true, "tool": tool })))
}

pub async fn update_tool(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
    ApiJson(patch): ApiJson<ToolPatch>,
) -> DeckResult<Json<Value>> {
    patch.validate()?;
    let tool = state
        .store
        .update_tool(&caller.user_id, &id, patch)
        .await?
        .ok_or_else(|| DeckError::not_found("Tool"))?;
    Ok(Json(json!({ "success": true, "tool": tool })))
}

pub async fn delete_tool(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
) -> DeckResult<Json<Value>> {
    if !state.store.delete_tool(&caller.user_id, &id).await? {
        return Err(DeckError::not_found("Tool"));
    }
    Ok(Json(json!({ "success": true, "message": "Tool deleted" })))
}
