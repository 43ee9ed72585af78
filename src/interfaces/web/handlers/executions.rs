use axum::{
    Extension, Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::core::error::{DeckError, DeckResult};
use crate::interfaces::web::AppState;
use crate::interfaces::web::auth::Caller;

const DEFAULT_LIMIT: u32 = 50;
const MAX_LIMIT: u32 = 500;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    limit: Option<u32>,
}

pub async fn list_executions(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Query(query): Query<ListQuery>,
) -> DeckResult<Json<Value>> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let executions = state.store.list_executions(&caller.user_id, limit).await?;
    Ok(Json(json!({ "success": true, "executions": executions })))
}

/// Accepts either the record id or the public `exec-...` id.
pub async fn get_execution(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
) -> DeckResult<Json<Value>> {
    let execution = state
        .store
        .get_execution(&caller.user_id, &id)
        .await?
        .ok_or_else(|| DeckError::not_found("Execution"))?;
    Ok(Json(json!({ "success": true, "execution": execution })))
}
