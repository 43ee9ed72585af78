use axum::{
    Extension, Json,
    extract::{Path, State},
};
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::core::error::{DeckError, DeckResult};
use crate::core::store::types::AgentRecord;
use crate::core::store::{AgentPatch, NewAgent};
use crate::interfaces::web::AppState;
use crate::interfaces::web::auth::Caller;
use crate::interfaces::web::error::ApiJson;

/// The row is already saved, so a scheduling failure is logged rather than
/// reported as a failed write.
async fn sync_schedule(state: &AppState, agent: &AgentRecord) {
    if let Err(e) = state.scheduler.sync(agent).await {
        warn!("Failed to sync schedule for agent [{}]: {}", agent.name, e);
    }
}

pub async fn list_agents(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> DeckResult<Json<Value>> {
    let agents = state.store.list_agents(&caller.user_id).await?;
    Ok(Json(json!({ "success": true, "agents": agents })))
}

pub async fn create_agent(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    ApiJson(payload): ApiJson<NewAgent>,
) -> DeckResult<Json<Value>> {
    payload.validate()?;
    let agent = state.store.create_agent(&caller.user_id, payload).await?;
    sync_schedule(&state, &agent).await;
    info!("Agent [{}] created", agent.name);
    Ok(Json(json!({ "success": true, "agent": agent })))
}

pub async fn get_agent(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
) -> DeckResult<Json<Value>> {
    let agent = state
        .store
        .get_agent(&caller.user_id, &id)
        .await?
        .ok_or_else(|| DeckError::not_found("Agent"))?;
    Ok(Json(json!({ "success": true, "agent": agent })))
}

pub async fn update_agent(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
    ApiJson(patch): ApiJson<AgentPatch>,
) -> DeckResult<Json<Value>> {
    patch.validate()?;
    let agent = state
        .store
        .update_agent(&caller.user_id, &id, patch)
        .await?
        .ok_or_else(|| DeckError::not_found("Agent"))?;
    sync_schedule(&state, &agent).await;
    Ok(Json(json!({ "success": true, "agent": agent })))
}

/// Archive the agent, stop its schedule and cancel anything still running.
pub async fn delete_agent(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
) -> DeckResult<Json<Value>> {
    if !state.store.archive_agent(&caller.user_id, &id).await? {
        return Err(DeckError::not_found("Agent"));
    }
    if let Err(e) = state.scheduler.unschedule(&id).await {
        warn!("Failed to unschedule archived agent {}: {}", id, e);
    }
    let canceled = state.runner.cancel_agent(&id).await;
    Ok(Json(json!({
        "success": true,
        "message": "Agent archived",
        "canceledExecutions": canceled
    })))
}

pub async fn execute_agent(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
) -> DeckResult<Json<Value>> {
    let record = state.runner.start(&caller.user_id, &id).await?;
    Ok(Json(json!({
        "success": true,
        "executionId": record.execution_id,
        "status": record.status
    })))
}

pub async fn agent_logs(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
) -> DeckResult<Json<Value>> {
    let logs = state
        .store
        .list_executions_for_agent(&caller.user_id, &id)
        .await?;
    Ok(Json(json!({ "success": true, "logs": logs })))
}
