use axum::{Extension, Json, extract::State};
use serde_json::{Value, json};

use crate::core::error::{DeckError, DeckResult};
use crate::core::schedule::{self, PRESETS};
use crate::interfaces::web::AppState;
use crate::interfaces::web::auth::Caller;

pub async fn me(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> DeckResult<Json<Value>> {
    let user = state
        .store
        .get_user(&caller.user_id)
        .await?
        .ok_or_else(|| DeckError::Unauthorized("Unknown user".into()))?;
    Ok(Json(json!({ "success": true, "user": user })))
}

pub async fn schedule_presets() -> Json<Value> {
    let presets: Vec<Value> = PRESETS
        .iter()
        .map(|preset| {
            json!({
                "schedule": preset.descriptor(),
                "label": preset.label(),
                "nextRun": schedule::next_run(preset.descriptor()),
            })
        })
        .collect();
    Json(json!({ "success": true, "presets": presets }))
}
