use axum::{
    Extension, Json,
    extract::{Multipart, Path, State},
};
use serde_json::{Value, json};

use crate::core::error::{DeckError, DeckResult};
use crate::core::ingest::IngestionKind;
use crate::core::store::NewKnowledgeFile;
use crate::core::store::types::KnowledgeSource;
use crate::interfaces::web::AppState;
use crate::interfaces::web::auth::Caller;
use crate::interfaces::web::error::ApiJson;

pub async fn list_knowledge(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> DeckResult<Json<Value>> {
    let files = state.store.list_knowledge_files(&caller.user_id).await?;
    Ok(Json(json!({ "success": true, "files": files })))
}

pub async fn register_knowledge(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    ApiJson(payload): ApiJson<NewKnowledgeFile>,
) -> DeckResult<Json<Value>> {
    let file = state
        .ingestor
        .ingest(&caller.user_id, payload, IngestionKind::Register)
        .await?;
    Ok(Json(json!({ "success": true, "file": file })))
}

pub async fn get_knowledge(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
) -> DeckResult<Json<Value>> {
    let file = state
        .store
        .get_knowledge_file(&caller.user_id, &id)
        .await?
        .ok_or_else(|| DeckError::not_found("Knowledge file"))?;
    Ok(Json(json!({ "success": true, "file": file })))
}

pub async fn delete_knowledge(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
) -> DeckResult<Json<Value>> {
    if !state.ingestor.remove(&caller.user_id, &id).await? {
        return Err(DeckError::not_found("Knowledge file"));
    }
    Ok(Json(json!({ "success": true, "message": "Knowledge file deleted" })))
}

/// Multipart upload; only the `file` part is read, its bytes are counted and dropped.
pub async fn upload_file(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    mut multipart: Multipart,
) -> DeckResult<Json<Value>> {
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| DeckError::validation(format!("invalid multipart body: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let name = field
            .file_name()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or("upload")
            .to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| DeckError::validation(format!("failed to read upload: {}", e)))?;
        upload = Some(NewKnowledgeFile {
            name,
            source: KnowledgeSource::File,
            size: Some(bytes.len() as i64),
            url: None,
        });
        break;
    }

    let new = upload.ok_or_else(|| DeckError::validation("No file uploaded"))?;
    let file = state
        .ingestor
        .ingest(&caller.user_id, new, IngestionKind::Upload)
        .await?;
    Ok(Json(json!({
        "success": true,
        "fileId": file.id,
        "message": "File uploaded successfully",
        "file": file
    })))
}
