use anyhow::Result;
use rusqlite::{OptionalExtension, params};
use serde::Deserialize;

use super::types::{ToolKind, ToolRecord};
use super::{Store, new_id, now_millis};
use crate::core::error::{DeckError, DeckResult};

const TOOL_COLUMNS: &str =
    "id, owner_id, name, description, kind, code, open_api_spec, parameters, created_at, updated_at";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTool {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type")]
    pub kind: ToolKind,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub open_api_spec: Option<String>,
    #[serde(default)]
    pub parameters: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub code: Option<String>,
    pub open_api_spec: Option<String>,
    pub parameters: Option<serde_json::Value>,
}

fn check_parameters(parameters: Option<&serde_json::Value>) -> DeckResult<()> {
    if parameters.is_some_and(|p| !p.is_object()) {
        return Err(DeckError::validation("parameters must be a JSON object"));
    }
    Ok(())
}

impl NewTool {
    pub fn validate(&self) -> DeckResult<()> {
        if self.name.trim().is_empty() {
            return Err(DeckError::validation("name is required"));
        }
        match self.kind {
            ToolKind::OpenApi if self.open_api_spec.as_deref().is_none_or(str::is_empty) => {
                return Err(DeckError::validation("openapi tools need an openApiSpec"));
            }
            ToolKind::Python | ToolKind::JavaScript
                if self.code.as_deref().is_none_or(str::is_empty) =>
            {
                return Err(DeckError::validation("code is required"));
            }
            _ => {}
        }
        check_parameters(self.parameters.as_ref())
    }
}

impl ToolPatch {
    pub fn validate(&self) -> DeckResult<()> {
        if self.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(DeckError::validation("name must not be empty"));
        }
        check_parameters(self.parameters.as_ref())
    }
}

fn map_tool(row: &rusqlite::Row<'_>) -> rusqlite::Result<ToolRecord> {
    Ok(ToolRecord {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        kind: row.get(4)?,
        code: row.get(5)?,
        open_api_spec: row.get(6)?,
        parameters: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

impl Store {
    pub async fn create_tool(&self, owner_id: &str, new: NewTool) -> Result<ToolRecord> {
        let now = now_millis();
        let tool = ToolRecord {
            id: new_id(),
            owner_id: owner_id.to_string(),
            name: new.name.trim().to_string(),
            description: new.description,
            kind: new.kind,
            code: new.code,
            open_api_spec: new.open_api_spec,
            parameters: new.parameters.unwrap_or_else(|| serde_json::json!({})),
            created_at: now,
            updated_at: now,
        };
        self.insert_tool(&tool).await?;
        Ok(tool)
    }

    pub(crate) async fn insert_tool(&self, tool: &ToolRecord) -> Result<()> {
        let db = self.db.lock().await;
        db.execute(
            &format!(
                "INSERT INTO tools ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                TOOL_COLUMNS
            ),
            params![
                tool.id,
                tool.owner_id,
                tool.name,
                tool.description,
                tool.kind,
                tool.code,
                tool.open_api_spec,
                tool.parameters,
                tool.created_at,
                tool.updated_at
            ],
        )?;
        Ok(())
    }

    pub async fn list_tools(&self, owner_id: &str) -> Result<Vec<ToolRecord>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare(&format!(
            "SELECT {} FROM tools WHERE owner_id = ?1 ORDER BY created_at DESC",
            TOOL_COLUMNS
        ))?;
        let rows = stmt.query_map(params![owner_id], map_tool)?;
        let mut tools = Vec::new();
        for row in rows {
            tools.push(row?);
        }
        Ok(tools)
    }

    pub async fn get_tool(&self, owner_id: &str, id: &str) -> Result<Option<ToolRecord>> {
        let db = self.db.lock().await;
        let tool = db
            .query_row(
                &format!(
                    "SELECT {} FROM tools WHERE id = ?1 AND owner_id = ?2",
                    TOOL_COLUMNS
                ),
                params![id, owner_id],
                map_tool,
            )
            .optional()?;
        Ok(tool)
    }

    pub async fn update_tool(
        &self,
        owner_id: &str,
        id: &str,
        patch: ToolPatch,
    ) -> Result<Option<ToolRecord>> {
        let Some(mut tool) = self.get_tool(owner_id, id).await? else {
            return Ok(None);
        };
        if let Some(v) = patch.name {
            tool.name = v.trim().to_string();
        }
        if let Some(v) = patch.description {
            tool.description = v;
        }
        if let Some(v) = patch.code {
            tool.code = Some(v);
        }
        if let Some(v) = patch.open_api_spec {
            tool.open_api_spec = Some(v);
        }
        if let Some(v) = patch.parameters {
            tool.parameters = v;
        }
        tool.updated_at = now_millis();

        let db = self.db.lock().await;
        db.execute(
            "UPDATE tools SET name = ?1, description = ?2, code = ?3, open_api_spec = ?4,
                parameters = ?5, updated_at = ?6
             WHERE id = ?7 AND owner_id = ?8",
            params![
                tool.name,
                tool.description,
                tool.code,
                tool.open_api_spec,
                tool.parameters,
                tool.updated_at,
                tool.id,
                owner_id
            ],
        )?;
        Ok(Some(tool))
    }

    pub async fn delete_tool(&self, owner_id: &str, id: &str) -> Result<bool> {
        let db = self.db.lock().await;
        let rows = db.execute(
            "DELETE FROM tools WHERE id = ?1 AND owner_id = ?2",
            params![id, owner_id],
        )?;
        Ok(rows > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_store;
    use super::*;

    fn python_tool() -> NewTool {
        NewTool {
            name: "Weather Checker".into(),
            description: "Get current weather".into(),
            kind: ToolKind::Python,
            code: Some("def run(city):\n    return city".into()),
            open_api_spec: None,
            parameters: Some(serde_json::json!({"city": {"type": "string"}})),
        }
    }

    #[tokio::test]
    async fn create_update_delete() {
        let store = test_store();
        let tool = store.create_tool("user-1", python_tool()).await.unwrap();
        let patch = ToolPatch {
            description: Some("Forecasts".into()),
            ..Default::default()
        };
        let updated = store
            .update_tool("user-1", &tool.id, patch)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.description, "Forecasts");
        let fetched = store.get_tool("user-1", &tool.id).await.unwrap().unwrap();
        assert_eq!(fetched.parameters["city"]["type"], "string");
        assert!(store.get_tool("user-2", &tool.id).await.unwrap().is_none());
        assert!(store.delete_tool("user-1", &tool.id).await.unwrap());
    }

    #[test]
    fn validation_follows_kind() {
        let mut tool = python_tool();
        tool.code = None;
        assert!(tool.validate().is_err());

        let mut tool = python_tool();
        tool.kind = ToolKind::OpenApi;
        assert!(tool.validate().is_err());
        tool.open_api_spec = Some("openapi: 3.0.0".into());
        assert!(tool.validate().is_ok());

        let mut tool = python_tool();
        tool.parameters = Some(serde_json::json!([1, 2]));
        assert!(tool.validate().is_err());
    }
}
