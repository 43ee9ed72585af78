use anyhow::Result;
use rusqlite::{OptionalExtension, params};
use serde::Deserialize;

use super::types::{ProviderKind, ProviderRecord};
use super::{Store, new_id, now_millis};
use crate::core::error::{DeckError, DeckResult};

const PROVIDER_COLUMNS: &str =
    "id, owner_id, name, kind, api_key, endpoint, is_active, created_at, updated_at";

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProvider {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ProviderKind,
    pub api_key: String,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderPatch {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<ProviderKind>,
    pub api_key: Option<String>,
    pub endpoint: Option<String>,
    pub is_active: Option<bool>,
}

impl NewProvider {
    pub fn validate(&self) -> DeckResult<()> {
        if self.name.trim().is_empty() {
            return Err(DeckError::validation("name is required"));
        }
        if self.api_key.trim().is_empty() {
            return Err(DeckError::validation("apiKey is required"));
        }
        if self.kind == ProviderKind::Custom && self.endpoint.as_deref().is_none_or(str::is_empty) {
            return Err(DeckError::validation("custom providers need an endpoint"));
        }
        Ok(())
    }
}

impl ProviderPatch {
    pub fn validate(&self) -> DeckResult<()> {
        if self.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(DeckError::validation("name must not be empty"));
        }
        if self.api_key.as_deref().is_some_and(|k| k.trim().is_empty()) {
            return Err(DeckError::validation("apiKey must not be empty"));
        }
        Ok(())
    }
}

fn map_provider(row: &rusqlite::Row<'_>) -> rusqlite::Result<ProviderRecord> {
    let kind: ProviderKind = row.get(3)?;
    Ok(ProviderRecord {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        name: row.get(2)?,
        kind,
        api_key: row.get(4)?,
        endpoint: row.get(5)?,
        is_active: row.get(6)?,
        models: kind.models(),
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

impl Store {
    pub async fn create_provider(&self, owner_id: &str, new: NewProvider) -> Result<ProviderRecord> {
        let now = now_millis();
        let provider = ProviderRecord {
            id: new_id(),
            owner_id: owner_id.to_string(),
            name: new.name.trim().to_string(),
            kind: new.kind,
            api_key: new.api_key,
            endpoint: new.endpoint,
            is_active: new.is_active,
            models: new.kind.models(),
            created_at: now,
            updated_at: now,
        };
        self.insert_provider(&provider).await?;
        Ok(provider)
    }

    pub(crate) async fn insert_provider(&self, provider: &ProviderRecord) -> Result<()> {
        let db = self.db.lock().await;
        db.execute(
            &format!(
                "INSERT INTO providers ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                PROVIDER_COLUMNS
            ),
            params![
                provider.id,
                provider.owner_id,
                provider.name,
                provider.kind,
                provider.api_key,
                provider.endpoint,
                provider.is_active,
                provider.created_at,
                provider.updated_at
            ],
        )?;
        Ok(())
    }

    pub async fn list_providers(&self, owner_id: &str) -> Result<Vec<ProviderRecord>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare(&format!(
            "SELECT {} FROM providers WHERE owner_id = ?1 ORDER BY created_at ASC",
            PROVIDER_COLUMNS
        ))?;
        let rows = stmt.query_map(params![owner_id], map_provider)?;
        let mut providers = Vec::new();
        for row in rows {
            providers.push(row?);
        }
        Ok(providers)
    }

    pub async fn get_provider(&self, owner_id: &str, id: &str) -> Result<Option<ProviderRecord>> {
        let db = self.db.lock().await;
        let provider = db
            .query_row(
                &format!(
                    "SELECT {} FROM providers WHERE id = ?1 AND owner_id = ?2",
                    PROVIDER_COLUMNS
                ),
                params![id, owner_id],
                map_provider,
            )
            .optional()?;
        Ok(provider)
    }

    pub async fn update_provider(
        &self,
        owner_id: &str,
        id: &str,
        patch: ProviderPatch,
    ) -> Result<Option<ProviderRecord>> {
        let Some(mut provider) = self.get_provider(owner_id, id).await? else {
            return Ok(None);
        };
        if let Some(v) = patch.name {
            provider.name = v.trim().to_string();
        }
        if let Some(v) = patch.kind {
            provider.kind = v;
            provider.models = v.models();
        }
        if let Some(v) = patch.api_key {
            provider.api_key = v;
        }
        if let Some(v) = patch.endpoint {
            provider.endpoint = Some(v).filter(|e| !e.is_empty());
        }
        if let Some(v) = patch.is_active {
            provider.is_active = v;
        }
        provider.updated_at = now_millis();

        let db = self.db.lock().await;
        db.execute(
            "UPDATE providers SET name = ?1, kind = ?2, api_key = ?3, endpoint = ?4,
                is_active = ?5, updated_at = ?6
             WHERE id = ?7 AND owner_id = ?8",
            params![
                provider.name,
                provider.kind,
                provider.api_key,
                provider.endpoint,
                provider.is_active,
                provider.updated_at,
                provider.id,
                owner_id
            ],
        )?;
        Ok(Some(provider))
    }

    pub async fn delete_provider(&self, owner_id: &str, id: &str) -> Result<bool> {
        let db = self.db.lock().await;
        let rows = db.execute(
            "DELETE FROM providers WHERE id = ?1 AND owner_id = ?2",
            params![id, owner_id],
        )?;
        Ok(rows > 0)
    }
}

#[cfg(test)]
pub(crate) fn sample_provider() -> NewProvider {
    NewProvider {
        name: "OpenAI GPT-4".to_string(),
        kind: ProviderKind::OpenAi,
        api_key: "sk-test-key-123456".to_string(),
        endpoint: None,
        is_active: true,
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_store;
    use super::*;

    #[tokio::test]
    async fn crud_roundtrip() {
        let store = test_store();
        let provider = store.create_provider("user-1", sample_provider()).await.unwrap();
        assert_eq!(provider.models.len(), 5);

        let patch = ProviderPatch {
            kind: Some(ProviderKind::Anthropic),
            is_active: Some(false),
            ..Default::default()
        };
        let updated = store
            .update_provider("user-1", &provider.id, patch)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.kind, ProviderKind::Anthropic);
        assert!(updated.models.contains(&"claude-3-haiku".to_string()));
        assert!(!updated.is_active);

        let fetched = store.get_provider("user-1", &provider.id).await.unwrap().unwrap();
        assert_eq!(fetched.models, updated.models);

        assert!(!store.delete_provider("user-2", &provider.id).await.unwrap());
        assert!(store.delete_provider("user-1", &provider.id).await.unwrap());
        assert!(store.list_providers("user-1").await.unwrap().is_empty());
    }

    #[test]
    fn custom_provider_requires_endpoint() {
        let mut new = sample_provider();
        new.kind = ProviderKind::Custom;
        assert!(new.validate().is_err());
        new.endpoint = Some("https://llm.internal/v1".to_string());
        assert!(new.validate().is_ok());
    }
}
