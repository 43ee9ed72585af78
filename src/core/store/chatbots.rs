use anyhow::Result;
use rusqlite::{OptionalExtension, params};
use serde::Deserialize;

use super::types::{AgentStatus, ChatbotAppearance, ChatbotRecord};
use super::{Store, list_from_json, list_to_json, new_id, now_millis};
use crate::core::error::{DeckError, DeckResult};

const CHATBOT_COLUMNS: &str = "id, owner_id, name, description, provider_id, provider, model, \
     system_prompt, temperature, max_tokens, welcome_message, appearance, knowledge_base, tools, \
     status, created_at, updated_at";

pub const DEFAULT_WELCOME: &str = "Hello! How can I help you today?";

/// Creation input. `provider` and `model` are resolved against the
/// caller's provider when omitted.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewChatbot {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub provider_id: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub system_prompt: String,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub welcome_message: Option<String>,
    #[serde(default)]
    pub appearance: Option<ChatbotAppearance>,
    #[serde(default)]
    pub knowledge_base: Vec<String>,
    #[serde(default)]
    pub tools: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatbotPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub model: Option<String>,
    pub system_prompt: Option<String>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
    pub welcome_message: Option<String>,
    pub appearance: Option<ChatbotAppearance>,
    pub knowledge_base: Option<Vec<String>>,
    pub tools: Option<Vec<String>>,
    pub status: Option<AgentStatus>,
}

fn check_sampling(temperature: Option<f64>, max_tokens: Option<u32>) -> DeckResult<()> {
    if temperature.is_some_and(|t| !(0.0..=2.0).contains(&t)) {
        return Err(DeckError::validation("temperature must be between 0 and 2"));
    }
    if max_tokens == Some(0) {
        return Err(DeckError::validation("maxTokens must be positive"));
    }
    Ok(())
}

impl NewChatbot {
    pub fn validate(&self) -> DeckResult<()> {
        if self.name.trim().is_empty() {
            return Err(DeckError::validation("name is required"));
        }
        if self.provider_id.trim().is_empty() {
            return Err(DeckError::validation("providerId is required"));
        }
        check_sampling(self.temperature, self.max_tokens)
    }
}

impl ChatbotPatch {
    pub fn validate(&self) -> DeckResult<()> {
        if self.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(DeckError::validation("name must not be empty"));
        }
        check_sampling(self.temperature, self.max_tokens)
    }
}

fn map_chatbot(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChatbotRecord> {
    let appearance: String = row.get(11)?;
    let knowledge_base: String = row.get(12)?;
    let tools: String = row.get(13)?;
    Ok(ChatbotRecord {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        provider_id: row.get(4)?,
        provider: row.get(5)?,
        model: row.get(6)?,
        system_prompt: row.get(7)?,
        temperature: row.get(8)?,
        max_tokens: row.get(9)?,
        welcome_message: row.get(10)?,
        appearance: serde_json::from_str(&appearance).unwrap_or_default(),
        knowledge_base: list_from_json(&knowledge_base)?,
        tools: list_from_json(&tools)?,
        status: row.get(14)?,
        created_at: row.get(15)?,
        updated_at: row.get(16)?,
    })
}

impl Store {
    /// Fails with `Validation` when the referenced provider is not the caller's.
    pub async fn create_chatbot(&self, owner_id: &str, new: NewChatbot) -> DeckResult<ChatbotRecord> {
        let provider = self
            .get_provider(owner_id, &new.provider_id)
            .await?
            .ok_or_else(|| DeckError::validation("unknown providerId"))?;
        let model = match new.model.filter(|m| !m.trim().is_empty()) {
            Some(model) => model,
            None => provider
                .models
                .first()
                .cloned()
                .ok_or_else(|| DeckError::validation("model is required"))?,
        };
        let now = now_millis();
        let chatbot = ChatbotRecord {
            id: new_id(),
            owner_id: owner_id.to_string(),
            name: new.name.trim().to_string(),
            description: new.description,
            provider_id: provider.id,
            provider: provider.name,
            model,
            system_prompt: new.system_prompt,
            temperature: new.temperature.unwrap_or(0.7),
            max_tokens: new.max_tokens.unwrap_or(1000),
            welcome_message: new
                .welcome_message
                .filter(|w| !w.is_empty())
                .unwrap_or_else(|| DEFAULT_WELCOME.to_string()),
            appearance: new.appearance.unwrap_or_default(),
            knowledge_base: new.knowledge_base,
            tools: new.tools,
            status: AgentStatus::Active,
            created_at: now,
            updated_at: now,
        };
        self.insert_chatbot(&chatbot).await?;
        Ok(chatbot)
    }

    pub(crate) async fn insert_chatbot(&self, chatbot: &ChatbotRecord) -> Result<()> {
        let appearance = serde_json::to_string(&chatbot.appearance)?;
        let knowledge_base = list_to_json(&chatbot.knowledge_base)?;
        let tools = list_to_json(&chatbot.tools)?;
        let db = self.db.lock().await;
        db.execute(
            &format!(
                "INSERT INTO chatbots ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
                CHATBOT_COLUMNS
            ),
            params![
                chatbot.id,
                chatbot.owner_id,
                chatbot.name,
                chatbot.description,
                chatbot.provider_id,
                chatbot.provider,
                chatbot.model,
                chatbot.system_prompt,
                chatbot.temperature,
                chatbot.max_tokens,
                chatbot.welcome_message,
                appearance,
                knowledge_base,
                tools,
                chatbot.status,
                chatbot.created_at,
                chatbot.updated_at
            ],
        )?;
        Ok(())
    }

    pub async fn list_chatbots(&self, owner_id: &str) -> Result<Vec<ChatbotRecord>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare(&format!(
            "SELECT {} FROM chatbots WHERE owner_id = ?1 ORDER BY created_at DESC",
            CHATBOT_COLUMNS
        ))?;
        let rows = stmt.query_map(params![owner_id], map_chatbot)?;
        let mut chatbots = Vec::new();
        for row in rows {
            chatbots.push(row?);
        }
        Ok(chatbots)
    }

    pub async fn get_chatbot(&self, owner_id: &str, id: &str) -> Result<Option<ChatbotRecord>> {
        let db = self.db.lock().await;
        let chatbot = db
            .query_row(
                &format!(
                    "SELECT {} FROM chatbots WHERE id = ?1 AND owner_id = ?2",
                    CHATBOT_COLUMNS
                ),
                params![id, owner_id],
                map_chatbot,
            )
            .optional()?;
        Ok(chatbot)
    }

    pub async fn update_chatbot(
        &self,
        owner_id: &str,
        id: &str,
        patch: ChatbotPatch,
    ) -> Result<Option<ChatbotRecord>> {
        let Some(mut bot) = self.get_chatbot(owner_id, id).await? else {
            return Ok(None);
        };
        if let Some(v) = patch.name {
            bot.name = v.trim().to_string();
        }
        if let Some(v) = patch.description {
            bot.description = v;
        }
        if let Some(v) = patch.model {
            bot.model = v;
        }
        if let Some(v) = patch.system_prompt {
            bot.system_prompt = v;
        }
        if let Some(v) = patch.temperature {
            bot.temperature = v;
        }
        if let Some(v) = patch.max_tokens {
            bot.max_tokens = v;
        }
        if let Some(v) = patch.welcome_message {
            bot.welcome_message = v;
        }
        if let Some(v) = patch.appearance {
            bot.appearance = v;
        }
        if let Some(v) = patch.knowledge_base {
            bot.knowledge_base = v;
        }
        if let Some(v) = patch.tools {
            bot.tools = v;
        }
        if let Some(v) = patch.status {
            bot.status = v;
        }
        bot.updated_at = now_millis();

        let appearance = serde_json::to_string(&bot.appearance)?;
        let knowledge_base = list_to_json(&bot.knowledge_base)?;
        let tools = list_to_json(&bot.tools)?;
        let db = self.db.lock().await;
        db.execute(
            "UPDATE chatbots SET name = ?1, description = ?2, model = ?3, system_prompt = ?4,
                temperature = ?5, max_tokens = ?6, welcome_message = ?7, appearance = ?8,
                knowledge_base = ?9, tools = ?10, status = ?11, updated_at = ?12
             WHERE id = ?13 AND owner_id = ?14",
            params![
                bot.name,
                bot.description,
                bot.model,
                bot.system_prompt,
                bot.temperature,
                bot.max_tokens,
                bot.welcome_message,
                appearance,
                knowledge_base,
                tools,
                bot.status,
                bot.updated_at,
                bot.id,
                owner_id
            ],
        )?;
        Ok(Some(bot))
    }

    pub async fn delete_chatbot(&self, owner_id: &str, id: &str) -> Result<bool> {
        let db = self.db.lock().await;
        let rows = db.execute(
            "DELETE FROM chatbots WHERE id = ?1 AND owner_id = ?2",
            params![id, owner_id],
        )?;
        Ok(rows > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::super::providers::sample_provider;
    use super::super::test_store;
    use super::*;

    fn new_bot(provider_id: &str) -> NewChatbot {
        serde_json::from_value(serde_json::json!({
            "name": "Support Bot",
            "providerId": provider_id,
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn defaults_are_filled_from_provider() {
        let store = test_store();
        let provider = store.create_provider("user-1", sample_provider()).await.unwrap();
        let bot = store
            .create_chatbot("user-1", new_bot(&provider.id))
            .await
            .unwrap();
        assert_eq!(bot.provider, "OpenAI GPT-4");
        assert_eq!(bot.model, "gpt-4o");
        assert_eq!(bot.temperature, 0.7);
        assert_eq!(bot.max_tokens, 1000);
        assert_eq!(bot.welcome_message, DEFAULT_WELCOME);
        assert_eq!(bot.appearance, ChatbotAppearance::default());
        assert_eq!(bot.status, AgentStatus::Active);
    }

    #[tokio::test]
    async fn foreign_provider_is_a_validation_error() {
        let store = test_store();
        let provider = store.create_provider("user-1", sample_provider()).await.unwrap();
        let err = store
            .create_chatbot("user-2", new_bot(&provider.id))
            .await
            .unwrap_err();
        assert!(matches!(err, DeckError::Validation(_)));
    }

    #[tokio::test]
    async fn patch_keeps_untouched_fields() {
        let store = test_store();
        let provider = store.create_provider("user-1", sample_provider()).await.unwrap();
        let bot = store
            .create_chatbot("user-1", new_bot(&provider.id))
            .await
            .unwrap();
        let patch = ChatbotPatch {
            status: Some(AgentStatus::Inactive),
            appearance: Some(ChatbotAppearance {
                primary_color: "#10b981".into(),
                show_avatar: false,
            }),
            ..Default::default()
        };
        let updated = store
            .update_chatbot("user-1", &bot.id, patch)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.status, AgentStatus::Inactive);
        assert_eq!(updated.name, "Support Bot");

        let fetched = store.get_chatbot("user-1", &bot.id).await.unwrap().unwrap();
        assert_eq!(fetched.appearance.primary_color, "#10b981");
        assert!(store.delete_chatbot("user-1", &bot.id).await.unwrap());
    }
}
