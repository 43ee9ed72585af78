use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use serde::Deserialize;

use super::types::{AgentRecord, AgentStatus};
use super::{Store, list_from_json, list_to_json, new_id, now_millis};
use crate::core::error::{DeckError, DeckResult};
use crate::core::schedule;

const AGENT_COLUMNS: &str = "id, owner_id, name, description, provider, model, system_prompt, \
     schedule, tools, temperature, status, next_run, last_run, created_at, updated_at";

fn default_temperature() -> f64 {
    0.7
}

fn default_status() -> AgentStatus {
    AgentStatus::Draft
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAgent {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub provider: String,
    pub model: String,
    #[serde(default)]
    pub system_prompt: String,
    #[serde(default)]
    pub schedule: String,
    #[serde(default)]
    pub tools: Vec<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_status")]
    pub status: AgentStatus,
}

/// Partial update; absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub system_prompt: Option<String>,
    pub schedule: Option<String>,
    pub tools: Option<Vec<String>>,
    pub temperature: Option<f64>,
    pub status: Option<AgentStatus>,
}

fn check_temperature(temperature: f64) -> DeckResult<()> {
    if !(0.0..=2.0).contains(&temperature) {
        return Err(DeckError::validation("temperature must be between 0 and 2"));
    }
    Ok(())
}

fn check_required(field: &str, value: &str) -> DeckResult<()> {
    if value.trim().is_empty() {
        return Err(DeckError::validation(format!("{} is required", field)));
    }
    Ok(())
}

impl NewAgent {
    pub fn validate(&self) -> DeckResult<()> {
        check_required("name", &self.name)?;
        check_required("provider", &self.provider)?;
        check_required("model", &self.model)?;
        check_temperature(self.temperature)
    }
}

impl AgentPatch {
    pub fn validate(&self) -> DeckResult<()> {
        if let Some(name) = &self.name {
            check_required("name", name)?;
        }
        if let Some(provider) = &self.provider {
            check_required("provider", provider)?;
        }
        if let Some(model) = &self.model {
            check_required("model", model)?;
        }
        if let Some(t) = self.temperature {
            check_temperature(t)?;
        }
        Ok(())
    }

    fn apply(self, agent: &mut AgentRecord) {
        if let Some(v) = self.name {
            agent.name = v;
        }
        if let Some(v) = self.description {
            agent.description = v;
        }
        if let Some(v) = self.provider {
            agent.provider = v;
        }
        if let Some(v) = self.model {
            agent.model = v;
        }
        if let Some(v) = self.system_prompt {
            agent.system_prompt = v;
        }
        if let Some(v) = self.schedule {
            agent.schedule = v;
        }
        if let Some(v) = self.tools {
            agent.tools = v;
        }
        if let Some(v) = self.temperature {
            agent.temperature = v;
        }
        if let Some(v) = self.status {
            agent.status = v;
        }
    }
}

/// Only active agents with a recognized schedule have a next run.
fn select_agent(db: &Connection, owner_id: &str, id: &str) -> rusqlite::Result<Option<AgentRecord>> {
    db.query_row(
        &format!(
            "SELECT {} FROM agents WHERE id = ?1 AND owner_id = ?2 AND archived = 0",
            AGENT_COLUMNS
        ),
        params![id, owner_id],
        map_agent,
    )
    .optional()
}

fn planned_next_run(status: AgentStatus, descriptor: &str) -> Option<DateTime<Utc>> {
    if status == AgentStatus::Active {
        schedule::next_run(descriptor)
    } else {
        None
    }
}

fn map_agent(row: &rusqlite::Row<'_>) -> rusqlite::Result<AgentRecord> {
    let tools: String = row.get(8)?;
    Ok(AgentRecord {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        provider: row.get(4)?,
        model: row.get(5)?,
        system_prompt: row.get(6)?,
        schedule: row.get(7)?,
        tools: list_from_json(&tools)?,
        temperature: row.get(9)?,
        status: row.get(10)?,
        next_run: row.get(11)?,
        last_run: row.get(12)?,
        created_at: row.get(13)?,
        updated_at: row.get(14)?,
    })
}

impl Store {
    pub async fn create_agent(&self, owner_id: &str, new: NewAgent) -> Result<AgentRecord> {
        let now = now_millis();
        let agent = AgentRecord {
            id: new_id(),
            owner_id: owner_id.to_string(),
            next_run: planned_next_run(new.status, &new.schedule),
            name: new.name.trim().to_string(),
            description: new.description,
            provider: new.provider,
            model: new.model,
            system_prompt: new.system_prompt,
            schedule: new.schedule,
            tools: new.tools,
            temperature: new.temperature,
            status: new.status,
            last_run: None,
            created_at: now,
            updated_at: now,
        };
        self.insert_agent(&agent).await?;
        Ok(agent)
    }

    pub(crate) async fn insert_agent(&self, agent: &AgentRecord) -> Result<()> {
        let tools = list_to_json(&agent.tools)?;
        let db = self.db.lock().await;
        db.execute(
            &format!(
                "INSERT INTO agents ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
                AGENT_COLUMNS
            ),
            params![
                agent.id,
                agent.owner_id,
                agent.name,
                agent.description,
                agent.provider,
                agent.model,
                agent.system_prompt,
                agent.schedule,
                tools,
                agent.temperature,
                agent.status,
                agent.next_run,
                agent.last_run,
                agent.created_at,
                agent.updated_at
            ],
        )?;
        Ok(())
    }

    pub async fn list_agents(&self, owner_id: &str) -> Result<Vec<AgentRecord>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare(&format!(
            "SELECT {} FROM agents WHERE owner_id = ?1 AND archived = 0 ORDER BY created_at DESC",
            AGENT_COLUMNS
        ))?;
        let rows = stmt.query_map(params![owner_id], map_agent)?;
        let mut agents = Vec::new();
        for row in rows {
            agents.push(row?);
        }
        Ok(agents)
    }

    /// Every active, unarchived agent across owners; used to restore schedules at boot.
    pub async fn list_active_agents(&self) -> Result<Vec<AgentRecord>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare(&format!(
            "SELECT {} FROM agents WHERE status = 'active' AND archived = 0",
            AGENT_COLUMNS
        ))?;
        let rows = stmt.query_map([], map_agent)?;
        let mut agents = Vec::new();
        for row in rows {
            agents.push(row?);
        }
        Ok(agents)
    }

    pub async fn get_agent(&self, owner_id: &str, id: &str) -> Result<Option<AgentRecord>> {
        let db = self.db.lock().await;
        Ok(select_agent(&db, owner_id, id)?)
    }

    pub async fn update_agent(
        &self,
        owner_id: &str,
        id: &str,
        patch: AgentPatch,
    ) -> Result<Option<AgentRecord>> {
        // One guard for read and write, so concurrent patches cannot drop each other's fields.
        let db = self.db.lock().await;
        let Some(mut agent) = select_agent(&db, owner_id, id)? else {
            return Ok(None);
        };
        patch.apply(&mut agent);
        agent.next_run = planned_next_run(agent.status, &agent.schedule);
        agent.updated_at = now_millis();

        let tools = list_to_json(&agent.tools)?;
        let rows = db.execute(
            "UPDATE agents SET name = ?1, description = ?2, provider = ?3, model = ?4,
                system_prompt = ?5, schedule = ?6, tools = ?7, temperature = ?8, status = ?9,
                next_run = ?10, updated_at = ?11
             WHERE id = ?12 AND owner_id = ?13 AND archived = 0",
            params![
                agent.name,
                agent.description,
                agent.provider,
                agent.model,
                agent.system_prompt,
                agent.schedule,
                tools,
                agent.temperature,
                agent.status,
                agent.next_run,
                agent.updated_at,
                agent.id,
                owner_id
            ],
        )?;
        Ok((rows > 0).then_some(agent))
    }

    /// Soft delete: the row stays for execution history but disappears from queries.
    pub async fn archive_agent(&self, owner_id: &str, id: &str) -> Result<bool> {
        let db = self.db.lock().await;
        let rows = db.execute(
            "UPDATE agents SET archived = 1, next_run = NULL, updated_at = ?1
             WHERE id = ?2 AND owner_id = ?3 AND archived = 0",
            params![now_millis(), id, owner_id],
        )?;
        Ok(rows > 0)
    }

    pub async fn set_agent_next_run(&self, id: &str, next_run: Option<DateTime<Utc>>) -> Result<()> {
        let db = self.db.lock().await;
        db.execute(
            "UPDATE agents SET next_run = ?1 WHERE id = ?2 AND archived = 0",
            params![next_run, id],
        )?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) fn sample_agent(name: &str) -> NewAgent {
    NewAgent {
        name: name.to_string(),
        description: "Generates reports".to_string(),
        provider: "OpenAI".to_string(),
        model: "gpt-4".to_string(),
        system_prompt: String::new(),
        schedule: "0 9 * * *".to_string(),
        tools: vec!["web-search".to_string()],
        temperature: 0.7,
        status: AgentStatus::Active,
    }
}
