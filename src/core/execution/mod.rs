//! Agent execution runner.
//!
//! `start` persists a `running` record and returns at once; a spawned task
//! waits for a worker permit, calls the backend, then applies the single
//! terminal transition. Cancellation and restart recovery go through the same
//! completion path, so every terminal record carries the same three entries.

mod backend;

pub use backend::{ExecutionBackend, SimulatedBackend};

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore, broadcast};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::core::error::{DeckError, DeckResult};
use crate::core::lifecycle::LifecycleComponent;
use crate::core::store::types::{AgentRecord, ExecutionRecord};
use crate::core::store::{Completion, Store, now_millis};

pub const CANCELED_ERROR: &str = "Execution canceled";
pub const INTERRUPTED_ERROR: &str = "Interrupted by server restart";

const EVENT_BUFFER: usize = 256;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExecutionEvent {
    #[serde(rename_all = "camelCase")]
    Started {
        #[serde(skip)]
        owner_id: String,
        agent_id: String,
        execution_id: String,
        start_time: DateTime<Utc>,
    },
    Finished { record: ExecutionRecord },
}

impl ExecutionEvent {
    pub fn owner_id(&self) -> &str {
        match self {
            ExecutionEvent::Started { owner_id, .. } => owner_id,
            ExecutionEvent::Finished { record } => &record.owner_id,
        }
    }
}

type InflightMap = HashMap<String, HashMap<String, CancellationToken>>;

#[derive(Clone)]
pub struct ExecutionRunner {
    store: Store,
    backend: Arc<dyn ExecutionBackend>,
    permits: Arc<Semaphore>,
    inflight: Arc<Mutex<InflightMap>>,
    events: broadcast::Sender<ExecutionEvent>,
}

impl ExecutionRunner {
    pub fn new(store: Store, backend: Arc<dyn ExecutionBackend>, max_concurrent: usize) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            store,
            backend,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
            inflight: Arc::new(Mutex::new(HashMap::new())),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ExecutionEvent> {
        self.events.subscribe()
    }

    /// Start one execution of `agent_id` on behalf of `owner_id`.
    pub async fn start(&self, owner_id: &str, agent_id: &str) -> DeckResult<ExecutionRecord> {
        let agent = self
            .store
            .get_agent(owner_id, agent_id)
            .await?
            .ok_or_else(|| DeckError::not_found("Agent"))?;
        self.start_for(agent)
            .await?
            .ok_or_else(|| DeckError::not_found("Agent"))
    }

    /// Returns `None` when the agent was archived before its record was created.
    pub(crate) async fn start_for(&self, agent: AgentRecord) -> Result<Option<ExecutionRecord>> {
        // Held across insert and registration so `cancel_agent` sees every record
        // created before the archive.
        let mut inflight = self.inflight.lock().await;
        let Some(record) = self.store.create_execution(&agent).await? else {
            return Ok(None);
        };
        let token = CancellationToken::new();
        inflight
            .entry(agent.id.clone())
            .or_default()
            .insert(record.id.clone(), token.clone());
        drop(inflight);

        let _ = self.events.send(ExecutionEvent::Started {
            owner_id: record.owner_id.clone(),
            agent_id: record.agent_id.clone(),
            execution_id: record.execution_id.clone(),
            start_time: record.start_time,
        });
        info!(
            "Execution {} started for agent [{}]",
            record.execution_id, agent.name
        );

        let runner = self.clone();
        let record_id = record.id.clone();
        tokio::spawn(async move {
            runner.drive(agent, record_id, token).await;
        });
        Ok(Some(record))
    }

    async fn drive(self, agent: AgentRecord, record_id: String, token: CancellationToken) {
        let completion = tokio::select! {
            _ = token.cancelled() => Completion::Failed(CANCELED_ERROR.to_string()),
            completion = async {
                let Ok(_permit) = self.permits.acquire().await else {
                    return Completion::Failed(CANCELED_ERROR.to_string());
                };
                self.backend.execute(&agent).await
            } => completion,
        };

        self.finish(&record_id, completion).await;

        let mut inflight = self.inflight.lock().await;
        if let Some(pending) = inflight.get_mut(&agent.id) {
            pending.remove(&record_id);
            if pending.is_empty() {
                inflight.remove(&agent.id);
            }
        }
    }

    async fn finish(&self, record_id: &str, completion: Completion) -> Option<ExecutionRecord> {
        match self
            .store
            .complete_execution(record_id, completion, now_millis())
            .await
        {
            Ok(Some(record)) => {
                info!(
                    "Execution {} finished as {} in {} ms",
                    record.execution_id,
                    record.status.as_str(),
                    record.duration_ms.unwrap_or_default()
                );
                let _ = self.events.send(ExecutionEvent::Finished {
                    record: record.clone(),
                });
                Some(record)
            }
            Ok(None) => {
                debug!("Execution {} was already terminal", record_id);
                None
            }
            Err(e) => {
                error!("Failed to complete execution {}: {}", record_id, e);
                None
            }
        }
    }

    /// Cancel every pending execution of `agent_id`. Returns how many were signalled.
    pub async fn cancel_agent(&self, agent_id: &str) -> usize {
        let pending = self.inflight.lock().await.remove(agent_id);
        let Some(pending) = pending else {
            return 0;
        };
        for token in pending.values() {
            token.cancel();
        }
        info!(
            "Canceled {} pending execution(s) for agent {}",
            pending.len(),
            agent_id
        );
        pending.len()
    }

    pub async fn inflight_count(&self) -> usize {
        self.inflight.lock().await.values().map(HashMap::len).sum()
    }

    /// Terminate records a previous process left `running`.
    pub async fn recover(&self) -> Result<usize> {
        let orphaned = self.store.list_running_execution_ids().await?;
        let mut recovered = 0;
        for record_id in orphaned {
            let completion = Completion::Failed(INTERRUPTED_ERROR.to_string());
            if self.finish(&record_id, completion).await.is_some() {
                recovered += 1;
            }
        }
        if recovered > 0 {
            warn!("Marked {} interrupted execution(s) as failed", recovered);
        }
        Ok(recovered)
    }
}

#[async_trait::async_trait]
impl LifecycleComponent for ExecutionRunner {
    async fn on_recover(&mut self) -> Result<()> {
        self.recover().await?;
        Ok(())
    }

    async fn on_shutdown(&mut self) -> Result<()> {
        let pending = self.inflight_count().await;
        if pending > 0 {
            info!(
                "{} execution(s) still running; they will be failed on next start",
                pending
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests;
