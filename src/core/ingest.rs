use anyhow::Result;
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::core::config::{IngestionConfig, IngestionProfile};
use crate::core::error::DeckResult;
use crate::core::lifecycle::LifecycleComponent;
use crate::core::store::types::KnowledgeFileRecord;
use crate::core::store::{NewKnowledgeFile, Store};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestionKind {
    /// Registered through the knowledge API.
    Register,
    /// Sent as a multipart upload.
    Upload,
}

/// Simulated chunking of knowledge sources.
#[derive(Clone)]
pub struct KnowledgeIngestor {
    store: Store,
    config: Arc<IngestionConfig>,
    pending: Arc<Mutex<HashMap<String, CancellationToken>>>,
}

fn draw(profile: &IngestionProfile) -> (Duration, u32) {
    let mut rng = rand::thread_rng();
    let delay = rng.gen_range(profile.min_delay_ms..=profile.max_delay_ms);
    let chunks = rng.gen_range(profile.min_chunks..=profile.max_chunks);
    (Duration::from_millis(delay), chunks)
}

impl KnowledgeIngestor {
    pub fn new(store: Store, config: IngestionConfig) -> Self {
        Self {
            store,
            config: Arc::new(config),
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn profile(&self, kind: IngestionKind) -> &IngestionProfile {
        match kind {
            IngestionKind::Register => &self.config.register,
            IngestionKind::Upload => &self.config.upload,
        }
    }

    /// Persist the file as `processing` and schedule its completion.
    pub async fn ingest(
        &self,
        owner_id: &str,
        new: NewKnowledgeFile,
        kind: IngestionKind,
    ) -> DeckResult<KnowledgeFileRecord> {
        new.validate()?;
        let file = self.store.create_knowledge_file(owner_id, new).await?;
        let (delay, chunks) = draw(self.profile(kind));
        let token = CancellationToken::new();
        self.pending
            .lock()
            .await
            .insert(file.id.clone(), token.clone());

        let ingestor = self.clone();
        let file_id = file.id.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {
                    info!("Ingestion of {} canceled", file_id);
                }
                _ = tokio::time::sleep(delay) => {
                    match ingestor.store.complete_ingestion(&file_id, chunks).await {
                        Ok(true) => info!("Knowledge file {} processed into {} chunks", file_id, chunks),
                        Ok(false) => {}
                        Err(e) => error!("Failed to finish ingestion of {}: {}", file_id, e),
                    }
                }
            }
            ingestor.pending.lock().await.remove(&file_id);
        });
        Ok(file)
    }

    /// Delete the file and stop any pending processing for it.
    pub async fn remove(&self, owner_id: &str, id: &str) -> Result<bool> {
        let deleted = self.store.delete_knowledge_file(owner_id, id).await?;
        if deleted && let Some(token) = self.pending.lock().await.remove(id) {
            token.cancel();
        }
        Ok(deleted)
    }

    #[cfg(test)]
    pub async fn pending_count(&self) -> usize {
        self.pending.lock().await.len()
    }
}

#[async_trait::async_trait]
impl LifecycleComponent for KnowledgeIngestor {
    async fn on_recover(&mut self) -> Result<()> {
        let stale = self.store.fail_stale_ingestions().await?;
        if stale > 0 {
            warn!("Marked {} interrupted ingestion(s) as failed", stale);
        }
        Ok(())
    }

    async fn on_shutdown(&mut self) -> Result<()> {
        for (_, token) in self.pending.lock().await.drain() {
            token.cancel();
        }
        Ok(())
    }
}
