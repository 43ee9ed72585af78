use anyhow::Result;
use rusqlite::{OptionalExtension, params};
use serde::Deserialize;

use super::types::{IngestionStatus, KnowledgeFileRecord, KnowledgeSource};
use super::{Store, new_id, now_millis};
use crate::core::error::{DeckError, DeckResult};

const KNOWLEDGE_COLUMNS: &str =
    "id, owner_id, name, source, status, chunks, size, url, created_at, updated_at";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewKnowledgeFile {
    pub name: String,
    #[serde(rename = "type")]
    pub source: KnowledgeSource,
    #[serde(default)]
    pub size: Option<i64>,
    #[serde(default)]
    pub url: Option<String>,
}

impl NewKnowledgeFile {
    pub fn validate(&self) -> DeckResult<()> {
        if self.name.trim().is_empty() {
            return Err(DeckError::validation("name is required"));
        }
        if self.source == KnowledgeSource::Url && self.url.as_deref().is_none_or(str::is_empty) {
            return Err(DeckError::validation("url sources need a url"));
        }
        if self.size.is_some_and(|s| s < 0) {
            return Err(DeckError::validation("size must not be negative"));
        }
        Ok(())
    }
}

fn map_knowledge(row: &rusqlite::Row<'_>) -> rusqlite::Result<KnowledgeFileRecord> {
    Ok(KnowledgeFileRecord {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        name: row.get(2)?,
        source: row.get(3)?,
        status: row.get(4)?,
        chunks: row.get(5)?,
        size: row.get(6)?,
        url: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

impl Store {
    /// New files always start `processing` with zero chunks.
    pub async fn create_knowledge_file(
        &self,
        owner_id: &str,
        new: NewKnowledgeFile,
    ) -> Result<KnowledgeFileRecord> {
        let now = now_millis();
        let file = KnowledgeFileRecord {
            id: new_id(),
            owner_id: owner_id.to_string(),
            name: new.name.trim().to_string(),
            source: new.source,
            status: IngestionStatus::Processing,
            chunks: 0,
            size: new.size,
            url: new.url,
            created_at: now,
            updated_at: now,
        };
        self.insert_knowledge_file(&file).await?;
        Ok(file)
    }

    pub(crate) async fn insert_knowledge_file(&self, file: &KnowledgeFileRecord) -> Result<()> {
        let db = self.db.lock().await;
        db.execute(
            &format!(
                "INSERT INTO knowledge_files ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                KNOWLEDGE_COLUMNS
            ),
            params![
                file.id,
                file.owner_id,
                file.name,
                file.source,
                file.status,
                file.chunks,
                file.size,
                file.url,
                file.created_at,
                file.updated_at
            ],
        )?;
        Ok(())
    }

    pub async fn list_knowledge_files(&self, owner_id: &str) -> Result<Vec<KnowledgeFileRecord>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare(&format!(
            "SELECT {} FROM knowledge_files WHERE owner_id = ?1 ORDER BY created_at DESC",
            KNOWLEDGE_COLUMNS
        ))?;
        let rows = stmt.query_map(params![owner_id], map_knowledge)?;
        let mut files = Vec::new();
        for row in rows {
            files.push(row?);
        }
        Ok(files)
    }

    pub async fn get_knowledge_file(
        &self,
        owner_id: &str,
        id: &str,
    ) -> Result<Option<KnowledgeFileRecord>> {
        let db = self.db.lock().await;
        let file = db
            .query_row(
                &format!(
                    "SELECT {} FROM knowledge_files WHERE id = ?1 AND owner_id = ?2",
                    KNOWLEDGE_COLUMNS
                ),
                params![id, owner_id],
                map_knowledge,
            )
            .optional()?;
        Ok(file)
    }

    /// Returns false when the file is gone or no longer processing.
    pub async fn complete_ingestion(&self, id: &str, chunks: u32) -> Result<bool> {
        let db = self.db.lock().await;
        let rows = db.execute(
            "UPDATE knowledge_files SET status = 'completed', chunks = ?1, updated_at = ?2
             WHERE id = ?3 AND status = 'processing'",
            params![chunks, now_millis(), id],
        )?;
        Ok(rows > 0)
    }

    /// Marks everything still `processing` as failed. Returns how many rows changed.
    pub async fn fail_stale_ingestions(&self) -> Result<usize> {
        let db = self.db.lock().await;
        let rows = db.execute(
            "UPDATE knowledge_files SET status = 'failed', updated_at = ?1 WHERE status = 'processing'",
            params![now_millis()],
        )?;
        Ok(rows)
    }

    pub async fn delete_knowledge_file(&self, owner_id: &str, id: &str) -> Result<bool> {
        let db = self.db.lock().await;
        let rows = db.execute(
            "DELETE FROM knowledge_files WHERE id = ?1 AND owner_id = ?2",
            params![id, owner_id],
        )?;
        Ok(rows > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_store;
    use super::*;

    fn faq() -> NewKnowledgeFile {
        NewKnowledgeFile {
            name: "Company FAQ.pdf".into(),
            source: KnowledgeSource::File,
            size: Some(2_048_576),
            url: None,
        }
    }

    #[tokio::test]
    async fn ingestion_completes_once() {
        let store = test_store();
        let file = store.create_knowledge_file("user-1", faq()).await.unwrap();
        assert_eq!(file.status, IngestionStatus::Processing);
        assert_eq!(file.chunks, 0);

        assert!(store.complete_ingestion(&file.id, 42).await.unwrap());
        assert!(!store.complete_ingestion(&file.id, 7).await.unwrap());
        let stored = store
            .get_knowledge_file("user-1", &file.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, IngestionStatus::Completed);
        assert_eq!(stored.chunks, 42);
    }

    #[tokio::test]
    async fn stale_processing_rows_fail() {
        let store = test_store();
        let pending = store.create_knowledge_file("user-1", faq()).await.unwrap();
        let done = store.create_knowledge_file("user-1", faq()).await.unwrap();
        store.complete_ingestion(&done.id, 10).await.unwrap();

        assert_eq!(store.fail_stale_ingestions().await.unwrap(), 1);
        let pending = store
            .get_knowledge_file("user-1", &pending.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(pending.status, IngestionStatus::Failed);
    }

    #[tokio::test]
    async fn completing_a_deleted_file_is_a_noop() {
        let store = test_store();
        let file = store.create_knowledge_file("user-1", faq()).await.unwrap();
        assert!(!store.delete_knowledge_file("user-2", &file.id).await.unwrap());
        assert!(store.delete_knowledge_file("user-1", &file.id).await.unwrap());
        assert!(!store.complete_ingestion(&file.id, 5).await.unwrap());
    }

    #[test]
    fn url_sources_need_url() {
        let new = NewKnowledgeFile {
            name: "Playbook".into(),
            source: KnowledgeSource::Url,
            size: None,
            url: None,
        };
        assert!(new.validate().is_err());
    }
}
