use anyhow::Result;
use rusqlite::{OptionalExtension, params};
use sha2::{Digest, Sha256};

use super::types::{ApiTokenRecord, UserRecord};
use super::{Store, new_id, now_millis};

fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

fn generate_raw_token() -> String {
    let bytes: [u8; 24] = rand::random();
    format!("adk_{}", hex::encode(bytes))
}

impl Store {
    /// Returns the raw token once; only its hash is stored.
    pub async fn create_api_token(
        &self,
        user_id: &str,
        name: &str,
    ) -> Result<(String, ApiTokenRecord)> {
        let raw_token = generate_raw_token();
        let token_hash = hash_token(&raw_token);
        let record = ApiTokenRecord {
            id: new_id(),
            user_id: user_id.to_string(),
            name: name.to_string(),
            created_at: now_millis(),
        };

        let db = self.db.lock().await;
        db.execute(
            "INSERT INTO api_tokens (id, user_id, name, token_hash, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                record.id,
                record.user_id,
                record.name,
                token_hash,
                record.created_at
            ],
        )?;
        Ok((raw_token, record))
    }

    pub async fn list_api_tokens(&self, user_id: &str) -> Result<Vec<ApiTokenRecord>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare(
            "SELECT id, user_id, name, created_at FROM api_tokens
             WHERE user_id = ?1 ORDER BY created_at DESC",
        )?;
        let rows = stmt.query_map(params![user_id], |row| {
            Ok(ApiTokenRecord {
                id: row.get(0)?,
                user_id: row.get(1)?,
                name: row.get(2)?,
                created_at: row.get(3)?,
            })
        })?;
        let mut tokens = Vec::new();
        for row in rows {
            tokens.push(row?);
        }
        Ok(tokens)
    }

    pub async fn delete_api_token(&self, user_id: &str, id: &str) -> Result<bool> {
        let db = self.db.lock().await;
        let rows = db.execute(
            "DELETE FROM api_tokens WHERE id = ?1 AND user_id = ?2",
            params![id, user_id],
        )?;
        Ok(rows > 0)
    }

    /// Resolve a presented bearer token to its user.
    pub async fn resolve_api_token(&self, raw_token: &str) -> Result<Option<UserRecord>> {
        let token_hash = hash_token(raw_token);
        let db = self.db.lock().await;
        let user = db
            .query_row(
                "SELECT u.id, u.name, u.email, u.created_at
                 FROM api_tokens t JOIN users u ON u.id = t.user_id
                 WHERE t.token_hash = ?1",
                params![token_hash],
                |row| {
                    Ok(UserRecord {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        email: row.get(2)?,
                        created_at: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_store;
    use super::*;

    #[test]
    fn hash_is_stable_hex() {
        let h = hash_token("adk_abc");
        assert_eq!(h.len(), 64);
        assert_eq!(h, hash_token("adk_abc"));
        assert_ne!(h, hash_token("adk_abd"));
    }

    #[tokio::test]
    async fn token_resolves_to_its_user() {
        let store = test_store();
        let user = store.create_user("Demo", "demo@neural.ai").await.unwrap();
        let (raw, record) = store.create_api_token(&user.id, "cli").await.unwrap();
        assert!(raw.starts_with("adk_"));
        assert_eq!(record.user_id, user.id);

        let resolved = store.resolve_api_token(&raw).await.unwrap().unwrap();
        assert_eq!(resolved.id, user.id);
        assert!(store.resolve_api_token("adk_bogus").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn tokens_are_scoped_to_their_user() {
        let store = test_store();
        let alice = store.create_user("Alice", "alice@example.com").await.unwrap();
        let bob = store.create_user("Bob", "bob@example.com").await.unwrap();
        let (_, token) = store.create_api_token(&alice.id, "laptop").await.unwrap();

        assert!(store.list_api_tokens(&bob.id).await.unwrap().is_empty());
        assert!(!store.delete_api_token(&bob.id, &token.id).await.unwrap());
        assert!(store.delete_api_token(&alice.id, &token.id).await.unwrap());
        assert!(store.list_api_tokens(&alice.id).await.unwrap().is_empty());
    }
}
