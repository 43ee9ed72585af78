use anyhow::{Result, bail};
use rusqlite::{OptionalExtension, params};

use super::types::UserRecord;
use super::{Store, new_id, now_millis};

fn map_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserRecord> {
    Ok(UserRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        created_at: row.get(3)?,
    })
}

impl Store {
    pub async fn create_user(&self, name: &str, email: &str) -> Result<UserRecord> {
        self.insert_user(&new_id(), name, email).await
    }

    pub(crate) async fn insert_user(&self, id: &str, name: &str, email: &str) -> Result<UserRecord> {
        let name = name.trim();
        let email = email.trim();
        if name.is_empty() || email.is_empty() {
            bail!("user name and email are required");
        }
        let db = self.db.lock().await;
        let exists: i64 = db.query_row(
            "SELECT COUNT(*) FROM users WHERE email = ?1",
            params![email],
            |row| row.get(0),
        )?;
        if exists > 0 {
            bail!("a user with email '{}' already exists", email);
        }
        let user = UserRecord {
            id: id.to_string(),
            name: name.to_string(),
            email: email.to_string(),
            created_at: now_millis(),
        };
        db.execute(
            "INSERT INTO users (id, name, email, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![user.id, user.name, user.email, user.created_at],
        )?;
        Ok(user)
    }

    pub async fn get_user(&self, id: &str) -> Result<Option<UserRecord>> {
        let db = self.db.lock().await;
        let user = db
            .query_row(
                "SELECT id, name, email, created_at FROM users WHERE id = ?1",
                params![id],
                map_user,
            )
            .optional()?;
        Ok(user)
    }

    /// Accepts either a user id or an email address.
    pub async fn find_user(&self, id_or_email: &str) -> Result<Option<UserRecord>> {
        let db = self.db.lock().await;
        let user = db
            .query_row(
                "SELECT id, name, email, created_at FROM users WHERE id = ?1 OR email = ?1",
                params![id_or_email],
                map_user,
            )
            .optional()?;
        Ok(user)
    }

    pub async fn list_users(&self) -> Result<Vec<UserRecord>> {
        let db = self.db.lock().await;
        let mut stmt =
            db.prepare("SELECT id, name, email, created_at FROM users ORDER BY created_at ASC")?;
        let rows = stmt.query_map([], map_user)?;
        let mut users = Vec::new();
        for row in rows {
            users.push(row?);
        }
        Ok(users)
    }

    pub async fn has_any_users(&self) -> Result<bool> {
        let db = self.db.lock().await;
        let count: i64 = db.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
        Ok(count > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_store;

    #[tokio::test]
    async fn create_and_find_by_email() {
        let store = test_store();
        let user = store.create_user("Demo User", "demo@neural.ai").await.unwrap();
        let found = store.find_user("demo@neural.ai").await.unwrap().unwrap();
        assert_eq!(found.id, user.id);
        let by_id = store.find_user(&user.id).await.unwrap().unwrap();
        assert_eq!(by_id.email, "demo@neural.ai");
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let store = test_store();
        store.create_user("A", "a@example.com").await.unwrap();
        let err = store.create_user("B", "a@example.com").await.unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[tokio::test]
    async fn blank_fields_are_rejected() {
        let store = test_store();
        assert!(store.create_user("  ", "x@example.com").await.is_err());
        assert!(!store.has_any_users().await.unwrap());
    }
}
