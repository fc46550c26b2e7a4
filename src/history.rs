//! Chat history stores.
//!
//! [`SqliteHistoryStore`] persists to the `chat_history` table, whose
//! autoincrement `ordinal` gives messages a total order.
//! [`InMemoryHistoryStore`] keeps the same contract for tests and
//! ephemeral sessions.

use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use crate::models::{ConversationMessage, Role};
use crate::traits::HistoryStore;

pub struct SqliteHistoryStore {
    pool: SqlitePool,
}

impl SqliteHistoryStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl HistoryStore for SqliteHistoryStore {
    async fn append(&self, role: Role, content: &str) -> Result<()> {
        sqlx::query("INSERT INTO chat_history (role, content, created_at) VALUES (?, ?, ?)")
            .bind(role.as_str())
            .bind(content)
            .bind(chrono::Utc::now().timestamp())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<ConversationMessage>> {
        let rows = sqlx::query(
            "SELECT ordinal, role, content FROM chat_history ORDER BY ordinal DESC LIMIT ?",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        let mut messages = Vec::with_capacity(rows.len());
        for row in rows.iter().rev() {
            let role: String = row.get("role");
            let role = Role::parse(&role)
                .ok_or_else(|| anyhow::anyhow!("unknown role in chat_history: '{}'", role))?;
            messages.push(ConversationMessage {
                role,
                content: row.get("content"),
                ordinal: row.get("ordinal"),
            });
        }
        Ok(messages)
    }

    async fn clear(&self) -> Result<()> {
        sqlx::query("DELETE FROM chat_history")
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryHistoryStore {
    inner: Mutex<(i64, Vec<ConversationMessage>)>,
}

impl InMemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistoryStore {
    async fn append(&self, role: Role, content: &str) -> Result<()> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| anyhow::anyhow!("history lock poisoned"))?;
        let (next, messages) = &mut *guard;
        *next += 1;
        messages.push(ConversationMessage {
            role,
            content: content.to_string(),
            ordinal: *next,
        });
        Ok(())
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<ConversationMessage>> {
        let guard = self
            .inner
            .lock()
            .map_err(|_| anyhow::anyhow!("history lock poisoned"))?;
        let messages = &guard.1;
        let start = messages.len().saturating_sub(limit);
        Ok(messages[start..].to_vec())
    }

    async fn clear(&self) -> Result<()> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| anyhow::anyhow!("history lock poisoned"))?;
        guard.1.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn exercise(store: &dyn HistoryStore) {
        assert!(store.list_recent(10).await.unwrap().is_empty());

        store.append(Role::User, "hi").await.unwrap();
        store.append(Role::Agent, "hello").await.unwrap();
        store.append(Role::User, "what is rust?").await.unwrap();

        let all = store.list_recent(10).await.unwrap();
        let contents: Vec<&str> = all.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["hi", "hello", "what is rust?"]);
        assert!(all.windows(2).all(|w| w[0].ordinal < w[1].ordinal));
        assert_eq!(all[1].role, Role::Agent);

        let last_two = store.list_recent(2).await.unwrap();
        assert_eq!(last_two[0].content, "hello");
        assert_eq!(last_two[1].content, "what is rust?");

        store.clear().await.unwrap();
        assert!(store.list_recent(10).await.unwrap().is_empty());

        // Ordinals keep increasing after a clear.
        store.append(Role::User, "again").await.unwrap();
        let after = store.list_recent(10).await.unwrap();
        assert!(after[0].ordinal > all[2].ordinal);
    }

    #[tokio::test]
    async fn test_in_memory_store() {
        exercise(&InMemoryHistoryStore::new()).await;
    }

    #[tokio::test]
    async fn test_sqlite_store() {
        let tmp = tempfile::TempDir::new().unwrap();
        let pool = crate::db::connect_path(&tmp.path().join("h.sqlite"))
            .await
            .unwrap();
        crate::migrate::run_migrations(&pool).await.unwrap();
        exercise(&SqliteHistoryStore::new(pool)).await;
    }
}
