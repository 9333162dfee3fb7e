use anyhow::Result;
use rusqlite::{Connection, Row, params};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::core::agent::{Agent, ScheduleMode, WritingStyle};

/// Durable, operator-visible list of agents. The single source of
/// truth for every reschedule decision: the scheduler re-reads from
/// here instead of trusting in-memory snapshots.
pub struct AgentStore {
    db: Arc<Mutex<Connection>>,
}

/// Operator-editable fields for patch-by-id. Credential/token fields
/// are deliberately absent: those rotate through `update_tokens` and
/// the authorization callback only.
#[derive(Debug, Default, Deserialize)]
pub struct AgentPatch {
    pub name: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub llm_api_key: Option<String>,
    pub model: Option<String>,
    pub personality: Option<String>,
    pub posting_style: Option<String>,
    pub writing_style: Option<WritingStyle>,
    pub mention_name: Option<bool>,
    pub read_context: Option<bool>,
    pub topic: Option<String>,
    pub schedule_mode: Option<ScheduleMode>,
    pub interval_minutes: Option<i64>,
    pub paused: Option<bool>,
}

fn row_to_agent(row: &Row<'_>) -> rusqlite::Result<Agent> {
    Ok(Agent {
        id: row.get("id")?,
        name: row.get("name")?,
        client_id: row.get("client_id")?,
        client_secret: row.get("client_secret")?,
        access_token: row.get("access_token")?,
        refresh_token: row.get("refresh_token")?,
        account_handle: row.get("account_handle")?,
        account_id: row.get("account_id")?,
        llm_api_key: row.get("llm_api_key")?,
        model: row.get("model")?,
        personality: row.get("personality")?,
        posting_style: row.get("posting_style")?,
        writing_style: WritingStyle::parse(&row.get::<_, String>("writing_style")?),
        mention_name: row.get("mention_name")?,
        read_context: row.get("read_context")?,
        topic: row.get("topic")?,
        schedule_mode: ScheduleMode::parse(&row.get::<_, String>("schedule_mode")?),
        interval_minutes: row.get("interval_minutes")?,
        paused: row.get("paused")?,
    })
}

impl AgentStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = Connection::open(path)?;
        Self::from_connection(db)
    }

    #[allow(dead_code)]
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(db: Connection) -> Result<Self> {
        db.execute(
            "CREATE TABLE IF NOT EXISTS agents (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL DEFAULT '',
                client_id TEXT NOT NULL DEFAULT '',
                client_secret TEXT NOT NULL DEFAULT '',
                access_token TEXT,
                refresh_token TEXT,
                account_handle TEXT,
                account_id TEXT,
                llm_api_key TEXT NOT NULL DEFAULT '',
                model TEXT NOT NULL DEFAULT 'gpt-4o',
                personality TEXT NOT NULL DEFAULT '',
                posting_style TEXT NOT NULL DEFAULT '',
                writing_style TEXT NOT NULL DEFAULT 'normal',
                mention_name INTEGER NOT NULL DEFAULT 0,
                read_context INTEGER NOT NULL DEFAULT 0,
                topic TEXT NOT NULL DEFAULT '',
                schedule_mode TEXT NOT NULL DEFAULT 'fixed',
                interval_minutes INTEGER NOT NULL DEFAULT 0,
                paused INTEGER NOT NULL DEFAULT 1,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )",
            [],
        )?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
        })
    }

    pub async fn list_agents(&self) -> Result<Vec<Agent>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare("SELECT * FROM agents ORDER BY created_at, id")?;
        let rows = stmt.query_map([], row_to_agent)?;

        let mut agents = Vec::new();
        for row in rows {
            agents.push(row?);
        }
        Ok(agents)
    }

    pub async fn get_agent(&self, id: &str) -> Result<Option<Agent>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare("SELECT * FROM agents WHERE id = ?1")?;
        let mut rows = stmt.query_map(params![id], row_to_agent)?;
        match rows.next() {
            Some(agent) => Ok(Some(agent?)),
            None => Ok(None),
        }
    }

    /// Insert a blank agent (paused, no credentials) and return it.
    pub async fn create_agent(&self) -> Result<Agent> {
        let agent = Agent::new(format!("agent_{}", Uuid::new_v4()));
        let db = self.db.lock().await;
        db.execute(
            "INSERT INTO agents (id, model, paused) VALUES (?1, ?2, 1)",
            params![agent.id, agent.model],
        )?;
        Ok(agent)
    }

    /// Read-modify-write of operator fields only. Token columns are
    /// never touched here, so a patch racing a finishing cycle cannot
    /// clobber a credential rotation.
    pub async fn update_config(&self, id: &str, patch: &AgentPatch) -> Result<Option<Agent>> {
        let db = self.db.lock().await;
        let current = {
            let mut stmt = db.prepare("SELECT * FROM agents WHERE id = ?1")?;
            let mut rows = stmt.query_map(params![id], row_to_agent)?;
            match rows.next() {
                Some(agent) => agent?,
                None => return Ok(None),
            }
        };

        let mut agent = current;
        if let Some(v) = &patch.name {
            agent.name = v.clone();
        }
        if let Some(v) = &patch.client_id {
            agent.client_id = v.clone();
        }
        if let Some(v) = &patch.client_secret {
            agent.client_secret = v.clone();
        }
        if let Some(v) = &patch.llm_api_key {
            agent.llm_api_key = v.clone();
        }
        if let Some(v) = &patch.model {
            agent.model = v.clone();
        }
        if let Some(v) = &patch.personality {
            agent.personality = v.clone();
        }
        if let Some(v) = &patch.posting_style {
            agent.posting_style = v.clone();
        }
        if let Some(v) = patch.writing_style {
            agent.writing_style = v;
        }
        if let Some(v) = patch.mention_name {
            agent.mention_name = v;
        }
        if let Some(v) = patch.read_context {
            agent.read_context = v;
        }
        if let Some(v) = &patch.topic {
            agent.topic = v.clone();
        }
        if let Some(v) = patch.schedule_mode {
            agent.schedule_mode = v;
        }
        if let Some(v) = patch.interval_minutes {
            agent.interval_minutes = v;
        }
        if let Some(v) = patch.paused {
            agent.paused = v;
        }

        db.execute(
            "UPDATE agents SET
                name = ?2, client_id = ?3, client_secret = ?4, llm_api_key = ?5,
                model = ?6, personality = ?7, posting_style = ?8, writing_style = ?9,
                mention_name = ?10, read_context = ?11, topic = ?12,
                schedule_mode = ?13, interval_minutes = ?14, paused = ?15
             WHERE id = ?1",
            params![
                id,
                agent.name,
                agent.client_id,
                agent.client_secret,
                agent.llm_api_key,
                agent.model,
                agent.personality,
                agent.posting_style,
                agent.writing_style.as_str(),
                agent.mention_name,
                agent.read_context,
                agent.topic,
                agent.schedule_mode.as_str(),
                agent.interval_minutes,
                agent.paused,
            ],
        )?;
        Ok(Some(agent))
    }

    /// Patch only the rotating token pair. Called after every cycle,
    /// success or failure, so a single-use refresh token is never lost.
    pub async fn update_tokens(&self, id: &str, access: &str, refresh: &str) -> Result<bool> {
        let db = self.db.lock().await;
        let changed = db.execute(
            "UPDATE agents SET access_token = ?2, refresh_token = ?3 WHERE id = ?1",
            params![id, access, refresh],
        )?;
        Ok(changed > 0)
    }

    /// Write the authorization handshake result for an agent.
    pub async fn set_authorized(
        &self,
        id: &str,
        access: &str,
        refresh: &str,
        handle: &str,
        account_id: &str,
    ) -> Result<bool> {
        let db = self.db.lock().await;
        let changed = db.execute(
            "UPDATE agents SET access_token = ?2, refresh_token = ?3,
                account_handle = ?4, account_id = ?5
             WHERE id = ?1",
            params![id, access, refresh, handle, account_id],
        )?;
        Ok(changed > 0)
    }

    pub async fn set_paused(&self, id: &str, paused: bool) -> Result<bool> {
        let db = self.db.lock().await;
        let changed = db.execute(
            "UPDATE agents SET paused = ?2 WHERE id = ?1",
            params![id, paused],
        )?;
        Ok(changed > 0)
    }

    pub async fn delete_agent(&self, id: &str) -> Result<bool> {
        let db = self.db.lock().await;
        let deleted = db.execute("DELETE FROM agents WHERE id = ?1", params![id])?;
        Ok(deleted > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store_with_agent() -> (AgentStore, Agent) {
        let store = AgentStore::open_in_memory().expect("in-memory store");
        let agent = store.create_agent().await.expect("create agent");
        (store, agent)
    }

    #[tokio::test]
    async fn created_agent_is_paused_with_defaults() {
        let (store, agent) = store_with_agent().await;
        let loaded = store.get_agent(&agent.id).await.unwrap().unwrap();
        assert!(loaded.paused);
        assert_eq!(loaded.model, "gpt-4o");
        assert_eq!(loaded.schedule_mode, ScheduleMode::Fixed);
        assert_eq!(loaded.interval_minutes, 0);
        assert!(loaded.access_token.is_none());
        assert!(!loaded.is_eligible());
    }

    #[tokio::test]
    async fn patch_updates_only_named_fields() {
        let (store, agent) = store_with_agent().await;
        store
            .set_authorized(&agent.id, "acc", "ref", "nova", "42")
            .await
            .unwrap();

        let patch = AgentPatch {
            name: Some("Nova".to_string()),
            personality: Some("dry wit".to_string()),
            ..Default::default()
        };
        let updated = store.update_config(&agent.id, &patch).await.unwrap().unwrap();
        assert_eq!(updated.name, "Nova");
        assert_eq!(updated.personality, "dry wit");
        // Tokens and untouched fields survive the patch.
        assert_eq!(updated.access_token.as_deref(), Some("acc"));
        assert_eq!(updated.refresh_token.as_deref(), Some("ref"));
        assert_eq!(updated.model, "gpt-4o");
    }

    #[tokio::test]
    async fn patch_missing_agent_returns_none() {
        let store = AgentStore::open_in_memory().unwrap();
        let res = store
            .update_config("ghost", &AgentPatch::default())
            .await
            .unwrap();
        assert!(res.is_none());
    }

    #[tokio::test]
    async fn update_tokens_touches_only_token_columns() {
        let (store, agent) = store_with_agent().await;
        store
            .update_config(
                &agent.id,
                &AgentPatch {
                    name: Some("Nova".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert!(store.update_tokens(&agent.id, "a2", "r2").await.unwrap());
        let loaded = store.get_agent(&agent.id).await.unwrap().unwrap();
        assert_eq!(loaded.access_token.as_deref(), Some("a2"));
        assert_eq!(loaded.refresh_token.as_deref(), Some("r2"));
        assert_eq!(loaded.name, "Nova");
    }

    #[tokio::test]
    async fn update_tokens_for_deleted_agent_is_noop() {
        let (store, agent) = store_with_agent().await;
        assert!(store.delete_agent(&agent.id).await.unwrap());
        assert!(!store.update_tokens(&agent.id, "a", "r").await.unwrap());
    }

    #[tokio::test]
    async fn toggle_and_delete() {
        let (store, agent) = store_with_agent().await;
        assert!(store.set_paused(&agent.id, false).await.unwrap());
        assert!(!store.get_agent(&agent.id).await.unwrap().unwrap().paused);

        assert!(store.delete_agent(&agent.id).await.unwrap());
        assert!(store.get_agent(&agent.id).await.unwrap().is_none());
        assert!(!store.delete_agent(&agent.id).await.unwrap());
    }

    #[tokio::test]
    async fn list_returns_all_agents() {
        let store = AgentStore::open_in_memory().unwrap();
        let a = store.create_agent().await.unwrap();
        let b = store.create_agent().await.unwrap();
        let ids: Vec<String> = store
            .list_agents()
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.id)
            .collect();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&a.id));
        assert!(ids.contains(&b.id));
    }
}
