//! The sqlite-backed state store: agent-to-room mappings, the inbound-event
//! dedupe table, and the singleton space configuration (§3, §3a, §4.1).
//!
//! The store is the sole writer of all three tables; every other component
//! reads through its API rather than touching sqlite directly. A single
//! `rusqlite::Connection`, opened once with `PRAGMA journal_mode=WAL`, is
//! wrapped in a [`deadpool_sync::SyncWrapper`] so every query dispatches onto
//! a dedicated blocking thread instead of stalling a tokio worker — the
//! embedded-single-writer posture `matrix-sdk-sqlite` uses for its own store.

use std::collections::HashMap;
use std::path::Path;

use deadpool_sync::SyncWrapper;
use rusqlite::{params, OptionalExtension};

use crate::error::{BridgeError, BridgeResult};
use crate::types::LettaId;

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);

CREATE TABLE IF NOT EXISTS agent_mappings (
    agent_id          TEXT PRIMARY KEY,
    agent_name        TEXT NOT NULL,
    matrix_user_id    TEXT NOT NULL UNIQUE,
    matrix_password   TEXT NOT NULL,
    room_id           TEXT,
    created           INTEGER NOT NULL DEFAULT 0,
    room_created      INTEGER NOT NULL DEFAULT 0,
    space_bound       INTEGER NOT NULL DEFAULT 0,
    invitation_status TEXT NOT NULL DEFAULT '{}'
);

CREATE TABLE IF NOT EXISTS processed_events (
    event_id     TEXT PRIMARY KEY,
    processed_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS space_config (
    id         INTEGER PRIMARY KEY CHECK (id = 0),
    space_id   TEXT NOT NULL,
    created_at INTEGER NOT NULL
);
";

/// A persisted Letta-agent-to-Matrix-identity mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentMapping {
    pub agent_id: String,
    pub agent_name: String,
    pub matrix_user_id: String,
    pub matrix_password: String,
    pub room_id: Option<String>,
    pub created: bool,
    pub room_created: bool,
    /// Whether the room has already been bound into the Letta Agents space
    /// via `m.space.child`/`m.space.parent` — set once, never re-bound.
    pub space_bound: bool,
    /// Matrix user ID -> invitation status (e.g. `"invited"`, `"joined"`).
    pub invitation_status: HashMap<String, String>,
}

/// The singleton "Letta Agents" space configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpaceConfig {
    pub space_id: String,
    pub created_at: i64,
}

fn row_to_mapping(row: &rusqlite::Row) -> rusqlite::Result<AgentMapping> {
    let invitation_status_json: String = row.get("invitation_status")?;
    let invitation_status = serde_json::from_str(&invitation_status_json).unwrap_or_default();
    Ok(AgentMapping {
        agent_id: row.get("agent_id")?,
        agent_name: row.get("agent_name")?,
        matrix_user_id: row.get("matrix_user_id")?,
        matrix_password: row.get("matrix_password")?,
        room_id: row.get("room_id")?,
        created: row.get::<_, i64>("created")? != 0,
        room_created: row.get::<_, i64>("room_created")? != 0,
        space_bound: row.get::<_, i64>("space_bound")? != 0,
        invitation_status,
    })
}

/// The bridge's sqlite-backed persistence layer.
pub struct StateStore {
    conn: SyncWrapper<rusqlite::Connection>,
}

impl StateStore {
    /// Open (creating if absent) the state store database at `path`,
    /// applying the embedded schema. Idempotent — safe to call on every
    /// process start.
    pub async fn open(path: &Path) -> BridgeResult<Self> {
        let owned_path = path.to_owned();
        let connection = tokio::task::spawn_blocking(
            move || -> Result<rusqlite::Connection, rusqlite::Error> {
                let conn = rusqlite::Connection::open(&owned_path)?;
                conn.execute_batch("PRAGMA journal_mode=WAL;")?;
                conn.execute_batch(SCHEMA_SQL)?;
                Ok(conn)
            },
        )
        .await
        .map_err(|e| BridgeError::Pool(e.to_string()))??;

        let conn = SyncWrapper::new(move || connection).await;
        Ok(Self { conn })
    }

    async fn interact<F, R>(&self, f: F) -> BridgeResult<R>
    where
        F: FnOnce(&mut rusqlite::Connection) -> rusqlite::Result<R> + Send + 'static,
        R: Send + 'static,
    {
        self.conn
            .interact(f)
            .await
            .map_err(|e| BridgeError::Pool(e.to_string()))?
            .map_err(BridgeError::from)
    }

    /// Look up a mapping by Letta agent ID.
    pub async fn get_mapping(&self, agent_id: &LettaId) -> BridgeResult<Option<AgentMapping>> {
        let agent_id = agent_id.to_string();
        self.interact(move |conn| {
            conn.query_row(
                "SELECT * FROM agent_mappings WHERE agent_id = ?1",
                params![agent_id],
                row_to_mapping,
            )
            .optional()
        })
        .await
    }

    /// Look up a mapping by its Matrix room ID.
    pub async fn get_mapping_by_room(&self, room_id: &str) -> BridgeResult<Option<AgentMapping>> {
        let room_id = room_id.to_string();
        self.interact(move |conn| {
            conn.query_row(
                "SELECT * FROM agent_mappings WHERE room_id = ?1",
                params![room_id],
                row_to_mapping,
            )
            .optional()
        })
        .await
    }

    /// Insert or atomically replace a mapping.
    pub async fn upsert_mapping(&self, mapping: AgentMapping) -> BridgeResult<()> {
        self.interact(move |conn| {
            let invitation_status_json =
                serde_json::to_string(&mapping.invitation_status).unwrap_or_else(|_| "{}".to_string());
            conn.execute(
                "INSERT INTO agent_mappings
                    (agent_id, agent_name, matrix_user_id, matrix_password, room_id, created, room_created, space_bound, invitation_status)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                 ON CONFLICT(agent_id) DO UPDATE SET
                    agent_name = excluded.agent_name,
                    matrix_user_id = excluded.matrix_user_id,
                    matrix_password = excluded.matrix_password,
                    room_id = excluded.room_id,
                    created = excluded.created,
                    room_created = excluded.room_created,
                    space_bound = excluded.space_bound,
                    invitation_status = excluded.invitation_status",
                params![
                    mapping.agent_id,
                    mapping.agent_name,
                    mapping.matrix_user_id,
                    mapping.matrix_password,
                    mapping.room_id,
                    mapping.created as i64,
                    mapping.room_created as i64,
                    mapping.space_bound as i64,
                    invitation_status_json,
                ],
            )?;
            Ok(())
        })
        .await
    }

    /// All persisted mappings, in no particular order.
    pub async fn all_mappings(&self) -> BridgeResult<Vec<AgentMapping>> {
        self.interact(|conn| {
            let mut stmt = conn.prepare("SELECT * FROM agent_mappings")?;
            let rows = stmt.query_map([], row_to_mapping)?;
            rows.collect()
        })
        .await
    }

    /// Persist the (singleton) Letta Agents space ID.
    pub async fn set_space(&self, space_id: String) -> BridgeResult<()> {
        self.interact(move |conn| {
            conn.execute(
                "INSERT INTO space_config (id, space_id, created_at) VALUES (0, ?1, ?2)
                 ON CONFLICT(id) DO UPDATE SET space_id = excluded.space_id",
                params![space_id, chrono::Utc::now().timestamp()],
            )?;
            Ok(())
        })
        .await
    }

    /// Read the persisted space configuration, if one has been created.
    pub async fn get_space(&self) -> BridgeResult<Option<SpaceConfig>> {
        self.interact(|conn| {
            conn.query_row(
                "SELECT space_id, created_at FROM space_config WHERE id = 0",
                [],
                |row| {
                    Ok(SpaceConfig {
                        space_id: row.get(0)?,
                        created_at: row.get(1)?,
                    })
                },
            )
            .optional()
        })
        .await
    }

    /// Atomically record `event_id` as processed. Returns `true` if it had
    /// already been recorded (a duplicate) — the uniqueness constraint on
    /// `event_id` does the atomic work; this never reads before writing.
    pub async fn is_duplicate_event(&self, event_id: &str) -> BridgeResult<bool> {
        let event_id = event_id.to_string();
        self.interact(move |conn| {
            let rows_affected = conn.execute(
                "INSERT OR IGNORE INTO processed_events (event_id, processed_at) VALUES (?1, ?2)",
                params![event_id, chrono::Utc::now().timestamp()],
            )?;
            Ok(rows_affected == 0)
        })
        .await
    }

    /// Delete processed-event rows older than `older_than_seconds`.
    pub async fn vacuum_events(&self, older_than_seconds: i64) -> BridgeResult<usize> {
        self.interact(move |conn| {
            let cutoff = chrono::Utc::now().timestamp() - older_than_seconds;
            conn.execute("DELETE FROM processed_events WHERE processed_at < ?1", params![cutoff])
        })
        .await
    }

    /// Count of rows in `processed_events`, for the `/health` surface.
    pub async fn count_events(&self) -> BridgeResult<usize> {
        self.interact(|conn| {
            conn.query_row("SELECT COUNT(*) FROM processed_events", [], |row| row.get(0))
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn test_store() -> StateStore {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bridge.sqlite3");
        // Leak the tempdir so the file isn't removed before the store closes.
        std::mem::forget(dir);
        StateStore::open(&path).await.unwrap()
    }

    fn sample_mapping(agent_id: &str) -> AgentMapping {
        AgentMapping {
            agent_id: agent_id.to_string(),
            agent_name: "scout".to_string(),
            matrix_user_id: format!("@agent_{agent_id}:example.org"),
            matrix_password: "s3cret".to_string(),
            room_id: None,
            created: true,
            room_created: false,
            space_bound: false,
            invitation_status: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn test_upsert_and_get_mapping_roundtrip() {
        let store = test_store().await;
        store.upsert_mapping(sample_mapping("agent-1")).await.unwrap();

        let all = store.all_mappings().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].agent_name, "scout");
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent_replace() {
        let store = test_store().await;
        store.upsert_mapping(sample_mapping("agent-1")).await.unwrap();
        let mut updated = sample_mapping("agent-1");
        updated.room_id = Some("!room:example.org".to_string());
        updated.room_created = true;
        store.upsert_mapping(updated).await.unwrap();

        let all = store.all_mappings().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].room_id.as_deref(), Some("!room:example.org"));
        assert!(all[0].room_created);
    }

    #[tokio::test]
    async fn test_get_mapping_by_agent_id() {
        let store = test_store().await;
        let agent_id = LettaId::new_prefixed("agent", uuid::Uuid::nil());
        store.upsert_mapping(sample_mapping(&agent_id.to_string())).await.unwrap();

        let found = store.get_mapping(&agent_id).await.unwrap();
        assert!(found.is_some());
        assert_eq!(found.unwrap().agent_name, "scout");
        assert!(store
            .get_mapping(&LettaId::new_prefixed("agent", uuid::Uuid::new_v4()))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_get_mapping_by_room() {
        let store = test_store().await;
        let mut mapping = sample_mapping("agent-1");
        mapping.room_id = Some("!abc:example.org".to_string());
        store.upsert_mapping(mapping).await.unwrap();

        let found = store.get_mapping_by_room("!abc:example.org").await.unwrap();
        assert!(found.is_some());
        assert_eq!(found.unwrap().agent_id, "agent-1");
    }

    #[tokio::test]
    async fn test_space_config_roundtrip() {
        let store = test_store().await;
        assert!(store.get_space().await.unwrap().is_none());
        store.set_space("!space:example.org".to_string()).await.unwrap();
        let space = store.get_space().await.unwrap().unwrap();
        assert_eq!(space.space_id, "!space:example.org");
    }

    #[tokio::test]
    async fn test_is_duplicate_event_atomic_insert_or_ignore() {
        let store = test_store().await;
        assert!(!store.is_duplicate_event("$event1").await.unwrap());
        assert!(store.is_duplicate_event("$event1").await.unwrap());
    }

    #[tokio::test]
    async fn test_vacuum_events_removes_old_rows() {
        let store = test_store().await;
        store.is_duplicate_event("$event1").await.unwrap();
        let removed = store.vacuum_events(-1).await.unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.count_events().await.unwrap(), 0);
    }
}
