use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use rusqlite::{Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::error::{ParritaError, Result};
use crate::model::*;
use crate::rate_limit::RateDecision;

/// SQLite-backed storage for Parrita.
///
/// Uses a single `Connection` behind `Arc<Mutex<>>` so it can be shared
/// across async tasks.  All blocking SQLite calls go through
/// [`with_conn`](Self::with_conn) which runs them on the Tokio blocking
/// thread-pool.
pub struct SqliteStorage {
    conn: Arc<Mutex<Connection>>,
    path: PathBuf,
}

impl SqliteStorage {
    /// Open (or create) a file-backed SQLite database at `path`.
    ///
    /// Sets WAL journal mode and enables foreign keys, then creates all
    /// tables and indexes if they don't already exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open(&path)
            .map_err(|e| ParritaError::Storage(format!("failed to open SQLite database: {e}")))?;

        Self::configure_and_init(conn, path)
    }

    /// Open an in-memory SQLite database (useful for tests).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| {
            ParritaError::Storage(format!("failed to open in-memory SQLite database: {e}"))
        })?;

        Self::configure_and_init(conn, PathBuf::from(":memory:"))
    }

    /// Return the path this database was opened with (`:memory:` for in-memory).
    pub fn path(&self) -> &Path {
        &self.path
    }

    // ── helpers ────────────────────────────────────────────────────────

    /// Shared initialisation: pragmas + table creation.
    fn configure_and_init(conn: Connection, path: PathBuf) -> Result<Self> {
        // WAL mode for better concurrent-read performance.
        conn.execute_batch("PRAGMA journal_mode = WAL;")
            .map_err(|e| ParritaError::Storage(format!("failed to set WAL mode: {e}")))?;

        // Enforce foreign-key constraints.
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(|e| ParritaError::Storage(format!("failed to enable foreign keys: {e}")))?;

        let storage = Self {
            conn: Arc::new(Mutex::new(conn)),
            path,
        };

        storage.create_tables()?;
        Ok(storage)
    }

    /// Create all tables and indexes (idempotent).
    fn create_tables(&self) -> Result<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| ParritaError::Storage(format!("failed to acquire database lock: {e}")))?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS discovery_calls_knowledge (
                id TEXT PRIMARY KEY,
                entreprise TEXT NOT NULL DEFAULT '',
                secteur TEXT NOT NULL DEFAULT '',
                besoin TEXT NOT NULL DEFAULT '',
                contexte TEXT NOT NULL DEFAULT '',
                phase_1_introduction TEXT,
                phase_2_exploration TEXT,
                phase_3_affinage TEXT,
                phase_4_next_steps TEXT,
                raw_data TEXT NOT NULL DEFAULT 'null',
                batch_id TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS lead_conversations (
                id TEXT PRIMARY KEY,
                session_id TEXT NOT NULL,
                is_qualified INTEGER NOT NULL DEFAULT 0,
                qualification_data TEXT,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS chat_messages (
                id TEXT PRIMARY KEY,
                conversation_id TEXT NOT NULL
                    REFERENCES lead_conversations(id) ON DELETE CASCADE,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            -- One row per distinct session; rows are updated in place and
            -- never swept, so this table grows with session count.
            CREATE TABLE IF NOT EXISTS rate_limits (
                session_id TEXT PRIMARY KEY,
                request_count INTEGER NOT NULL,
                window_start TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS n8n_webhooks (
                id TEXT PRIMARY KEY,
                trigger_event TEXT NOT NULL,
                webhook_url TEXT NOT NULL,
                is_active INTEGER NOT NULL DEFAULT 1
            );

            CREATE INDEX IF NOT EXISTS idx_calls_batch_id
                ON discovery_calls_knowledge(batch_id);
            CREATE INDEX IF NOT EXISTS idx_messages_conversation
                ON chat_messages(conversation_id, created_at);
            CREATE INDEX IF NOT EXISTS idx_webhooks_trigger
                ON n8n_webhooks(trigger_event, is_active);
            ",
        )
        .map_err(|e| ParritaError::Storage(format!("failed to create tables: {e}")))?;

        Ok(())
    }

    /// Run a blocking closure against the SQLite connection on the Tokio
    /// blocking thread-pool.  This is the primary way the async methods
    /// interact with the database.
    pub(crate) async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().map_err(|e| {
                ParritaError::Storage(format!("failed to acquire database lock: {e}"))
            })?;
            f(&conn)
        })
        .await
        .map_err(|e| ParritaError::Storage(format!("task join error: {e}")))?
    }

    // ── discovery calls ────────────────────────────────────────────────

    pub async fn save_discovery_call(&self, call: &DiscoveryCall) -> Result<()> {
        let call = call.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO discovery_calls_knowledge
                 (id, entreprise, secteur, besoin, contexte,
                  phase_1_introduction, phase_2_exploration,
                  phase_3_affinage, phase_4_next_steps,
                  raw_data, batch_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                rusqlite::params![
                    call.id.to_string(),
                    call.entreprise,
                    call.secteur,
                    call.besoin,
                    call.contexte,
                    call.phase_1_introduction,
                    call.phase_2_exploration,
                    call.phase_3_affinage,
                    call.phase_4_next_steps,
                    call.raw_data.to_string(),
                    call.batch_id.to_string(),
                    call.created_at.to_rfc3339(),
                ],
            )
            .map_err(|e| ParritaError::Storage(format!("failed to insert discovery call: {e}")))?;
            Ok(())
        })
        .await
    }

    /// Calls usable as cold-start examples: a non-empty first phase.
    pub async fn cold_start_calls(&self, limit: usize) -> Result<Vec<DiscoveryCall>> {
        self.with_conn(move |conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, entreprise, secteur, besoin, contexte,
                            phase_1_introduction, phase_2_exploration,
                            phase_3_affinage, phase_4_next_steps,
                            raw_data, batch_id, created_at
                     FROM discovery_calls_knowledge
                     WHERE phase_1_introduction IS NOT NULL
                       AND phase_1_introduction != ''
                     ORDER BY created_at
                     LIMIT ?1",
                )
                .map_err(storage_err)?;
            let rows = stmt
                .query_map([limit as i64], call_from_row)
                .map_err(storage_err)?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(storage_err)?;
            Ok(rows)
        })
        .await
    }

    /// Calls whose sector matches any detected label (substring,
    /// case-insensitive). With no labels, returns the first `limit` calls.
    pub async fn matching_calls(
        &self,
        secteurs: &[String],
        limit: usize,
    ) -> Result<Vec<DiscoveryCall>> {
        let secteurs: Vec<String> = secteurs
            .iter()
            .map(|s| format!("%{}%", s.to_lowercase()))
            .collect();
        self.with_conn(move |conn| {
            let base = "SELECT id, entreprise, secteur, besoin, contexte,
                               phase_1_introduction, phase_2_exploration,
                               phase_3_affinage, phase_4_next_steps,
                               raw_data, batch_id, created_at
                        FROM discovery_calls_knowledge";
            let (sql, params) = if secteurs.is_empty() {
                (
                    format!("{base} ORDER BY created_at LIMIT ?1"),
                    vec![rusqlite::types::Value::from(limit as i64)],
                )
            } else {
                let conditions = (1..=secteurs.len())
                    .map(|i| format!("lower(secteur) LIKE ?{i}"))
                    .collect::<Vec<_>>()
                    .join(" OR ");
                let mut params: Vec<rusqlite::types::Value> = secteurs
                    .iter()
                    .map(|s| rusqlite::types::Value::from(s.clone()))
                    .collect();
                params.push(rusqlite::types::Value::from(limit as i64));
                (
                    format!(
                        "{base} WHERE {conditions} ORDER BY created_at LIMIT ?{}",
                        secteurs.len() + 1
                    ),
                    params,
                )
            };
            let mut stmt = conn.prepare(&sql).map_err(storage_err)?;
            let rows = stmt
                .query_map(rusqlite::params_from_iter(params), call_from_row)
                .map_err(storage_err)?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(storage_err)?;
            Ok(rows)
        })
        .await
    }

    /// Derived batch summaries: count + earliest timestamp per batch id,
    /// newest batch first.
    pub async fn list_import_batches(&self) -> Result<Vec<ImportBatchSummary>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT batch_id, COUNT(*), MIN(created_at)
                     FROM discovery_calls_knowledge
                     GROUP BY batch_id
                     ORDER BY MIN(created_at) DESC",
                )
                .map_err(storage_err)?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(ImportBatchSummary {
                        batch_id: parse_uuid(row.get(0)?)?,
                        call_count: row.get::<_, i64>(1)? as usize,
                        first_imported_at: parse_dt(row.get(2)?)?,
                    })
                })
                .map_err(storage_err)?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(storage_err)?;
            Ok(rows)
        })
        .await
    }

    /// Drop every call imported under `batch_id`. Returns the deleted count.
    pub async fn delete_import_batch(&self, batch_id: Uuid) -> Result<usize> {
        self.with_conn(move |conn| {
            let deleted = conn
                .execute(
                    "DELETE FROM discovery_calls_knowledge WHERE batch_id = ?1",
                    [batch_id.to_string()],
                )
                .map_err(|e| ParritaError::Storage(format!("failed to delete batch: {e}")))?;
            Ok(deleted)
        })
        .await
    }

    // ── conversations & messages ───────────────────────────────────────

    pub async fn create_conversation(&self, conversation: &Conversation) -> Result<()> {
        let conversation = conversation.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO lead_conversations
                 (id, session_id, is_qualified, qualification_data, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    conversation.id.to_string(),
                    conversation.session_id,
                    conversation.qualified,
                    conversation
                        .qualification_data
                        .as_ref()
                        .map(|v| v.to_string()),
                    conversation.created_at.to_rfc3339(),
                ],
            )
            .map_err(|e| ParritaError::Storage(format!("failed to insert conversation: {e}")))?;
            Ok(())
        })
        .await
    }

    pub async fn get_conversation(&self, id: Uuid) -> Result<Conversation> {
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT id, session_id, is_qualified, qualification_data, created_at
                 FROM lead_conversations WHERE id = ?1",
                [id.to_string()],
                conversation_from_row,
            )
            .optional()
            .map_err(storage_err)?
            .ok_or_else(|| ParritaError::NotFound(format!("conversation {id}")))
        })
        .await
    }

    pub async fn append_message(&self, message: &ChatMessage) -> Result<()> {
        let message = message.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO chat_messages (id, conversation_id, role, content, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    message.id.to_string(),
                    message.conversation_id.to_string(),
                    message.role.as_str(),
                    message.content,
                    message.created_at.to_rfc3339(),
                ],
            )
            .map_err(|e| ParritaError::Storage(format!("failed to insert message: {e}")))?;
            Ok(())
        })
        .await
    }

    /// Full ordered history of one conversation, oldest first.
    pub async fn list_messages(&self, conversation_id: Uuid) -> Result<Vec<ChatMessage>> {
        self.with_conn(move |conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, conversation_id, role, content, created_at
                     FROM chat_messages
                     WHERE conversation_id = ?1
                     ORDER BY created_at, id",
                )
                .map_err(storage_err)?;
            let rows = stmt
                .query_map([conversation_id.to_string()], message_from_row)
                .map_err(storage_err)?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(storage_err)?;
            Ok(rows)
        })
        .await
    }

    pub async fn mark_qualified(
        &self,
        conversation_id: Uuid,
        qualification_data: serde_json::Value,
    ) -> Result<()> {
        self.with_conn(move |conn| {
            conn.execute(
                "UPDATE lead_conversations
                 SET is_qualified = 1, qualification_data = ?2
                 WHERE id = ?1",
                rusqlite::params![conversation_id.to_string(), qualification_data.to_string()],
            )
            .map_err(|e| ParritaError::Storage(format!("failed to mark qualified: {e}")))?;
            Ok(())
        })
        .await
    }

    // ── rate limiting ──────────────────────────────────────────────────

    /// Atomic admit-or-deny for one session. The read and the counter
    /// write run in a single transaction, so two concurrent requests for
    /// the same session serialize instead of both reading the same count.
    pub async fn rate_limit_admit(
        &self,
        session_id: &str,
        now: DateTime<Utc>,
        window_minutes: i64,
        max_requests: u32,
    ) -> Result<RateDecision> {
        let session_id = session_id.to_string();
        self.with_conn(move |conn| {
            let tx = conn.unchecked_transaction().map_err(storage_err)?;

            let existing: Option<RateLimitCounter> = tx
                .query_row(
                    "SELECT session_id, request_count, window_start
                     FROM rate_limits WHERE session_id = ?1",
                    [&session_id],
                    |row| {
                        Ok(RateLimitCounter {
                            session_id: row.get(0)?,
                            request_count: row.get(1)?,
                            window_start: parse_dt(row.get(2)?)?,
                        })
                    },
                )
                .optional()
                .map_err(storage_err)?;

            let retry_after_secs = (window_minutes * 60) as u64;
            let decision = match existing {
                None => {
                    tx.execute(
                        "INSERT INTO rate_limits (session_id, request_count, window_start)
                         VALUES (?1, 1, ?2)",
                        rusqlite::params![session_id, now.to_rfc3339()],
                    )
                    .map_err(storage_err)?;
                    RateDecision::admitted(max_requests.saturating_sub(1))
                }
                Some(counter) => {
                    let lookback = now - Duration::minutes(window_minutes);

                    if counter.window_start > lookback {
                        // Same window.
                        if counter.request_count >= max_requests {
                            RateDecision::denied(retry_after_secs)
                        } else {
                            tx.execute(
                                "UPDATE rate_limits SET request_count = request_count + 1
                                 WHERE session_id = ?1",
                                [&session_id],
                            )
                            .map_err(storage_err)?;
                            RateDecision::admitted(max_requests.saturating_sub(counter.request_count + 1))
                        }
                    } else {
                        // Window aged out: reset.
                        tx.execute(
                            "UPDATE rate_limits
                             SET request_count = 1, window_start = ?2
                             WHERE session_id = ?1",
                            rusqlite::params![session_id, now.to_rfc3339()],
                        )
                        .map_err(storage_err)?;
                        RateDecision::admitted(max_requests.saturating_sub(1))
                    }
                }
            };

            tx.commit().map_err(storage_err)?;
            Ok(decision)
        })
        .await
    }

    // ── webhooks ───────────────────────────────────────────────────────

    pub async fn save_webhook(&self, webhook: &Webhook) -> Result<()> {
        let webhook = webhook.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO n8n_webhooks (id, trigger_event, webhook_url, is_active)
                 VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![
                    webhook.id.to_string(),
                    webhook.trigger_event,
                    webhook.webhook_url,
                    webhook.is_active,
                ],
            )
            .map_err(|e| ParritaError::Storage(format!("failed to insert webhook: {e}")))?;
            Ok(())
        })
        .await
    }

    pub async fn active_webhooks(&self, trigger_event: &str) -> Result<Vec<Webhook>> {
        let trigger_event = trigger_event.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, trigger_event, webhook_url, is_active
                     FROM n8n_webhooks
                     WHERE trigger_event = ?1 AND is_active = 1",
                )
                .map_err(storage_err)?;
            let rows = stmt
                .query_map([trigger_event], |row| {
                    Ok(Webhook {
                        id: parse_uuid(row.get(0)?)?,
                        trigger_event: row.get(1)?,
                        webhook_url: row.get(2)?,
                        is_active: row.get(3)?,
                    })
                })
                .map_err(storage_err)?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(storage_err)?;
            Ok(rows)
        })
        .await
    }
}

// ── row mapping ────────────────────────────────────────────────────────

fn storage_err(e: rusqlite::Error) -> ParritaError {
    ParritaError::Storage(e.to_string())
}

/// Convert a TEXT column into a `Uuid`, surfacing parse failures as
/// conversion errors so they stay inside the rusqlite error channel.
fn parse_uuid(s: String) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(&s).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn parse_dt(s: String) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })
}

fn parse_json(s: String) -> rusqlite::Result<serde_json::Value> {
    serde_json::from_str(&s).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn call_from_row(row: &Row<'_>) -> rusqlite::Result<DiscoveryCall> {
    Ok(DiscoveryCall {
        id: parse_uuid(row.get(0)?)?,
        entreprise: row.get(1)?,
        secteur: row.get(2)?,
        besoin: row.get(3)?,
        contexte: row.get(4)?,
        phase_1_introduction: row.get(5)?,
        phase_2_exploration: row.get(6)?,
        phase_3_affinage: row.get(7)?,
        phase_4_next_steps: row.get(8)?,
        raw_data: parse_json(row.get(9)?)?,
        batch_id: parse_uuid(row.get(10)?)?,
        created_at: parse_dt(row.get(11)?)?,
    })
}

fn conversation_from_row(row: &Row<'_>) -> rusqlite::Result<Conversation> {
    let qualification_data: Option<String> = row.get(3)?;
    Ok(Conversation {
        id: parse_uuid(row.get(0)?)?,
        session_id: row.get(1)?,
        qualified: row.get(2)?,
        qualification_data: qualification_data.map(parse_json).transpose()?,
        created_at: parse_dt(row.get(4)?)?,
    })
}

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<ChatMessage> {
    let role: String = row.get(2)?;
    Ok(ChatMessage {
        id: parse_uuid(row.get(0)?)?,
        conversation_id: parse_uuid(row.get(1)?)?,
        role: role.parse().map_err(|e: ParritaError| {
            rusqlite::Error::FromSqlConversionFailure(
                2,
                rusqlite::types::Type::Text,
                e.to_string().into(),
            )
        })?,
        content: row.get(3)?,
        created_at: parse_dt(row.get(4)?)?,
    })
}
