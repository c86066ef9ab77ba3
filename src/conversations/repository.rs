//! SQLite-backed persistence for conversation sessions.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio_rusqlite::Connection;
use tracing::debug;

use crate::conversations::types::ConversationSession;
use crate::core::errors::CouncilResult;
use crate::core::ids::ConversationId;

/// Boxed future type for repository operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Durable storage for conversation sessions.
pub trait ConversationRepository: Send + Sync {
    /// Load every session in insertion order.
    fn load_all(&self) -> StoreFuture<'_, CouncilResult<Vec<ConversationSession>>>;

    /// Append a new session after every stored one, or update an existing
    /// session in place. Updates never move a session.
    fn upsert(&self, session: ConversationSession) -> StoreFuture<'_, CouncilResult<()>>;

    /// Remove a session. Removing a missing row is not an error.
    fn delete(&self, id: ConversationId) -> StoreFuture<'_, CouncilResult<()>>;

    /// Remove every session.
    fn delete_all(&self) -> StoreFuture<'_, CouncilResult<()>>;
}

/// `SQLite` implementation of [`ConversationRepository`].
pub struct SqliteConversationRepository {
    conn: Arc<Connection>,
    table: String,
}

impl SqliteConversationRepository {
    /// Default table name.
    pub const DEFAULT_TABLE: &'static str = "conversations";

    /// Open the repository on `conn`, creating `table` if needed.
    ///
    /// `table` must be a plain identifier; `CouncilConfig::validate` enforces it.
    ///
    /// # Errors
    /// Returns an error if database operations fail.
    pub async fn new(conn: Arc<Connection>, table: impl Into<String>) -> CouncilResult<Self> {
        let table = table.into();
        let table_name = table.clone();

        conn.call(move |conn| {
            conn.execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS {table_name} (
                    id TEXT PRIMARY KEY,
                    title TEXT NOT NULL DEFAULT '',
                    created_at INTEGER NOT NULL,
                    updated_at INTEGER NOT NULL,
                    message_count INTEGER NOT NULL DEFAULT 0,
                    position INTEGER NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_{table_name}_position
                    ON {table_name} (position ASC);"
            ))?;
            Ok(())
        })
        .await?;

        Ok(Self { conn, table })
    }

    /// Open an in-memory repository (tests, ephemeral servers).
    ///
    /// # Errors
    /// Returns an error if the connection cannot be opened.
    pub async fn in_memory() -> CouncilResult<Self> {
        let conn = Connection::open_in_memory().await?;
        Self::new(Arc::new(conn), Self::DEFAULT_TABLE).await
    }
}

impl ConversationRepository for SqliteConversationRepository {
    fn load_all(&self) -> StoreFuture<'_, CouncilResult<Vec<ConversationSession>>> {
        Box::pin(async move {
            let table = self.table.clone();
            let rows = self
                .conn
                .call(move |conn| {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT id, title, created_at, updated_at, message_count
                         FROM {table}
                         ORDER BY position ASC, created_at ASC"
                    ))?;
                    let rows = stmt
                        .query_map([], |row| {
                            Ok(ConversationSession {
                                id: row.get(0)?,
                                title: row.get(1)?,
                                created_at: row.get(2)?,
                                updated_at: row.get(3)?,
                                message_count: row.get(4)?,
                            })
                        })?
                        .collect::<Result<Vec<_>, _>>()?;
                    Ok(rows)
                })
                .await?;
            debug!("Loaded {} conversations", rows.len());
            Ok(rows)
        })
    }

    fn upsert(&self, session: ConversationSession) -> StoreFuture<'_, CouncilResult<()>> {
        Box::pin(async move {
            let table = self.table.clone();
            self.conn
                .call(move |conn| {
                    conn.execute(
                        &format!(
                            "INSERT INTO {table} (id, title, created_at, updated_at, message_count, position)
                             VALUES (?1, ?2, ?3, ?4, ?5,
                                (SELECT COALESCE(MAX(position), -1) + 1 FROM {table}))
                             ON CONFLICT(id) DO UPDATE SET
                                title = excluded.title,
                                updated_at = excluded.updated_at,
                                message_count = excluded.message_count"
                        ),
                        rusqlite::params![
                            session.id,
                            session.title,
                            session.created_at,
                            session.updated_at,
                            session.message_count
                        ],
                    )?;
                    Ok(())
                })
                .await?;
            Ok(())
        })
    }

    fn delete(&self, id: ConversationId) -> StoreFuture<'_, CouncilResult<()>> {
        Box::pin(async move {
            let table = self.table.clone();
            self.conn
                .call(move |conn| {
                    conn.execute(
                        &format!("DELETE FROM {table} WHERE id = ?1"),
                        rusqlite::params![id],
                    )?;
                    Ok(())
                })
                .await?;
            Ok(())
        })
    }

    fn delete_all(&self) -> StoreFuture<'_, CouncilResult<()>> {
        Box::pin(async move {
            let table = self.table.clone();
            self.conn
                .call(move |conn| {
                    conn.execute(&format!("DELETE FROM {table}"), [])?;
                    Ok(())
                })
                .await?;
            Ok(())
        })
    }
}
