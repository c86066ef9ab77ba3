//! Application state shared across all request handlers.

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::conversations::repository::ConversationRepository;
use crate::conversations::store::ConversationStore;
use crate::conversations::types::ConversationSession;
use crate::core::config::CouncilConfig;
use crate::core::errors::CouncilResult;
use crate::core::ids::ConversationId;
use crate::progress::tracker::ProgressTracker;

/// Shared application state.
///
/// The store and the tracker each sit behind one lock. Conversation handlers
/// keep the store's write guard while persisting and only apply the change in
/// memory once the repository accepted it.
pub struct AppState {
    /// Effective configuration.
    pub config: CouncilConfig,
    /// Sidebar state.
    pub conversations: RwLock<ConversationStore>,
    /// Progress bar state.
    pub progress: RwLock<ProgressTracker>,
    repository: Option<Arc<dyn ConversationRepository>>,
}

impl AppState {
    /// Create state that keeps conversations in memory only.
    #[must_use]
    pub fn new(config: CouncilConfig) -> Arc<Self> {
        let conversations = ConversationStore::new(&config.store);
        let progress = ProgressTracker::new(config.progress.clone());
        Arc::new(Self {
            config,
            conversations: RwLock::new(conversations),
            progress: RwLock::new(progress),
            repository: None,
        })
    }

    /// Create state backed by `repository`, loading the persisted conversations.
    ///
    /// # Errors
    /// Returns an error if the repository cannot be read.
    pub async fn with_repository(
        config: CouncilConfig,
        repository: Arc<dyn ConversationRepository>,
    ) -> CouncilResult<Arc<Self>> {
        let sessions = repository.load_all().await?;
        info!("Restored {} conversations", sessions.len());

        let conversations = ConversationStore::from_sessions(&config.store, sessions);
        let progress = ProgressTracker::new(config.progress.clone());
        Ok(Arc::new(Self {
            config,
            conversations: RwLock::new(conversations),
            progress: RwLock::new(progress),
            repository: Some(repository),
        }))
    }

    /// Whether mutations are persisted.
    #[must_use]
    pub fn is_persistent(&self) -> bool {
        self.repository.is_some()
    }

    /// Persist the latest version of a session.
    ///
    /// # Errors
    /// Returns an error if the repository write fails.
    pub async fn persist_session(&self, session: ConversationSession) -> CouncilResult<()> {
        if let Some(repository) = &self.repository {
            if let Err(e) = repository.upsert(session).await {
                warn!("Failed to persist conversation: {e}");
                return Err(e);
            }
        }
        Ok(())
    }

    /// Persist the removal of a session.
    ///
    /// # Errors
    /// Returns an error if the repository write fails.
    pub async fn persist_delete(&self, id: ConversationId) -> CouncilResult<()> {
        if let Some(repository) = &self.repository {
            if let Err(e) = repository.delete(id).await {
                warn!("Failed to delete persisted conversation {id}: {e}");
                return Err(e);
            }
        }
        Ok(())
    }

    /// Persist the removal of every session.
    ///
    /// # Errors
    /// Returns an error if the repository write fails.
    pub async fn persist_delete_all(&self) -> CouncilResult<()> {
        if let Some(repository) = &self.repository {
            if let Err(e) = repository.delete_all().await {
                warn!("Failed to clear persisted conversations: {e}");
                return Err(e);
            }
        }
        Ok(())
    }
}
