//! In-memory conversation store with change notifications.

use std::collections::HashSet;

use tracing::{debug, info};

use crate::conversations::events::{StoreEvent, StoreEventBus, StoreEventReceiver};
use crate::conversations::types::{ConversationListSnapshot, ConversationSession};
use crate::core::config::StoreConfig;
use crate::core::errors::{CouncilError, CouncilResult};
use crate::core::ids::ConversationId;
use crate::council::title::clean_title;

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Authoritative ordered collection of conversation sessions.
///
/// Policies:
/// - `select` and `delete` on an unknown id return `NotFound` and change nothing.
/// - Deleting the current session clears the current id.
///
/// Every successful mutation is published on the event bus after it is applied.
/// Wrap the store in a single lock when it is shared between tasks.
#[derive(Debug)]
pub struct ConversationStore {
    sessions: Vec<ConversationSession>,
    current: Option<ConversationId>,
    events: StoreEventBus,
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new(&StoreConfig::default())
    }
}

impl ConversationStore {
    /// Create an empty store.
    #[must_use]
    pub fn new(config: &StoreConfig) -> Self {
        Self {
            sessions: Vec::new(),
            current: None,
            events: StoreEventBus::new(config.event_capacity),
        }
    }

    /// Rebuild a store from previously persisted sessions, keeping their order.
    ///
    /// Duplicate ids are dropped (first occurrence wins). No session is current.
    #[must_use]
    pub fn from_sessions(config: &StoreConfig, sessions: Vec<ConversationSession>) -> Self {
        let mut seen = HashSet::with_capacity(sessions.len());
        let mut store = Self::new(config);
        for session in sessions {
            if seen.insert(session.id) {
                store.sessions.push(session);
            } else {
                debug!("Dropping duplicate conversation {} while loading", session.id);
            }
        }
        store
    }

    /// Register an observer for change notifications.
    #[must_use]
    pub fn subscribe(&self) -> StoreEventReceiver {
        self.events.subscribe()
    }

    /// Allocate a new session, append it and make it current.
    pub fn create(&mut self) -> ConversationSession {
        let session = self.prepare_create();
        self.insert_prepared(session.clone());
        session
    }

    /// Build the session [`create`](Self::create) would append, without
    /// changing the store. The id is unused by every stored session.
    #[must_use]
    pub fn prepare_create(&self) -> ConversationSession {
        let mut id = ConversationId::new();
        while self.position(id).is_some() {
            id = ConversationId::new();
        }
        ConversationSession::new(id, now_ms())
    }

    /// Append a session built by [`prepare_create`](Self::prepare_create)
    /// and make it current.
    ///
    /// # Errors
    /// Returns `InvalidArgument` if a session with this id is already stored.
    pub fn commit_create(&mut self, session: ConversationSession) -> CouncilResult<()> {
        if self.position(session.id).is_some() {
            return Err(CouncilError::invalid_argument(format!(
                "conversation {} already exists",
                session.id
            )));
        }
        self.insert_prepared(session);
        Ok(())
    }

    fn insert_prepared(&mut self, session: ConversationSession) {
        let id = session.id;
        self.sessions.push(session);
        self.current = Some(id);

        info!("Created new conversation: {id}");
        self.events.emit(StoreEvent::Created { id });
    }

    /// Make `id` the current session.
    ///
    /// # Errors
    /// Returns `NotFound` if no session has this id; the current id is left unchanged.
    pub fn select(&mut self, id: ConversationId) -> CouncilResult<()> {
        if self.position(id).is_none() {
            return Err(CouncilError::conversation_not_found(id));
        }

        self.current = Some(id);
        debug!("Switched to conversation: {id}");
        self.events.emit(StoreEvent::Selected { id });
        Ok(())
    }

    /// Remove the session `id`. Clears the current id if it pointed at it.
    ///
    /// # Errors
    /// Returns `NotFound` if no session has this id.
    pub fn delete(&mut self, id: ConversationId) -> CouncilResult<ConversationSession> {
        let index = self
            .position(id)
            .ok_or_else(|| CouncilError::conversation_not_found(id))?;

        let removed = self.sessions.remove(index);
        let was_current = self.current == Some(id);
        if was_current {
            self.current = None;
        }

        info!("Deleted conversation: {id}");
        self.events.emit(StoreEvent::Deleted { id, was_current });
        Ok(removed)
    }

    /// Remove every session and clear the current id. Returns how many were removed.
    pub fn delete_all(&mut self) -> usize {
        let removed = self.sessions.len();
        self.sessions.clear();
        self.current = None;

        info!("Deleted all conversations ({removed})");
        self.events.emit(StoreEvent::Cleared { removed });
        removed
    }

    /// Sessions in insertion order.
    #[must_use]
    pub fn list(&self) -> Vec<ConversationSession> {
        self.sessions.clone()
    }

    /// Sessions plus the current id, as one consistent view.
    #[must_use]
    pub fn snapshot(&self) -> ConversationListSnapshot {
        ConversationListSnapshot {
            conversations: self.list(),
            current_conversation_id: self.current,
        }
    }

    /// Look up a session.
    #[must_use]
    pub fn get(&self, id: ConversationId) -> Option<&ConversationSession> {
        self.sessions.iter().find(|s| s.id == id)
    }

    /// Current session id.
    #[must_use]
    pub const fn current_id(&self) -> Option<ConversationId> {
        self.current
    }

    /// Current session, if any.
    #[must_use]
    pub fn current(&self) -> Option<&ConversationSession> {
        self.current.and_then(|id| self.get(id))
    }

    /// Number of sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether the store holds no sessions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Position of `id` in insertion order.
    #[must_use]
    pub fn position(&self, id: ConversationId) -> Option<usize> {
        self.sessions.iter().position(|s| s.id == id)
    }

    /// Count one more message on `id` and touch its activity timestamp.
    ///
    /// # Errors
    /// Returns `NotFound` if no session has this id.
    pub fn record_message(&mut self, id: ConversationId) -> CouncilResult<&ConversationSession> {
        let updated = self.prepare_message(id)?;
        self.commit_update(updated)
    }

    /// Copy of `id` as [`record_message`](Self::record_message) would leave it.
    ///
    /// # Errors
    /// Returns `NotFound` if no session has this id.
    pub fn prepare_message(&self, id: ConversationId) -> CouncilResult<ConversationSession> {
        let mut session = self
            .get(id)
            .cloned()
            .ok_or_else(|| CouncilError::conversation_not_found(id))?;
        session.message_count = session.message_count.saturating_add(1);
        session.updated_at = now_ms().max(session.updated_at);
        Ok(session)
    }

    /// Set the title of `id`. The raw title is cleaned before being stored.
    ///
    /// # Errors
    /// Returns `NotFound` if no session has this id.
    pub fn rename(&mut self, id: ConversationId, raw_title: &str) -> CouncilResult<&ConversationSession> {
        let updated = self.prepare_rename(id, raw_title)?;
        self.commit_update(updated)
    }

    /// Copy of `id` as [`rename`](Self::rename) would leave it.
    ///
    /// # Errors
    /// Returns `NotFound` if no session has this id.
    pub fn prepare_rename(
        &self,
        id: ConversationId,
        raw_title: &str,
    ) -> CouncilResult<ConversationSession> {
        let mut session = self
            .get(id)
            .cloned()
            .ok_or_else(|| CouncilError::conversation_not_found(id))?;
        session.title = clean_title(raw_title);
        Ok(session)
    }

    /// Replace a stored session with an updated copy, keeping its position.
    ///
    /// Emits `Renamed` and/or `MessageRecorded` for the fields that changed.
    ///
    /// # Errors
    /// Returns `NotFound` if no session has this id.
    pub fn commit_update(&mut self, updated: ConversationSession) -> CouncilResult<&ConversationSession> {
        let id = updated.id;
        let index = self
            .position(id)
            .ok_or_else(|| CouncilError::conversation_not_found(id))?;

        let previous = std::mem::replace(&mut self.sessions[index], updated);
        let session = &self.sessions[index];

        if session.title != previous.title {
            debug!("Renamed conversation {id} to: {}", session.title);
            self.events.emit(StoreEvent::Renamed {
                id,
                title: session.title.clone(),
            });
        }
        if session.message_count != previous.message_count {
            self.events.emit(StoreEvent::MessageRecorded {
                id,
                message_count: session.message_count,
            });
        }
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_unique(store: &ConversationStore) {
        let ids: HashSet<ConversationId> = store.list().iter().map(|s| s.id).collect();
        assert_eq!(ids.len(), store.len());
    }

    #[test]
    fn test_create_appends_and_selects() {
        let mut store = ConversationStore::default();
        let first = store.create();
        let second = store.create();

        assert_eq!(store.len(), 2);
        assert_eq!(store.current_id(), Some(second.id));
        assert_eq!(store.list()[0].id, first.id);
        assert!(second.title.is_empty());
        assert_eq!(second.message_count, 0);
    }

    #[test]
    fn test_ids_stay_unique_across_create_and_delete() {
        let mut store = ConversationStore::default();
        for round in 0..20 {
            let session = store.create();
            assert_unique(&store);
            if round % 3 == 0 {
                assert!(store.delete(session.id).is_ok());
                assert_unique(&store);
            }
        }
    }

    #[test]
    fn test_delete_middle_keeps_relative_order() {
        let mut store = ConversationStore::default();
        let a = store.create();
        let b = store.create();
        let c = store.create();

        assert!(store.delete(b.id).is_ok());

        let ids: Vec<ConversationId> = store.list().iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![a.id, c.id]);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_delete_all_clears_everything() {
        let mut store = ConversationStore::default();
        store.create();
        store.create();

        assert_eq!(store.delete_all(), 2);
        assert!(store.list().is_empty());
        assert_eq!(store.current_id(), None);
    }

    #[test]
    fn test_select_unknown_keeps_current() {
        let mut store = ConversationStore::default();
        let a = store.create();
        store.create();
        assert!(store.select(a.id).is_ok());

        let result = store.select(ConversationId::new());

        assert!(matches!(result, Err(CouncilError::NotFound { .. })));
        assert_eq!(store.current_id(), Some(a.id));
    }

    #[test]
    fn test_delete_current_clears_current() {
        let mut store = ConversationStore::default();
        let a = store.create();
        let b = store.create();

        assert!(store.delete(b.id).is_ok());
        assert_eq!(store.current_id(), None);

        assert!(store.select(a.id).is_ok());
        assert_eq!(store.current().map(|s| s.id), Some(a.id));
    }

    #[test]
    fn test_delete_unknown_is_not_found_and_harmless() {
        let mut store = ConversationStore::default();
        let a = store.create();

        assert!(store.delete(ConversationId::new()).is_err());
        assert_eq!(store.len(), 1);
        assert_eq!(store.current_id(), Some(a.id));
    }

    #[test]
    fn test_record_message_and_rename() {
        let mut store = ConversationStore::default();
        let a = store.create();

        assert!(store.record_message(a.id).is_ok());
        let count = store.record_message(a.id).map(|s| s.message_count).unwrap_or(0);
        assert_eq!(count, 2);

        let title = store
            .rename(a.id, "\"Why Trains Are Superior\"")
            .map(|s| s.display_title().to_string())
            .unwrap_or_default();
        assert_eq!(title, "Why Trains Are Superior");

        assert!(store.record_message(ConversationId::new()).is_err());
    }

    #[test]
    fn test_prepare_leaves_store_untouched() {
        let mut store = ConversationStore::default();
        let a = store.create();
        let mut rx = store.subscribe();
        let before = store.snapshot();

        let draft = store.prepare_create();
        let counted = store.prepare_message(a.id).map(|s| s.message_count).ok();
        let titled = store.prepare_rename(a.id, " 'Spot Rules' ").map(|s| s.title).ok();

        assert_eq!(store.snapshot(), before);
        assert!(rx.try_recv().is_err());
        assert_ne!(draft.id, a.id);
        assert_eq!(counted, Some(1));
        assert_eq!(titled.as_deref(), Some("Spot Rules"));
        assert!(store.prepare_message(ConversationId::new()).is_err());

        assert!(store.commit_create(draft.clone()).is_ok());
        assert_eq!(store.current_id(), Some(draft.id));
        assert!(store.commit_create(draft).is_err());
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_commit_update_keeps_position() {
        let mut store = ConversationStore::default();
        let a = store.create();
        let b = store.create();
        let mut rx = store.subscribe();

        let renamed = store.prepare_rename(a.id, "Fun with Flags");
        assert!(renamed.is_ok_and(|s| store.commit_update(s).is_ok()));

        let ids: Vec<ConversationId> = store.list().iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![a.id, b.id]);
        assert_eq!(
            rx.try_recv().ok(),
            Some(StoreEvent::Renamed {
                id: a.id,
                title: "Fun with Flags".to_string()
            })
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_mutations_notify_observers() {
        let mut store = ConversationStore::default();
        let mut rx = store.subscribe();

        let a = store.create();
        assert!(store.select(a.id).is_ok());
        assert!(store.select(ConversationId::new()).is_err());
        assert!(store.delete(a.id).is_ok());
        store.delete_all();

        assert_eq!(rx.try_recv().ok(), Some(StoreEvent::Created { id: a.id }));
        assert_eq!(rx.try_recv().ok(), Some(StoreEvent::Selected { id: a.id }));
        assert_eq!(
            rx.try_recv().ok(),
            Some(StoreEvent::Deleted {
                id: a.id,
                was_current: true
            })
        );
        assert_eq!(rx.try_recv().ok(), Some(StoreEvent::Cleared { removed: 0 }));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_from_sessions_drops_duplicates() {
        let first = ConversationSession::new(ConversationId::new(), 1);
        let mut duplicate = first.clone();
        duplicate.title = "shadow".to_string();
        let second = ConversationSession::new(ConversationId::new(), 2);

        let store = ConversationStore::from_sessions(
            &StoreConfig::default(),
            vec![first.clone(), duplicate, second.clone()],
        );

        assert_eq!(store.list(), vec![first, second]);
        assert_eq!(store.current_id(), None);
    }

    #[test]
    fn test_snapshot_matches_state() {
        let mut store = ConversationStore::default();
        let a = store.create();
        let snapshot = store.snapshot();
        assert_eq!(snapshot.current_conversation_id, Some(a.id));
        assert_eq!(snapshot.conversations.len(), 1);
        assert_eq!(snapshot, store.snapshot());
    }
}
