//! Conversation session lifecycle.
//!
//! This module owns the sidebar state:
//! - `types`: session metadata and the render snapshot
//! - `store`: the ordered in-memory collection and the current selection
//! - `events`: change notifications for observers
//! - `repository`: optional `SQLite` persistence

pub mod events;
pub mod repository;
pub mod store;
pub mod types;

pub use events::{StoreEvent, StoreEventBus, StoreEventReceiver};
pub use repository::{ConversationRepository, SqliteConversationRepository, StoreFuture};
pub use store::ConversationStore;
pub use types::{ConversationListSnapshot, ConversationSession, DEFAULT_TITLE};
