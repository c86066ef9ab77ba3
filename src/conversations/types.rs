//! Types for conversation management.

use serde::{Deserialize, Serialize};

use crate::core::ids::ConversationId;

/// Title shown for a conversation that has not been named yet.
pub const DEFAULT_TITLE: &str = "New Conversation";

/// One conversation thread as displayed in the sidebar.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationSession {
    /// Stable identifier assigned at creation.
    pub id: ConversationId,
    /// Title; empty until the conversation is named.
    pub title: String,
    /// Number of messages exchanged so far.
    pub message_count: u32,
    /// Creation timestamp in milliseconds since Unix epoch.
    pub created_at: i64,
    /// Last activity timestamp in milliseconds since Unix epoch.
    pub updated_at: i64,
}

impl ConversationSession {
    /// Create an untitled session with no messages.
    #[must_use]
    pub const fn new(id: ConversationId, now_ms: i64) -> Self {
        Self {
            id,
            title: String::new(),
            message_count: 0,
            created_at: now_ms,
            updated_at: now_ms,
        }
    }

    /// Title to render, falling back to [`DEFAULT_TITLE`] when the title is empty.
    ///
    /// Whitespace-only titles are rendered as-is; [`clean_title`] never
    /// stores one.
    ///
    /// [`clean_title`]: crate::council::title::clean_title
    #[must_use]
    pub fn display_title(&self) -> &str {
        if self.title.is_empty() {
            DEFAULT_TITLE
        } else {
            &self.title
        }
    }
}

/// Read-only view of the whole collection handed to render consumers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationListSnapshot {
    /// Sessions in insertion order.
    pub conversations: Vec<ConversationSession>,
    /// Active session, if any. Always refers to an entry of `conversations`.
    pub current_conversation_id: Option<ConversationId>,
}
