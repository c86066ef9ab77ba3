//! Core configuration, errors and identifiers.

pub mod config;
pub mod errors;
pub mod ids;

pub use config::{CouncilConfig, ProgressConfig, ServerConfig, StorageConfig, StoreConfig};
pub use errors::{CouncilError, CouncilResult};
pub use ids::{ConversationId, ModelId, ModelIdError};
