//! Multi-agent stage progress.

pub mod stages;
pub mod tracker;

pub use stages::CouncilStage;
pub use tracker::{ProgressPhase, ProgressSnapshot, ProgressState, ProgressTracker, percentage};
