//! Progress counters for the active council stage.

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info};

use crate::core::config::ProgressConfig;
use crate::core::errors::{CouncilError, CouncilResult};
use crate::council::roster::CouncilRoster;
use crate::progress::stages::CouncilStage;

/// Display percentage of `completed` out of `total`, rounded half up.
///
/// Zero when `total` is zero. Exceeds 100 when `completed > total`.
#[must_use]
pub fn percentage(completed: u64, total: u64) -> u64 {
    if total == 0 {
        return 0;
    }
    // round(c / t * 100) == floor((200c + t) / 2t)
    let completed = u128::from(completed);
    let total = u128::from(total);
    let value = (200 * completed + total) / (2 * total);
    u64::try_from(value).unwrap_or(u64::MAX)
}

/// Whether a stage is running.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressPhase {
    /// No stage is running.
    Idle,
    /// A stage is collecting completions.
    InProgress,
}

/// Counters of the running stage.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ProgressState {
    /// Label of the stage.
    pub stage_name: String,
    /// Agents finished so far.
    pub completed: u64,
    /// Agents expected.
    pub total: u64,
}

impl ProgressState {
    /// Derived display percentage.
    #[must_use]
    pub fn percentage(&self) -> u64 {
        percentage(self.completed, self.total)
    }
}

/// Read-only view handed to the progress bar.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    /// Label of the stage (empty when idle).
    pub stage_name: String,
    /// Agents finished so far.
    pub completed: u64,
    /// Agents expected.
    pub total: u64,
    /// Rounded percentage.
    pub percentage: u64,
    /// Idle or in progress.
    pub phase: ProgressPhase,
}

impl ProgressSnapshot {
    /// Snapshot of an idle tracker.
    #[must_use]
    pub const fn idle() -> Self {
        Self {
            stage_name: String::new(),
            completed: 0,
            total: 0,
            percentage: 0,
            phase: ProgressPhase::Idle,
        }
    }
}

/// Tracks one stage at a time: `Idle -> set_stage -> InProgress -> finish -> Idle`.
///
/// Rejected calls leave the counters untouched. Every accepted change
/// replaces the value seen by [`ProgressTracker::subscribe`] receivers.
#[derive(Debug)]
pub struct ProgressTracker {
    config: ProgressConfig,
    state: Option<ProgressState>,
    notifier: watch::Sender<ProgressSnapshot>,
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new(ProgressConfig::default())
    }
}

impl ProgressTracker {
    /// Create an idle tracker.
    #[must_use]
    pub fn new(config: ProgressConfig) -> Self {
        let (notifier, _) = watch::channel(ProgressSnapshot::idle());
        Self {
            config,
            state: None,
            notifier,
        }
    }

    /// Settings in effect.
    #[must_use]
    pub const fn config(&self) -> &ProgressConfig {
        &self.config
    }

    /// Receiver that always holds the latest snapshot.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ProgressSnapshot> {
        self.notifier.subscribe()
    }

    /// Current phase.
    #[must_use]
    pub const fn phase(&self) -> ProgressPhase {
        if self.state.is_some() {
            ProgressPhase::InProgress
        } else {
            ProgressPhase::Idle
        }
    }

    /// Counters of the running stage.
    #[must_use]
    pub const fn state(&self) -> Option<&ProgressState> {
        self.state.as_ref()
    }

    /// Begin a new stage with `completed` reset to zero.
    ///
    /// # Errors
    /// Returns `InvalidArgument` if `total` is negative.
    pub fn set_stage(&mut self, name: impl Into<String>, total: i64) -> CouncilResult<()> {
        let total = u64::try_from(total).map_err(|_| {
            CouncilError::invalid_argument(format!("stage total must be >= 0, got {total}"))
        })?;
        let stage_name = name.into();

        info!("Starting stage {stage_name:?} with {total} agents");
        self.state = Some(ProgressState {
            stage_name,
            completed: 0,
            total,
        });
        self.publish();
        Ok(())
    }

    /// Begin a council stage sized from the roster.
    ///
    /// # Errors
    /// Returns `InvalidArgument` if the roster is too large to count.
    pub fn begin_council_stage(
        &mut self,
        stage: CouncilStage,
        roster: &CouncilRoster,
    ) -> CouncilResult<()> {
        let total = i64::try_from(stage.expected_agents(roster))
            .map_err(|_| CouncilError::invalid_argument("roster too large"))?;
        self.set_stage(stage.label(), total)
    }

    /// Add `n` completions (negative `n` retracts) and return the new count.
    ///
    /// # Errors
    /// Returns `InvalidArgument` if no stage is running, the result would be
    /// negative, or the result would exceed `total` while over-completion is
    /// disallowed.
    pub fn record_completion(&mut self, n: i64) -> CouncilResult<u64> {
        let allow_over = self.config.allow_over_completion;
        let Some(state) = self.state.as_mut() else {
            return Err(CouncilError::invalid_argument(
                "no stage in progress; call set_stage first",
            ));
        };

        let next = i128::from(state.completed) + i128::from(n);
        let next = u64::try_from(next).map_err(|_| {
            CouncilError::invalid_argument(format!(
                "completed would become {next} for stage {:?}",
                state.stage_name
            ))
        })?;

        if !allow_over && next > state.total {
            return Err(CouncilError::invalid_argument(format!(
                "completed {next} would exceed total {} for stage {:?}",
                state.total, state.stage_name
            )));
        }

        state.completed = next;
        debug!(
            "Stage {:?}: {}/{} agents",
            state.stage_name, state.completed, state.total
        );
        self.publish();
        Ok(next)
    }

    /// End the running stage and return to idle.
    pub fn finish(&mut self) {
        if let Some(state) = self.state.take() {
            info!(
                "Finished stage {:?} at {}/{}",
                state.stage_name, state.completed, state.total
            );
        }
        self.publish();
    }

    /// Current counters and derived percentage.
    #[must_use]
    pub fn snapshot(&self) -> ProgressSnapshot {
        self.state
            .as_ref()
            .map_or_else(ProgressSnapshot::idle, |state| ProgressSnapshot {
                stage_name: state.stage_name.clone(),
                completed: state.completed,
                total: state.total,
                percentage: state.percentage(),
                phase: ProgressPhase::InProgress,
            })
    }

    fn publish(&self) {
        let snapshot = self.snapshot();
        self.notifier.send_modify(|current| *current = snapshot);
    }
}
