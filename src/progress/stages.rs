//! The three council stages and how many agents each one waits for.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::council::roster::CouncilRoster;

/// Processing phase of one council run.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CouncilStage {
    /// Every member answers the question.
    CollectResponses,
    /// Every member ranks the anonymized answers.
    Ranking,
    /// The chairman writes the final answer.
    Synthesis,
}

impl CouncilStage {
    /// Stages in execution order.
    pub const ALL: [Self; 3] = [Self::CollectResponses, Self::Ranking, Self::Synthesis];

    /// Stable string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CollectResponses => "collect_responses",
            Self::Ranking => "ranking",
            Self::Synthesis => "synthesis",
        }
    }

    /// Label shown above the progress bar.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::CollectResponses => "Stage 1: Collecting responses",
            Self::Ranking => "Stage 2: Peer rankings",
            Self::Synthesis => "Stage 3: Final synthesis",
        }
    }

    /// Agents expected to report in this stage.
    #[must_use]
    pub fn expected_agents(self, roster: &CouncilRoster) -> usize {
        match self {
            Self::CollectResponses | Self::Ranking => roster.len(),
            Self::Synthesis => 1,
        }
    }

    /// Stage that follows this one, if any.
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::CollectResponses => Some(Self::Ranking),
            Self::Ranking => Some(Self::Synthesis),
            Self::Synthesis => None,
        }
    }
}

impl fmt::Display for CouncilStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expected_agents() {
        let roster = CouncilRoster::default();
        assert_eq!(CouncilStage::CollectResponses.expected_agents(&roster), 5);
        assert_eq!(CouncilStage::Ranking.expected_agents(&roster), 5);
        assert_eq!(CouncilStage::Synthesis.expected_agents(&roster), 1);
    }

    #[test]
    fn test_stage_order() {
        let mut walked = vec![CouncilStage::CollectResponses];
        while let Some(next) = walked.last().and_then(|s| s.next()) {
            walked.push(next);
        }
        assert_eq!(walked, CouncilStage::ALL.to_vec());
    }
}
