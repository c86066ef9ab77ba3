//! Council membership: which models sit on the council and who chairs it.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::core::errors::{CouncilError, CouncilResult};
use crate::core::ids::ModelId;

/// Default council: free models, each speaking as one Sheldon.
const DEFAULT_MEMBERS: [(&str, &str); 5] = [
    ("meta-llama/llama-3.1-8b-instruct", "Science Sheldon"),
    ("mistralai/mistral-7b-instruct", "Texas Sheldon"),
    ("openchat/openchat-3.5-0106", "Fanboy Sheldon"),
    ("google/gemma-2-9b-it", "Germaphobe Sheldon"),
    ("qwen/qwen-2.5-7b-instruct", "Humorous Sheldon"),
];

/// Default chairman, synthesizes the final answer.
const DEFAULT_CHAIRMAN: &str = "meta-llama/llama-3.1-8b-instruct";

/// One seat on the council.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CouncilMember {
    /// Model answering for this seat.
    pub model: ModelId,
    /// Persona name shown to the user.
    pub sheldon_name: String,
}

/// Ordered council seats plus the chairman model.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CouncilRoster {
    /// Seats, in display order.
    pub members: Vec<CouncilMember>,
    /// Chairman model.
    pub chairman: ModelId,
}

impl Default for CouncilRoster {
    fn default() -> Self {
        Self {
            members: DEFAULT_MEMBERS
                .iter()
                .map(|(model, name)| CouncilMember {
                    model: ModelId::from_known(model),
                    sheldon_name: (*name).to_string(),
                })
                .collect(),
            chairman: ModelId::from_known(DEFAULT_CHAIRMAN),
        }
    }
}

impl CouncilRoster {
    /// Number of seats.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the council has no seats.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Persona name of the seat at `index`.
    #[must_use]
    pub fn sheldon_name(&self, index: usize) -> Option<&str> {
        self.members.get(index).map(|m| m.sheldon_name.as_str())
    }

    /// Validate roster invariants.
    ///
    /// # Errors
    /// Returns `InvalidConfig` if there are no members, a persona name is blank,
    /// or two seats share a persona name.
    pub fn validate(&self) -> CouncilResult<()> {
        if self.members.is_empty() {
            return Err(CouncilError::InvalidConfig(
                "roster.members must not be empty".to_string(),
            ));
        }

        if self.members.len() > crate::council::ranking::MAX_LABELS {
            return Err(CouncilError::InvalidConfig(format!(
                "roster.members supports at most {} seats",
                crate::council::ranking::MAX_LABELS
            )));
        }

        let mut names = HashSet::with_capacity(self.members.len());
        for member in &self.members {
            let name = member.sheldon_name.trim();
            if name.is_empty() {
                return Err(CouncilError::InvalidConfig(format!(
                    "roster member {} has no sheldon_name",
                    member.model
                )));
            }
            if !names.insert(name) {
                return Err(CouncilError::InvalidConfig(format!(
                    "duplicate sheldon_name {name:?} in roster"
                )));
            }
        }

        Ok(())
    }
}
