//! Peer ranking: anonymous response labels, ranking extraction and aggregation.
//!
//! During the ranking stage every member sees the other answers as
//! `Response A`, `Response B`, ... and ends its evaluation with a
//! `FINAL RANKING:` section listing labels best to worst. This module turns
//! those free-text evaluations back into an ordered list of models.

use std::collections::{BTreeMap, HashMap};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::core::errors::CouncilResult;
use crate::core::ids::ModelId;
use crate::council::roster::CouncilMember;

/// Marker that opens the ranking section of an evaluation.
pub const FINAL_RANKING_MARKER: &str = "FINAL RANKING:";

/// Labels run from `A` to `Z`.
pub const MAX_LABELS: usize = 26;

/// Anonymous label for the answer at `index` (`0 -> "Response A"`).
#[must_use]
pub fn response_label(index: usize) -> Option<String> {
    let offset = u8::try_from(index).ok().filter(|i| usize::from(*i) < MAX_LABELS)?;
    Some(format!("Response {}", char::from(b'A' + offset)))
}

/// Map each anonymous label to the model that produced the answer.
#[must_use]
pub fn label_to_model(members: &[CouncilMember]) -> BTreeMap<String, ModelId> {
    members
        .iter()
        .enumerate()
        .filter_map(|(index, member)| response_label(index).map(|label| (label, member.model.clone())))
        .collect()
}

/// One member's evaluation of its peers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerRanking {
    /// Evaluating model.
    pub model: ModelId,
    /// Persona of the evaluating model.
    pub sheldon_name: String,
    /// Full evaluation text, including the `FINAL RANKING:` section.
    pub ranking: String,
}

/// Average placement of one model across all peer rankings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AggregateRanking {
    /// Ranked model.
    pub model: ModelId,
    /// Mean 1-based position, rounded to two decimals. Lower is better.
    pub average_rank: f64,
    /// Number of rankings that placed this model.
    pub rankings_count: usize,
}

/// Extracts ordered response labels from evaluation text.
#[derive(Clone, Debug)]
pub struct RankingParser {
    numbered: Regex,
    label: Regex,
}

impl RankingParser {
    /// Compile the label patterns.
    ///
    /// # Errors
    /// Returns `Regex` if a pattern fails to compile.
    pub fn new() -> CouncilResult<Self> {
        Ok(Self {
            numbered: Regex::new(r"\d+\.\s*(Response [A-Z])")?,
            label: Regex::new(r"Response [A-Z]")?,
        })
    }

    /// Labels in ranked order.
    ///
    /// After a `FINAL RANKING:` marker, numbered lines (`1. Response C`) win;
    /// otherwise every label after the marker is taken in order. Without a
    /// marker, every label in the whole text is taken in order.
    #[must_use]
    pub fn parse(&self, text: &str) -> Vec<String> {
        if let Some(section) = text.split(FINAL_RANKING_MARKER).nth(1) {
            let numbered: Vec<String> = self
                .numbered
                .captures_iter(section)
                .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
                .collect();
            if !numbered.is_empty() {
                return numbered;
            }
            return self.labels(section);
        }

        self.labels(text)
    }

    fn labels(&self, text: &str) -> Vec<String> {
        self.label
            .find_iter(text)
            .map(|m| m.as_str().to_string())
            .collect()
    }

    /// Average each model's position across `rankings`, best first.
    ///
    /// Labels missing from `labels` are ignored. Ties keep first-seen order.
    #[must_use]
    pub fn aggregate(
        &self,
        rankings: &[PeerRanking],
        labels: &BTreeMap<String, ModelId>,
    ) -> Vec<AggregateRanking> {
        let mut order: Vec<ModelId> = Vec::new();
        let mut positions: HashMap<ModelId, Vec<u32>> = HashMap::new();

        for ranking in rankings {
            for (position, label) in (1_u32..).zip(self.parse(&ranking.ranking)) {
                let Some(model) = labels.get(&label) else {
                    continue;
                };
                positions
                    .entry(model.clone())
                    .or_insert_with(|| {
                        order.push(model.clone());
                        Vec::new()
                    })
                    .push(position);
            }
        }

        let mut aggregate: Vec<AggregateRanking> = order
            .into_iter()
            .filter_map(|model| {
                let seen = positions.remove(&model)?;
                let count = u32::try_from(seen.len()).ok().filter(|c| *c > 0)?;
                let sum: f64 = seen.iter().map(|p| f64::from(*p)).sum();
                let average = sum / f64::from(count);
                Some(AggregateRanking {
                    model,
                    average_rank: (average * 100.0).round() / 100.0,
                    rankings_count: seen.len(),
                })
            })
            .collect();

        aggregate.sort_by(|a, b| a.average_rank.total_cmp(&b.average_rank));
        aggregate
    }
}
