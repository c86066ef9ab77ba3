//! Council domain helpers: roster, peer ranking and title cleanup.

pub mod ranking;
pub mod roster;
pub mod title;

pub use ranking::{
    AggregateRanking, FINAL_RANKING_MARKER, MAX_LABELS, PeerRanking, RankingParser,
    label_to_model, response_label,
};
pub use roster::{CouncilMember, CouncilRoster};
pub use title::{MAX_TITLE_CHARS, clean_title};
