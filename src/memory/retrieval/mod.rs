//! Ranking of retrieved memories.

pub mod ranking;

pub use ranking::{
    CompositeParts, RetrievedMemory, ScoredMemory, composite_parts, composite_score,
    rank_composite, sort_retrieved,
};
