//! Heuristic scoring for memory creation and retention.

pub mod importance;
pub mod lexicon;
pub mod relevance;

pub use importance::{ImportanceBreakdown, ImportanceScorer, emotional_intensity};
pub use lexicon::{ScoringLexicon, jaccard, segment, tokenize};
pub use relevance::RelevanceEvaluator;
