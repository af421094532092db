//! Emotion subsystem: per-user affective profile and the state machine that
//! maps it to a discrete persona mode.
//!
//! - `mode`: the nine discrete modes
//! - `profile`: continuous variables and summary deltas
//! - `keywords`: configurable keyword sets
//! - `machine`: variable updates and rule-ordered mode selection
//! - `profile_store`: load/save persistence between turns

pub mod keywords;
pub mod machine;
pub mod mode;
pub mod profile;
pub mod profile_store;

pub use keywords::EmotionKeywords;
pub use machine::{
    Clock, EmotionStateMachine, FixedClock, FixedHeat, HeatSource, RandomHeat, SystemClock,
    Transition, is_night,
};
pub use mode::{EmotionMode, EmotionModeParseError};
pub use profile::{EmotionProfile, SummaryDelta, Variable};
pub use profile_store::{InMemoryProfileStore, ProfileStore, SqliteProfileStore};
