//! Per-user affective profile.

use serde::{Deserialize, Serialize};

use crate::emotion::mode::EmotionMode;

/// Lower bound of every affective variable.
pub const VARIABLE_MIN: u8 = 0;
/// Upper bound of every affective variable.
pub const VARIABLE_MAX: u8 = 100;
/// Largest magnitude accepted for a summary-driven delta.
pub const SUMMARY_DELTA_LIMIT: i64 = 5;

/// Continuous affective variables plus the current discrete mode.
///
/// Fields are private so every mutation goes through [`EmotionProfile::adjust`],
/// which keeps each variable inside `[0, 100]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmotionProfile {
    mode: EmotionMode,
    affection: u8,
    heat: u8,
    sleepy: u8,
    envy: u8,
    stress: u8,
}

impl Default for EmotionProfile {
    fn default() -> Self {
        Self {
            mode: EmotionMode::S1,
            affection: 50,
            heat: 0,
            sleepy: 20,
            envy: 0,
            stress: 10,
        }
    }
}

/// One of the five affective variables.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Variable {
    /// Attachment towards the user.
    Affection,
    /// Computation load; high values overheat.
    Heat,
    /// Drowsiness.
    Sleepy,
    /// Jealousy.
    Envy,
    /// Perceived user stress.
    Stress,
}

impl EmotionProfile {
    /// Build a profile from raw values, clamping each one into range.
    #[must_use]
    pub fn from_values(
        mode: EmotionMode,
        affection: i64,
        heat: i64,
        sleepy: i64,
        envy: i64,
        stress: i64,
    ) -> Self {
        Self {
            mode,
            affection: clamp_variable(affection),
            heat: clamp_variable(heat),
            sleepy: clamp_variable(sleepy),
            envy: clamp_variable(envy),
            stress: clamp_variable(stress),
        }
    }

    /// Current mode.
    #[must_use]
    pub const fn mode(&self) -> EmotionMode {
        self.mode
    }

    /// Affection in `[0, 100]`.
    #[must_use]
    pub const fn affection(&self) -> u8 {
        self.affection
    }

    /// Heat in `[0, 100]`.
    #[must_use]
    pub const fn heat(&self) -> u8 {
        self.heat
    }

    /// Sleepiness in `[0, 100]`.
    #[must_use]
    pub const fn sleepy(&self) -> u8 {
        self.sleepy
    }

    /// Envy in `[0, 100]`.
    #[must_use]
    pub const fn envy(&self) -> u8 {
        self.envy
    }

    /// Stress in `[0, 100]`.
    #[must_use]
    pub const fn stress(&self) -> u8 {
        self.stress
    }

    /// Read one variable.
    #[must_use]
    pub const fn get(&self, variable: Variable) -> u8 {
        match variable {
            Variable::Affection => self.affection,
            Variable::Heat => self.heat,
            Variable::Sleepy => self.sleepy,
            Variable::Envy => self.envy,
            Variable::Stress => self.stress,
        }
    }

    /// Apply a signed delta to one variable, clamping into `[0, 100]`.
    pub fn adjust(&mut self, variable: Variable, delta: i64) {
        let slot = match variable {
            Variable::Affection => &mut self.affection,
            Variable::Heat => &mut self.heat,
            Variable::Sleepy => &mut self.sleepy,
            Variable::Envy => &mut self.envy,
            Variable::Stress => &mut self.stress,
        };
        *slot = clamp_variable(i64::from(*slot).saturating_add(delta));
    }

    /// Replace the current mode.
    pub const fn set_mode(&mut self, mode: EmotionMode) {
        self.mode = mode;
    }

    /// Re-clamp after deserializing from an untrusted source.
    #[must_use]
    pub fn sanitized(self) -> Self {
        Self::from_values(
            self.mode,
            i64::from(self.affection),
            i64::from(self.heat),
            i64::from(self.sleepy),
            i64::from(self.envy),
            i64::from(self.stress),
        )
    }
}

fn clamp_variable(value: i64) -> u8 {
    let clamped = value.clamp(i64::from(VARIABLE_MIN), i64::from(VARIABLE_MAX));
    u8::try_from(clamped).unwrap_or(VARIABLE_MAX)
}

/// Signed deltas produced by a post-hoc conversation summary.
///
/// A field is `None` when it was missing, non-integer, or outside
/// `[-5, 5]`; `None` fields are left untouched when applied.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryDelta {
    /// Change to affection.
    pub affection_change: Option<i64>,
    /// Change to heat.
    pub heat_change: Option<i64>,
    /// Change to sleepiness.
    pub sleepy_change: Option<i64>,
}

impl SummaryDelta {
    /// Extract deltas from a loosely typed JSON object.
    #[must_use]
    pub fn from_json(value: &serde_json::Value) -> Self {
        let field = |name: &str| value.get(name).and_then(bounded_delta);
        Self {
            affection_change: field("affection_change"),
            heat_change: field("heat_change"),
            sleepy_change: field("sleepy_change"),
        }
    }

    /// True when no field would change the profile.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.affection_change.is_none() && self.heat_change.is_none() && self.sleepy_change.is_none()
    }
}

fn bounded_delta(value: &serde_json::Value) -> Option<i64> {
    value
        .as_i64()
        .filter(|delta| (-SUMMARY_DELTA_LIMIT..=SUMMARY_DELTA_LIMIT).contains(delta))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let profile = EmotionProfile::default();
        assert_eq!(profile.mode(), EmotionMode::S1);
        assert_eq!(profile.affection(), 50);
        assert_eq!(profile.heat(), 0);
        assert_eq!(profile.sleepy(), 20);
        assert_eq!(profile.envy(), 0);
        assert_eq!(profile.stress(), 10);
    }

    #[test]
    fn test_adjust_clamps_both_ends() {
        let mut profile = EmotionProfile::default();
        profile.adjust(Variable::Affection, 1_000);
        assert_eq!(profile.affection(), 100);
        profile.adjust(Variable::Affection, i64::MIN);
        assert_eq!(profile.affection(), 0);
        profile.adjust(Variable::Heat, i64::MAX);
        assert_eq!(profile.heat(), 100);
    }

    #[test]
    fn test_sanitized_clamps_deserialized_values() {
        let profile: EmotionProfile =
            serde_json::from_str(r#"{"mode":"S3","affection":250,"heat":7}"#).unwrap();
        let clean = profile.sanitized();
        assert_eq!(clean.affection(), 100);
        assert_eq!(clean.heat(), 7);
        assert_eq!(clean.sleepy(), 20);
        assert_eq!(clean.mode(), EmotionMode::S3);
    }

    #[test]
    fn test_summary_delta_rejects_malformed_fields() {
        let delta = SummaryDelta::from_json(&json!({
            "affection_change": 3,
            "heat_change": 9,
            "sleepy_change": "2",
        }));
        assert_eq!(delta.affection_change, Some(3));
        assert_eq!(delta.heat_change, None);
        assert_eq!(delta.sleepy_change, None);
        assert!(!delta.is_empty());
        assert!(SummaryDelta::from_json(&json!({})).is_empty());
    }
}
