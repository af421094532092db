//! Emotion state machine: variable updates and rule-ordered mode selection.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Local, Timelike, Utc};
use rand::Rng;
use tracing::debug;

use crate::emotion::keywords::{EmotionKeywords, contains_any, count_matches};
use crate::emotion::mode::EmotionMode;
use crate::emotion::profile::{EmotionProfile, SummaryDelta, Variable};

const AFFECTION_PER_KEYWORD: i64 = 3;
const STRESS_PER_KEYWORD: i64 = 5;
const ENVY_PER_TRIGGER: i64 = 10;
const SLEEPY_AT_NIGHT: i64 = 2;
/// Largest heat increment drawn per message.
pub const MAX_HEAT_STEP: u8 = 3;
const OVERHEAT_THRESHOLD: u8 = 80;
const NIGHT_AFFECTION_THRESHOLD: u8 = 70;
const ENVY_THRESHOLD: u8 = 60;
const HISTORY_CAPACITY: usize = 32;

/// Source of the per-message heat increment.
pub trait HeatSource: Send + Sync {
    /// Draw a value in `[0, MAX_HEAT_STEP]`.
    fn draw(&self) -> u8;
}

/// Uniform random heat increments.
#[derive(Clone, Copy, Debug, Default)]
pub struct RandomHeat;

impl HeatSource for RandomHeat {
    fn draw(&self) -> u8 {
        rand::thread_rng().gen_range(0..=MAX_HEAT_STEP)
    }
}

/// Constant heat increment, for deterministic callers.
#[derive(Clone, Copy, Debug, Default)]
pub struct FixedHeat(pub u8);

impl HeatSource for FixedHeat {
    fn draw(&self) -> u8 {
        self.0.min(MAX_HEAT_STEP)
    }
}

/// Source of the local wall-clock hour.
pub trait Clock: Send + Sync {
    /// Hour of day in `[0, 23]`.
    fn local_hour(&self) -> u32;
}

/// Host local time.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn local_hour(&self) -> u32 {
        Local::now().hour()
    }
}

/// Pinned hour.
#[derive(Clone, Copy, Debug)]
pub struct FixedClock(pub u32);

impl Clock for FixedClock {
    fn local_hour(&self) -> u32 {
        self.0 % 24
    }
}

/// Night window: 22:00 through 06:59, wrapping midnight.
#[must_use]
pub const fn is_night(hour: u32) -> bool {
    hour >= 22 || hour < 7
}

/// One recorded mode change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Transition {
    /// When the mode was determined.
    pub at: DateTime<Utc>,
    /// Mode before the message.
    pub from: EmotionMode,
    /// Mode after the message.
    pub to: EmotionMode,
}

/// Maps a profile plus an incoming message to a new mode.
///
/// The rules only read the profile, the message and the clock; the
/// transition log is kept for diagnostics.
pub struct EmotionStateMachine {
    keywords: EmotionKeywords,
    heat: Box<dyn HeatSource>,
    clock: Box<dyn Clock>,
    history: Mutex<VecDeque<Transition>>,
}

impl Default for EmotionStateMachine {
    fn default() -> Self {
        Self::new(EmotionKeywords::default(), RandomHeat, SystemClock)
    }
}

impl EmotionStateMachine {
    /// Build a machine with explicit keyword, heat and clock sources.
    #[must_use]
    pub fn new(
        keywords: EmotionKeywords,
        heat: impl HeatSource + 'static,
        clock: impl Clock + 'static,
    ) -> Self {
        Self {
            keywords: keywords.normalized(),
            heat: Box::new(heat),
            clock: Box::new(clock),
            history: Mutex::new(VecDeque::with_capacity(HISTORY_CAPACITY)),
        }
    }

    /// Keyword sets in use.
    #[must_use]
    pub const fn keywords(&self) -> &EmotionKeywords {
        &self.keywords
    }

    /// Apply keyword, heat and night-time increments to `profile`.
    pub fn update_variables(&self, profile: &mut EmotionProfile, message: Option<&str>) {
        let text = normalize(message);
        self.apply_increments(profile, &text, self.clock.local_hour());
    }

    /// Update variables, then select the first matching mode rule and store it.
    pub fn determine_mode(&self, profile: &mut EmotionProfile, message: Option<&str>) -> EmotionMode {
        let text = normalize(message);
        let hour = self.clock.local_hour();
        let previous = profile.mode();

        self.apply_increments(profile, &text, hour);
        let mode = self.select_mode(profile, &text, hour);
        profile.set_mode(mode);

        debug!(
            from = %previous,
            to = %mode,
            heat = profile.heat(),
            affection = profile.affection(),
            envy = profile.envy(),
            "emotion mode determined"
        );
        self.record(previous, mode);
        mode
    }

    /// Apply summary deltas; absent fields are ignored.
    pub fn update_from_summary(&self, profile: &mut EmotionProfile, delta: &SummaryDelta) {
        let fields = [
            (Variable::Affection, delta.affection_change),
            (Variable::Heat, delta.heat_change),
            (Variable::Sleepy, delta.sleepy_change),
        ];
        for (variable, change) in fields {
            if let Some(change) = change {
                profile.adjust(variable, change);
            }
        }
    }

    /// Most recent transitions, oldest first.
    #[must_use]
    pub fn recent_transitions(&self) -> Vec<Transition> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .copied()
            .collect()
    }

    fn apply_increments(&self, profile: &mut EmotionProfile, text: &str, hour: u32) {
        let affection = count_matches(&self.keywords.affection, text);
        let stress = count_matches(&self.keywords.stress, text);
        let envy = count_matches(&self.keywords.envy_triggers, text);

        profile.adjust(Variable::Affection, per_match(affection, AFFECTION_PER_KEYWORD));
        profile.adjust(Variable::Stress, per_match(stress, STRESS_PER_KEYWORD));
        profile.adjust(Variable::Envy, per_match(envy, ENVY_PER_TRIGGER));
        profile.adjust(Variable::Heat, i64::from(self.heat.draw().min(MAX_HEAT_STEP)));
        if is_night(hour) {
            profile.adjust(Variable::Sleepy, SLEEPY_AT_NIGHT);
        }
    }

    fn select_mode(&self, profile: &EmotionProfile, text: &str, hour: u32) -> EmotionMode {
        if profile.heat() > OVERHEAT_THRESHOLD {
            EmotionMode::S7
        } else if is_night(hour) && profile.affection() > NIGHT_AFFECTION_THRESHOLD {
            EmotionMode::S8
        } else if profile.envy() > ENVY_THRESHOLD {
            EmotionMode::S4
        } else if contains_any(&self.keywords.explain, text) {
            EmotionMode::S2
        } else if contains_any(&self.keywords.otaku, text) {
            EmotionMode::S5
        } else if contains_any(&self.keywords.hacker, text) {
            EmotionMode::S6
        } else if contains_any(&self.keywords.sad, text) {
            EmotionMode::S3
        } else {
            EmotionMode::S1
        }
    }

    fn record(&self, from: EmotionMode, to: EmotionMode) {
        let mut history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
        if history.len() == HISTORY_CAPACITY {
            history.pop_front();
        }
        history.push_back(Transition {
            at: Utc::now(),
            from,
            to,
        });
    }
}

fn normalize(message: Option<&str>) -> String {
    message.unwrap_or_default().to_lowercase()
}

fn per_match(count: usize, step: i64) -> i64 {
    i64::try_from(count).unwrap_or(i64::MAX).saturating_mul(step)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pinned(heat: u8, hour: u32) -> EmotionStateMachine {
        EmotionStateMachine::new(EmotionKeywords::default(), FixedHeat(heat), FixedClock(hour))
    }

    fn profile(affection: i64, heat: i64, envy: i64) -> EmotionProfile {
        EmotionProfile::from_values(EmotionMode::S1, affection, heat, 20, envy, 10)
    }

    #[test]
    fn test_overheat_wins_over_everything() {
        let machine = pinned(0, 23);
        let mut state = profile(90, 85, 90);
        assert_eq!(machine.determine_mode(&mut state, Some("")), EmotionMode::S7);

        let mut state = profile(90, 85, 90);
        let mode = machine.determine_mode(&mut state, Some("为什么 机甲 电脑 难过"));
        assert_eq!(mode, EmotionMode::S7);
        assert_eq!(state.mode(), EmotionMode::S7);
    }

    #[test]
    fn test_night_affection_beats_explain() {
        let machine = pinned(0, 23);
        let mut state = profile(75, 0, 0);
        assert_eq!(machine.determine_mode(&mut state, Some("")), EmotionMode::S8);

        let mut state = profile(75, 0, 0);
        assert_eq!(
            machine.determine_mode(&mut state, Some("Why is the sky blue? 为什么")),
            EmotionMode::S8
        );
    }

    #[test]
    fn test_daytime_explain_is_scholar() {
        let machine = pinned(0, 14);
        let mut state = profile(75, 0, 0);
        assert_eq!(machine.determine_mode(&mut state, Some("WHY")), EmotionMode::S2);
    }

    #[test]
    fn test_rule_order_after_envy() {
        let machine = pinned(0, 12);
        let mut state = profile(50, 0, 0);
        assert_eq!(machine.determine_mode(&mut state, Some("看看机甲模型")), EmotionMode::S5);
        let mut state = profile(50, 0, 0);
        assert_eq!(machine.determine_mode(&mut state, Some("你动了我的电脑")), EmotionMode::S6);
        let mut state = profile(50, 0, 0);
        assert_eq!(machine.determine_mode(&mut state, Some("好难过")), EmotionMode::S3);
        let mut state = profile(50, 0, 0);
        assert_eq!(machine.determine_mode(&mut state, None), EmotionMode::S1);
        let mut state = profile(50, 0, 55);
        assert_eq!(machine.determine_mode(&mut state, Some("她很好")), EmotionMode::S4);
    }

    #[test]
    fn test_update_variables_increments() {
        let machine = pinned(3, 23);
        let mut state = EmotionProfile::default();
        machine.update_variables(&mut state, Some("喜欢你 宝贝，最近好累，压力大，她呢"));
        assert_eq!(state.affection(), 56);
        assert_eq!(state.stress(), 20);
        assert_eq!(state.envy(), 10);
        assert_eq!(state.heat(), 3);
        assert_eq!(state.sleepy(), 22);

        let daytime = pinned(0, 7);
        let mut state = EmotionProfile::default();
        daytime.update_variables(&mut state, None);
        assert_eq!(state.sleepy(), 20);
        assert_eq!(state.heat(), 0);
    }

    #[test]
    fn test_variables_stay_in_range() {
        let machine = pinned(3, 2);
        let mut state = EmotionProfile::from_values(EmotionMode::S1, 99, 99, 99, 99, 99);
        for _ in 0..50 {
            machine.update_variables(&mut state, Some("喜欢 爱 辛苦 累 女朋友 她"));
            machine.update_from_summary(
                &mut state,
                &SummaryDelta {
                    affection_change: Some(5),
                    heat_change: Some(5),
                    sleepy_change: Some(-5),
                },
            );
        }
        for variable in [
            Variable::Affection,
            Variable::Heat,
            Variable::Sleepy,
            Variable::Envy,
            Variable::Stress,
        ] {
            assert!(state.get(variable) <= 100);
        }
        assert_eq!(state.affection(), 100);

        let mut low = EmotionProfile::from_values(EmotionMode::S1, 1, 1, 1, 0, 0);
        let drain = SummaryDelta {
            affection_change: Some(-5),
            heat_change: Some(-5),
            sleepy_change: Some(-5),
        };
        machine.update_from_summary(&mut low, &drain);
        assert_eq!((low.affection(), low.heat(), low.sleepy()), (0, 0, 0));
    }

    #[test]
    fn test_summary_absent_fields_are_noops() {
        let machine = pinned(0, 12);
        let mut state = EmotionProfile::default();
        machine.update_from_summary(
            &mut state,
            &SummaryDelta {
                heat_change: Some(4),
                ..SummaryDelta::default()
            },
        );
        assert_eq!(state.heat(), 4);
        assert_eq!(state.affection(), 50);
        assert_eq!(state.sleepy(), 20);
    }

    #[test]
    fn test_random_heat_is_bounded() {
        let heat = RandomHeat;
        for _ in 0..200 {
            assert!(heat.draw() <= MAX_HEAT_STEP);
        }
    }

    #[test]
    fn test_night_window_wraps_midnight() {
        assert!(is_night(22));
        assert!(is_night(0));
        assert!(is_night(6));
        assert!(!is_night(7));
        assert!(!is_night(21));
    }

    #[test]
    fn test_transition_history_is_bounded() {
        let machine = pinned(0, 12);
        let mut state = EmotionProfile::default();
        for _ in 0..(HISTORY_CAPACITY + 5) {
            machine.determine_mode(&mut state, Some("为什么"));
        }
        let history = machine.recent_transitions();
        assert_eq!(history.len(), HISTORY_CAPACITY);
        assert!(history.iter().all(|t| t.to == EmotionMode::S2));
    }
}
