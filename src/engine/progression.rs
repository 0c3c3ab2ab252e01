//! Progressive overload rule
//!
//! A working weight goes up once the most recent sessions show a streak of
//! `required_streak` consecutive entries logged at that same weight. The step
//! size comes from a tiered table keyed by the current weight.

use serde::{Deserialize, Serialize};

use crate::model::Exercise;

/// Sessions at the same weight before an increase
pub const DEFAULT_REQUIRED_STREAK: usize = 6;

/// Weights closer than this are the same load
const WEIGHT_EPSILON: f64 = 1e-6;

pub fn same_weight(a: f64, b: f64) -> bool {
    (a - b).abs() < WEIGHT_EPSILON
}

/// Weights strictly below `below` use `step`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IncrementTier {
    pub below: f64,
    pub step: f64,
}

/// Ordered step table with a fallback for weights above every tier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncrementTable {
    tiers: Vec<IncrementTier>,
    fallback: f64,
}

impl IncrementTable {
    /// Tiers are sorted by threshold; steps never shrink as weight grows
    pub fn new(mut tiers: Vec<IncrementTier>, fallback: f64) -> Self {
        tiers.retain(|t| t.below.is_finite() && t.step.is_finite());
        tiers.sort_by(|a, b| a.below.total_cmp(&b.below));

        let mut floor = 0.0_f64;
        for tier in &mut tiers {
            tier.step = tier.step.max(floor);
            floor = tier.step;
        }

        let fallback = if fallback.is_finite() { fallback.max(floor) } else { floor };
        Self { tiers, fallback }
    }

    /// Same step at every weight
    pub fn flat(step: f64) -> Self {
        Self::new(Vec::new(), step)
    }

    pub fn tiers(&self) -> &[IncrementTier] {
        &self.tiers
    }

    pub fn fallback(&self) -> f64 {
        self.fallback
    }

    pub fn step_for(&self, weight: f64) -> f64 {
        self.tiers
            .iter()
            .find(|t| weight < t.below)
            .map(|t| t.step)
            .unwrap_or(self.fallback)
    }
}

impl Default for IncrementTable {
    fn default() -> Self {
        Self::new(
            vec![
                IncrementTier { below: 20.0, step: 1.25 }, // dumbbells, small isolation
                IncrementTier { below: 60.0, step: 2.5 },
            ],
            2.5,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressionConfig {
    pub required_streak: usize,
    pub increments: IncrementTable,
}

impl Default for ProgressionConfig {
    fn default() -> Self {
        Self {
            required_streak: DEFAULT_REQUIRED_STREAK,
            increments: IncrementTable::default(),
        }
    }
}

/// Pure weight calculator. Holds only the configuration current at call time
#[derive(Debug, Clone, Default)]
pub struct ProgressionEngine {
    config: ProgressionConfig,
}

impl ProgressionEngine {
    pub fn new(config: ProgressionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ProgressionConfig {
        &self.config
    }

    pub fn increment(&self, weight: f64) -> f64 {
        self.config.increments.step_for(weight)
    }

    /// Consecutive most-recent history entries logged at the current weight
    pub fn streak(&self, exercise: &Exercise) -> usize {
        exercise
            .history
            .iter()
            .rev()
            .take_while(|entry| same_weight(entry.weight, exercise.weight))
            .count()
    }

    /// Weight to use next session. Expects history to already contain the
    /// session being completed.
    pub fn next_weight(&self, exercise: &Exercise) -> f64 {
        if exercise.history.is_empty() {
            return exercise.weight;
        }

        if self.streak(exercise) >= self.config.required_streak {
            exercise.weight + self.increment(exercise.weight)
        } else {
            exercise.weight
        }
    }

    /// Completions still needed at the current weight before it goes up
    pub fn sessions_until_overload(&self, exercise: &Exercise) -> usize {
        self.config
            .required_streak
            .saturating_sub(self.streak(exercise))
            .max(1)
    }
}
