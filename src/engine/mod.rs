//! Engine module - rotation, progression and progress statistics
//!
//! Features:
//! - Round-robin selection of today's workout day
//! - Streak-based progressive overload
//! - Per-exercise progress report (start, current, gain)

pub mod cycle;
pub mod progression;

pub use cycle::{find_day_index_by_name, next_day, next_day_index, set_manual_index};
pub use progression::{
    IncrementTable, IncrementTier, ProgressionConfig, ProgressionEngine, DEFAULT_REQUIRED_STREAK,
};

use chrono::{DateTime, Utc};

use crate::model::{Exercise, UserWorkoutData};

/// Progress summary for one exercise
#[derive(Debug, Clone, PartialEq)]
pub struct ExerciseProgress {
    pub exercise_id: String,
    pub name: String,
    pub day_name: String,
    pub starting_weight: f64,
    pub current_weight: f64,
    pub sessions: usize,
    pub best_weight: f64,
    /// Chronological (date, weight) points for charting
    pub series: Vec<(DateTime<Utc>, f64)>,
}

impl ExerciseProgress {
    pub fn from_exercise(day_name: &str, exercise: &Exercise) -> Self {
        let best_weight = exercise
            .history
            .iter()
            .map(|h| h.weight)
            .fold(exercise.weight, f64::max);

        Self {
            exercise_id: exercise.id.clone(),
            name: exercise.name.clone(),
            day_name: day_name.to_string(),
            starting_weight: exercise.starting_weight,
            current_weight: exercise.weight,
            sessions: exercise.history.len(),
            best_weight,
            series: exercise.history.iter().map(|h| (h.date, h.weight)).collect(),
        }
    }

    /// Weight gained since the exercise was added
    pub fn gain(&self) -> f64 {
        self.current_weight - self.starting_weight
    }
}

/// Progress over the whole plan
pub struct ProgressReport {
    exercises: Vec<ExerciseProgress>,
}

impl ProgressReport {
    pub fn new(data: &UserWorkoutData) -> Self {
        Self {
            exercises: data
                .all_exercises()
                .map(|(day, ex)| ExerciseProgress::from_exercise(&day.name, ex))
                .collect(),
        }
    }

    pub fn exercises(&self) -> &[ExerciseProgress] {
        &self.exercises
    }

    /// Case-insensitive substring match on the exercise name
    pub fn find(&self, name: &str) -> Option<&ExerciseProgress> {
        let needle = name.to_lowercase();
        self.exercises
            .iter()
            .find(|e| e.name.to_lowercase().contains(&needle))
    }

    pub fn total_sessions(&self) -> usize {
        self.exercises.iter().map(|e| e.sessions).sum()
    }
}
