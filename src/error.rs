//! Domain errors surfaced to the shells

use thiserror::Error;

use crate::transaction::CompletedWorkout;

/// Change that is committed in memory but whose durable write failed
#[derive(Debug, Clone, PartialEq)]
pub enum Unsaved {
    Completed(Box<CompletedWorkout>),
    /// Id of a newly added day or exercise
    Created { id: String },
}

#[derive(Debug, Error)]
pub enum WorkoutError {
    #[error("workout day not found: {day_id}")]
    UnknownDay { day_id: String },

    #[error("exercise {exercise_id} not found in day {day_id}")]
    UnknownExercise { day_id: String, exercise_id: String },

    #[error("day index {index} out of range (plan has {len} days)")]
    DayIndexOutOfRange { index: usize, len: usize },

    #[error("a workout completion is still being saved")]
    Busy,

    /// The in-memory snapshot already holds the change; only the durable write failed
    #[error("failed to save workout data after {attempts} attempts: {message}")]
    Persist {
        attempts: u32,
        message: String,
        unsaved: Option<Unsaved>,
    },
}

impl WorkoutError {
    pub fn unknown_day(day_id: &str) -> Self {
        Self::UnknownDay { day_id: day_id.to_string() }
    }

    pub fn unknown_exercise(day_id: &str, exercise_id: &str) -> Self {
        Self::UnknownExercise {
            day_id: day_id.to_string(),
            exercise_id: exercise_id.to_string(),
        }
    }

    pub fn persist(attempts: u32, message: String) -> Self {
        Self::Persist {
            attempts,
            message,
            unsaved: None,
        }
    }

    /// True when retrying `flush` may still save the change
    pub fn is_persist(&self) -> bool {
        matches!(self, Self::Persist { .. })
    }

    /// Attach the outcome that only exists in memory. Other variants pass through
    pub fn with_unsaved(self, outcome: Unsaved) -> Self {
        match self {
            Self::Persist { attempts, message, .. } => Self::Persist {
                attempts,
                message,
                unsaved: Some(outcome),
            },
            other => other,
        }
    }

    pub fn unsaved(&self) -> Option<&Unsaved> {
        match self {
            Self::Persist { unsaved, .. } => unsaved.as_ref(),
            _ => None,
        }
    }
}
