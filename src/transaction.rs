//! "Complete workout" as a pure state transition

use chrono::{DateTime, Utc};

use crate::engine::{next_day_index, ProgressionEngine};
use crate::model::{Exercise, ExerciseHistoryEntry, UserWorkoutData, WorkoutDay};

/// Weight change of one exercise in a completed session
#[derive(Debug, Clone, PartialEq)]
pub struct ExerciseUpdate {
    pub exercise_id: String,
    pub name: String,
    pub previous_weight: f64,
    pub new_weight: f64,
}

impl ExerciseUpdate {
    /// Increase applied by this completion, if any
    pub fn overload(&self) -> Option<f64> {
        let delta = self.new_weight - self.previous_weight;
        (delta > 0.0).then_some(delta)
    }

    pub fn overload_message(&self) -> Option<String> {
        self.overload().map(|d| format!("Overload! +{:.2}kg", d))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletedWorkout {
    pub day_index: usize,
    pub day_id: String,
    pub day_name: String,
    pub completed_at: DateTime<Utc>,
    pub updates: Vec<ExerciseUpdate>,
}

impl CompletedWorkout {
    pub fn overloads(&self) -> impl Iterator<Item = &ExerciseUpdate> {
        self.updates.iter().filter(|u| u.overload().is_some())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    /// Plan has no days
    NothingToComplete,
    Completed(CompletedWorkout),
}

/// Log today's session for every exercise of the current day, advance weights
/// and move the rotation pointer. `None` when the plan has no days.
pub fn complete_workout(
    data: &UserWorkoutData,
    engine: &ProgressionEngine,
    now: DateTime<Utc>,
) -> Option<(UserWorkoutData, CompletedWorkout)> {
    let index = next_day_index(data)?;
    let day = &data.days[index];

    let (exercises, updates): (Vec<Exercise>, Vec<ExerciseUpdate>) = day
        .exercises
        .iter()
        .map(|ex| complete_exercise(ex, engine, now))
        .unzip();

    let mut days = data.days.clone();
    days[index] = WorkoutDay {
        exercises,
        ..day.clone()
    };

    let completed = CompletedWorkout {
        day_index: index,
        day_id: day.id.clone(),
        day_name: day.name.clone(),
        completed_at: now,
        updates,
    };

    let next = UserWorkoutData {
        days,
        last_workout_index: index as i64,
        last_workout_date: Some(now),
        ..data.clone()
    };

    Some((next, completed))
}

fn complete_exercise(
    exercise: &Exercise,
    engine: &ProgressionEngine,
    now: DateTime<Utc>,
) -> (Exercise, ExerciseUpdate) {
    let mut logged = exercise.clone();
    logged.history.push(ExerciseHistoryEntry {
        date: now,
        weight: exercise.weight,
        reps: exercise.target_reps.clone(),
    });

    // the session just logged counts toward the streak
    let new_weight = engine.next_weight(&logged);
    logged.weight = new_weight;

    let update = ExerciseUpdate {
        exercise_id: exercise.id.clone(),
        name: exercise.name.clone(),
        previous_weight: exercise.weight,
        new_weight,
    };

    (logged, update)
}
