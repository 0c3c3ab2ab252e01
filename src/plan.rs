//! Structural plan edits: days and exercises
//!
//! Every operation takes the current snapshot by reference and returns a new
//! one. History is never touched except when a whole exercise is removed.

use std::collections::HashSet;

use crate::error::WorkoutError;
use crate::model::{fresh_id, Exercise, UserWorkoutData, WorkoutDay, NO_WORKOUT};

const DEFAULT_EXERCISE_NAME: &str = "New Exercise";
const DEFAULT_TARGET_REPS: &str = "8-12";

/// User input for a new exercise. Fields are raw text from the form
#[derive(Debug, Clone, Default)]
pub struct NewExercise {
    pub name: Option<String>,
    pub target_reps: Option<String>,
    pub weight: Option<String>,
}

/// Parse a user-entered weight. `None` for anything that is not a finite,
/// non-negative number
pub fn parse_weight(raw: &str) -> Option<f64> {
    raw.trim()
        .replace(',', ".")
        .parse::<f64>()
        .ok()
        .filter(|w| w.is_finite() && *w >= 0.0)
}

fn taken_ids(data: &UserWorkoutData) -> HashSet<&str> {
    data.days
        .iter()
        .flat_map(|d| std::iter::once(d.id.as_str()).chain(d.exercises.iter().map(|e| e.id.as_str())))
        .collect()
}

fn non_blank(text: Option<&str>) -> Option<String> {
    text.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

/// Append an empty day. Returns the new snapshot and the day's id
pub fn add_day(data: &UserWorkoutData, name: &str) -> (UserWorkoutData, String) {
    let taken = taken_ids(data);
    let id = fresh_id("day", |id| taken.contains(id));
    let name = non_blank(Some(name)).unwrap_or_else(|| format!("Workout {}", data.days.len() + 1));

    let mut days = data.days.clone();
    days.push(WorkoutDay {
        id: id.clone(),
        name,
        exercises: Vec::new(),
    });

    (UserWorkoutData { days, ..data.clone() }, id)
}

/// Remove a day and keep the rotation anchored on the same last-completed day.
///
/// Removing the last-completed day itself makes the day that followed it next.
pub fn delete_day(data: &UserWorkoutData, day_id: &str) -> Result<UserWorkoutData, WorkoutError> {
    let removed = data
        .day_position(day_id)
        .ok_or_else(|| WorkoutError::unknown_day(day_id))?;

    let mut days = data.days.clone();
    days.remove(removed);

    let removed = removed as i64;
    let last = data.last_workout_index;
    let mut last_workout_index = if last == NO_WORKOUT || removed > last {
        last
    } else {
        last - 1
    };
    if last_workout_index < NO_WORKOUT || last_workout_index >= days.len() as i64 {
        last_workout_index = NO_WORKOUT;
    }

    Ok(UserWorkoutData {
        days,
        last_workout_index,
        ..data.clone()
    })
}

/// Append an exercise with empty history. Returns the new snapshot and the exercise's id
pub fn add_exercise(
    data: &UserWorkoutData,
    day_id: &str,
    spec: &NewExercise,
) -> Result<(UserWorkoutData, String), WorkoutError> {
    let pos = data
        .day_position(day_id)
        .ok_or_else(|| WorkoutError::unknown_day(day_id))?;

    let taken = taken_ids(data);
    let id = fresh_id("ex", |id| taken.contains(id));
    let weight = spec.weight.as_deref().and_then(parse_weight).unwrap_or(0.0);

    let exercise = Exercise {
        id: id.clone(),
        name: non_blank(spec.name.as_deref()).unwrap_or_else(|| DEFAULT_EXERCISE_NAME.to_string()),
        target_reps: non_blank(spec.target_reps.as_deref())
            .unwrap_or_else(|| DEFAULT_TARGET_REPS.to_string()),
        weight,
        starting_weight: weight,
        history: Vec::new(),
    };

    let mut days = data.days.clone();
    days[pos].exercises.push(exercise);

    Ok((UserWorkoutData { days, ..data.clone() }, id))
}

pub fn delete_exercise(
    data: &UserWorkoutData,
    day_id: &str,
    exercise_id: &str,
) -> Result<UserWorkoutData, WorkoutError> {
    let pos = data
        .day_position(day_id)
        .ok_or_else(|| WorkoutError::unknown_day(day_id))?;
    if data.days[pos].find_exercise(exercise_id).is_none() {
        return Err(WorkoutError::unknown_exercise(day_id, exercise_id));
    }

    let mut days = data.days.clone();
    days[pos].exercises.retain(|e| e.id != exercise_id);

    Ok(UserWorkoutData { days, ..data.clone() })
}

/// Manual working-weight edit. Unparseable input keeps the previous weight;
/// starting weight and history are untouched
pub fn set_exercise_weight(
    data: &UserWorkoutData,
    day_id: &str,
    exercise_id: &str,
    raw_weight: &str,
) -> Result<UserWorkoutData, WorkoutError> {
    let pos = data
        .day_position(day_id)
        .ok_or_else(|| WorkoutError::unknown_day(day_id))?;

    let mut days = data.days.clone();
    let exercise = days[pos]
        .exercises
        .iter_mut()
        .find(|e| e.id == exercise_id)
        .ok_or_else(|| WorkoutError::unknown_exercise(day_id, exercise_id))?;

    if let Some(weight) = parse_weight(raw_weight) {
        exercise.weight = weight;
    }

    Ok(UserWorkoutData { days, ..data.clone() })
}
