//! Round-robin rotation through the plan's days

use crate::error::WorkoutError;
use crate::model::{UserWorkoutData, WorkoutDay};

/// Index of today's day: one past the last completed one. `None` for an empty plan
pub fn next_day_index(data: &UserWorkoutData) -> Option<usize> {
    let len = data.days.len() as i64;
    if len == 0 {
        return None;
    }
    Some((data.last_workout_index + 1).rem_euclid(len) as usize)
}

pub fn next_day(data: &UserWorkoutData) -> Option<&WorkoutDay> {
    next_day_index(data).and_then(|i| data.days.get(i))
}

/// Point the rotation so that `target` is the next day. Not a completion:
/// history and `last_workout_date` are untouched.
pub fn set_manual_index(
    data: &UserWorkoutData,
    target: usize,
) -> Result<UserWorkoutData, WorkoutError> {
    let len = data.days.len();
    if target >= len {
        return Err(WorkoutError::DayIndexOutOfRange { index: target, len });
    }

    let len = len as i64;
    Ok(UserWorkoutData {
        last_workout_index: (target as i64 - 1 + len).rem_euclid(len),
        ..data.clone()
    })
}

pub fn find_day_index_by_name(data: &UserWorkoutData, name: &str) -> Option<usize> {
    data.days.iter().position(|d| d.name == name)
}
