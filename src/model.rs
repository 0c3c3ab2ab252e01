//! Plan data model - the persisted shape of a user's rotating plan

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `last_workout_index` value meaning "no workout completed yet"
pub const NO_WORKOUT: i64 = -1;

/// One completed session's recorded load
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseHistoryEntry {
    pub date: DateTime<Utc>,
    pub weight: f64,
    pub reps: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Exercise {
    pub id: String,
    pub name: String,
    /// Target e.g. "3x10" or "8-12"
    pub target_reps: String,
    /// Current working weight, kg
    pub weight: f64,
    /// Weight at creation, never changes afterwards
    pub starting_weight: f64,
    /// Chronological, append-only
    pub history: Vec<ExerciseHistoryEntry>,
}

impl Exercise {
    pub fn last_entry(&self) -> Option<&ExerciseHistoryEntry> {
        self.history.last()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutDay {
    pub id: String,
    pub name: String,
    pub exercises: Vec<Exercise>,
}

impl WorkoutDay {
    pub fn find_exercise(&self, exercise_id: &str) -> Option<&Exercise> {
        self.exercises.iter().find(|e| e.id == exercise_id)
    }
}

/// Root aggregate. Every operation produces a new value of this type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserWorkoutData {
    pub user_id: String,
    /// Last *completed* day, or [`NO_WORKOUT`]
    pub last_workout_index: i64,
    pub last_workout_date: Option<DateTime<Utc>>,
    pub days: Vec<WorkoutDay>,
}

impl UserWorkoutData {
    /// Default plan for a fresh install: a two-day push/pull split
    pub fn seed() -> Self {
        Self {
            user_id: "local-user".to_string(),
            last_workout_index: NO_WORKOUT,
            last_workout_date: None,
            days: SEED_PLAN
                .iter()
                .map(|day| WorkoutDay {
                    id: day.id.to_string(),
                    name: day.name.to_string(),
                    exercises: day
                        .exercises
                        .iter()
                        .map(|ex| Exercise {
                            id: ex.id.to_string(),
                            name: ex.name.to_string(),
                            target_reps: ex.target_reps.to_string(),
                            weight: ex.weight,
                            starting_weight: ex.weight,
                            history: Vec::new(),
                        })
                        .collect(),
                })
                .collect(),
        }
    }

    pub fn find_day(&self, day_id: &str) -> Option<&WorkoutDay> {
        self.days.iter().find(|d| d.id == day_id)
    }

    pub fn day_position(&self, day_id: &str) -> Option<usize> {
        self.days.iter().position(|d| d.id == day_id)
    }

    /// Every exercise in plan order, paired with its day
    pub fn all_exercises(&self) -> impl Iterator<Item = (&WorkoutDay, &Exercise)> {
        self.days
            .iter()
            .flat_map(|day| day.exercises.iter().map(move |ex| (day, ex)))
    }
}

impl Default for UserWorkoutData {
    fn default() -> Self {
        Self::seed()
    }
}

struct SeedExercise {
    id: &'static str,
    name: &'static str,
    target_reps: &'static str,
    weight: f64,
}

struct SeedDay {
    id: &'static str,
    name: &'static str,
    exercises: &'static [SeedExercise],
}

const SEED_PLAN: &[SeedDay] = &[
    SeedDay {
        id: "day-1",
        name: "Push (Chest & Tris)",
        exercises: &[
            SeedExercise { id: "e1", name: "Bench Press", target_reps: "3x8", weight: 60.0 },
            SeedExercise { id: "e2", name: "Overhead Press", target_reps: "3x10", weight: 40.0 },
            SeedExercise { id: "e3", name: "Tricep Pushdown", target_reps: "3x12", weight: 25.0 },
        ],
    },
    SeedDay {
        id: "day-2",
        name: "Pull (Back & Biceps)",
        exercises: &[
            SeedExercise { id: "e4", name: "Lat Pulldown", target_reps: "3x10", weight: 55.0 },
            SeedExercise { id: "e5", name: "Barbell Row", target_reps: "3x8", weight: 60.0 },
            SeedExercise { id: "e6", name: "Bicep Curl", target_reps: "3x12", weight: 15.0 },
        ],
    },
];

/// Generate an id with `prefix` that is not already taken
pub fn fresh_id(prefix: &str, is_taken: impl Fn(&str) -> bool) -> String {
    loop {
        let id = format!(
            "{}-{}-{:04x}",
            prefix,
            Utc::now().timestamp_millis(),
            rand::random::<u16>()
        );
        if !is_taken(&id) {
            return id;
        }
    }
}

/// Format a weight in kg for display ("62.5kg", "60kg")
pub fn format_weight(weight: f64) -> String {
    if weight.fract() == 0.0 {
        format!("{:.0}kg", weight)
    } else {
        format!("{}kg", weight)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_has_no_completed_workout() {
        let data = UserWorkoutData::seed();
        assert_eq!(data.last_workout_index, NO_WORKOUT);
        assert!(data.last_workout_date.is_none());
        assert_eq!(data.days.len(), 2);
    }

    #[test]
    fn test_seed_starting_weight_equals_weight() {
        let data = UserWorkoutData::seed();
        for (_, ex) in data.all_exercises() {
            assert_eq!(ex.weight, ex.starting_weight, "{} starting weight", ex.name);
            assert!(ex.history.is_empty());
        }
    }

    #[test]
    fn test_seed_ids_unique() {
        let data = UserWorkoutData::seed();
        let mut ids: Vec<_> = data.all_exercises().map(|(_, e)| e.id.as_str()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 6);
    }

    #[test]
    fn test_json_field_names() {
        let data = UserWorkoutData::seed();
        let json = serde_json::to_value(&data).unwrap();
        assert!(json.get("userId").is_some());
        assert!(json.get("lastWorkoutIndex").is_some());
        assert!(json.get("lastWorkoutDate").is_some());
        let ex = &json["days"][0]["exercises"][0];
        assert!(ex.get("targetReps").is_some());
        assert!(ex.get("startingWeight").is_some());
    }

    #[test]
    fn test_last_entry() {
        let mut ex = UserWorkoutData::seed().days[0].exercises[0].clone();
        assert!(ex.last_entry().is_none());
        for weight in [60.0, 62.5] {
            ex.history.push(ExerciseHistoryEntry {
                date: Utc::now(),
                weight,
                reps: "3x8".to_string(),
            });
        }
        assert_eq!(ex.last_entry().map(|e| e.weight), Some(62.5));
    }

    #[test]
    fn test_fresh_id_skips_taken() {
        let first = fresh_id("day", |_| false);
        assert!(first.starts_with("day-"));
        let second = fresh_id("day", |id| id == first);
        assert_ne!(first, second);
    }

    #[test]
    fn test_format_weight() {
        assert_eq!(format_weight(60.0), "60kg");
        assert_eq!(format_weight(62.5), "62.5kg");
        assert_eq!(format_weight(0.0), "0kg");
    }
}
