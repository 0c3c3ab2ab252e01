//! Persisted blob format and migration of older/partial records

use std::collections::HashSet;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::model::{
    fresh_id, Exercise, ExerciseHistoryEntry, UserWorkoutData, WorkoutDay, NO_WORKOUT,
};

/// Current storage key. Bumping the version is the migration trigger
pub const STORAGE_KEY: &str = "gainengine-data-v3";

/// Keys written by older versions, newest first
pub const LEGACY_KEYS: &[&str] = &["gainengine-data-v2", "gainengine-data"];

const DEFAULT_EXERCISE_NAME: &str = "New Exercise";
const DEFAULT_TARGET_REPS: &str = "8-12";

// Raw shapes accept every field name any version has written and
// tolerate wrong types; `normalize` turns them into the current model.

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawUserData {
    #[serde(default, alias = "userID")]
    user_id: Option<Value>,
    #[serde(default)]
    last_workout_index: Option<Value>,
    #[serde(default)]
    last_workout_date: Option<Value>,
    #[serde(default, alias = "fullWorkouts")]
    days: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDay {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default, alias = "workoutName")]
    name: Option<Value>,
    #[serde(default)]
    exercises: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawExercise {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default, alias = "exerciseName")]
    name: Option<Value>,
    #[serde(default, alias = "reps")]
    target_reps: Option<Value>,
    #[serde(default)]
    weight: Option<Value>,
    #[serde(default)]
    starting_weight: Option<Value>,
    #[serde(default)]
    history: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawHistoryEntry {
    #[serde(default)]
    date: Option<Value>,
    #[serde(default)]
    weight: Option<Value>,
    #[serde(default, alias = "repsCompleted")]
    reps: Option<Value>,
}

/// Parse and normalize a stored blob
pub fn parse_snapshot(bytes: &[u8]) -> Result<UserWorkoutData> {
    let value: Value = serde_json::from_slice(bytes).context("workout data is not valid JSON")?;
    let Some(raw) = from_object::<RawUserData>(value) else {
        bail!("workout data is not a JSON object");
    };
    Ok(normalize(raw))
}

/// Blob to snapshot. Absent or unreadable data yields the seed plan
pub fn load_snapshot(bytes: Option<&[u8]>) -> UserWorkoutData {
    match bytes {
        None => {
            debug!("No stored workout data, using seed plan");
            UserWorkoutData::seed()
        }
        Some(bytes) => parse_snapshot(bytes).unwrap_or_else(|e| {
            warn!("Stored workout data unreadable, falling back to seed plan: {:#}", e);
            UserWorkoutData::seed()
        }),
    }
}

pub fn encode_snapshot(data: &UserWorkoutData) -> Result<Vec<u8>> {
    serde_json::to_vec(data).context("failed to encode workout data")
}

/// Restore invariants on an already typed snapshot (idempotent)
pub fn normalize_snapshot(data: &UserWorkoutData) -> UserWorkoutData {
    let mut taken = HashSet::new();
    let days: Vec<WorkoutDay> = data
        .days
        .iter()
        .map(|day| WorkoutDay {
            id: unique_id(Some(day.id.clone()), "day", &mut taken),
            name: day.name.clone(),
            exercises: day
                .exercises
                .iter()
                .map(|ex| Exercise {
                    id: unique_id(Some(ex.id.clone()), "ex", &mut taken),
                    weight: sanitize_weight(ex.weight),
                    starting_weight: sanitize_weight(ex.starting_weight),
                    history: ex
                        .history
                        .iter()
                        .filter(|h| h.weight.is_finite() && h.weight >= 0.0)
                        .cloned()
                        .collect(),
                    ..ex.clone()
                })
                .collect(),
        })
        .collect();

    UserWorkoutData {
        user_id: data.user_id.clone(),
        last_workout_index: clamp_last_index(data.last_workout_index, days.len()),
        last_workout_date: data.last_workout_date,
        days,
    }
}

fn normalize(raw: RawUserData) -> UserWorkoutData {
    let mut taken = HashSet::new();
    let days: Vec<WorkoutDay> = array_items(raw.days)
        .into_iter()
        .filter_map(from_object::<RawDay>)
        .map(|day| normalize_day(day, &mut taken))
        .collect();

    let last_workout_index = raw
        .last_workout_index
        .as_ref()
        .and_then(Value::as_i64)
        .unwrap_or(NO_WORKOUT);

    UserWorkoutData {
        user_id: raw
            .user_id
            .and_then(value_text)
            .unwrap_or_else(|| UserWorkoutData::seed().user_id),
        last_workout_index: clamp_last_index(last_workout_index, days.len()),
        last_workout_date: raw.last_workout_date.as_ref().and_then(value_date),
        days,
    }
}

fn normalize_day(day: RawDay, taken: &mut HashSet<String>) -> WorkoutDay {
    let id = unique_id(day.id.and_then(value_text), "day", taken);
    let name = day.name.and_then(value_text).unwrap_or_else(|| id.clone());

    let exercises = array_items(day.exercises)
        .into_iter()
        .filter_map(from_object::<RawExercise>)
        .map(|ex| normalize_exercise(ex, taken))
        .collect();

    WorkoutDay { id, name, exercises }
}

fn normalize_exercise(ex: RawExercise, taken: &mut HashSet<String>) -> Exercise {
    let history: Vec<ExerciseHistoryEntry> = match ex.history {
        Some(Value::Array(items)) => items.into_iter().filter_map(normalize_entry).collect(),
        _ => Vec::new(),
    };

    let weight = ex
        .weight
        .as_ref()
        .and_then(value_number)
        .map(sanitize_weight)
        .unwrap_or(0.0);

    let starting_weight = ex
        .starting_weight
        .as_ref()
        .and_then(value_number)
        .map(sanitize_weight)
        .or_else(|| history.first().map(|h| h.weight))
        .unwrap_or(weight);

    Exercise {
        id: unique_id(ex.id.and_then(value_text), "ex", taken),
        name: ex
            .name
            .and_then(value_text)
            .unwrap_or_else(|| DEFAULT_EXERCISE_NAME.to_string()),
        target_reps: ex
            .target_reps
            .and_then(value_text)
            .unwrap_or_else(|| DEFAULT_TARGET_REPS.to_string()),
        weight,
        starting_weight,
        history,
    }
}

/// Unreadable entries are dropped, the rest keep their order
fn normalize_entry(value: Value) -> Option<ExerciseHistoryEntry> {
    let raw: RawHistoryEntry = from_object(value)?;
    let weight = raw.weight.as_ref().and_then(value_number)?;
    if !weight.is_finite() || weight < 0.0 {
        return None;
    }

    Some(ExerciseHistoryEntry {
        date: raw.date.as_ref().and_then(value_date)?,
        weight,
        reps: raw.reps.and_then(value_text).unwrap_or_default(),
    })
}

fn clamp_last_index(index: i64, len: usize) -> i64 {
    if index >= NO_WORKOUT && index < len as i64 {
        index
    } else {
        NO_WORKOUT
    }
}

fn sanitize_weight(weight: f64) -> f64 {
    if weight.is_finite() && weight > 0.0 { weight } else { 0.0 }
}

fn unique_id(candidate: Option<String>, prefix: &str, taken: &mut HashSet<String>) -> String {
    let id = match candidate {
        Some(id) if !id.is_empty() && !taken.contains(&id) => id,
        _ => fresh_id(prefix, |id| taken.contains(id)),
    };
    taken.insert(id.clone());
    id
}

/// Only objects; serde would otherwise accept arrays for structs
fn from_object<T: serde::de::DeserializeOwned>(value: Value) -> Option<T> {
    if value.is_object() {
        serde_json::from_value(value).ok()
    } else {
        None
    }
}

fn array_items(value: Option<Value>) -> Vec<Value> {
    match value {
        Some(Value::Array(items)) => items,
        _ => Vec::new(),
    }
}

fn value_text(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Numbers, or strings holding one (older shells stored weights as text)
fn value_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn value_date(value: &Value) -> Option<DateTime<Utc>> {
    value
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|d| d.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_blob_yields_seed() {
        assert_eq!(load_snapshot(None), UserWorkoutData::seed());
    }

    #[test]
    fn test_garbage_blob_yields_seed() {
        assert_eq!(load_snapshot(Some(b"not json{")), UserWorkoutData::seed());
        assert_eq!(load_snapshot(Some(b"[1,2,3]")), UserWorkoutData::seed());
        assert_eq!(load_snapshot(Some(b"null")), UserWorkoutData::seed());
    }

    #[test]
    fn test_current_shape_round_trip() {
        let data = UserWorkoutData::seed();
        let bytes = encode_snapshot(&data).unwrap();
        assert_eq!(parse_snapshot(&bytes).unwrap(), data);
    }

    #[test]
    fn test_migration_is_idempotent() {
        let legacy = br#"{
            "userID": "local-user",
            "lastWorkoutIndex": 0,
            "lastWorkoutDate": "2025-01-03T10:00:00Z",
            "fullWorkouts": [{
                "id": "day-1",
                "workoutName": "Push",
                "exercises": [
                    {"id": "e1", "exerciseName": "Bench Press", "reps": "3x8", "weight": 62.5,
                     "history": [{"date": "2025-01-01T10:00:00Z", "weight": 60, "reps": "3x8"}]},
                    {"id": "e2", "exerciseName": "Dips", "reps": "3x10", "weight": 10, "history": "oops"}
                ]
            }]
        }"#;

        let once = parse_snapshot(legacy).unwrap();
        let once_bytes = encode_snapshot(&once).unwrap();
        let twice = parse_snapshot(&once_bytes).unwrap();
        let twice_bytes = encode_snapshot(&twice).unwrap();

        assert_eq!(once, twice);
        assert_eq!(once_bytes, twice_bytes);
        assert_eq!(normalize_snapshot(&once), once);
    }

    #[test]
    fn test_legacy_field_names_are_read() {
        let legacy = br#"{"userID": "u1", "lastWorkoutIndex": -1, "lastWorkoutDate": null,
            "fullWorkouts": [{"id": "d", "workoutName": "Legs", "exercises": [
                {"id": "x", "exerciseName": "Squat", "reps": "5x5", "weight": 100, "history": []}
            ]}]}"#;
        let data = parse_snapshot(legacy).unwrap();
        assert_eq!(data.user_id, "u1");
        assert_eq!(data.days[0].name, "Legs");
        assert_eq!(data.days[0].exercises[0].name, "Squat");
        assert_eq!(data.days[0].exercises[0].target_reps, "5x5");
    }

    #[test]
    fn test_starting_weight_backfilled_from_history() {
        let blob = br#"{"days": [{"id": "d", "name": "A", "exercises": [
            {"id": "x", "name": "Row", "targetReps": "3x8", "weight": 65,
             "history": [{"date": "2025-01-01T10:00:00Z", "weight": 60, "reps": "3x8"}]}
        ]}]}"#;
        let data = parse_snapshot(blob).unwrap();
        assert_eq!(data.days[0].exercises[0].starting_weight, 60.0);
    }

    #[test]
    fn test_starting_weight_backfilled_from_weight() {
        let blob = br#"{"days": [{"id": "d", "name": "A", "exercises": [
            {"id": "x", "name": "Row", "targetReps": "3x8", "weight": 65}
        ]}]}"#;
        let ex = &parse_snapshot(blob).unwrap().days[0].exercises[0];
        assert_eq!(ex.starting_weight, 65.0);
        assert!(ex.history.is_empty());
    }

    #[test]
    fn test_existing_starting_weight_kept() {
        let blob = br#"{"days": [{"id": "d", "name": "A", "exercises": [
            {"id": "x", "name": "Row", "targetReps": "3x8", "weight": 65, "startingWeight": 50,
             "history": [{"date": "2025-01-01T10:00:00Z", "weight": 60, "reps": "3x8"}]}
        ]}]}"#;
        assert_eq!(parse_snapshot(blob).unwrap().days[0].exercises[0].starting_weight, 50.0);
    }

    #[test]
    fn test_malformed_history_becomes_empty() {
        let blob = br#"{"days": [{"id": "d", "name": "A", "exercises": [
            {"id": "x", "name": "Row", "weight": 65, "history": {"not": "a list"}}
        ]}]}"#;
        assert!(parse_snapshot(blob).unwrap().days[0].exercises[0].history.is_empty());
    }

    #[test]
    fn test_unreadable_entries_dropped_in_order() {
        let blob = br#"{"days": [{"id": "d", "name": "A", "exercises": [
            {"id": "x", "name": "Row", "weight": 65, "history": [
                {"date": "2025-01-01T10:00:00Z", "weight": 60, "repsCompleted": 8},
                {"date": "yesterday", "weight": 61},
                {"date": "2025-01-03T10:00:00Z", "weight": "62.5", "reps": "3x8"}
            ]}
        ]}]}"#;
        let history = &parse_snapshot(blob).unwrap().days[0].exercises[0].history;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].reps, "8");
        assert_eq!(history[1].weight, 62.5);
    }

    #[test]
    fn test_out_of_range_index_reset() {
        let blob = br#"{"lastWorkoutIndex": 5, "days": [{"id": "d", "name": "A", "exercises": []}]}"#;
        assert_eq!(parse_snapshot(blob).unwrap().last_workout_index, NO_WORKOUT);
    }

    #[test]
    fn test_negative_weight_clamped() {
        let blob = br#"{"days": [{"id": "d", "name": "A", "exercises": [
            {"id": "x", "name": "Row", "weight": -5}
        ]}]}"#;
        assert_eq!(parse_snapshot(blob).unwrap().days[0].exercises[0].weight, 0.0);
    }

    #[test]
    fn test_duplicate_ids_replaced() {
        let blob = br#"{"days": [
            {"id": "d", "name": "A", "exercises": []},
            {"id": "d", "name": "B", "exercises": []}
        ]}"#;
        let data = parse_snapshot(blob).unwrap();
        assert_eq!(data.days[0].id, "d");
        assert_ne!(data.days[1].id, "d");
    }
}
