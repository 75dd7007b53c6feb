//! The five mirrored progress collections.
//!
//! Fields mirror the remote columns. History arrays are bounded by the
//! server and copied verbatim here; blobs such as board layouts stay opaque
//! JSON. Columns this crate does not model are kept in `extra` so a typed
//! round trip never drops them.
//!
//! Non-key columns are nullable remotely: a `null` reads as the field's
//! default, and history entries accept any JSON number.

use crate::schema::{Row, RowId, Syncable};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Number, Value};

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Completion state of one level within a module.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LevelProgress {
    /// Primary key, absent until the row is stored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RowId>,
    /// Owner.
    pub user_id: String,
    /// Module the level belongs to.
    pub module_id: i64,
    /// Level within the module.
    pub level_id: i64,
    /// Whether the level was completed.
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_completed: bool,
    /// Completion timestamp (ISO 8601).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
    /// Creation timestamp (ISO 8601).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    /// Last update timestamp (ISO 8601).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    /// Unmodelled columns.
    #[serde(flatten)]
    pub extra: Row,
}

impl Syncable for LevelProgress {
    const TABLE: &'static str = "level_progress";
    const CONFLICT_KEYS: &'static [&'static str] = &["user_id", "module_id", "level_id"];

    fn user_id(&self) -> &str {
        &self.user_id
    }
}

/// One bingo/memory session (level 1).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Level1Session {
    /// Primary key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RowId>,
    /// Owner.
    pub user_id: String,
    /// Module number.
    pub module_number: i64,
    /// Level number.
    pub level_number: i64,
    /// Game session identifier.
    pub session_id: String,
    /// Latest score.
    #[serde(default, deserialize_with = "null_as_default")]
    pub score: i64,
    /// Recent scores, newest last.
    #[serde(default, deserialize_with = "null_as_default")]
    pub score_history: Vec<Number>,
    /// Recent completion times in seconds, newest last.
    #[serde(default, deserialize_with = "null_as_default")]
    pub timer_history: Vec<Number>,
    /// Board layout.
    #[serde(default, deserialize_with = "null_as_default")]
    pub board_state: Value,
    /// Whether the session was completed.
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_completed: bool,
    /// Creation timestamp (ISO 8601).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    /// Last update timestamp (ISO 8601).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    /// Unmodelled columns.
    #[serde(flatten)]
    pub extra: Row,
}

impl Syncable for Level1Session {
    const TABLE: &'static str = "level_1";
    const CONFLICT_KEYS: &'static [&'static str] =
        &["user_id", "module_number", "level_number", "session_id"];

    fn user_id(&self) -> &str {
        &self.user_id
    }
}

/// Sorting game state (level 2).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Level2GameData {
    /// Primary key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RowId>,
    /// Owner.
    pub user_id: String,
    /// Module identifier.
    pub module_id: i64,
    /// Level number.
    pub level_number: i64,
    /// Latest score.
    #[serde(default, deserialize_with = "null_as_default")]
    pub score: i64,
    /// Latest completion time in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<Number>,
    /// Terms placed into categories.
    #[serde(default, deserialize_with = "null_as_default")]
    pub placed_terms: Value,
    /// Recent scores, newest last.
    #[serde(default, deserialize_with = "null_as_default")]
    pub score_history: Vec<Number>,
    /// Recent times, newest last.
    #[serde(default, deserialize_with = "null_as_default")]
    pub time_history: Vec<Number>,
    /// Whether the level was completed.
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_completed: bool,
    /// Creation timestamp (ISO 8601).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    /// Last update timestamp (ISO 8601).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    /// Unmodelled columns.
    #[serde(flatten)]
    pub extra: Row,
}

impl Syncable for Level2GameData {
    const TABLE: &'static str = "level2_game_data";
    const CONFLICT_KEYS: &'static [&'static str] = &["user_id", "module_id", "level_number"];

    fn user_id(&self) -> &str {
        &self.user_id
    }
}

/// Jigsaw scenario progress (level 3).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Level3Progress {
    /// Primary key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RowId>,
    /// Owner.
    pub user_id: String,
    /// Module number.
    pub module: i64,
    /// Level number.
    pub level: i64,
    /// Scenario within the level.
    pub scenario_index: i64,
    /// Latest score.
    #[serde(default, deserialize_with = "null_as_default")]
    pub current_score: i64,
    /// Latest completion time in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_taken: Option<Number>,
    /// Last three scores, newest last.
    #[serde(default, deserialize_with = "null_as_default")]
    pub score_history: Vec<Number>,
    /// Last three times, newest last.
    #[serde(default, deserialize_with = "null_as_default")]
    pub time_history: Vec<Number>,
    /// Puzzle pieces placed so far.
    #[serde(default, deserialize_with = "null_as_default")]
    pub placed_pieces: Value,
    /// Number of attempts at this scenario.
    #[serde(default, deserialize_with = "null_as_default")]
    pub total_attempts: i64,
    /// Whether the scenario was completed.
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_completed: bool,
    /// Creation timestamp (ISO 8601).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    /// Last update timestamp (ISO 8601).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    /// Unmodelled columns.
    #[serde(flatten)]
    pub extra: Row,
}

impl Syncable for Level3Progress {
    const TABLE: &'static str = "level3_progress";
    const CONFLICT_KEYS: &'static [&'static str] =
        &["user_id", "module", "level", "scenario_index"];

    fn user_id(&self) -> &str {
        &self.user_id
    }
}

/// Detective/deviation-analysis progress (level 4).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Level4Progress {
    /// Primary key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RowId>,
    /// Owner.
    pub user_id: String,
    /// Module number.
    pub module: i64,
    /// Latest score.
    #[serde(default, deserialize_with = "null_as_default")]
    pub score: i64,
    /// Recent scores, newest last.
    #[serde(default, deserialize_with = "null_as_default")]
    pub score_history: Vec<Number>,
    /// Recent times, newest last.
    #[serde(default, deserialize_with = "null_as_default")]
    pub time_history: Vec<Number>,
    /// Case answers.
    #[serde(default, deserialize_with = "null_as_default")]
    pub cases: Value,
    /// Whether the module's cases were completed.
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_completed: bool,
    /// Creation timestamp (ISO 8601).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    /// Last update timestamp (ISO 8601).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    /// Unmodelled columns.
    #[serde(flatten)]
    pub extra: Row,
}

impl Syncable for Level4Progress {
    const TABLE: &'static str = "level_4";
    const CONFLICT_KEYS: &'static [&'static str] = &["user_id", "module"];

    fn user_id(&self) -> &str {
        &self.user_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_columns_survive_round_trip() {
        let raw = json!({
            "id": 12,
            "user_id": "u1",
            "module": 1,
            "level": 2,
            "scenario_index": 0,
            "current_score": 80,
            "time_taken": 41,
            "score_history": [60, 70, 80],
            "time_history": [50, 45, 41],
            "placed_pieces": {"a": 1},
            "total_attempts": 3,
            "is_completed": true,
            "best_streak": 4
        });
        let row = match raw.clone() {
            Value::Object(map) => map,
            _ => unreachable!(),
        };

        let record = Level3Progress::from_row(&row).unwrap();
        assert_eq!(record.id, Some(RowId::Int(12)));
        assert_eq!(record.extra.get("best_streak"), Some(&json!(4)));

        let back = record.to_row().unwrap();
        assert_eq!(Value::Object(back), raw);
    }

    #[test]
    fn missing_key_field_is_rejected() {
        let row = match json!({"user_id": "u1", "score": 3}) {
            Value::Object(map) => map,
            _ => unreachable!(),
        };
        let err = Level4Progress::from_row(&row).unwrap_err();
        assert!(err.to_string().contains("level_4"));
    }

    #[test]
    fn null_columns_read_as_defaults() {
        let row = match json!({
            "id": 1,
            "user_id": "u1",
            "module": 1,
            "score": null,
            "score_history": null,
            "time_history": [41.5, 38],
            "cases": null,
            "is_completed": null
        }) {
            Value::Object(map) => map,
            _ => unreachable!(),
        };

        let record = Level4Progress::from_row(&row).unwrap();
        assert_eq!(record.score, 0);
        assert!(record.score_history.is_empty());
        assert_eq!(record.time_history[0].as_f64(), Some(41.5));
        assert_eq!(record.time_history[1].as_i64(), Some(38));
        assert!(!record.is_completed);
    }

    #[test]
    fn fractional_times_are_accepted() {
        let row = match json!({
            "user_id": "u1",
            "module": 1,
            "level": 1,
            "scenario_index": 2,
            "time_taken": 41.5,
            "time_history": [41.5]
        }) {
            Value::Object(map) => map,
            _ => unreachable!(),
        };

        let record = Level3Progress::from_row(&row).unwrap();
        assert_eq!(record.time_taken.and_then(|t| t.as_f64()), Some(41.5));
    }

    #[test]
    fn defaults_fill_optional_columns() {
        let row = match json!({"user_id": "u1", "module_id": 1, "level_id": 3}) {
            Value::Object(map) => map,
            _ => unreachable!(),
        };
        let record = LevelProgress::from_row(&row).unwrap();
        assert!(!record.is_completed);
        assert!(record.id.is_none());
        assert_eq!(record.user_id(), "u1");
    }
}
