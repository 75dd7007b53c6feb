//! Property-based test generators using proptest.
//!
//! Strategies produce rows that satisfy the store's requirements (object
//! rows, key fields present) while colliding on compound keys often enough
//! to exercise replacement.

use gmpq_store::Row;
use proptest::prelude::*;
use serde_json::json;

use crate::fixtures::row;

/// Strategy for user ids drawn from a small pool.
pub fn user_id_strategy() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["u1", "u2", "u3"]).prop_map(str::to_string)
}

/// Strategy for bounded score or time histories.
pub fn history_strategy() -> impl Strategy<Value = Vec<i64>> {
    prop::collection::vec(0i64..1000, 0..=3)
}

/// Strategy for `level_4` rows with small module numbers, so compound keys
/// repeat.
pub fn level_4_row_strategy() -> impl Strategy<Value = Row> {
    (
        user_id_strategy(),
        1i64..4,
        0i64..100,
        history_strategy(),
        any::<bool>(),
    )
        .prop_map(|(user_id, module, score, history, completed)| {
            row(json!({
                "user_id": user_id,
                "module": module,
                "score": score,
                "score_history": history,
                "is_completed": completed,
            }))
        })
}

/// Strategy for `level3_progress` rows.
pub fn level3_row_strategy() -> impl Strategy<Value = Row> {
    (
        user_id_strategy(),
        1i64..3,
        1i64..4,
        0i64..3,
        history_strategy(),
        history_strategy(),
    )
        .prop_map(|(user_id, module, level, scenario, scores, times)| {
            row(json!({
                "user_id": user_id,
                "module": module,
                "level": level,
                "scenario_index": scenario,
                "current_score": scores.last().copied().unwrap_or(0),
                "score_history": scores,
                "time_history": times,
            }))
        })
}

/// Strategy for batches of `level_4` rows.
pub fn level_4_batch_strategy(max: usize) -> impl Strategy<Value = Vec<Row>> {
    prop::collection::vec(level_4_row_strategy(), 0..=max)
}
