//! Component payload helpers.
//!
//! Payloads are opaque [`serde_json::Value`]s. The only structure the core
//! relies on is the empty object used for missing data and the shallow merge
//! applied by component updates.

use serde_json::{Map, Value};

/// The payload of a component declared without data.
#[must_use]
pub fn empty() -> Value {
    Value::Object(Map::new())
}

/// Merges `update` into `current`.
///
/// When both are JSON objects the merge is shallow: top-level keys of
/// `update` overwrite those of `current`, other keys are kept. Any other
/// combination replaces `current` outright.
pub fn merge(current: &mut Value, update: Value) {
    match (current, update) {
        (Value::Object(current), Value::Object(update)) => {
            for (key, value) in update {
                current.insert(key, value);
            }
        }
        (current, update) => *current = update,
    }
}
