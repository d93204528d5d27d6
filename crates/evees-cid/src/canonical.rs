//! Canonical form of a [`Value`].
//!
//! Map keys are sorted in ascending byte order at every level; array order is
//! preserved. The result is what gets encoded and hashed, so two objects that
//! differ only in key insertion order always share an id.

use crate::value::Value;

/// Return the canonical form of `value`. The input is never mutated.
///
/// When a map repeats a key the last occurrence wins, the same way a later
/// assignment overwrites an earlier one.
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        Value::Map(entries) => {
            let mut sorted: Vec<(String, Value)> = entries
                .iter()
                .map(|(k, v)| (k.clone(), canonicalize(v)))
                .collect();
            // Stable, so repeated keys keep their relative order.
            sorted.sort_by(|(a, _), (b, _)| a.cmp(b));

            let mut canonical: Vec<(String, Value)> = Vec::with_capacity(sorted.len());
            for (key, v) in sorted {
                match canonical.last_mut() {
                    Some((prev, slot)) if *prev == key => *slot = v,
                    _ => canonical.push((key, v)),
                }
            }
            Value::Map(canonical)
        }
        other => other.clone(),
    }
}

/// Whether `value` is already in canonical form.
pub fn is_canonical(value: &Value) -> bool {
    match value {
        Value::Array(items) => items.iter().all(is_canonical),
        Value::Map(entries) => {
            entries.windows(2).all(|pair| pair[0].0 < pair[1].0)
                && entries.iter().all(|(_, v)| is_canonical(v))
        }
        _ => true,
    }
}
