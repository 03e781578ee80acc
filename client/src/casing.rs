// Copyright 2025 Dagbox Contributors
// SPDX-License-Identifier: Apache-2.0, MIT

use serde_json::{Map, Value};

/// Recursively rewrites object keys to snake_case.
///
/// The node reports PascalCase keys (`Hash`, `AgentVersion`); records handed
/// to callers use one casing convention throughout. Normalizing an
/// already-normalized value is a no-op.
pub fn normalize_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut normalized = Map::with_capacity(map.len());
            for (key, inner) in map {
                normalized.insert(snake_case(&key), normalize_keys(inner));
            }
            Value::Object(normalized)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(normalize_keys).collect()),
        other => other,
    }
}

fn snake_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 2);
    let mut prev_lower = false;
    for ch in key.chars() {
        if ch.is_uppercase() {
            if prev_lower {
                out.push('_');
            }
            out.extend(ch.to_lowercase());
            prev_lower = false;
        } else {
            prev_lower = ch.is_lowercase() || ch.is_ascii_digit();
            out.push(ch);
        }
    }
    out
}
