//! Assertion helpers for fixture and response checks.

use esp_fixtures::{DEFAULT_MASKED_KEYS, ResolutionContext, mask};
use serde_json::Value;

// ─────────────────────────────────────────────────────────────────────────────
// Response Assertions
// ─────────────────────────────────────────────────────────────────────────────

/// Assert two response bodies are equal once volatile fields are masked.
///
/// # Panics
///
/// Panics with both pretty-printed documents when they differ.
pub fn assert_masked_eq(actual: &Value, expected: &Value) {
    let actual = mask(actual.clone(), &DEFAULT_MASKED_KEYS);
    let expected = mask(expected.clone(), &DEFAULT_MASKED_KEYS);
    assert!(
        actual == expected,
        "Masked responses differ.\n--- actual ---\n{}\n--- expected ---\n{}",
        pretty(&actual),
        pretty(&expected)
    );
}

/// Assert a dotted path exists in a JSON document. Numeric segments index
/// arrays.
///
/// # Panics
///
/// Panics if any segment is missing.
pub fn assert_json_has(value: &Value, path: &str) {
    if let Err(missing) = lookup(value, path) {
        panic!("Missing field '{missing}' in path '{path}'. JSON: {value}");
    }
}

/// Assert a dotted path holds `expected`.
///
/// # Panics
///
/// Panics if the path is missing or holds a different value.
pub fn assert_json_eq(value: &Value, path: &str, expected: &Value) {
    match lookup(value, path) {
        Ok(actual) => assert_eq!(
            actual, expected,
            "Expected '{path}' to equal {expected} but got {actual}"
        ),
        Err(missing) => panic!("Missing field '{missing}' in path '{path}'. JSON: {value}"),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Placeholder Assertions
// ─────────────────────────────────────────────────────────────────────────────

/// Assert no date placeholder survived resolution anywhere in `value`.
///
/// # Panics
///
/// Panics naming the first leftover `<<DATE_...>>` / `<<RDATE_...>>`.
pub fn assert_fully_resolved(value: &Value) {
    if let Some(leftover) = find_date_placeholder(value) {
        panic!("Unresolved placeholder '{leftover}' in {value}");
    }
}

/// Assert a resolution pass recorded no failures.
///
/// # Panics
///
/// Panics listing every failure.
pub fn assert_no_resolution_failures(context: &ResolutionContext) {
    assert!(
        context.failures().is_empty(),
        "Expected no placeholder failures but found: {:?}",
        context.failures()
    );
}

fn lookup<'a>(value: &'a Value, path: &'a str) -> Result<&'a Value, &'a str> {
    path.split('.').try_fold(value, |current, part| {
        let next = match current {
            Value::Array(items) => part.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => current.get(part),
        };
        next.ok_or(part)
    })
}

fn find_date_placeholder(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => ["<<DATE_", "<<RDATE_"]
            .iter()
            .find_map(|marker| s.find(marker).map(|start| s[start..].to_string())),
        Value::Array(items) => items.iter().find_map(find_date_placeholder),
        Value::Object(map) => map.values().find_map(find_date_placeholder),
        _ => None,
    }
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
