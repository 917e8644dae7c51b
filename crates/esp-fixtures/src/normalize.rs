//! Masking of volatile response fields before comparison.

use serde_json::Value;

/// Value written in place of every masked field.
pub const MASK_SENTINEL: &str = "<ignored>";

/// Keys masked by default when comparing API responses.
pub const DEFAULT_MASKED_KEYS: [&str; 3] = ["responseId", "lastUpdated", "id"];

/// Replace the value of every object key found in `keys_to_mask` with
/// [`MASK_SENTINEL`], at any depth.
///
/// A masked key's whole subtree is replaced. Applying the mask twice gives the
/// same document as applying it once.
#[must_use]
pub fn mask<S: AsRef<str>>(document: Value, keys_to_mask: &[S]) -> Value {
    match document {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, value)| {
                    let value = if is_masked(&key, keys_to_mask) {
                        Value::String(MASK_SENTINEL.to_string())
                    } else {
                        mask(value, keys_to_mask)
                    };
                    (key, value)
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|item| mask(item, keys_to_mask))
                .collect(),
        ),
        other => other,
    }
}

/// [`mask`] with [`DEFAULT_MASKED_KEYS`].
#[must_use]
pub fn mask_default(document: Value) -> Value {
    mask(document, &DEFAULT_MASKED_KEYS)
}

fn is_masked<S: AsRef<str>>(key: &str, keys_to_mask: &[S]) -> bool {
    keys_to_mask.iter().any(|k| k.as_ref() == key)
}
