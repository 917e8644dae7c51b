//! Audit trail of resolved placeholders.
//!
//! A [`ResolutionContext`] only records. Resolution never reads back from it;
//! two files agree on a token's value because resolution is a pure function
//! of the token and the resolver's "now".

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Token → resolved value.
pub type PlaceholderValues = BTreeMap<String, String>;

/// A placeholder that matched the grammar but failed to evaluate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionFailure {
    /// Token text without the `<<>>` wrapper.
    pub token: String,
    /// Source file the token came from, if scoped.
    pub scope: Option<String>,
    /// Rendered error.
    pub message: String,
}

/// Accumulates resolved placeholder values for one batch of files.
///
/// Values recorded with a scope are grouped per source file; values recorded
/// without one land in a flat map. Later records for the same `(token, scope)`
/// overwrite earlier ones.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionContext {
    scoped: BTreeMap<String, PlaceholderValues>,
    unscoped: PlaceholderValues,
    failures: Vec<ResolutionFailure>,
}

impl ResolutionContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `token` resolved to `value`.
    pub fn record(&mut self, token: &str, value: &str, scope: Option<&str>) {
        let values = match scope {
            Some(scope) => self.scoped.entry(scope.to_string()).or_default(),
            None => &mut self.unscoped,
        };
        values.insert(token.to_string(), value.to_string());
    }

    /// Record a token whose evaluation failed and was left in place.
    pub fn record_failure(&mut self, token: &str, message: impl Into<String>, scope: Option<&str>) {
        self.failures.push(ResolutionFailure {
            token: token.to_string(),
            scope: scope.map(str::to_string),
            message: message.into(),
        });
    }

    /// Scope → token → value for every scoped record.
    #[must_use]
    pub fn export(&self) -> BTreeMap<String, PlaceholderValues> {
        self.scoped.clone()
    }

    /// Records made without a scope.
    #[must_use]
    pub const fn unscoped(&self) -> &PlaceholderValues {
        &self.unscoped
    }

    /// Records for one source file.
    #[must_use]
    pub fn for_scope(&self, scope: &str) -> Option<&PlaceholderValues> {
        self.scoped.get(scope)
    }

    /// Failures in the order they happened.
    #[must_use]
    pub fn failures(&self) -> &[ResolutionFailure] {
        &self.failures
    }

    /// True when nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scoped.is_empty() && self.unscoped.is_empty() && self.failures.is_empty()
    }

    /// Fold another context into this one. Entries from `other` win.
    pub fn merge(&mut self, other: Self) {
        for (scope, values) in other.scoped {
            self.scoped.entry(scope).or_default().extend(values);
        }
        self.unscoped.extend(other.unscoped);
        self.failures.extend(other.failures);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_are_grouped_by_scope() {
        let mut ctx = ResolutionContext::new();
        ctx.record("DATE_AGE_75", "19500615", Some("a.json"));
        ctx.record("DATE_DAY_1", "20250616", Some("b.json"));
        ctx.record("DATE_AGE_75", "19500615", Some("b.json"));

        let export = ctx.export();
        assert_eq!(export.len(), 2);
        assert_eq!(export["a.json"]["DATE_AGE_75"], "19500615");
        assert_eq!(export["b.json"].len(), 2);
        assert!(ctx.unscoped().is_empty());
    }

    #[test]
    fn later_record_overwrites() {
        let mut ctx = ResolutionContext::new();
        ctx.record("T", "1", None);
        ctx.record("T", "2", None);
        assert_eq!(ctx.unscoped()["T"], "2");
    }

    #[test]
    fn failures_are_kept_in_order() {
        let mut ctx = ResolutionContext::new();
        ctx.record_failure("DATE_DAY_x", "bad", Some("a.json"));
        ctx.record_failure("DATE_AGE_y", "bad", None);
        assert_eq!(ctx.failures().len(), 2);
        assert_eq!(ctx.failures()[0].scope.as_deref(), Some("a.json"));
        assert!(!ctx.is_empty());
    }

    #[test]
    fn merge_combines_scopes() {
        let mut left = ResolutionContext::new();
        left.record("A", "1", Some("f.json"));
        let mut right = ResolutionContext::new();
        right.record("B", "2", Some("f.json"));
        right.record("C", "3", None);
        left.merge(right);
        assert_eq!(left.for_scope("f.json").map(BTreeMap::len), Some(2));
        assert_eq!(left.unscoped()["C"], "3");
    }
}
