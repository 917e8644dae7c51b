//! Structured JSONL logs for scenario runs.

use std::fmt;
use std::io::{self, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Summary of assertions for a phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionsSummary {
    pub passed: u32,
    pub failed: u32,
}

impl AssertionsSummary {
    #[must_use]
    pub const fn new(passed: u32, failed: u32) -> Self {
        Self { passed, failed }
    }

    /// Count one assertion.
    pub const fn record(&mut self, ok: bool) {
        if ok {
            self.passed += 1;
        } else {
            self.failed += 1;
        }
    }

    #[must_use]
    pub const fn all_passed(&self) -> bool {
        self.failed == 0
    }
}

/// Scenario phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Setup,
    Execute,
    Verify,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Setup => "setup",
            Self::Execute => "execute",
            Self::Verify => "verify",
        };
        f.write_str(name)
    }
}

/// Phase result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Pass,
    Fail,
}

impl Outcome {
    #[must_use]
    pub const fn from_passed(passed: bool) -> Self {
        if passed { Self::Pass } else { Self::Fail }
    }
}

/// Structured log entry for one scenario phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct E2eLogEntry {
    /// RFC3339 timestamp (UTC).
    pub timestamp: DateTime<Utc>,
    /// info for passing phases, error for failing ones.
    pub level: String,
    /// `<file> - <scenario name>`.
    pub test_name: String,
    pub module: String,
    pub phase: Phase,
    /// Shared by every phase of one scenario run.
    pub correlation_id: String,
    pub result: Outcome,
    pub duration_ms: u64,
    pub assertions: AssertionsSummary,
    /// Phase-specific fields; secret values are redacted.
    #[serde(default)]
    pub context: Value,
}

impl E2eLogEntry {
    #[must_use]
    pub fn new(
        test_name: impl Into<String>,
        phase: Phase,
        correlation_id: impl Into<String>,
        result: Outcome,
        duration_ms: u64,
        assertions: AssertionsSummary,
        context: &Value,
    ) -> Self {
        let level = match result {
            Outcome::Pass => "info",
            Outcome::Fail => "error",
        };
        Self {
            timestamp: Utc::now(),
            level: level.to_string(),
            test_name: test_name.into(),
            module: "esp-e2e".to_string(),
            phase,
            correlation_id: correlation_id.into(),
            result,
            duration_ms,
            assertions,
            context: redact_secrets(context),
        }
    }
}

/// Collects the entries of a whole suite run for writing out.
#[derive(Debug, Default)]
pub struct E2eLogger {
    entries: Vec<E2eLogEntry>,
}

impl E2eLogger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, entries: impl IntoIterator<Item = E2eLogEntry>) {
        self.entries.extend(entries);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write every entry as a JSON line, replacing the file.
    pub fn write_json_lines<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let mut file = std::fs::File::create(path)?;
        for entry in &self.entries {
            let line = serde_json::to_string(entry)
                .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err.to_string()))?;
            writeln!(file, "{line}")?;
        }
        Ok(())
    }
}

fn redact_secrets(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, val)| {
                    let val = if should_redact_key(key) {
                        Value::String("redacted".to_string())
                    } else {
                        redact_secrets(val)
                    };
                    (key.clone(), val)
                })
                .collect(),
        ),
        Value::Array(values) => Value::Array(values.iter().map(redact_secrets).collect()),
        other => other.clone(),
    }
}

// Hashing secrets, client key material and credentials. `secret_version`
// only names which secret was used and stays readable.
fn should_redact_key(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    if key.ends_with("_version") {
        return false;
    }
    ["secret", "private_key", "key_pem", "password", "authorization"]
        .iter()
        .any(|marker| key.contains(marker))
}
