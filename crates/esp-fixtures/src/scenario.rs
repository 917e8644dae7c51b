//! Scenario fixture loading.
//!
//! A scenario directory holds one JSON file per test case. Each file carries a
//! `data` section (seed records for the backing store, with placeholders) and
//! request metadata. Files are processed in lexicographic filename order and
//! share one [`ResolutionContext`] per directory scan.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::context::{PlaceholderValues, ResolutionContext};
use crate::error::{FixtureError, FixtureResult};
use crate::normalize::mask;
use crate::placeholder::PlaceholderResolver;

/// Identifier returned when a scenario has no identifier field.
pub const IDENTIFIER_UNKNOWN: &str = "UNKNOWN";

/// Default identifier field, matched ignoring case and underscores.
pub const DEFAULT_IDENTIFIER_KEY: &str = "NHS_NUMBER";

/// HTTP status assumed when a scenario does not name one.
pub const DEFAULT_EXPECTED_STATUS: u16 = 200;

/// How the record identifier is stored in the backing data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SecretVersion {
    /// Hashed with the current secret.
    #[serde(rename = "AWSCURRENT")]
    Current,
    /// Hashed with the previous secret.
    #[serde(rename = "AWSPREVIOUS")]
    Previous,
    /// Stored as-is.
    #[serde(rename = "PLAINTEXT")]
    Plaintext,
}

impl SecretVersion {
    /// Secret stage label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Current => "AWSCURRENT",
            Self::Previous => "AWSPREVIOUS",
            Self::Plaintext => "PLAINTEXT",
        }
    }
}

impl fmt::Display for SecretVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// On-disk shape of a scenario file.
#[derive(Debug, Deserialize)]
struct ScenarioFile {
    #[serde(default)]
    scenario_name: Option<String>,
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    config_filenames: Option<Vec<String>>,
    #[serde(default)]
    request_headers: Option<BTreeMap<String, String>>,
    #[serde(default)]
    query_params: Option<BTreeMap<String, String>>,
    #[serde(default)]
    expected_response_code: Option<u16>,
    #[serde(default)]
    secret_version: Option<SecretVersion>,
}

/// One fixture file, fully resolved.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioRecord {
    pub filename: String,
    pub scenario_name: Option<String>,
    /// Resolved `data` section.
    pub data: Value,
    /// Identifier extracted from `data`, or [`IDENTIFIER_UNKNOWN`].
    pub identifier: String,
    pub config_filenames: Vec<String>,
    pub request_headers: BTreeMap<String, String>,
    pub query_params: BTreeMap<String, String>,
    pub expected_response_code: Option<u16>,
    pub secret_version: Option<SecretVersion>,
    /// Placeholders resolved while loading this file.
    pub placeholders: PlaceholderValues,
}

impl ScenarioRecord {
    /// Status the API should answer with.
    #[must_use]
    pub fn expected_status(&self) -> u16 {
        self.expected_response_code
            .unwrap_or(DEFAULT_EXPECTED_STATUS)
    }

    /// Seed items for the data store: the elements of `data` when it is an
    /// array, otherwise `data` itself.
    #[must_use]
    pub fn seed_items(&self) -> Vec<Value> {
        match &self.data {
            Value::Array(items) => items.clone(),
            Value::Null => Vec::new(),
            other => vec![other.clone()],
        }
    }

    /// Test display name: `<file> - <scenario name>`.
    #[must_use]
    pub fn display_name(&self) -> String {
        format!(
            "{} - {}",
            self.filename,
            self.scenario_name.as_deref().unwrap_or("No Scenario")
        )
    }
}

/// Every scenario in a directory plus the shared placeholder trail.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScenarioSet {
    pub scenarios: BTreeMap<String, ScenarioRecord>,
    pub context: ResolutionContext,
}

impl ScenarioSet {
    /// Scenarios in filename order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &ScenarioRecord)> {
        self.scenarios.iter()
    }

    #[must_use]
    pub fn get(&self, filename: &str) -> Option<&ScenarioRecord> {
        self.scenarios.get(filename)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.scenarios.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }

    #[must_use]
    pub fn filenames(&self) -> Vec<&str> {
        self.scenarios.keys().map(String::as_str).collect()
    }
}

/// Resolved and masked expected response bodies keyed by filename.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExpectedResponses {
    pub responses: BTreeMap<String, Value>,
    pub context: ResolutionContext,
}

impl ExpectedResponses {
    #[must_use]
    pub fn get(&self, filename: &str) -> Option<&Value> {
        self.responses.get(filename)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.responses.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.responses.is_empty()
    }
}

/// Loads scenario and expected-response directories.
#[derive(Debug, Clone)]
pub struct ScenarioLoader {
    resolver: PlaceholderResolver,
    extension: String,
    identifier_key: String,
}

impl ScenarioLoader {
    #[must_use]
    pub fn new(resolver: PlaceholderResolver) -> Self {
        Self {
            resolver,
            extension: "json".to_string(),
            identifier_key: DEFAULT_IDENTIFIER_KEY.to_string(),
        }
    }

    /// Use a different fixture file extension (without the dot).
    #[must_use]
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    /// Use a different identifier field name.
    #[must_use]
    pub fn with_identifier_key(mut self, key: impl Into<String>) -> Self {
        self.identifier_key = key.into();
        self
    }

    #[must_use]
    pub const fn resolver(&self) -> &PlaceholderResolver {
        &self.resolver
    }

    #[must_use]
    pub fn identifier_key(&self) -> &str {
        &self.identifier_key
    }

    /// Load every scenario file in `dir`.
    pub fn load_directory(&self, dir: impl AsRef<Path>) -> FixtureResult<ScenarioSet> {
        let dir = dir.as_ref();
        let mut set = ScenarioSet::default();

        for path in list_fixture_files(dir, &self.extension)? {
            let record = self.load_file(&path, &mut set.context)?;
            set.scenarios.insert(record.filename.clone(), record);
        }

        info!(
            dir = %dir.display(),
            scenarios = set.len(),
            failures = set.context.failures().len(),
            "loaded scenario directory"
        );
        Ok(set)
    }

    /// Load a single scenario file, recording placeholders into `context`
    /// under the file's name.
    pub fn load_file(
        &self,
        path: &Path,
        context: &mut ResolutionContext,
    ) -> FixtureResult<ScenarioRecord> {
        let filename = file_name(path);
        let raw: ScenarioFile = serde_json::from_value(read_json(path)?)
            .map_err(|err| FixtureError::json(path, err))?;

        let data = raw.data.ok_or_else(|| FixtureError::Malformed {
            path: path.to_path_buf(),
            reason: "missing 'data' section".to_string(),
        })?;

        let data = self
            .resolver
            .resolve_value(data, Some(&mut *context), Some(&filename));
        let identifier = extract_identifier(&data, &self.identifier_key).unwrap_or_else(|| {
            warn!(file = %filename, key = %self.identifier_key, "no identifier in scenario data");
            IDENTIFIER_UNKNOWN.to_string()
        });
        debug!(file = %filename, identifier = %identifier, "resolved scenario");

        Ok(ScenarioRecord {
            placeholders: context.for_scope(&filename).cloned().unwrap_or_default(),
            filename,
            scenario_name: raw.scenario_name,
            data,
            identifier,
            config_filenames: raw.config_filenames.unwrap_or_default(),
            request_headers: raw.request_headers.unwrap_or_default(),
            query_params: raw.query_params.unwrap_or_default(),
            expected_response_code: raw.expected_response_code,
            secret_version: raw.secret_version,
        })
    }

    /// Load expected-response files: whole document resolved, then masked.
    pub fn load_expected_responses<S: AsRef<str>>(
        &self,
        dir: impl AsRef<Path>,
        keys_to_mask: &[S],
    ) -> FixtureResult<ExpectedResponses> {
        let dir = dir.as_ref();
        let mut expected = ExpectedResponses::default();

        for path in list_fixture_files(dir, &self.extension)? {
            let filename = file_name(&path);
            let document = read_json(&path)?;
            let resolved =
                self.resolver
                    .resolve_value(document, Some(&mut expected.context), Some(&filename));
            expected
                .responses
                .insert(filename, mask(resolved, keys_to_mask));
        }

        info!(
            dir = %dir.display(),
            responses = expected.len(),
            "loaded expected responses"
        );
        Ok(expected)
    }
}

/// Fixture files in `dir` with the given extension, sorted by filename.
pub fn list_fixture_files(dir: &Path, extension: &str) -> FixtureResult<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|err| FixtureError::io(dir, err))?;
    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|err| FixtureError::io(dir, err))?.path();
        let matches = path.is_file()
            && path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext == extension);
        if matches {
            files.push(path);
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// Value of the first identifier field found depth-first, or `None` when it
/// is empty or not a scalar.
///
/// Keys match ignoring ASCII case and underscores, so `NHS_NUMBER`,
/// `nhsNumber` and `nhs_number` are all the same field.
#[must_use]
pub fn extract_identifier(data: &Value, key: &str) -> Option<String> {
    let wanted = normalize_key(key);
    find_identifier(data, &wanted)
}

// The first matching key settles its object, even when its value is empty;
// only enclosing arrays move on to later items.
fn find_identifier(value: &Value, wanted: &str) -> Option<String> {
    match value {
        Value::Object(map) => {
            for (k, v) in map {
                if normalize_key(k) == wanted {
                    return identifier_text(v);
                }
                if let Some(found) = find_identifier(v, wanted) {
                    return Some(found);
                }
            }
            None
        }
        Value::Array(items) => items.iter().find_map(|item| find_identifier(item, wanted)),
        _ => None,
    }
}

fn identifier_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Apply `rewrite` to every identifier field value in `data`.
///
/// Returns the number of fields rewritten.
pub fn rewrite_identifier_fields<F>(data: &mut Value, key: &str, mut rewrite: F) -> usize
where
    F: FnMut(&str) -> String,
{
    let wanted = normalize_key(key);
    rewrite_in(data, &wanted, &mut rewrite)
}

fn rewrite_in<F>(value: &mut Value, wanted: &str, rewrite: &mut F) -> usize
where
    F: FnMut(&str) -> String,
{
    match value {
        Value::Object(map) => map
            .iter_mut()
            .map(|(k, v)| {
                if normalize_key(k) == wanted {
                    if let Some(current) = identifier_text(v) {
                        *v = Value::String(rewrite(&current));
                        return 1;
                    }
                }
                rewrite_in(v, wanted, rewrite)
            })
            .sum(),
        Value::Array(items) => items
            .iter_mut()
            .map(|item| rewrite_in(item, wanted, rewrite))
            .sum(),
        _ => 0,
    }
}

fn normalize_key(key: &str) -> String {
    key.chars()
        .filter(|c| *c != '_')
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn read_json(path: &Path) -> FixtureResult<Value> {
    let text = fs::read_to_string(path).map_err(|err| FixtureError::io(path, err))?;
    serde_json::from_str(&text).map_err(|err| FixtureError::json(path, err))
}
