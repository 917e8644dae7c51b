//! Scenario execution: setup, execute, verify.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use esp_fixtures::{
    DEFAULT_IDENTIFIER_KEY, ExpectedResponses, ScenarioLoader, ScenarioRecord, ScenarioSet,
    mask_default,
};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::client::{ApiResponse, EligibilityApiClient, RequestOptions, ResponseBody};
use crate::config_sync::ConfigSync;
use crate::csv_log::{IdentifierLog, write_request_params};
use crate::error::E2eResult;
use crate::hashing::apply_secret_version;
use crate::logging::{AssertionsSummary, E2eLogEntry, Outcome, Phase};
use crate::secrets::SecretVersions;
use crate::store::DataStore;

/// Result of running one scenario.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioOutcome {
    pub filename: String,
    pub scenario_name: Option<String>,
    pub identifier: String,
    pub passed: bool,
    /// Status returned by the API, if the request was made.
    pub status_code: Option<u16>,
    /// First reason the scenario failed.
    pub mismatch: Option<String>,
    pub logs: Vec<E2eLogEntry>,
}

/// Outcomes for a whole suite, in filename order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SuiteReport {
    pub outcomes: Vec<ScenarioOutcome>,
}

impl SuiteReport {
    #[must_use]
    pub fn passed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.passed).count()
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.passed()
    }

    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.outcomes.iter().all(|o| o.passed)
    }

    /// Every log entry from every scenario.
    pub fn log_entries(&self) -> impl Iterator<Item = &E2eLogEntry> {
        self.outcomes.iter().flat_map(|o| o.logs.iter())
    }
}

/// Runs scenarios against the API with explicitly supplied collaborators.
pub struct ScenarioRunner {
    client: EligibilityApiClient,
    data_store: Arc<dyn DataStore>,
    config_sync: Option<(ConfigSync, PathBuf)>,
    secrets: Option<SecretVersions>,
    identifier_log: Option<IdentifierLog>,
    request_params: Option<PathBuf>,
    identifier_key: String,
    strict_ssl: bool,
}

impl std::fmt::Debug for ScenarioRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScenarioRunner")
            .field("client", &self.client)
            .field("config_sync", &self.config_sync)
            .field("secrets", &self.secrets)
            .field("request_params", &self.request_params)
            .field("identifier_key", &self.identifier_key)
            .field("strict_ssl", &self.strict_ssl)
            .finish_non_exhaustive()
    }
}

impl ScenarioRunner {
    #[must_use]
    pub fn new(client: EligibilityApiClient, data_store: Arc<dyn DataStore>) -> Self {
        Self {
            client,
            data_store,
            config_sync: None,
            secrets: None,
            identifier_log: None,
            request_params: None,
            identifier_key: DEFAULT_IDENTIFIER_KEY.to_string(),
            strict_ssl: false,
        }
    }

    /// Sync each scenario's configs from `config_dir` before seeding.
    #[must_use]
    pub fn with_config_sync(mut self, sync: ConfigSync, config_dir: impl Into<PathBuf>) -> Self {
        self.config_sync = Some((sync, config_dir.into()));
        self
    }

    /// Hashing secrets for scenarios with a secret version.
    #[must_use]
    pub fn with_secrets(mut self, secrets: SecretVersions) -> Self {
        self.secrets = Some(secrets);
        self
    }

    /// Record `filename,nhs_number` rows as scenarios are seeded.
    #[must_use]
    pub fn with_identifier_log(mut self, log: IdentifierLog) -> Self {
        self.identifier_log = Some(log);
        self
    }

    /// Record `NhsNumber,RequestHeaders` rows for the load generator as
    /// scenarios are seeded.
    #[must_use]
    pub fn with_request_params(mut self, path: impl Into<PathBuf>) -> Self {
        self.request_params = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_identifier_key(mut self, key: impl Into<String>) -> Self {
        self.identifier_key = key.into();
        self
    }

    #[must_use]
    pub const fn with_strict_ssl(mut self, strict_ssl: bool) -> Self {
        self.strict_ssl = strict_ssl;
        self
    }

    /// Run one scenario.
    ///
    /// Collaborator failures (config sync, seeding, transport) are returned
    /// as errors; status and body mismatches are reported in the outcome.
    #[instrument(skip_all, fields(file = %scenario.filename))]
    pub async fn run(
        &self,
        scenario: &ScenarioRecord,
        expected: Option<&Value>,
    ) -> E2eResult<ScenarioOutcome> {
        let test_name = scenario.display_name();
        let correlation_id = Uuid::new_v4().to_string();
        let mut logs = Vec::new();

        // Setup
        let started = Instant::now();
        let setup_context = self.setup(scenario).await?;
        logs.push(E2eLogEntry::new(
            &test_name,
            Phase::Setup,
            &correlation_id,
            Outcome::Pass,
            elapsed_ms(started),
            AssertionsSummary::default(),
            &setup_context,
        ));

        // Execute
        let started = Instant::now();
        let options = RequestOptions {
            strict_ssl: self.strict_ssl,
            raise_on_error: false,
        };
        let response = self
            .client
            .request(
                &scenario.identifier,
                &scenario.request_headers,
                &scenario.query_params,
                options,
            )
            .await?;
        logs.push(E2eLogEntry::new(
            &test_name,
            Phase::Execute,
            &correlation_id,
            Outcome::Pass,
            elapsed_ms(started),
            AssertionsSummary::default(),
            &json!({
                "url": self.client.url_for(&scenario.identifier),
                "status_code": response.status_code,
            }),
        ));

        // Verify
        let started = Instant::now();
        let (assertions, mismatch) = verify(scenario, &response, expected);
        let passed = mismatch.is_none();
        logs.push(E2eLogEntry::new(
            &test_name,
            Phase::Verify,
            &correlation_id,
            Outcome::from_passed(passed),
            elapsed_ms(started),
            assertions,
            &json!({
                "expected_status": scenario.expected_status(),
                "status_code": response.status_code,
                "mismatch": mismatch,
            }),
        ));

        if passed {
            info!(test = %test_name, "scenario passed");
        } else {
            warn!(test = %test_name, mismatch = ?mismatch, "scenario failed");
        }

        Ok(ScenarioOutcome {
            filename: scenario.filename.clone(),
            scenario_name: scenario.scenario_name.clone(),
            identifier: scenario.identifier.clone(),
            passed,
            status_code: Some(response.status_code),
            mismatch,
            logs,
        })
    }

    /// Run every scenario in filename order. A scenario whose setup or
    /// request fails is recorded as a failed outcome and the suite continues.
    pub async fn run_suite(
        &self,
        scenarios: &ScenarioSet,
        expected: &ExpectedResponses,
    ) -> SuiteReport {
        let mut report = SuiteReport::default();
        for (filename, scenario) in scenarios.iter() {
            let outcome = match self.run(scenario, expected.get(filename)).await {
                Ok(outcome) => outcome,
                Err(err) => {
                    error!(file = %filename, error = %err, "scenario errored");
                    ScenarioOutcome {
                        filename: filename.clone(),
                        scenario_name: scenario.scenario_name.clone(),
                        identifier: scenario.identifier.clone(),
                        passed: false,
                        status_code: err.status_code(),
                        mismatch: Some(err.to_string()),
                        logs: Vec::new(),
                    }
                }
            };
            report.outcomes.push(outcome);
        }
        info!(
            passed = report.passed(),
            failed = report.failed(),
            "suite finished"
        );
        report
    }

    async fn setup(&self, scenario: &ScenarioRecord) -> E2eResult<Value> {
        let mut context = json!({
            "identifier": scenario.identifier,
            "config_filenames": scenario.config_filenames,
            "secret_version": scenario.secret_version,
        });

        if let Some((sync, config_dir)) = &self.config_sync {
            let report = sync
                .sync_configs(&scenario.config_filenames, config_dir)
                .await?;
            context["configs_uploaded"] = json!(report.uploaded);
            context["configs_deleted"] = json!(report.deleted);
        }

        let mut items = scenario.seed_items();
        let hashed = apply_secret_version(
            &mut items,
            &self.identifier_key,
            scenario.secret_version,
            self.secrets.as_ref(),
        )?;
        self.data_store.insert_records(&items).await?;
        context["records_seeded"] = json!(items.len());
        context["identifiers_hashed"] = json!(hashed);

        if let Some(log) = &self.identifier_log {
            log.append(&scenario.filename, &scenario.identifier)?;
        }
        if let Some(path) = &self.request_params {
            write_request_params(path, &scenario.identifier, &scenario.request_headers)?;
        }
        Ok(context)
    }
}

fn verify(
    scenario: &ScenarioRecord,
    response: &ApiResponse,
    expected: Option<&Value>,
) -> (AssertionsSummary, Option<String>) {
    let mut assertions = AssertionsSummary::default();
    let mut mismatch = None;

    let expected_status = scenario.expected_status();
    let status_ok = response.status_code == expected_status;
    assertions.record(status_ok);
    if !status_ok {
        mismatch = Some(format!(
            "expected status {expected_status}, got {}",
            response.status_code
        ));
    }

    if let Some(expected) = expected {
        let expected = mask_default(expected.clone());
        let body_mismatch = match &response.body {
            ResponseBody::Json(actual) => {
                first_difference(actual, &expected, "$").map(|path| format!("body differs at {path}"))
            }
            ResponseBody::Text(text) => Some(format!("expected a JSON body, got text: {text}")),
        };
        assertions.record(body_mismatch.is_none());
        mismatch = mismatch.or(body_mismatch);
    }

    (assertions, mismatch)
}

/// Path of the first place two documents differ, depth-first.
fn first_difference(actual: &Value, expected: &Value, path: &str) -> Option<String> {
    match (actual, expected) {
        (Value::Object(a), Value::Object(e)) => {
            for (key, expected_value) in e {
                let child = format!("{path}.{key}");
                match a.get(key) {
                    Some(actual_value) => {
                        if let Some(diff) = first_difference(actual_value, expected_value, &child) {
                            return Some(diff);
                        }
                    }
                    None => return Some(format!("{child} (missing)")),
                }
            }
            a.keys()
                .find(|key| !e.contains_key(*key))
                .map(|key| format!("{path}.{key} (unexpected)"))
        }
        (Value::Array(a), Value::Array(e)) => {
            if a.len() != e.len() {
                return Some(format!("{path} (length {} != {})", a.len(), e.len()));
            }
            a.iter()
                .zip(e)
                .enumerate()
                .find_map(|(i, (av, ev))| first_difference(av, ev, &format!("{path}[{i}]")))
        }
        _ if actual == expected => None,
        _ => Some(format!("{path}: {actual} != {expected}")),
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Load a scenario directory and seed every scenario's data.
pub async fn initialise_suite(
    loader: &ScenarioLoader,
    dir: &Path,
    data_store: &dyn DataStore,
    secrets: Option<&SecretVersions>,
) -> E2eResult<ScenarioSet> {
    let scenarios = loader.load_directory(dir)?;
    for scenario in scenarios.scenarios.values() {
        let mut items = scenario.seed_items();
        apply_secret_version(
            &mut items,
            loader.identifier_key(),
            scenario.secret_version,
            secrets,
        )?;
        data_store.insert_records(&items).await?;
    }
    info!(dir = %dir.display(), scenarios = scenarios.len(), "initialised suite");
    Ok(scenarios)
}

/// Seed the data of several scenario directories in one pass.
///
/// Returns the number of records written.
pub async fn preload_data(
    loader: &ScenarioLoader,
    dirs: &[PathBuf],
    data_store: &dyn DataStore,
) -> E2eResult<usize> {
    let mut written = 0;
    for dir in dirs {
        let scenarios = loader.load_directory(dir)?;
        for scenario in scenarios.scenarios.values() {
            let items = scenario.seed_items();
            data_store.insert_records(&items).await?;
            written += items.len();
        }
    }
    info!(dirs = dirs.len(), records = written, "preloaded data");
    Ok(written)
}
