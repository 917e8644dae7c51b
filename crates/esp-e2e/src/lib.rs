//! End-to-end harness for the eligibility signposting API.
//!
//! Wraps the fixture core from `esp-fixtures` with everything a suite run
//! needs: configuration, an mTLS client, data and object store seams,
//! identifier hashing, the scenario runner with structured JSONL logs, and
//! performance statistics.
//!
//! Collaborators are passed in explicitly; nothing here is a process-wide
//! singleton.
//!
//! ```rust,ignore
//! let loader = ScenarioLoader::new(PlaceholderResolver::at_current_time());
//! let scenarios = loader.load_directory(&paths.data)?;
//! let expected = loader.load_expected_responses(&paths.responses, &DEFAULT_MASKED_KEYS)?;
//!
//! let runner = ScenarioRunner::new(EligibilityApiClient::new(&config)?, store);
//! let report = runner.run_suite(&scenarios, &expected).await;
//! assert!(report.all_passed());
//! ```

#![forbid(unsafe_code)]

pub mod client;
pub mod config;
pub mod config_sync;
pub mod csv_log;
mod error;
pub mod hashing;
pub mod logging;
pub mod perf;
pub mod runner;
pub mod secrets;
pub mod store;

pub use client::{ApiResponse, EligibilityApiClient, RequestOptions, ResponseBody};
pub use config::{HarnessConfig, SuiteKind, SuitePaths};
pub use config_sync::{ConfigSync, SyncReport};
pub use csv_log::{IdentifierLog, write_request_params};
pub use error::{E2eError, E2eResult, SecretError, StoreError};
pub use hashing::{apply_secret_version, hash_identifier};
pub use logging::{AssertionsSummary, E2eLogEntry, E2eLogger, Outcome, Phase};
pub use perf::{
    LatencyStats, LocustStats, SlaBreach, SlaThresholds, latency_breaches, locust_breaches,
    render_html_report,
};
pub use runner::{ScenarioOutcome, ScenarioRunner, SuiteReport, initialise_suite, preload_data};
pub use secrets::{
    EnvSecretSource, InMemorySecretSource, SecretSource, SecretStage, SecretVersions,
    get_current_and_previous_secret,
};
pub use store::{
    DataStore, DirectoryObjectStore, InMemoryDataStore, InMemoryObjectStore, JsonlDataStore,
    ObjectStore, StoreResult,
};
