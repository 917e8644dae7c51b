//! Harness configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::{E2eError, E2eResult};

/// Configuration for a harness run.
///
/// Loadable from a JSON file; every field has a default and most can be
/// overridden from the environment (see [`HarnessConfig::apply_env`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarnessConfig {
    /// Patient-check endpoint; the identifier is appended as a path segment.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Directory holding the mTLS client certificate, key and CA.
    #[serde(default = "default_cert_dir")]
    pub cert_dir: PathBuf,

    /// Deployment environment name (dev, test, preprod).
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Backing table seeded before each scenario.
    #[serde(default = "default_table_name")]
    pub table_name: String,

    /// Bucket holding campaign configs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket_name: Option<String>,

    /// Key prefix for campaign configs inside the bucket.
    #[serde(default)]
    pub config_prefix: String,

    /// Hashing secret name; derived from the environment when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hashing_secret_name: Option<String>,

    /// Request timeout
    #[serde(default = "default_timeout", with = "duration_secs")]
    pub request_timeout: Duration,

    /// Verify the server against the bundled CA instead of accepting any
    /// certificate.
    #[serde(default)]
    pub strict_ssl: bool,
}

fn default_base_url() -> String {
    "https://test.eligibility-signposting-api.nhs.uk/patient-check".into()
}

fn default_cert_dir() -> PathBuf {
    PathBuf::from("certs")
}

fn default_environment() -> String {
    "dev".into()
}

fn default_table_name() -> String {
    "eligibility_data_store".into()
}

const fn default_timeout() -> Duration {
    Duration::from_secs(10)
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            cert_dir: default_cert_dir(),
            environment: default_environment(),
            table_name: default_table_name(),
            bucket_name: None,
            config_prefix: String::new(),
            hashing_secret_name: None,
            request_timeout: default_timeout(),
            strict_ssl: false,
        }
    }
}

impl HarnessConfig {
    /// Read a JSON config file. Missing fields take their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> E2eResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|err| E2eError::io(path, err))?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Defaults overridden from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env(|name| std::env::var(name).ok());
        config
    }

    /// Apply overrides from `lookup` (an environment-variable getter).
    ///
    /// Empty values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|value| !value.is_empty());

        if let Some(value) = get("BASE_URL") {
            self.base_url = value;
        }
        if let Some(value) = get("CERT_DIR") {
            self.cert_dir = PathBuf::from(value);
        }
        if let Some(value) = get("ENVIRONMENT") {
            self.environment = value;
        }
        if let Some(value) = get("DYNAMODB_TABLE_NAME") {
            self.table_name = value;
        }
        if let Some(value) = get("S3_BUCKET_NAME") {
            self.bucket_name = Some(value);
        }
        if let Some(value) = get("S3_PREFIX") {
            self.config_prefix = value;
        }
        if let Some(value) = get("STRICT_SSL") {
            self.strict_ssl = matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }
    }

    /// Name of the identifier hashing secret.
    #[must_use]
    pub fn hashing_secret_name(&self) -> String {
        self.hashing_secret_name.clone().unwrap_or_else(|| {
            format!(
                "eligibility-signposting-api-{}/hashing_secret",
                self.environment
            )
        })
    }
}

/// Fixture suites shipped with the harness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum SuiteKind {
    Smoke,
    Story,
    Regression,
    InProgress,
    VitaIntegration,
    Performance,
}

impl SuiteKind {
    pub const ALL: [Self; 6] = [
        Self::Smoke,
        Self::Story,
        Self::Regression,
        Self::InProgress,
        Self::VitaIntegration,
        Self::Performance,
    ];

    /// Seed-data, response and config directory names for the suite.
    const fn dir_names(self) -> (&'static str, &'static str, &'static str) {
        match self {
            Self::Smoke => ("smokeTestData", "smokeTestResponses", "smokeTestConfigs"),
            Self::Story => ("storyTestData", "storyTestResponses", "storyTestConfigs"),
            Self::Regression => (
                "regressionTestData",
                "regressionTestResponses",
                "regressionConfigs",
            ),
            Self::InProgress => (
                "inProgressTestData",
                "inProgressTestResponses",
                "inProgressConfigs",
            ),
            Self::VitaIntegration => (
                "vitaIntegrationTestData",
                "vitaIntegrationTestResponses",
                "vitaIntegrationConfigs",
            ),
            Self::Performance => (
                "performanceTestData",
                "performanceTestResponses",
                "performanceTestConfigs",
            ),
        }
    }
}

/// Data, expected-response and config directories for one suite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SuitePaths {
    pub data: PathBuf,
    pub responses: PathBuf,
    pub configs: PathBuf,
}

impl SuitePaths {
    /// Standard layout below `data_root`.
    #[must_use]
    pub fn for_suite(data_root: &Path, suite: SuiteKind) -> Self {
        let (data, responses, configs) = suite.dir_names();
        Self {
            data: data_root.join("dynamoDB").join(data),
            responses: data_root.join("responses").join(responses),
            configs: data_root.join("configs").join(configs),
        }
    }
}
