//! Fixture directories and sample documents.
//!
//! [`FixtureDirs`] lays out a suite the way the harness expects it on disk
//! (`data/`, `responses/`, `configs/`) inside a temporary directory.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tempfile::TempDir;

/// A throwaway suite directory tree.
pub struct FixtureDirs {
    root: TempDir,
    data: PathBuf,
    responses: PathBuf,
    configs: PathBuf,
}

impl FixtureDirs {
    /// Create the tree.
    ///
    /// # Panics
    ///
    /// Panics if the temporary directories cannot be created.
    #[must_use]
    pub fn new() -> Self {
        let root = TempDir::new().expect("create temp dir");
        let data = root.path().join("data");
        let responses = root.path().join("responses");
        let configs = root.path().join("configs");
        for dir in [&data, &responses, &configs] {
            fs::create_dir_all(dir).expect("create fixture dir");
        }
        Self {
            root,
            data,
            responses,
            configs,
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        self.root.path()
    }

    #[must_use]
    pub fn data_dir(&self) -> &Path {
        &self.data
    }

    #[must_use]
    pub fn responses_dir(&self) -> &Path {
        &self.responses
    }

    #[must_use]
    pub fn configs_dir(&self) -> &Path {
        &self.configs
    }

    /// Write a scenario file into `data/`.
    pub fn write_scenario(&self, filename: &str, scenario: &Value) -> PathBuf {
        write_json(&self.data, filename, scenario)
    }

    /// Write an expected response into `responses/`.
    pub fn write_expected(&self, filename: &str, response: &Value) -> PathBuf {
        write_json(&self.responses, filename, response)
    }

    /// Write a campaign config into `configs/`.
    pub fn write_config(&self, filename: &str, config: &Value) -> PathBuf {
        write_json(&self.configs, filename, config)
    }
}

impl Default for FixtureDirs {
    fn default() -> Self {
        Self::new()
    }
}

fn write_json(dir: &Path, filename: &str, value: &Value) -> PathBuf {
    let path = dir.join(filename);
    let text = serde_json::to_string_pretty(value).expect("serialize fixture");
    fs::write(&path, text).expect("write fixture");
    path
}

/// Common documents used across harness tests.
pub mod json {
    use serde_json::{Value, json};

    /// Scenario with one person record aged `age` and the given configs.
    #[must_use]
    pub fn scenario(identifier: &str, age: u32, configs: &[&str]) -> Value {
        json!({
            "scenario_name": format!("{age} year old"),
            "config_filenames": configs,
            "request_headers": {"nhs-login-nhs-number": identifier},
            "data": [
                {
                    "NHS_NUMBER": identifier,
                    "ATTRIBUTE_TYPE": "PERSON",
                    "DATE_OF_BIRTH": format!("<<DATE_AGE_{age}>>"),
                    "POSTCODE": "LS1 1AB"
                },
                {
                    "NHS_NUMBER": identifier,
                    "ATTRIBUTE_TYPE": "COHORTS",
                    "COHORT_MEMBERSHIPS": [{"COHORT_LABEL": "rsv_75_rolling", "DATE_JOINED": "<<DATE_DAY_-7>>"}]
                }
            ]
        })
    }

    /// Eligibility response for one condition.
    #[must_use]
    pub fn eligibility_response(condition: &str, status: &str) -> Value {
        json!({
            "responseId": "<<IGNORE_RESPONSE_ID>>",
            "meta": {"lastUpdated": "<<IGNORE_DATE>>"},
            "processedSuggestions": [{
                "condition": condition,
                "status": status,
                "statusText": format!("You should have the {condition} vaccine"),
                "eligibilityCohorts": [],
                "suitabilityRules": [],
                "actions": []
            }]
        })
    }

    /// Minimal campaign config with a date placeholder.
    #[must_use]
    pub fn campaign_config(name: &str) -> Value {
        json!({
            "CampaignConfig": {
                "ID": name,
                "Name": name,
                "StartDate": "<<DATE_DAY_-30>>",
                "EndDate": "<<DATE_DAY_30>>",
                "Iterations": []
            }
        })
    }

    /// API error body.
    #[must_use]
    pub fn error(code: &str, message: &str) -> Value {
        json!({
            "resourceType": "OperationOutcome",
            "issue": [{"severity": "error", "code": code, "diagnostics": message}]
        })
    }
}
