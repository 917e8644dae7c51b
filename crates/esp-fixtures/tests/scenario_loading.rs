//! Integration tests for loading scenario and expected-response directories.

use std::fs;
use std::path::Path;

use chrono::NaiveDate;
use esp_fixtures::{
    FixtureError, IDENTIFIER_UNKNOWN, PlaceholderResolver, ScenarioLoader, SecretVersion,
};
use serde_json::json;
use tempfile::TempDir;

fn loader() -> ScenarioLoader {
    ScenarioLoader::new(PlaceholderResolver::for_date(
        NaiveDate::from_ymd_opt(2025, 6, 15).unwrap(),
    ))
}

fn write(dir: &Path, name: &str, value: &serde_json::Value) {
    fs::write(dir.join(name), serde_json::to_string_pretty(value).unwrap()).unwrap();
}

#[test]
fn loads_scenarios_in_filename_order() {
    let tmp = TempDir::new().unwrap();
    write(
        tmp.path(),
        "b_second.json",
        &json!({"scenario_name": "second", "data": [{"NHS_NUMBER": "9000000002"}]}),
    );
    write(
        tmp.path(),
        "a_first.json",
        &json!({"scenario_name": "first", "data": [{"NHS_NUMBER": "9000000001"}]}),
    );
    fs::write(tmp.path().join("notes.txt"), "not a fixture").unwrap();
    fs::create_dir(tmp.path().join("nested.json")).unwrap();

    let set = loader().load_directory(tmp.path()).unwrap();

    assert_eq!(set.filenames(), vec!["a_first.json", "b_second.json"]);
    assert_eq!(set.get("a_first.json").unwrap().identifier, "9000000001");
    assert_eq!(
        set.get("b_second.json").unwrap().scenario_name.as_deref(),
        Some("second")
    );

    let again = loader().load_directory(tmp.path()).unwrap();
    assert_eq!(again.filenames(), set.filenames());
    assert_eq!(again.scenarios, set.scenarios);
}

#[test]
fn resolves_placeholders_in_data_section() {
    let tmp = TempDir::new().unwrap();
    write(
        tmp.path(),
        "rsv_75.json",
        &json!({
            "scenario_name": "75 year old is eligible",
            "config_filenames": ["RSV.json"],
            "request_headers": {"nhs-login-nhs-number": "9000000075"},
            "query_params": {"conditions": "RSV"},
            "expected_response_code": 200,
            "secret_version": "AWSPREVIOUS",
            "data": [
                {"NHS_NUMBER": "9000000075", "ATTRIBUTE_TYPE": "PERSON", "DATE_OF_BIRTH": "<<DATE_AGE_75>>"},
                {"NHS_NUMBER": "9000000075", "ATTRIBUTE_TYPE": "COHORTS", "LABEL": "<<RDATE_AGE_75>>"}
            ]
        }),
    );

    let set = loader().load_directory(tmp.path()).unwrap();
    let record = set.get("rsv_75.json").unwrap();

    assert_eq!(record.data[0]["DATE_OF_BIRTH"], "19500615");
    assert_eq!(record.data[1]["LABEL"], "15 June 1950");
    assert_eq!(record.config_filenames, vec!["RSV.json"]);
    assert_eq!(record.query_params["conditions"], "RSV");
    assert_eq!(record.secret_version, Some(SecretVersion::Previous));
    assert_eq!(record.seed_items().len(), 2);
    assert_eq!(record.placeholders["DATE_AGE_75"], "19500615");
    assert_eq!(
        set.context.for_scope("rsv_75.json").unwrap()["RDATE_AGE_75"],
        "15 June 1950"
    );
}

#[test]
fn shared_tokens_agree_across_files() {
    let tmp = TempDir::new().unwrap();
    for name in ["one.json", "two.json", "three.json"] {
        write(
            tmp.path(),
            name,
            &json!({"data": [{"NHS_NUMBER": name, "DOB": "<<DATE_AGE_65-YESTERDAY>>"}]}),
        );
    }

    let set = loader().load_directory(tmp.path()).unwrap();
    let values: Vec<_> = set
        .iter()
        .map(|(_, record)| record.data[0]["DOB"].clone())
        .collect();

    assert!(values.iter().all(|v| v == "19600614"));
    assert_eq!(set.context.export().len(), 3);
}

#[test]
fn missing_identifier_is_unknown() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "anon.json", &json!({"data": [{"ATTRIBUTE_TYPE": "PERSON"}]}));

    let set = loader().load_directory(tmp.path()).unwrap();
    assert_eq!(set.get("anon.json").unwrap().identifier, IDENTIFIER_UNKNOWN);
}

#[test]
fn bad_tokens_are_kept_and_reported() {
    let tmp = TempDir::new().unwrap();
    write(
        tmp.path(),
        "bad.json",
        &json!({"data": [{"NHS_NUMBER": "1", "DOB": "<<DATE_AGE_old>>", "X": "<<SOMETHING_ELSE>>"}]}),
    );

    let set = loader().load_directory(tmp.path()).unwrap();
    let record = set.get("bad.json").unwrap();

    assert_eq!(record.data[0]["DOB"], "<<DATE_AGE_old>>");
    assert_eq!(record.data[0]["X"], "<<SOMETHING_ELSE>>");
    assert_eq!(set.context.failures().len(), 1);
    assert_eq!(set.context.failures()[0].scope.as_deref(), Some("bad.json"));
}

#[test]
fn missing_data_section_is_malformed() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "empty.json", &json!({"scenario_name": "no data"}));

    let err = loader().load_directory(tmp.path()).unwrap_err();
    assert!(matches!(err, FixtureError::Malformed { .. }), "{err}");
}

#[test]
fn invalid_json_is_reported_with_path() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("broken.json"), "{ not json").unwrap();

    let err = loader().load_directory(tmp.path()).unwrap_err();
    match err {
        FixtureError::Json { path, .. } => assert!(path.ends_with("broken.json")),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn missing_directory_is_io_error() {
    let tmp = TempDir::new().unwrap();
    let err = loader()
        .load_directory(tmp.path().join("absent"))
        .unwrap_err();
    assert!(matches!(err, FixtureError::Io { .. }));
}

#[test]
fn expected_responses_are_resolved_then_masked() {
    let tmp = TempDir::new().unwrap();
    write(
        tmp.path(),
        "rsv_75.json",
        &json!({
            "responseId": "<<IGNORE_RESPONSE_ID>>",
            "meta": {"lastUpdated": "<<IGNORE_DATE>>"},
            "processedSuggestions": [{
                "condition": "RSV",
                "status": "Actionable",
                "eligibilityCohorts": [{"cohortText": "Born <<RDATE_AGE_75>>"}]
            }]
        }),
    );

    let expected = loader()
        .load_expected_responses(tmp.path(), &esp_fixtures::DEFAULT_MASKED_KEYS)
        .unwrap();
    let body = expected.get("rsv_75.json").unwrap();

    assert_eq!(body["responseId"], "<ignored>");
    assert_eq!(body["meta"]["lastUpdated"], "<ignored>");
    assert_eq!(
        body["processedSuggestions"][0]["eligibilityCohorts"][0]["cohortText"],
        "Born 15 June 1950"
    );
}

#[test]
fn custom_extension_and_identifier_key() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "case.fixture", &json!({"data": {"patientId": "P-1"}}));
    write(tmp.path(), "ignored.json", &json!({"data": {"patientId": "P-2"}}));

    let set = loader()
        .with_extension("fixture")
        .with_identifier_key("patient_id")
        .load_directory(tmp.path())
        .unwrap();

    assert_eq!(set.len(), 1);
    assert_eq!(set.get("case.fixture").unwrap().identifier, "P-1");
}
