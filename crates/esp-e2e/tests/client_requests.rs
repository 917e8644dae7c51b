//! `EligibilityApiClient` against a mock API.

use std::collections::BTreeMap;
use std::time::Duration;

use esp_e2e::{E2eError, EligibilityApiClient, RequestOptions, ResponseBody};
use esp_testkit::{MockEligibilityApi, fixtures::json as docs, init_test_tracing};
use serde_json::json;

fn no_params() -> BTreeMap<String, String> {
    BTreeMap::new()
}

#[tokio::test]
async fn json_body_is_masked() {
    init_test_tracing();
    let api = MockEligibilityApi::start().await;
    api.expect_eligibility(
        "9000000001",
        json!({
            "responseId": "5f2c-real-id",
            "meta": {"lastUpdated": "2025-06-15T10:00:00Z"},
            "processedSuggestions": [{"condition": "RSV", "status": "Actionable"}]
        }),
    )
    .await;

    let client = EligibilityApiClient::plain(api.base_url()).unwrap();
    let response = client
        .request(
            "9000000001",
            &no_params(),
            &no_params(),
            RequestOptions::default(),
        )
        .await
        .unwrap();

    assert_eq!(response.status_code, 200);
    assert!(response.ok);
    assert_eq!(
        response.headers.get("content-type").map(String::as_str),
        Some("application/json")
    );
    assert_eq!(
        response.body,
        ResponseBody::Json(json!({
            "responseId": "<ignored>",
            "meta": {"lastUpdated": "<ignored>"},
            "processedSuggestions": [{"condition": "RSV", "status": "Actionable"}]
        }))
    );
    api.assert_checked("9000000001").await;
}

#[tokio::test]
async fn error_status_raises_unless_lenient() {
    let api = MockEligibilityApi::start().await;
    api.expect_status("9000000002", 404, docs::error("not-found", "No person"))
        .await;
    let client = EligibilityApiClient::plain(api.base_url()).unwrap();

    let err = client
        .request(
            "9000000002",
            &no_params(),
            &no_params(),
            RequestOptions::default(),
        )
        .await
        .unwrap_err();
    match err {
        E2eError::Status { status, url, body } => {
            assert_eq!(status, 404);
            assert!(url.ends_with("/patient-check/9000000002"));
            assert!(body.contains("No person"));
        }
        other => panic!("expected Status error, got {other:?}"),
    }

    let response = client
        .request(
            "9000000002",
            &no_params(),
            &no_params(),
            RequestOptions::lenient(),
        )
        .await
        .unwrap();
    assert_eq!(response.status_code, 404);
    assert!(!response.ok);
    api.assert_request_count(2).await;
}

#[tokio::test]
async fn non_json_body_is_kept_as_text() {
    let api = MockEligibilityApi::start().await;
    api.expect_text("9000000003", 502, "Bad Gateway").await;
    let client = EligibilityApiClient::plain(api.base_url()).unwrap();

    let response = client
        .request(
            "9000000003",
            &no_params(),
            &no_params(),
            RequestOptions::lenient(),
        )
        .await
        .unwrap();
    assert_eq!(response.status_code, 502);
    assert_eq!(response.body, ResponseBody::Text("Bad Gateway".to_string()));
}

#[tokio::test]
async fn headers_and_query_params_are_sent() {
    let api = MockEligibilityApi::start().await;
    api.expect_with_header(
        "9000000004",
        "nhs-login-nhs-number",
        "9000000004",
        json!({"via": "header"}),
    )
    .await;
    api.expect_with_query("9000000005", "conditions", "RSV", json!({"via": "query"}))
        .await;
    let client = EligibilityApiClient::plain(api.base_url()).unwrap();

    let headers = BTreeMap::from([(
        "nhs-login-nhs-number".to_string(),
        "9000000004".to_string(),
    )]);
    let response = client
        .request("9000000004", &headers, &no_params(), RequestOptions::default())
        .await
        .unwrap();
    assert_eq!(response.body, ResponseBody::Json(json!({"via": "header"})));

    let query = BTreeMap::from([("conditions".to_string(), "RSV".to_string())]);
    let response = client
        .request("9000000005", &no_params(), &query, RequestOptions::default())
        .await
        .unwrap();
    assert_eq!(response.body, ResponseBody::Json(json!({"via": "query"})));

    let request = &api.received_requests().await[1];
    assert_eq!(request.url.query(), Some("conditions=RSV"));
}

#[tokio::test]
async fn slow_responses_time_out() {
    let api = MockEligibilityApi::start().await;
    api.expect_delayed("9000000006", Duration::from_secs(2), json!({}))
        .await;
    let client =
        EligibilityApiClient::plain_with_timeout(api.base_url(), Duration::from_millis(100))
            .unwrap();

    let err = client
        .request(
            "9000000006",
            &no_params(),
            &no_params(),
            RequestOptions::default(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, E2eError::Http(ref e) if e.is_timeout()), "{err:?}");
}
