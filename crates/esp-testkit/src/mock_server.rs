//! Mock eligibility API for exercising the HTTP client and scenario runner.
//!
//! Wraps wiremock. Patient checks are served at
//! `GET {base_url}/{identifier}`, matching the real API's path layout.

use std::time::Duration;

use serde_json::Value;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

/// Path prefix the mock serves patient checks under.
pub const PATIENT_CHECK_PATH: &str = "/patient-check";

/// A mock eligibility API.
pub struct MockEligibilityApi {
    server: MockServer,
}

impl MockEligibilityApi {
    /// Start a new mock server.
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Base URL to hand to the API client (includes [`PATIENT_CHECK_PATH`]).
    #[must_use]
    pub fn base_url(&self) -> String {
        format!("{}{PATIENT_CHECK_PATH}", self.server.uri())
    }

    fn patient_path(identifier: &str) -> String {
        format!("{PATIENT_CHECK_PATH}/{identifier}")
    }

    fn json_response(status: u16, body: Value) -> ResponseTemplate {
        ResponseTemplate::new(status)
            .set_body_json(body)
            .insert_header("content-type", "application/json")
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Response Setup
    // ─────────────────────────────────────────────────────────────────────────────

    /// Answer `GET /patient-check/{identifier}` with 200 and `body`.
    pub async fn expect_eligibility(&self, identifier: &str, body: Value) {
        self.expect_status(identifier, 200, body).await;
    }

    /// Answer the identifier's check with an arbitrary status.
    pub async fn expect_status(&self, identifier: &str, status: u16, body: Value) {
        Mock::given(method("GET"))
            .and(path(Self::patient_path(identifier)))
            .respond_with(Self::json_response(status, body))
            .mount(&self.server)
            .await;
    }

    /// Answer with a plain-text body.
    pub async fn expect_text(&self, identifier: &str, status: u16, body: &str) {
        Mock::given(method("GET"))
            .and(path(Self::patient_path(identifier)))
            .respond_with(
                ResponseTemplate::new(status)
                    .set_body_string(body)
                    .insert_header("content-type", "text/plain"),
            )
            .mount(&self.server)
            .await;
    }

    /// Answer only when the request carries `header_name: header_value`.
    pub async fn expect_with_header(
        &self,
        identifier: &str,
        header_name: &str,
        header_value: &str,
        body: Value,
    ) {
        Mock::given(method("GET"))
            .and(path(Self::patient_path(identifier)))
            .and(header(header_name, header_value))
            .respond_with(Self::json_response(200, body))
            .mount(&self.server)
            .await;
    }

    /// Answer only when the request carries `param_name=param_value`.
    pub async fn expect_with_query(
        &self,
        identifier: &str,
        param_name: &str,
        param_value: &str,
        body: Value,
    ) {
        Mock::given(method("GET"))
            .and(path(Self::patient_path(identifier)))
            .and(query_param(param_name, param_value))
            .respond_with(Self::json_response(200, body))
            .mount(&self.server)
            .await;
    }

    /// Answer after `delay`, for timeout tests.
    pub async fn expect_delayed(&self, identifier: &str, delay: Duration, body: Value) {
        Mock::given(method("GET"))
            .and(path(Self::patient_path(identifier)))
            .respond_with(Self::json_response(200, body).set_delay(delay))
            .mount(&self.server)
            .await;
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Verification
    // ─────────────────────────────────────────────────────────────────────────────

    /// # Panics
    ///
    /// Panics if the count doesn't match.
    pub async fn assert_request_count(&self, expected: usize) {
        let received = self.received_requests().await;
        assert_eq!(
            received.len(),
            expected,
            "Expected {expected} requests but received {}",
            received.len()
        );
    }

    /// # Panics
    ///
    /// Panics if no check was made for `identifier`.
    pub async fn assert_checked(&self, identifier: &str) {
        let wanted = Self::patient_path(identifier);
        let received = self.received_requests().await;
        assert!(
            received.iter().any(|r| r.url.path() == wanted),
            "No request received for '{identifier}'. Received: {:?}",
            received.iter().map(|r| r.url.path().to_string()).collect::<Vec<_>>()
        );
    }

    pub async fn received_requests(&self) -> Vec<Request> {
        self.server.received_requests().await.unwrap_or_default()
    }
}
