//! ESP Test Kit - shared test support for the eligibility harness crates
//!
//! - [`MockEligibilityApi`] - wiremock server laid out like the patient-check API
//! - [`FixtureDirs`](fixtures::FixtureDirs) - temporary suite directories
//! - Assertion helpers for masked responses and placeholder resolution
//! - Tracing configuration for test output
//!
//! # Example
//!
//! ```rust,ignore
//! use esp_testkit::{MockEligibilityApi, fixtures};
//!
//! #[tokio::test]
//! async fn checks_patient() {
//!     esp_testkit::init_test_tracing();
//!
//!     let mock = MockEligibilityApi::start().await;
//!     mock.expect_eligibility("9000000001", fixtures::json::eligibility_response("RSV", "Actionable"))
//!         .await;
//!
//!     let client = EligibilityApiClient::plain(&mock.base_url())?;
//!     // ...
//! }
//! ```

#![forbid(unsafe_code)]

mod assertions;
pub mod fixtures;
mod mock_server;
mod tracing_config;

pub use assertions::*;
pub use mock_server::*;
pub use tracing_config::*;

pub use esp_fixtures::{MASK_SENTINEL, ResolutionContext};
