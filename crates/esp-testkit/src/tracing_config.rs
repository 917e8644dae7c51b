//! Tracing setup for harness tests.

use std::sync::Once;

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

static INIT: Once = Once::new();

/// Environment variable holding a filter for test output only.
pub const TEST_LOG_ENV: &str = "ESP_TEST_LOG";

/// Placeholder resolution and runner phases at debug, everything else at warn.
const HARNESS_FILTER: &str = "warn,esp_fixtures=debug,esp_e2e=debug";

/// Route harness logs through the test writer so `cargo test` captures them
/// per test.
///
/// Only the first call installs a subscriber. The filter comes from
/// [`TEST_LOG_ENV`], then `RUST_LOG`, then the harness default.
///
/// ```rust
/// esp_testkit::init_test_tracing();
/// esp_testkit::init_test_tracing();
/// ```
pub fn init_test_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_env(TEST_LOG_ENV)
            .or_else(|_| EnvFilter::try_from_default_env())
            .unwrap_or_else(|_| EnvFilter::new(HARNESS_FILTER));

        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_test_writer()
                    .with_target(false)
                    .without_time(),
            )
            .try_init()
            .ok();
    });
}
