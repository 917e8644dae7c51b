//! Eligibility fixtures - date placeholders, scenario loading and response masking
//!
//! Test fixtures for the eligibility API carry `<<TOKEN>>` placeholders that
//! stand for dates relative to "today". This crate provides:
//!
//! - [`PlaceholderResolver`] - resolves `<<DATE_AGE_75>>` style tokens
//! - [`ResolutionContext`] - audit trail of every value handed out
//! - [`ScenarioLoader`] - loads scenario and expected-response directories
//! - [`mask`] - blanks volatile response fields before comparison
//!
//! # Example
//!
//! ```rust,ignore
//! use esp_fixtures::{PlaceholderResolver, ScenarioLoader};
//!
//! let loader = ScenarioLoader::new(PlaceholderResolver::at_current_time());
//! let scenarios = loader.load_directory("data/dynamoDB/storyTestData")?;
//! for (file, scenario) in scenarios.iter() {
//!     println!("{file}: {}", scenario.identifier);
//! }
//! ```

#![forbid(unsafe_code)]

pub mod context;
pub mod date_math;
mod error;
pub mod normalize;
pub mod placeholder;
pub mod scenario;

pub use context::{PlaceholderValues, ResolutionContext, ResolutionFailure};
pub use date_math::{DateFormat, DateMathError, DayShift, OffsetMode, format_date, resolve_offset};
pub use error::{FixtureError, FixtureResult, PlaceholderError};
pub use normalize::{DEFAULT_MASKED_KEYS, MASK_SENTINEL, mask, mask_default};
pub use placeholder::{PlaceholderResolver, Token, parse_token};
pub use scenario::{
    DEFAULT_IDENTIFIER_KEY, ExpectedResponses, IDENTIFIER_UNKNOWN, ScenarioLoader, ScenarioRecord,
    ScenarioSet, SecretVersion, extract_identifier, rewrite_identifier_fields,
};
