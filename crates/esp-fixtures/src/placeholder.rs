//! `<<TOKEN>>` placeholder parsing and substitution.
//!
//! Grammar: `<<FORMAT_MODE_ARG>>` with `FORMAT` in `DATE | RDATE`, `MODE` in
//! `AGE | DAY | WEEK | MONTH | YEAR` and `ARG` a signed integer (AGE also
//! accepts a `-TOMORROW` / `-YESTERDAY` suffix). `<<IGNORE_RESPONSE_ID>>` and
//! `<<IGNORE_DATE>>` resolve to their bare names. Anything else is left as is.
//!
//! Every `<<...>>` occurrence in a string is replaced independently.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, Utc};
use regex::{Captures, Regex};
use serde_json::Value;
use tracing::{debug, error};

use crate::context::ResolutionContext;
use crate::date_math::{DateFormat, OffsetArgument, OffsetMode, format_date, resolve_offset};
use crate::error::PlaceholderError;

static PLACEHOLDER_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<<(.*?)>>").expect("valid placeholder pattern"));

/// Literal tokens that resolve to their own name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReservedLiteral {
    IgnoreResponseId,
    IgnoreDate,
}

impl ReservedLiteral {
    /// Bare token name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::IgnoreResponseId => "IGNORE_RESPONSE_ID",
            Self::IgnoreDate => "IGNORE_DATE",
        }
    }

    fn from_token(token: &str) -> Option<Self> {
        match token {
            "IGNORE_RESPONSE_ID" => Some(Self::IgnoreResponseId),
            "IGNORE_DATE" => Some(Self::IgnoreDate),
            _ => None,
        }
    }
}

/// A date placeholder whose argument has not been evaluated yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateToken<'a> {
    pub format: DateFormat,
    pub mode: OffsetMode,
    pub argument: &'a str,
}

/// Outcome of matching a token against the grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token<'a> {
    Reserved(ReservedLiteral),
    Date(DateToken<'a>),
    /// Not part of the grammar; the placeholder is kept verbatim.
    Unrecognized,
}

/// Classify a token (the text between `<<` and `>>`).
#[must_use]
pub fn parse_token(token: &str) -> Token<'_> {
    if let Some(literal) = ReservedLiteral::from_token(token) {
        return Token::Reserved(literal);
    }

    let parts: Vec<&str> = token.split('_').collect();
    let [marker, mode, argument] = parts.as_slice() else {
        return Token::Unrecognized;
    };
    let Some(format) = DateFormat::from_marker(marker) else {
        return Token::Unrecognized;
    };
    let Ok(mode) = mode.parse::<OffsetMode>() else {
        return Token::Unrecognized;
    };

    Token::Date(DateToken {
        format,
        mode,
        argument: *argument,
    })
}

/// Resolves placeholders against a fixed "today".
///
/// The date is captured once at construction so every token resolved through
/// the same resolver agrees, even across midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaceholderResolver {
    today: NaiveDate,
}

impl PlaceholderResolver {
    /// Resolver anchored at the UTC date of `now`.
    #[must_use]
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            today: now.date_naive(),
        }
    }

    /// Resolver anchored at an explicit date.
    #[must_use]
    pub const fn for_date(today: NaiveDate) -> Self {
        Self { today }
    }

    /// Resolver anchored at the current wall-clock date.
    #[must_use]
    pub fn at_current_time() -> Self {
        Self::new(Utc::now())
    }

    #[must_use]
    pub const fn today(&self) -> NaiveDate {
        self.today
    }

    /// Resolve one token (without the `<<>>` wrapper).
    ///
    /// Unrecognized tokens come back wrapped, unchanged. Arithmetic failures
    /// on recognized tokens are returned as errors.
    pub fn resolve_token(&self, token: &str) -> Result<String, PlaceholderError> {
        match parse_token(token) {
            Token::Reserved(literal) => Ok(literal.as_str().to_string()),
            Token::Unrecognized => Ok(format!("<<{token}>>")),
            Token::Date(date_token) => {
                let wrap = |source| PlaceholderError {
                    token: token.to_string(),
                    source,
                };
                let argument =
                    OffsetArgument::parse(date_token.mode, date_token.argument).map_err(wrap)?;
                let date = resolve_offset(
                    self.today,
                    date_token.mode,
                    argument.magnitude,
                    argument.shift,
                )
                .map_err(wrap)?;
                Ok(format_date(date, date_token.format))
            }
        }
    }

    /// Replace every `<<...>>` in `text`.
    ///
    /// A token that fails to evaluate is logged, recorded as a failure on the
    /// context, and left in place.
    pub fn resolve_str(
        &self,
        text: &str,
        mut context: Option<&mut ResolutionContext>,
        scope: Option<&str>,
    ) -> String {
        if !text.contains("<<") {
            return text.to_string();
        }

        PLACEHOLDER_PATTERN
            .replace_all(text, |caps: &Captures<'_>| {
                let token = &caps[1];
                match self.resolve_token(token) {
                    Ok(resolved) => {
                        debug!(token, resolved = %resolved, scope, "resolved placeholder");
                        if let Some(ctx) = context.as_deref_mut() {
                            ctx.record(token, &resolved, scope);
                        }
                        resolved
                    }
                    Err(err) => {
                        error!(token, scope, error = %err, "could not resolve placeholder");
                        if let Some(ctx) = context.as_deref_mut() {
                            ctx.record_failure(token, err.to_string(), scope);
                        }
                        caps[0].to_string()
                    }
                }
            })
            .into_owned()
    }

    /// Resolve every string leaf of a JSON document. Object keys and
    /// non-string leaves are untouched.
    pub fn resolve_value(
        &self,
        value: Value,
        mut context: Option<&mut ResolutionContext>,
        scope: Option<&str>,
    ) -> Value {
        match value {
            Value::String(text) => Value::String(self.resolve_str(&text, context, scope)),
            Value::Array(items) => Value::Array(
                items
                    .into_iter()
                    .map(|item| self.resolve_value(item, context.as_deref_mut(), scope))
                    .collect(),
            ),
            Value::Object(map) => Value::Object(
                map.into_iter()
                    .map(|(key, item)| {
                        (key, self.resolve_value(item, context.as_deref_mut(), scope))
                    })
                    .collect(),
            ),
            other => other,
        }
    }
}
