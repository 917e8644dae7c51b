//! Calendar arithmetic behind the date placeholders.
//!
//! Everything here is a pure function of the supplied "today" date. Month and
//! year offsets clamp to the last valid day of the target month, and age
//! offsets map a Feb 29 birthday onto Feb 28 in non-leap target years.
//! Resolved dates are confined to years 1 through 9999 so that both output
//! formats carry a four-digit year.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Months, NaiveDate, TimeDelta};
use thiserror::Error;

/// Errors raised by date arithmetic.
///
/// These are never swallowed here; callers decide whether a failure is fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DateMathError {
    /// The numeric argument could not be interpreted.
    #[error("invalid placeholder argument '{argument}': {reason}")]
    InvalidArgument { argument: String, reason: String },

    /// The shifted date falls outside years 1 through 9999.
    #[error("date offset out of range: {mode} {magnitude} from {from}")]
    OutOfRange {
        mode: OffsetMode,
        magnitude: i64,
        from: NaiveDate,
    },
}

/// Arithmetic mode selected by the middle segment of a placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OffsetMode {
    Day,
    Week,
    Month,
    Year,
    /// The date `magnitude` years before today (a birth date for that age).
    Age,
}

impl OffsetMode {
    /// Placeholder segment for this mode.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Day => "DAY",
            Self::Week => "WEEK",
            Self::Month => "MONTH",
            Self::Year => "YEAR",
            Self::Age => "AGE",
        }
    }
}

impl fmt::Display for OffsetMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OffsetMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DAY" => Ok(Self::Day),
            "WEEK" => Ok(Self::Week),
            "MONTH" => Ok(Self::Month),
            "YEAR" => Ok(Self::Year),
            "AGE" => Ok(Self::Age),
            _ => Err(()),
        }
    }
}

/// One-day adjustment applied after the base offset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum DayShift {
    #[default]
    None,
    /// `-TOMORROW`: one day later.
    Tomorrow,
    /// `-YESTERDAY`: one day earlier.
    Yesterday,
}

impl DayShift {
    const fn days(self) -> i64 {
        match self {
            Self::None => 0,
            Self::Tomorrow => 1,
            Self::Yesterday => -1,
        }
    }
}

/// Output rendering for a resolved date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DateFormat {
    /// `YYYYMMDD`, selected by the `DATE` marker.
    Compact,
    /// `D Month YYYY`, selected by `RDATE`.
    Long,
}

impl DateFormat {
    /// Map an output-format marker to a format. Only `DATE` and `RDATE` are recognized.
    #[must_use]
    pub fn from_marker(marker: &str) -> Option<Self> {
        match marker {
            "DATE" => Some(Self::Compact),
            "RDATE" => Some(Self::Long),
            _ => None,
        }
    }

    /// The marker that selects this format.
    #[must_use]
    pub const fn marker(self) -> &'static str {
        match self {
            Self::Compact => "DATE",
            Self::Long => "RDATE",
        }
    }
}

/// Parsed final segment of a placeholder: signed magnitude plus optional shift.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OffsetArgument {
    pub magnitude: i64,
    pub shift: DayShift,
}

impl OffsetArgument {
    /// Parse an argument such as `75`, `-3` or `75-TOMORROW`.
    ///
    /// The day-shift suffixes are only meaningful for [`OffsetMode::Age`].
    pub fn parse(mode: OffsetMode, raw: &str) -> Result<Self, DateMathError> {
        let (number, shift) = if let Some(n) = raw.strip_suffix("-TOMORROW") {
            (n, DayShift::Tomorrow)
        } else if let Some(n) = raw.strip_suffix("-YESTERDAY") {
            (n, DayShift::Yesterday)
        } else {
            (raw, DayShift::None)
        };

        if shift != DayShift::None && mode != OffsetMode::Age {
            return Err(DateMathError::InvalidArgument {
                argument: raw.to_string(),
                reason: format!("day shift suffix is only valid with AGE, not {mode}"),
            });
        }

        let magnitude = number
            .parse::<i64>()
            .map_err(|err| DateMathError::InvalidArgument {
                argument: raw.to_string(),
                reason: err.to_string(),
            })?;

        Ok(Self { magnitude, shift })
    }
}

/// Earliest year a resolved date may fall in.
pub const MIN_YEAR: i32 = 1;
/// Latest year a resolved date may fall in.
pub const MAX_YEAR: i32 = 9999;

/// Compute the calendar date for `mode`/`magnitude` relative to `today`,
/// then apply `shift`.
///
/// Fails with [`DateMathError::OutOfRange`] when the result lands outside
/// [`MIN_YEAR`]..=[`MAX_YEAR`].
pub fn resolve_offset(
    today: NaiveDate,
    mode: OffsetMode,
    magnitude: i64,
    shift: DayShift,
) -> Result<NaiveDate, DateMathError> {
    let out_of_range = || DateMathError::OutOfRange {
        mode,
        magnitude,
        from: today,
    };

    let base = match mode {
        OffsetMode::Day => add_days(today, magnitude),
        OffsetMode::Week => magnitude.checked_mul(7).and_then(|d| add_days(today, d)),
        OffsetMode::Month => add_months(today, magnitude),
        OffsetMode::Year => magnitude.checked_mul(12).and_then(|m| add_months(today, m)),
        OffsetMode::Age => years_before(today, magnitude),
    }
    .ok_or_else(out_of_range)?;

    add_days(base, shift.days())
        .filter(|date| (MIN_YEAR..=MAX_YEAR).contains(&date.year()))
        .ok_or_else(out_of_range)
}

/// Render a date in the requested format.
#[must_use]
pub fn format_date(date: NaiveDate, format: DateFormat) -> String {
    match format {
        DateFormat::Compact => date.format("%Y%m%d").to_string(),
        DateFormat::Long => date.format("%-d %B %Y").to_string(),
    }
}

fn add_days(date: NaiveDate, days: i64) -> Option<NaiveDate> {
    date.checked_add_signed(TimeDelta::try_days(days)?)
}

fn add_months(date: NaiveDate, months: i64) -> Option<NaiveDate> {
    let count = Months::new(u32::try_from(months.unsigned_abs()).ok()?);
    if months >= 0 {
        date.checked_add_months(count)
    } else {
        date.checked_sub_months(count)
    }
}

fn years_before(today: NaiveDate, years: i64) -> Option<NaiveDate> {
    let target_year = i32::try_from(i64::from(today.year()).checked_sub(years)?).ok()?;
    match today.with_year(target_year) {
        Some(date) => Some(date),
        // Only Feb 29 into a common year can fail for an in-range year.
        None if today.month() == 2 && today.day() == 29 => {
            NaiveDate::from_ymd_opt(target_year, 2, 28)
        }
        None => None,
    }
}
