//! Human-readable, calendar-relative period expressions.

use std::fmt;

use chrono::{DateTime, Days, Months, TimeDelta, Utc};
use thiserror::Error;

/// A calendar-relative duration such as "1 month 2 days".
///
/// Unlike `std::time::Duration`, a `Period` has no fixed length: adding
/// "1 month" to different reference instants yields different absolute
/// durations. It is resolved against a concrete anchor with
/// [`Period::project_from`] and never collapsed to seconds at parse time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Period {
    pub years: u32,
    pub months: u32,
    pub weeks: u32,
    pub days: u32,
    pub hours: u32,
    pub minutes: u32,
    pub seconds: u32,
}

impl Period {
    /// Parses a word-based period expression.
    ///
    /// The grammar is one or more `<quantity> <unit>` pairs, optionally
    /// separated by commas or the word "and": "3 days", "2 weeks",
    /// "1 month and 12 hours". Units: second, minute, hour, day, week,
    /// month, year (singular or plural).
    ///
    /// Expressions with no pairs, an unknown unit word, or an all-zero
    /// total are rejected.
    pub fn parse(text: &str) -> Result<Self, PeriodError> {
        let mut period = Period::default();
        let mut tokens = text
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|t| !t.is_empty() && !t.eq_ignore_ascii_case("and"))
            .peekable();

        if tokens.peek().is_none() {
            return Err(PeriodError::Empty);
        }

        while let Some(quantity) = tokens.next() {
            let value: u32 = quantity
                .parse()
                .map_err(|_| PeriodError::InvalidQuantity {
                    text: text.to_string(),
                    token: quantity.to_string(),
                })?;
            let unit = tokens.next().ok_or_else(|| PeriodError::MissingUnit {
                text: text.to_string(),
                token: quantity.to_string(),
            })?;

            let unit_lower = unit.to_ascii_lowercase();
            let singular = unit_lower.strip_suffix('s').unwrap_or(&unit_lower);
            let slot = match singular {
                "year" => &mut period.years,
                "month" => &mut period.months,
                "week" => &mut period.weeks,
                "day" => &mut period.days,
                "hour" => &mut period.hours,
                "minute" => &mut period.minutes,
                "second" => &mut period.seconds,
                _ => {
                    return Err(PeriodError::UnknownUnit {
                        text: text.to_string(),
                        token: unit.to_string(),
                    });
                }
            };
            *slot = slot
                .checked_add(value)
                .ok_or_else(|| PeriodError::OutOfRange {
                    text: text.to_string(),
                })?;
        }

        if period == Period::default() {
            return Err(PeriodError::Zero {
                text: text.to_string(),
            });
        }

        Ok(period)
    }

    /// Resolves the period into an absolute duration anchored at `anchor`.
    ///
    /// The variable-length components (years, months) are applied with
    /// calendar arithmetic, so the result depends on the anchor date:
    /// "1 month" from 2024-02-01 is 29 days, from 2024-03-01 it is 31.
    pub fn project_from(&self, anchor: DateTime<Utc>) -> Result<TimeDelta, PeriodError> {
        let overflow = || PeriodError::ProjectionOverflow {
            period: *self,
            anchor,
        };

        let total_months = u32::try_from(u64::from(self.years) * 12 + u64::from(self.months))
            .map_err(|_| overflow())?;
        let total_days = u64::from(self.weeks) * 7 + u64::from(self.days);
        let clock_seconds = i64::from(self.hours) * 3600
            + i64::from(self.minutes) * 60
            + i64::from(self.seconds);

        let end = anchor
            .checked_add_months(Months::new(total_months))
            .and_then(|t| t.checked_add_days(Days::new(total_days)))
            .and_then(|t| t.checked_add_signed(TimeDelta::seconds(clock_seconds)))
            .ok_or_else(overflow)?;

        Ok(end - anchor)
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let components = [
            (self.years, "year"),
            (self.months, "month"),
            (self.weeks, "week"),
            (self.days, "day"),
            (self.hours, "hour"),
            (self.minutes, "minute"),
            (self.seconds, "second"),
        ];

        let mut wrote = false;
        for (value, unit) in components {
            if value == 0 {
                continue;
            }
            if wrote {
                f.write_str(" ")?;
            }
            write!(f, "{value} {unit}{}", if value == 1 { "" } else { "s" })?;
            wrote = true;
        }
        if !wrote {
            f.write_str("0 seconds")?;
        }
        Ok(())
    }
}

/// Errors from parsing or projecting a period expression.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum PeriodError {
    /// The expression contains no quantity/unit pairs.
    #[error("empty duration expression")]
    Empty,

    /// A token where a quantity was expected is not a non-negative integer.
    #[error("invalid quantity '{token}' in duration expression '{text}'")]
    InvalidQuantity { text: String, token: String },

    /// A quantity at the end of the expression has no unit word.
    #[error("quantity '{token}' has no unit in duration expression '{text}'")]
    MissingUnit { text: String, token: String },

    /// An unrecognized unit word.
    #[error("unknown unit '{token}' in duration expression '{text}'")]
    UnknownUnit { text: String, token: String },

    /// The expression sums to a zero-length period.
    #[error("duration expression '{text}' denotes an empty period")]
    Zero { text: String },

    /// A component does not fit the internal representation.
    #[error("duration expression '{text}' is out of range")]
    OutOfRange { text: String },

    /// The period cannot be projected from the given anchor.
    #[error("period '{period}' overflows when projected from {anchor}")]
    ProjectionOverflow {
        period: Period,
        anchor: DateTime<Utc>,
    },
}
