//! Polling interval parsing.
//!
//! Intervals are written as a positive integer followed by a unit character:
//! `m` (minutes), `h` (hours) or `d` (days), e.g. `"5m"` or `"2h"`.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

const SECONDS_PER_MINUTE: u64 = 60;
const SECONDS_PER_HOUR: u64 = 60 * SECONDS_PER_MINUTE;
const SECONDS_PER_DAY: u64 = 24 * SECONDS_PER_HOUR;

/// Errors produced while parsing an interval string
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntervalError {
    #[error("Interval cannot be empty")]
    Empty,

    #[error("Invalid interval unit '{0}'. Must be one of: m, h, d")]
    InvalidUnit(char),

    #[error("Invalid interval value '{0}'. Must be an integer")]
    InvalidValue(String),

    #[error("Invalid interval value {0}. Must be positive")]
    NonPositive(i64),

    #[error("Interval {0} is too large")]
    Overflow(String),
}

/// A strictly positive polling cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PollingInterval(Duration);

impl PollingInterval {
    /// Build an interval directly from a duration.
    ///
    /// Returns `None` for a zero duration.
    pub fn from_duration(duration: Duration) -> Option<Self> {
        (!duration.is_zero()).then_some(Self(duration))
    }

    pub const fn as_duration(&self) -> Duration {
        self.0
    }
}

impl FromStr for PollingInterval {
    type Err = IntervalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let unit = s.chars().last().ok_or(IntervalError::Empty)?;
        let value = &s[..s.len() - unit.len_utf8()];

        let multiplier = match unit {
            'm' => SECONDS_PER_MINUTE,
            'h' => SECONDS_PER_HOUR,
            'd' => SECONDS_PER_DAY,
            other => return Err(IntervalError::InvalidUnit(other)),
        };

        let amount: i64 = value
            .parse()
            .map_err(|_| IntervalError::InvalidValue(value.to_string()))?;
        if amount <= 0 {
            return Err(IntervalError::NonPositive(amount));
        }

        let seconds = amount
            .unsigned_abs()
            .checked_mul(multiplier)
            .ok_or_else(|| IntervalError::Overflow(s.to_string()))?;

        Ok(Self(Duration::from_secs(seconds)))
    }
}

impl fmt::Display for PollingInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}
