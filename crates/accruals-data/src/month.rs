//! Calendar month identifiers (`time_avail_m`).

use crate::error::DataError;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A calendar month stored as a month ordinal (`year * 12 + month - 1`).
///
/// Month arithmetic is integer addition, so the twelve-month expansion of
/// an annual observation is `(0..12).map(|k| m.plus_months(k))`.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    derive_more::From,
    derive_more::Into,
)]
#[serde(transparent)]
pub struct MonthId(i32);

impl MonthId {
    /// Earliest accepted calendar year.
    pub const MIN_YEAR: i32 = 1;

    /// Latest accepted calendar year.
    pub const MAX_YEAR: i32 = 9999;

    /// Create a month from a year and a 1-based month number.
    ///
    /// Returns `None` when `month` is outside `1..=12` or `year` is outside
    /// [`Self::MIN_YEAR`]`..=`[`Self::MAX_YEAR`].
    pub const fn new(year: i32, month: u32) -> Option<Self> {
        if month < 1 || month > 12 || year < Self::MIN_YEAR || year > Self::MAX_YEAR {
            return None;
        }
        Some(Self(year * 12 + month as i32 - 1))
    }

    /// The month containing `date`.
    pub fn from_date(date: NaiveDate) -> Self {
        Self(date.year() * 12 + date.month0() as i32)
    }

    /// Calendar year.
    pub const fn year(self) -> i32 {
        self.0.div_euclid(12)
    }

    /// Month number, 1 to 12.
    pub const fn month(self) -> u32 {
        self.0.rem_euclid(12) as u32 + 1
    }

    /// Output key `year * 100 + month`.
    pub const fn yyyymm(self) -> i32 {
        self.year() * 100 + self.month() as i32
    }

    /// The month `months` later (earlier when negative).
    pub const fn plus_months(self, months: i32) -> Self {
        Self(self.0 + months)
    }
}

impl fmt::Display for MonthId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year(), self.month())
    }
}

impl FromStr for MonthId {
    type Err = DataError;

    /// Accepts `YYYY-MM`, `YYYY-MM-DD` (day ignored), `YYYYMM` and the
    /// Stata monthly form `YYYYmM`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        let invalid = || DataError::InvalidMonth(s.to_string());

        let (year, month) = if let Some((y, m)) = text.split_once(['m', 'M']) {
            (y, m)
        } else if text.contains('-') {
            let mut parts = text.splitn(3, '-');
            let y = parts.next().ok_or_else(invalid)?;
            let m = parts.next().ok_or_else(invalid)?;
            (y, m)
        } else if text.len() == 6 && text.bytes().all(|b| b.is_ascii_digit()) {
            text.split_at(4)
        } else {
            return Err(invalid());
        };

        let year: i32 = year.parse().map_err(|_| invalid())?;
        let month: u32 = month.parse().map_err(|_| invalid())?;
        Self::new(year, month).ok_or_else(invalid)
    }
}
