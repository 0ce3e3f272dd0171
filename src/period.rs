use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AnalyticsError, Result};

/// Offset of the helpdesk's local time (WIB) from UTC.
pub const DEFAULT_UTC_OFFSET: &str = "+07:00";

/// A calendar month in the reporting time zone, written as `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Period {
    year: i32,
    month: u32,
}

/// Half-open instant range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant < self.end
    }
}

impl Period {
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(1..=12).contains(&month) || !(1..=9999).contains(&year) {
            return Err(AnalyticsError::InvalidPeriod(format!("{year:04}-{month:02}")));
        }
        Ok(Self { year, month })
    }

    pub fn containing(instant: DateTime<Utc>, offset: FixedOffset) -> Self {
        let local = instant.with_timezone(&offset);
        Self {
            year: local.year(),
            month: local.month(),
        }
    }

    pub fn current(offset: FixedOffset) -> Self {
        Self::containing(Utc::now(), offset)
    }

    pub fn next(&self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    pub fn previous(&self) -> Self {
        if self.month == 1 {
            Self {
                year: self.year - 1,
                month: 12,
            }
        } else {
            Self {
                year: self.year,
                month: self.month - 1,
            }
        }
    }

    pub fn first_day(&self) -> NaiveDate {
        // month and year are validated on construction
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    /// Local midnight of the first day, as a UTC instant.
    pub fn start(&self, offset: FixedOffset) -> DateTime<Utc> {
        let local_midnight = self.first_day().and_time(chrono::NaiveTime::default());
        let midnight = Utc.from_utc_datetime(&local_midnight);
        midnight - Duration::seconds(i64::from(offset.local_minus_utc()))
    }

    pub fn range(&self, offset: FixedOffset) -> TimeRange {
        TimeRange {
            start: self.start(offset),
            end: self.next().start(offset),
        }
    }

    /// Months from `from` through `to`, both inclusive.
    pub fn window(from: Period, to: Period, offset: FixedOffset) -> Result<TimeRange> {
        if from > to {
            return Err(AnalyticsError::InvalidRange { from, to });
        }
        Ok(TimeRange {
            start: from.start(offset),
            end: to.next().start(offset),
        })
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for Period {
    type Err = AnalyticsError;

    fn from_str(value: &str) -> Result<Self> {
        let invalid = || AnalyticsError::InvalidPeriod(value.to_string());
        let (year, month) = value.trim().split_once('-').ok_or_else(invalid)?;

        if year.len() != 4 || month.len() != 2 {
            return Err(invalid());
        }
        if !year.bytes().chain(month.bytes()).all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }

        let year: i32 = year.parse().map_err(|_| invalid())?;
        let month: u32 = month.parse().map_err(|_| invalid())?;
        Self::new(year, month).map_err(|_| invalid())
    }
}

impl From<Period> for String {
    fn from(period: Period) -> Self {
        period.to_string()
    }
}

impl TryFrom<String> for Period {
    type Error = AnalyticsError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

/// Resolves optional `--from`/`--to` months into inclusive month bounds.
///
/// A lone bound selects that single month.
pub fn resolve_months(from: Option<&str>, to: Option<&str>) -> Result<Option<(Period, Period)>> {
    let from = from.map(str::parse::<Period>).transpose()?;
    let to = to.map(str::parse::<Period>).transpose()?;

    let bounds = match (from, to) {
        (None, None) => return Ok(None),
        (Some(from), None) => (from, from),
        (None, Some(to)) => (to, to),
        (Some(from), Some(to)) => (from, to),
    };
    if bounds.0 > bounds.1 {
        return Err(AnalyticsError::InvalidRange {
            from: bounds.0,
            to: bounds.1,
        });
    }
    Ok(Some(bounds))
}

/// Resolves optional `--from`/`--to` months into a time window.
pub fn resolve_window(
    from: Option<&str>,
    to: Option<&str>,
    offset: FixedOffset,
) -> Result<Option<TimeRange>> {
    resolve_months(from, to)?
        .map(|(from, to)| Period::window(from, to, offset))
        .transpose()
}
