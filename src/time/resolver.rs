//! Time Resolver
//!
//! Turns a start/end argument into a UTC instant. Strings are first tried as
//! absolute calendar times and only then as relative durations from "now".

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};

use crate::error::{ClientError, ClientResult};
use crate::time::duration::parse_duration;

/// Wire format for instants sent to the query API
pub const WIRE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
];

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// A time argument as supplied by the caller
#[derive(Debug, Clone, PartialEq)]
pub enum TimeInput {
    /// Unparsed text: absolute ("2021-05-01T10:30:00Z") or relative ("-1h")
    Text(String),
    /// A native instant
    Instant(DateTime<Utc>),
    /// A structured offset from now
    Offset(Duration),
}

impl From<&str> for TimeInput {
    fn from(s: &str) -> Self {
        TimeInput::Text(s.to_string())
    }
}

impl From<String> for TimeInput {
    fn from(s: String) -> Self {
        TimeInput::Text(s)
    }
}

impl From<&String> for TimeInput {
    fn from(s: &String) -> Self {
        TimeInput::Text(s.clone())
    }
}

impl<Tz: TimeZone> From<DateTime<Tz>> for TimeInput {
    fn from(dt: DateTime<Tz>) -> Self {
        TimeInput::Instant(dt.with_timezone(&Utc))
    }
}

impl From<NaiveDateTime> for TimeInput {
    fn from(dt: NaiveDateTime) -> Self {
        TimeInput::Instant(dt.and_utc())
    }
}

impl From<Duration> for TimeInput {
    fn from(d: Duration) -> Self {
        TimeInput::Offset(d)
    }
}

impl std::fmt::Display for TimeInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimeInput::Text(s) => write!(f, "{}", s),
            TimeInput::Instant(dt) => write!(f, "{}", format_wire(dt)),
            TimeInput::Offset(d) => write!(f, "{}", d),
        }
    }
}

/// A parsed time expression
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeExpr {
    /// A fixed point in time
    Absolute(DateTime<Utc>),
    /// An offset from the moment of resolution
    Relative(Duration),
}

impl TimeExpr {
    /// Parse a caller-supplied time argument
    pub fn parse(input: &TimeInput) -> ClientResult<Self> {
        match input {
            TimeInput::Text(s) => Self::parse_str(s),
            TimeInput::Instant(dt) => Ok(TimeExpr::Absolute(*dt)),
            TimeInput::Offset(d) => Ok(TimeExpr::Relative(*d)),
        }
    }

    /// Parse text, trying absolute formats before the duration grammar
    pub fn parse_str(s: &str) -> ClientResult<Self> {
        let trimmed = s.trim();

        if trimmed.eq_ignore_ascii_case("now") {
            return Ok(TimeExpr::Relative(Duration::zero()));
        }

        match parse_absolute(trimmed) {
            Some(dt) => Ok(TimeExpr::Absolute(dt)),
            None => parse_duration(s).map(TimeExpr::Relative),
        }
    }

    /// Resolve against an explicit reference instant
    pub fn resolve_at(&self, now: DateTime<Utc>) -> ClientResult<DateTime<Utc>> {
        match self {
            TimeExpr::Absolute(dt) => Ok(*dt),
            TimeExpr::Relative(offset) => now.checked_add_signed(*offset).ok_or_else(|| {
                ClientError::invalid_time(offset.to_string(), "offset from now is out of range")
            }),
        }
    }
}

/// Parse an absolute calendar time, converting it to UTC.
///
/// Times without a zone are taken as UTC; a bare date means midnight UTC.
pub fn parse_absolute(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }

    for fmt in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.and_utc());
        }
    }

    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

/// Resolve a time argument to a UTC instant, reading the clock once
pub fn resolve(t: impl Into<TimeInput>) -> ClientResult<DateTime<Utc>> {
    resolve_at(t, Utc::now())
}

/// Resolve a time argument against a fixed "now"
pub fn resolve_at(t: impl Into<TimeInput>, now: DateTime<Utc>) -> ClientResult<DateTime<Utc>> {
    TimeExpr::parse(&t.into())?.resolve_at(now)
}

/// Render an instant for the wire: microsecond precision, literal `Z`.
/// Sub-microsecond digits are truncated.
pub fn format_wire(dt: &DateTime<Utc>) -> String {
    dt.format(WIRE_FORMAT).to_string()
}
