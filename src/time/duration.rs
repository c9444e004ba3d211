//! Duration Expression Parser
//!
//! Parses signed duration strings into `chrono::Duration`.
//!
//! # Supported Syntax
//!
//! ```text
//! [+|-] <number><unit> [<number><unit> ...]
//! ```
//!
//! # Examples
//!
//! ```text
//! -30s
//! -1h
//! -1h30m
//! -1.5d
//! -2 weeks
//! ```

use chrono::Duration;
use nom::{
    branch::alt,
    bytes::complete::tag_no_case,
    character::complete::{char, digit1, multispace0, one_of},
    combinator::{all_consuming, opt, recognize, value},
    multi::many1,
    sequence::{pair, tuple},
    IResult,
};

use crate::error::{ClientError, ClientResult};

const NANOS_PER_MICRO: i64 = 1_000;
const NANOS_PER_MILLI: i64 = 1_000_000;
const NANOS_PER_SECOND: i64 = 1_000_000_000;
const NANOS_PER_MINUTE: i64 = 60 * NANOS_PER_SECOND;
const NANOS_PER_HOUR: i64 = 60 * NANOS_PER_MINUTE;
const NANOS_PER_DAY: i64 = 24 * NANOS_PER_HOUR;
const NANOS_PER_WEEK: i64 = 7 * NANOS_PER_DAY;

/// Parse a duration expression like "-1h" or "-1h30m"
pub fn parse_duration(input: &str) -> ClientResult<Duration> {
    let trimmed = input.trim();

    let (_, (sign, parts)) = all_consuming(parse_expression)(trimmed).map_err(|_| {
        ClientError::invalid_time(
            input,
            "expected an absolute time or a duration such as -30s, -1h, -2d, -1w",
        )
    })?;

    let mut total: i64 = 0;
    for (number, unit) in parts {
        let nanos = component_nanos(number, unit)
            .ok_or_else(|| ClientError::invalid_time(input, "duration out of range"))?;
        total = total
            .checked_add(nanos)
            .ok_or_else(|| ClientError::invalid_time(input, "duration out of range"))?;
    }

    if sign == Some('-') {
        total = -total;
    }

    Ok(Duration::nanoseconds(total))
}

/// Nanoseconds represented by one `<number><unit>` component
fn component_nanos(number: &str, unit: i64) -> Option<i64> {
    if number.contains('.') {
        let scaled = number.parse::<f64>().ok()? * unit as f64;
        if !scaled.is_finite() || scaled.abs() >= i64::MAX as f64 {
            return None;
        }
        Some(scaled.round() as i64)
    } else {
        number.parse::<i64>().ok()?.checked_mul(unit)
    }
}

/// Parse the full expression: optional sign followed by one or more components
fn parse_expression(input: &str) -> IResult<&str, (Option<char>, Vec<(&str, i64)>)> {
    let (input, sign) = opt(one_of("+-"))(input)?;
    let (input, parts) = many1(parse_component)(input)?;
    let (input, _) = multispace0(input)?;
    Ok((input, (sign, parts)))
}

/// Parse a single component like "30m" or "2 weeks"
fn parse_component(input: &str) -> IResult<&str, (&str, i64)> {
    let (input, _) = multispace0(input)?;
    let (input, number) = parse_number(input)?;
    let (input, _) = multispace0(input)?;
    let (input, unit) = parse_unit(input)?;
    Ok((input, (number, unit)))
}

/// Parse an unsigned decimal number
fn parse_number(input: &str) -> IResult<&str, &str> {
    alt((
        recognize(tuple((digit1, opt(pair(char('.'), digit1))))),
        recognize(pair(char('.'), digit1)),
    ))(input)
}

/// Parse a unit suffix, returning its length in nanoseconds.
/// Longer spellings are tried before their prefixes ("ms" before "m").
fn parse_unit(input: &str) -> IResult<&str, i64> {
    alt((
        value(
            1,
            alt((
                tag_no_case("nanoseconds"),
                tag_no_case("nanosecond"),
                tag_no_case("nanos"),
                tag_no_case("ns"),
            )),
        ),
        value(
            NANOS_PER_MICRO,
            alt((
                tag_no_case("microseconds"),
                tag_no_case("microsecond"),
                tag_no_case("micros"),
                tag_no_case("us"),
            )),
        ),
        value(
            NANOS_PER_MILLI,
            alt((
                tag_no_case("milliseconds"),
                tag_no_case("millisecond"),
                tag_no_case("millis"),
                tag_no_case("ms"),
            )),
        ),
        value(
            NANOS_PER_SECOND,
            alt((
                tag_no_case("seconds"),
                tag_no_case("second"),
                tag_no_case("secs"),
                tag_no_case("sec"),
                tag_no_case("s"),
            )),
        ),
        value(
            NANOS_PER_MINUTE,
            alt((
                tag_no_case("minutes"),
                tag_no_case("minute"),
                tag_no_case("mins"),
                tag_no_case("min"),
                tag_no_case("m"),
            )),
        ),
        value(
            NANOS_PER_HOUR,
            alt((
                tag_no_case("hours"),
                tag_no_case("hour"),
                tag_no_case("hrs"),
                tag_no_case("hr"),
                tag_no_case("h"),
            )),
        ),
        value(
            NANOS_PER_DAY,
            alt((tag_no_case("days"), tag_no_case("day"), tag_no_case("d"))),
        ),
        value(
            NANOS_PER_WEEK,
            alt((tag_no_case("weeks"), tag_no_case("week"), tag_no_case("w"))),
        ),
    ))(input)
}
