//! Record decoding
//!
//! One line of the response stream is one JSON object:
//!
//! ```text
//! {"timestamp": <ns since epoch>, "name": "...", "value": <number|string|bool>, "meta": {...}}
//! ```
//!
//! `timestamp` may be an integer, a string of digits, or an RFC 3339 string.
//! `value` keeps its JSON type. Integers that do not fit `i64` and floats
//! outside `f64` range are rejected rather than silently widened.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use std::collections::BTreeMap;
use std::io::BufRead;

use crate::error::{ClientError, ClientResult};

/// Prefix applied to flattened metadata columns
pub const META_PREFIX: &str = "meta.";

/// A measurement value with its JSON type preserved
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
}

impl Value {
    /// Numeric view of the value; strings and booleans are not coerced
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_))
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Str(s) => write!(f, "{}", s),
            Value::Bool(b) => write!(f, "{}", b),
        }
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

/// One decoded measurement
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Measurement instant, nanosecond resolution
    pub timestamp: DateTime<Utc>,
    /// Measurement name (e.g. "env.temperature")
    pub name: String,
    /// Measurement value
    pub value: Value,
    /// Provenance fields (node, vsn, sensor, plugin, ...)
    pub meta: BTreeMap<String, String>,
}

impl Record {
    pub fn new(timestamp: DateTime<Utc>, name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            timestamp,
            name: name.into(),
            value: value.into(),
            meta: BTreeMap::new(),
        }
    }

    /// Builder method: add a metadata field
    pub fn meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    /// Metadata value by bare key ("vsn", not "meta.vsn")
    pub fn meta_value(&self, key: &str) -> Option<&str> {
        self.meta.get(key).map(String::as_str)
    }
}

#[derive(Deserialize)]
struct WireRecord<'a> {
    #[serde(borrow)]
    timestamp: &'a RawValue,
    #[serde(borrow)]
    name: &'a RawValue,
    #[serde(borrow)]
    value: &'a RawValue,
    meta: BTreeMap<String, String>,
}

/// Decode a single line into a record. `line_no` is 1-based and only used for errors.
pub fn decode_line(line: &str, line_no: usize) -> ClientResult<Record> {
    let at = Some(line_no);
    let wire: WireRecord<'_> =
        serde_json::from_str(line.trim()).map_err(|e| ClientError::decode(at, e.to_string()))?;

    Ok(Record {
        timestamp: decode_timestamp(wire.timestamp.get()).map_err(|m| ClientError::decode(at, m))?,
        name: decode_name(wire.name.get()).map_err(|m| ClientError::decode(at, m))?,
        value: decode_value(wire.value.get()).map_err(|m| ClientError::decode(at, m))?,
        meta: wire.meta,
    })
}

fn decode_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    if raw.starts_with('"') {
        let text: String = serde_json::from_str(raw).map_err(|e| e.to_string())?;
        if let Ok(nanos) = text.parse::<i64>() {
            return Ok(Utc.timestamp_nanos(nanos));
        }
        return DateTime::parse_from_rfc3339(&text)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| format!("invalid timestamp '{}': {}", text, e));
    }

    raw.parse::<i64>()
        .map(|nanos| Utc.timestamp_nanos(nanos))
        .map_err(|_| format!("timestamp must be integer nanoseconds, got {}", raw))
}

fn decode_name(raw: &str) -> Result<String, String> {
    match raw.as_bytes().first() {
        Some(b'"') => serde_json::from_str(raw).map_err(|e| e.to_string()),
        Some(b'-' | b'0'..=b'9') => Ok(raw.to_string()),
        _ => Err(format!("name must be a string, got {}", raw)),
    }
}

fn decode_value(raw: &str) -> Result<Value, String> {
    match raw.as_bytes().first() {
        Some(b'"') => serde_json::from_str(raw)
            .map(Value::Str)
            .map_err(|e| e.to_string()),
        Some(b't' | b'f') => serde_json::from_str(raw)
            .map(Value::Bool)
            .map_err(|e| e.to_string()),
        Some(b'-' | b'0'..=b'9') => {
            if raw.contains(&['.', 'e', 'E'][..]) {
                let value = serde_json::from_str::<f64>(raw)
                    .map_err(|e| format!("float value {} rejected: {}", raw, e))?;
                if value == 0.0 && has_nonzero_mantissa(raw) {
                    return Err(format!("float value {} is too small for 64 bits", raw));
                }
                Ok(Value::Float(value))
            } else {
                raw.parse::<i64>()
                    .map(Value::Int)
                    .map_err(|_| format!("integer value {} does not fit in 64 bits", raw))
            }
        }
        _ => Err(format!(
            "value must be a number, string, or bool, got {}",
            raw
        )),
    }
}

/// True when the digits before any exponent are not all zero
fn has_nonzero_mantissa(raw: &str) -> bool {
    raw.split(&['e', 'E'][..])
        .next()
        .map(|m| m.bytes().any(|b| (b'1'..=b'9').contains(&b)))
        .unwrap_or(false)
}

/// Lazy line-by-line decoder over a newline-delimited JSON stream.
///
/// Whitespace-only lines are skipped. After the first error the iterator is fused.
pub struct Decoder<R> {
    reader: R,
    buf: String,
    line_no: usize,
    done: bool,
}

impl<R: BufRead> Decoder<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: String::new(),
            line_no: 0,
            done: false,
        }
    }

    /// Number of lines consumed so far
    pub fn lines_read(&self) -> usize {
        self.line_no
    }
}

impl<R: BufRead> Iterator for Decoder<R> {
    type Item = ClientResult<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        loop {
            self.buf.clear();
            match self.reader.read_line(&mut self.buf) {
                Ok(0) => {
                    self.done = true;
                    return None;
                }
                Ok(_) => {
                    self.line_no += 1;
                    if self.buf.trim().is_empty() {
                        continue;
                    }
                    let result = decode_line(&self.buf, self.line_no);
                    self.done = result.is_err();
                    return Some(result);
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(ClientError::decode(
                        Some(self.line_no + 1),
                        format!("stream read failed: {}", e),
                    )));
                }
            }
        }
    }
}
