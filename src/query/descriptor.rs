//! Query descriptor
//!
//! `Query` is the caller-facing builder; `QueryDescriptor` is the resolved,
//! validated JSON body sent to the API:
//!
//! ```text
//! {"start": "2021-10-14T20:42:21.149425Z", "tail": 1, "filter": {"name": "env.temperature"}}
//! ```

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

use crate::error::{ClientError, ClientResult};
use crate::time::{format_wire, TimeExpr, TimeInput};

/// A query against the data API
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    start: TimeInput,
    end: Option<TimeInput>,
    head: Option<u64>,
    tail: Option<u64>,
    filter: Option<BTreeMap<String, String>>,
    bucket: Option<String>,
    function: Option<String>,
    window: Option<String>,
    endpoint: Option<String>,
}

impl Query {
    /// Start a query at `start` ("-1h", "2021-05-01T10:30:00Z", an instant, or an offset)
    pub fn new(start: impl Into<TimeInput>) -> Self {
        Self {
            start: start.into(),
            end: None,
            head: None,
            tail: None,
            filter: None,
            bucket: None,
            function: None,
            window: None,
            endpoint: None,
        }
    }

    /// Set the end of the time range
    pub fn end(mut self, end: impl Into<TimeInput>) -> Self {
        self.end = Some(end.into());
        self
    }

    /// Limit the response to the earliest `n` records per series
    pub fn head(mut self, n: u64) -> Self {
        self.head = Some(n);
        self
    }

    /// Limit the response to the latest `n` records per series
    pub fn tail(mut self, n: u64) -> Self {
        self.tail = Some(n);
        self
    }

    /// Add a filter; patterns like "env.*" or "W0[1-2]*" are matched server-side
    pub fn filter(mut self, field: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.filter
            .get_or_insert_with(BTreeMap::new)
            .insert(field.into(), pattern.into());
        self
    }

    /// Replace all filters
    pub fn filters(mut self, filters: BTreeMap<String, String>) -> Self {
        self.filter = Some(filters);
        self
    }

    /// Name of the bucket to query
    pub fn bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = Some(bucket.into());
        self
    }

    /// Experimental aggregation function applied server-side
    pub fn function(mut self, function: impl Into<String>) -> Self {
        self.function = Some(function.into());
        self
    }

    /// Experimental aggregation window applied server-side
    pub fn window(mut self, window: impl Into<String>) -> Self {
        self.window = Some(window.into());
        self
    }

    /// Send this query to a specific endpoint instead of the client's
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn endpoint_override(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    /// Validate and resolve against `now`
    pub fn descriptor_at(&self, now: DateTime<Utc>) -> ClientResult<QueryDescriptor> {
        if self.head.is_some() && self.tail.is_some() {
            return Err(ClientError::ConflictingLimits);
        }

        let start = TimeExpr::parse(&self.start)?.resolve_at(now)?;
        let end = match &self.end {
            Some(end) => Some(TimeExpr::parse(end)?.resolve_at(now)?),
            None => None,
        };

        Ok(QueryDescriptor {
            start,
            end,
            head: self.head,
            tail: self.tail,
            filter: self.filter.clone(),
            bucket: self.bucket.clone(),
            experimental_func: self.function.clone(),
            experimental_window: self.window.clone(),
        })
    }

    /// Validate and resolve against the current time
    pub fn descriptor(&self) -> ClientResult<QueryDescriptor> {
        self.descriptor_at(Utc::now())
    }
}

/// The request body, with times resolved
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryDescriptor {
    #[serde(serialize_with = "serialize_instant")]
    pub start: DateTime<Utc>,
    #[serde(
        serialize_with = "serialize_opt_instant",
        skip_serializing_if = "Option::is_none"
    )]
    pub end: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub head: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tail: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experimental_func: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experimental_window: Option<String>,
}

impl QueryDescriptor {
    pub fn to_json(&self) -> ClientResult<Vec<u8>> {
        serde_json::to_vec(self)
            .map_err(|e| ClientError::Transport(format!("failed to encode query: {}", e)))
    }
}

fn serialize_instant<S: Serializer>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format_wire(dt))
}

fn serialize_opt_instant<S: Serializer>(
    dt: &Option<DateTime<Utc>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match dt {
        Some(dt) => serialize_instant(dt, serializer),
        None => serializer.serialize_none(),
    }
}
