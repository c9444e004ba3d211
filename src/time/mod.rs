//! Time Resolution
//!
//! Converts start/end arguments into UTC instants for the query wire format:
//!
//! - **resolver**: `TimeInput` / `TimeExpr`, absolute parsing, wire formatting
//! - **duration**: signed duration expressions ("-1h", "-1h30m", "-2 weeks")
//!
//! # Example
//!
//! ```rust
//! use chrono::{TimeZone, Utc};
//! use sage_data_client::time::{format_wire, resolve_at};
//!
//! let now = Utc.with_ymd_and_hms(2021, 10, 14, 12, 0, 0).unwrap();
//! let start = resolve_at("-1h", now).unwrap();
//! assert_eq!(format_wire(&start), "2021-10-14T11:00:00.000000Z");
//! ```

mod duration;
mod resolver;

pub use duration::parse_duration;
pub use resolver::{
    format_wire, parse_absolute, resolve, resolve_at, TimeExpr, TimeInput, WIRE_FORMAT,
};
