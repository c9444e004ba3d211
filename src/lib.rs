//! # sage-data-client
//!
//! Client for the Sage sensor-network data API. A query is one POST of a JSON
//! descriptor; the newline-delimited JSON response is decoded into a [`Table`].
//!
//! ## Modules
//!
//! - [`time`]: absolute and relative time expressions
//! - [`query`]: query builder and blocking transport
//! - [`decode`]: streaming NDJSON decoder, tables, and export
//! - [`config`]: TOML config with environment overrides
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sage_data_client::{load, query, Query};
//!
//! // Latest temperature reading from each sensor in the last hour
//! let table = query(
//!     &Query::new("-1h")
//!         .filter("name", "env.temperature")
//!         .filter("vsn", "W0*")
//!         .tail(1),
//! )?;
//!
//! for (vsn, value) in table.meta("vsn").unwrap_or_default().iter().zip(table.values()) {
//!     println!("{}: {}", vsn.unwrap_or("-"), value);
//! }
//!
//! // Saved responses (optionally gzipped) load into the same table shape
//! let saved = load("responses/temperature.ndjson.gz")?;
//! println!("{} saved rows", saved.len());
//! # Ok::<(), sage_data_client::ClientError>(())
//! ```

pub mod config;
pub mod decode;
pub mod error;
pub mod query;
pub mod time;

pub use config::{ClientConfig, Config, LoggingConfig};

pub use decode::{load, load_reader, Cell, Column, ColumnType, Record, Source, Table, Value};

pub use error::{ClientError, ClientResult};

pub use query::{query, DataClient, Query, QueryDescriptor};

pub use time::{format_wire, resolve, TimeExpr, TimeInput};
