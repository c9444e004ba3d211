//! Query Builder & Transport
//!
//! Builds the JSON query descriptor and sends it to the data API:
//!
//! - **descriptor**: `Query` builder, validation, `QueryDescriptor` wire body
//! - **client**: blocking HTTP client that streams the response into the decoder
//!
//! # Example
//!
//! ```rust,no_run
//! use sage_data_client::query::Query;
//!
//! let table = sage_data_client::query(
//!     &Query::new("-1h").filter("name", "env.temperature").tail(1),
//! )?;
//! println!("{} rows", table.len());
//! # Ok::<(), sage_data_client::ClientError>(())
//! ```

mod client;
mod descriptor;

pub use client::{query, DataClient};
pub use descriptor::{Query, QueryDescriptor};
