//! Streaming Decoder
//!
//! Turns a newline-delimited JSON response into a [`Table`]:
//!
//! - **source**: paths, readers, buffers; gzip detection
//! - **record**: `Record`, `Value`, per-line decoding, lazy `Decoder`
//! - **table**: `Table`, `Column`, `Cell`, meta column discovery
//! - **export**: write a table back out as NDJSON or CSV
//!
//! # Pipeline
//!
//! ```text
//! Source → (gunzip) → lines → decode_line → TableBuilder → Table
//! ```
//!
//! A source with no records yields [`Table::empty`]. Any malformed line fails
//! the whole load; partial tables are never returned.

mod export;
mod record;
mod source;
mod table;

pub use record::{decode_line, Decoder, Record, Value, META_PREFIX};
pub use source::Source;
pub(crate) use source::wrap_stream;
pub use table::{
    Cell, Column, ColumnType, Table, TableBuilder, FIXED_COLUMNS, NAME_COLUMN, TIMESTAMP_COLUMN,
    VALUE_COLUMN,
};

use std::io::BufRead;

use crate::error::ClientResult;

/// Load a saved response from a path, reader, or buffer
pub fn load(source: impl Into<Source>) -> ClientResult<Table> {
    let source = source.into();
    let description = source.describe();
    let reader = source.open()?;

    let table = load_reader(reader)?;
    tracing::info!(
        source = %description,
        rows = table.len(),
        columns = table.columns().len(),
        "Loaded records"
    );
    Ok(table)
}

/// Decode an already-buffered line stream
pub fn load_reader<R: BufRead>(reader: R) -> ClientResult<Table> {
    let mut decoder = Decoder::new(reader);
    let mut builder = TableBuilder::new();

    for record in &mut decoder {
        builder.push(record?);
    }

    if builder.is_empty() {
        tracing::debug!(lines = decoder.lines_read(), "No records in stream");
    }

    Ok(builder.finish())
}
