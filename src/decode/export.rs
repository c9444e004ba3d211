//! Table export
//!
//! - NDJSON in the response wire schema, so a saved table loads back unchanged
//! - CSV with one column per table column, nulls as empty fields

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write;

use crate::decode::record::{Record, Value};
use crate::decode::table::Table;
use crate::error::{ClientError, ClientResult};

#[derive(Serialize)]
#[serde(untagged)]
enum WireTimestamp {
    Nanos(i64),
    Text(String),
}

#[derive(Serialize)]
struct WireRecordOut<'a> {
    timestamp: WireTimestamp,
    name: &'a str,
    value: &'a Value,
    meta: &'a BTreeMap<String, String>,
}

impl<'a> From<&'a Record> for WireRecordOut<'a> {
    fn from(record: &'a Record) -> Self {
        Self {
            timestamp: wire_timestamp(&record.timestamp),
            name: &record.name,
            value: &record.value,
            meta: &record.meta,
        }
    }
}

/// Integer nanoseconds when representable, RFC 3339 otherwise
fn wire_timestamp(dt: &DateTime<Utc>) -> WireTimestamp {
    match dt.timestamp_nanos_opt() {
        Some(nanos) => WireTimestamp::Nanos(nanos),
        None => WireTimestamp::Text(dt.to_rfc3339_opts(SecondsFormat::Nanos, true)),
    }
}

impl Table {
    /// Write the table as newline-delimited JSON records
    pub fn write_ndjson<W: Write>(&self, mut writer: W) -> ClientResult<()> {
        for record in self.records() {
            serde_json::to_writer(&mut writer, &WireRecordOut::from(record))
                .map_err(|e| ClientError::Write(e.into()))?;
            writer.write_all(b"\n").map_err(ClientError::Write)?;
        }
        writer.flush().map_err(ClientError::Write)
    }

    /// Write the table as CSV with a header row
    pub fn write_csv<W: Write>(&self, writer: W) -> ClientResult<()> {
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer
            .write_record(self.columns())
            .map_err(|e| ClientError::Write(e.into()))?;

        for row in 0..self.len() {
            let fields: Vec<String> = self
                .columns()
                .iter()
                .map(|c| self.cell(row, c).map(|cell| cell.to_string()).unwrap_or_default())
                .collect();
            csv_writer
                .write_record(&fields)
                .map_err(|e| ClientError::Write(e.into()))?;
        }

        csv_writer.flush().map_err(ClientError::Write)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::load_reader;
    use chrono::TimeZone;
    use std::io::Cursor;

    fn sample() -> Table {
        let ts = Utc.timestamp_nanos(1634247741149425156);
        Table::from_records(vec![
            Record::new(ts, "env.temperature", 21.74).meta("vsn", "W01C"),
            Record::new(ts, "env.temperature", 123i64)
                .meta("vsn", "W01A")
                .meta("node", "000048b02d15c31a"),
        ])
    }

    #[test]
    fn test_ndjson_uses_wire_schema() {
        let mut out = Vec::new();
        sample().write_ndjson(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let first = text.lines().next().unwrap();
        assert_eq!(
            first,
            r#"{"timestamp":1634247741149425156,"name":"env.temperature","value":21.74,"meta":{"vsn":"W01C"}}"#
        );
    }

    #[test]
    fn test_saved_ndjson_loads_back() {
        let table = sample();
        let mut out = Vec::new();
        table.write_ndjson(&mut out).unwrap();
        let reloaded = load_reader(Cursor::new(out)).unwrap();
        assert_eq!(reloaded, table);
    }

    #[test]
    fn test_csv_has_header_and_empty_nulls() {
        let mut out = Vec::new();
        sample().write_csv(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "timestamp,name,value,meta.vsn,meta.node");
        assert_eq!(
            lines[1],
            "2021-10-14T21:42:21.149425156Z,env.temperature,21.74,W01C,"
        );
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_empty_table_csv_is_header_only() {
        let mut out = Vec::new();
        Table::empty().write_csv(&mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "timestamp,name,value\n");
    }
}
