//! Result Table
//!
//! The normalized tabular result of a query or load. Rows are stored as
//! decoded records; columns are views over them:
//!
//! ```text
//! timestamp | name | value | meta.<key> ...
//! ```
//!
//! Meta columns are discovered by scanning the whole batch, in first-seen
//! order. A row without a given meta key reads as `Cell::Null` in that column.

use chrono::{DateTime, SecondsFormat, Utc};
use std::collections::HashSet;

use crate::decode::record::{Record, Value, META_PREFIX};

pub const TIMESTAMP_COLUMN: &str = "timestamp";
pub const NAME_COLUMN: &str = "name";
pub const VALUE_COLUMN: &str = "value";

/// Columns every table has, including an empty one
pub const FIXED_COLUMNS: [&str; 3] = [TIMESTAMP_COLUMN, NAME_COLUMN, VALUE_COLUMN];

/// Logical type of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    /// UTC instants
    Timestamp,
    /// Strings, possibly with nulls
    Utf8,
    Int,
    Float,
    Bool,
    /// Values of more than one type
    Mixed,
    /// No rows to infer a type from
    Empty,
}

impl ColumnType {
    fn of_value(value: &Value) -> Self {
        match value {
            Value::Int(_) => ColumnType::Int,
            Value::Float(_) => ColumnType::Float,
            Value::Str(_) => ColumnType::Utf8,
            Value::Bool(_) => ColumnType::Bool,
        }
    }
}

impl std::fmt::Display for ColumnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ColumnType::Timestamp => write!(f, "timestamp"),
            ColumnType::Utf8 => write!(f, "string"),
            ColumnType::Int => write!(f, "int"),
            ColumnType::Float => write!(f, "float"),
            ColumnType::Bool => write!(f, "bool"),
            ColumnType::Mixed => write!(f, "mixed"),
            ColumnType::Empty => write!(f, "empty"),
        }
    }
}

/// A single cell
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Cell<'a> {
    Timestamp(DateTime<Utc>),
    Str(&'a str),
    Value(&'a Value),
    Null,
}

impl Cell<'_> {
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }
}

impl std::fmt::Display for Cell<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Cell::Timestamp(dt) => write!(f, "{}", dt.to_rfc3339_opts(SecondsFormat::Nanos, true)),
            Cell::Str(s) => write!(f, "{}", s),
            Cell::Value(v) => write!(f, "{}", v),
            Cell::Null => Ok(()),
        }
    }
}

impl Record {
    /// Look up a cell by column name. Absent `meta.*` keys read as null.
    pub fn get(&self, column: &str) -> Option<Cell<'_>> {
        match column {
            TIMESTAMP_COLUMN => Some(Cell::Timestamp(self.timestamp)),
            NAME_COLUMN => Some(Cell::Str(&self.name)),
            VALUE_COLUMN => Some(Cell::Value(&self.value)),
            _ => {
                let key = column.strip_prefix(META_PREFIX)?;
                Some(
                    self.meta
                        .get(key)
                        .map(|v| Cell::Str(v))
                        .unwrap_or(Cell::Null),
                )
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum ColumnKind<'a> {
    Timestamp,
    Name,
    Value,
    Meta(&'a str),
}

/// A column view over a table
#[derive(Debug, Clone, Copy)]
pub struct Column<'a> {
    name: &'a str,
    kind: ColumnKind<'a>,
    records: &'a [Record],
}

impl<'a> Column<'a> {
    pub fn name(&self) -> &'a str {
        self.name
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, row: usize) -> Option<Cell<'a>> {
        self.records.get(row).map(|r| self.cell(r))
    }

    pub fn iter(&self) -> impl Iterator<Item = Cell<'a>> + 'a {
        let column = *self;
        self.records.iter().map(move |r| column.cell(r))
    }

    pub fn null_count(&self) -> usize {
        self.iter().filter(Cell::is_null).count()
    }

    /// Type of the column; value columns report `Mixed` unless every row agrees
    pub fn column_type(&self) -> ColumnType {
        match self.kind {
            ColumnKind::Timestamp => ColumnType::Timestamp,
            ColumnKind::Name | ColumnKind::Meta(_) => ColumnType::Utf8,
            ColumnKind::Value => {
                let mut types = self.records.iter().map(|r| ColumnType::of_value(&r.value));
                match types.next() {
                    None => ColumnType::Empty,
                    Some(first) if types.all(|t| t == first) => first,
                    Some(_) => ColumnType::Mixed,
                }
            }
        }
    }

    fn cell(&self, record: &'a Record) -> Cell<'a> {
        match self.kind {
            ColumnKind::Timestamp => Cell::Timestamp(record.timestamp),
            ColumnKind::Name => Cell::Str(&record.name),
            ColumnKind::Value => Cell::Value(&record.value),
            ColumnKind::Meta(key) => record
                .meta
                .get(key)
                .map(|v| Cell::Str(v))
                .unwrap_or(Cell::Null),
        }
    }
}

/// Decoded query result
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    records: Vec<Record>,
}

impl Table {
    /// The canonical empty result: `timestamp`, `name`, `value`, no rows
    pub fn empty() -> Self {
        Self {
            columns: FIXED_COLUMNS.iter().map(|c| c.to_string()).collect(),
            records: Vec::new(),
        }
    }

    /// Build a table from records already in memory
    pub fn from_records(records: impl IntoIterator<Item = Record>) -> Self {
        let mut builder = TableBuilder::new();
        for record in records {
            builder.push(record);
        }
        builder.finish()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Column names in table order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    /// Bare meta keys ("vsn", "node", ...) in column order
    pub fn meta_keys(&self) -> impl Iterator<Item = &str> {
        self.columns
            .iter()
            .filter_map(|c| c.strip_prefix(META_PREFIX))
    }

    pub fn column(&self, name: &str) -> Option<Column<'_>> {
        let name = self.columns.iter().find(|c| *c == name)?.as_str();
        let kind = match name {
            TIMESTAMP_COLUMN => ColumnKind::Timestamp,
            NAME_COLUMN => ColumnKind::Name,
            VALUE_COLUMN => ColumnKind::Value,
            _ => ColumnKind::Meta(name.strip_prefix(META_PREFIX)?),
        };
        Some(Column {
            name,
            kind,
            records: &self.records,
        })
    }

    pub fn column_type(&self, name: &str) -> Option<ColumnType> {
        self.column(name).map(|c| c.column_type())
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records
    }

    pub fn row(&self, index: usize) -> Option<&Record> {
        self.records.get(index)
    }

    /// Cell at (row, column); `None` if either is out of range
    pub fn cell(&self, row: usize, column: &str) -> Option<Cell<'_>> {
        self.column(column)?.get(row)
    }

    pub fn timestamps(&self) -> impl Iterator<Item = DateTime<Utc>> + '_ {
        self.records.iter().map(|r| r.timestamp)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|r| r.name.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.records.iter().map(|r| &r.value)
    }

    /// Values of one meta key, `None` where a row lacks it. `None` overall if no row has the key.
    pub fn meta(&self, key: &str) -> Option<Vec<Option<&str>>> {
        let column = format!("{}{}", META_PREFIX, key);
        if !self.has_column(&column) {
            return None;
        }
        Some(self.records.iter().map(|r| r.meta_value(key)).collect())
    }

    /// Every value as `f64`, only if every value is numeric
    pub fn f64_values(&self) -> Option<Vec<f64>> {
        self.records.iter().map(|r| r.value.as_f64()).collect()
    }

    /// Latest timestamp in the table
    pub fn max_timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamps().max()
    }
}

impl Default for Table {
    fn default() -> Self {
        Self::empty()
    }
}

/// Accumulates records in stream order and discovers meta columns
#[derive(Debug, Default)]
pub struct TableBuilder {
    records: Vec<Record>,
    meta_columns: Vec<String>,
    seen: HashSet<String>,
}

impl TableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: Record) {
        for key in record.meta.keys() {
            if !self.seen.contains(key) {
                self.seen.insert(key.clone());
                self.meta_columns.push(format!("{}{}", META_PREFIX, key));
            }
        }
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn finish(self) -> Table {
        if self.records.is_empty() {
            return Table::empty();
        }

        let mut columns: Vec<String> = FIXED_COLUMNS.iter().map(|c| c.to_string()).collect();
        columns.extend(self.meta_columns);

        Table {
            columns,
            records: self.records,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn sample() -> Table {
        Table::from_records(vec![
            Record::new(ts(10), "env.temperature", 21.74)
                .meta("node", "000048b02d15c31f")
                .meta("vsn", "W01C"),
            Record::new(ts(30), "env.temperature", "26.09").meta("vsn", "W01A"),
            Record::new(ts(20), "env.temperature", 123i64)
                .meta("vsn", "W024")
                .meta("sensor", "bme680"),
        ])
    }

    #[test]
    fn test_empty_table_has_fixed_columns() {
        let table = Table::empty();
        assert_eq!(table.columns(), &["timestamp", "name", "value"]);
        assert_eq!(table.len(), 0);
        assert_eq!(table.column_type("timestamp"), Some(ColumnType::Timestamp));
        assert_eq!(table.column_type("name"), Some(ColumnType::Utf8));
        assert_eq!(table.column_type("value"), Some(ColumnType::Empty));
        assert_eq!(table.column("value").unwrap().len(), 0);
        assert_eq!(table.max_timestamp(), None);
        assert_eq!(TableBuilder::new().finish(), Table::empty());
    }

    #[test]
    fn test_meta_columns_are_union_in_first_seen_order() {
        let table = sample();
        assert_eq!(
            table.columns(),
            &["timestamp", "name", "value", "meta.node", "meta.vsn", "meta.sensor"]
        );
        assert_eq!(
            table.meta_keys().collect::<Vec<_>>(),
            vec!["node", "vsn", "sensor"]
        );
    }

    #[test]
    fn test_missing_meta_is_null() {
        let table = sample();
        let node = table.column("meta.node").unwrap();
        assert_eq!(node.get(0), Some(Cell::Str("000048b02d15c31f")));
        assert_eq!(node.get(1), Some(Cell::Null));
        assert_eq!(node.null_count(), 2);

        assert_eq!(
            table.meta("sensor").unwrap(),
            vec![None, None, Some("bme680")]
        );
        assert!(table.meta("plugin").is_none());
    }

    #[test]
    fn test_value_types_are_preserved() {
        let table = sample();
        let values: Vec<&Value> = table.values().collect();
        assert_eq!(values[0], &Value::Float(21.74));
        assert_eq!(values[1], &Value::Str("26.09".to_string()));
        assert_eq!(values[2], &Value::Int(123));
        assert_eq!(table.column_type("value"), Some(ColumnType::Mixed));
        assert!(table.f64_values().is_none());
    }

    #[test]
    fn test_uniform_value_column() {
        let table = Table::from_records(vec![
            Record::new(ts(1), "x", 1i64),
            Record::new(ts(2), "x", 2i64),
        ]);
        assert_eq!(table.column_type("value"), Some(ColumnType::Int));
        assert_eq!(table.f64_values(), Some(vec![1.0, 2.0]));
    }

    #[test]
    fn test_row_order_and_max_timestamp() {
        let table = sample();
        let order: Vec<_> = table.timestamps().collect();
        assert_eq!(order, vec![ts(10), ts(30), ts(20)]);
        assert_eq!(table.max_timestamp(), Some(ts(30)));
    }

    #[test]
    fn test_cell_lookup() {
        let table = sample();
        assert_eq!(table.cell(0, "name"), Some(Cell::Str("env.temperature")));
        assert_eq!(table.cell(1, "meta.node"), Some(Cell::Null));
        assert_eq!(table.cell(5, "name"), None);
        assert_eq!(table.cell(0, "meta.unknown"), None);
        assert_eq!(table.row(0).unwrap().get("meta.unknown"), Some(Cell::Null));
        assert!(table.column("bogus").is_none());
    }
}
