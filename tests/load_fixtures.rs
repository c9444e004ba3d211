//! Loading saved responses from disk

use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use sage_data_client::{load, ClientError, ColumnType, Source, Table, Value};

const TEMPERATURE: &str = r#"{"timestamp":"2021-10-14T21:42:21.149425156Z","name":"env.temperature","value":21.74,"meta":{"host":"0000dca632a3069f.ws-rpi","job":"sage","node":"000048b02d15c31f","plugin":"plugin-iio:0.4.5","sensor":"bme680","task":"iio-rpi","vsn":"W01C"}}
{"timestamp":"2021-10-14T21:42:09.201150729Z","name":"env.temperature","value":26.09,"meta":{"host":"0000dca632a306d8.ws-rpi","job":"sage","node":"000048b02d15c31a","plugin":"plugin-iio:0.4.5","sensor":"bme680","task":"iio-shield","vsn":"W01A"}}
{"timestamp":"2021-10-14T21:42:19.087014343Z","name":"env.temperature","value":28.14,"meta":{"host":"0000dca632a3074d.ws-rpi","job":"sage","node":"000048b02d15bc73","plugin":"plugin-iio:0.4.5","sensor":"bme680","task":"iio-rpi","vsn":"W024"}}
"#;

fn write_plain(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

fn write_gzip(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    let mut encoder = GzEncoder::new(std::fs::File::create(&path).unwrap(), Compression::default());
    encoder.write_all(content.as_bytes()).unwrap();
    encoder.finish().unwrap();
    path
}

#[test]
fn test_plain_and_gzip_files_load_the_same_table() {
    let dir = TempDir::new().unwrap();
    let plain = write_plain(dir.path(), "temperature.ndjson", TEMPERATURE);
    let gzipped = write_gzip(dir.path(), "temperature.ndjson.gz", TEMPERATURE);

    let a = load(&plain).unwrap();
    let b = load(&gzipped).unwrap();

    assert_eq!(a.len(), 3);
    assert_eq!(a, b);
}

#[test]
fn test_gzip_detected_without_suffix() {
    let dir = TempDir::new().unwrap();
    let path = write_gzip(dir.path(), "response.bin", TEMPERATURE);

    let table = load(path).unwrap();
    assert_eq!(table.len(), 3);
}

#[test]
fn test_meta_columns_are_union_of_keys() {
    let dir = TempDir::new().unwrap();
    let path = write_plain(
        dir.path(),
        "mixed.ndjson",
        concat!(
            r#"{"timestamp":1634247741149425156,"name":"sys.uptime","value":1200,"meta":{"node":"000048b02d15c31f"}}"#,
            "\n",
            r#"{"timestamp":1634247742149425156,"name":"sys.uptime","value":1201,"meta":{"node":"000048b02d15c31a","vsn":"W01A"}}"#,
            "\n",
        ),
    );

    let table = load(path).unwrap();
    assert_eq!(
        table.columns(),
        ["timestamp", "name", "value", "meta.node", "meta.vsn"]
    );
    assert_eq!(table.meta("vsn").unwrap(), vec![None, Some("W01A")]);
    assert_eq!(table.column("meta.vsn").unwrap().null_count(), 1);
    assert_eq!(table.meta("plugin"), None);
}

#[test]
fn test_empty_file_is_canonical_empty_table() {
    let dir = TempDir::new().unwrap();
    let path = write_plain(dir.path(), "empty.ndjson", "");

    let table = load(&path).unwrap();
    assert_eq!(table, Table::empty());
    assert_eq!(table.columns(), ["timestamp", "name", "value"]);
    assert_eq!(table.column_type("timestamp"), Some(ColumnType::Timestamp));
    assert_eq!(table.column_type("name"), Some(ColumnType::Utf8));

    let gz = write_gzip(dir.path(), "empty.ndjson.gz", "");
    assert_eq!(load(gz).unwrap(), Table::empty());
}

#[test]
fn test_zero_byte_gz_file_is_empty_table() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("empty.ndjson.gz");
    std::fs::write(&path, b"").unwrap();

    assert_eq!(load(path).unwrap(), Table::empty());
}

fn large_gzip() -> Vec<u8> {
    let mut body = String::new();
    for _ in 0..300 {
        body.push_str(TEMPERATURE);
    }
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(body.as_bytes()).unwrap();
    encoder.finish().unwrap()
}

#[test]
fn test_truncated_gzip_is_a_decode_error() {
    let dir = TempDir::new().unwrap();
    let compressed = large_gzip();

    let half = dir.path().join("half.ndjson.gz");
    std::fs::write(&half, &compressed[..compressed.len() / 2]).unwrap();
    assert!(load(half).unwrap_err().is_decode());

    let no_trailer = dir.path().join("no_trailer.ndjson.gz");
    std::fs::write(&no_trailer, &compressed[..compressed.len() - 8]).unwrap();
    assert!(load(no_trailer).unwrap_err().is_decode());
}

#[test]
fn test_gzip_checksum_mismatch_is_a_decode_error() {
    let dir = TempDir::new().unwrap();
    let mut compressed = large_gzip();
    // Trailer is CRC32 then ISIZE, little endian
    let crc_at = compressed.len() - 8;
    compressed[crc_at] ^= 0xff;

    let path = dir.path().join("bad_crc.ndjson.gz");
    std::fs::write(&path, &compressed).unwrap();
    assert!(load(path).unwrap_err().is_decode());
}

#[test]
fn test_value_column_keeps_each_record_type() {
    let input = concat!(
        r#"{"timestamp":1,"name":"env.temperature","value":21.74,"meta":{}}"#,
        "\n",
        r#"{"timestamp":2,"name":"env.temperature","value":"26.09","meta":{}}"#,
        "\n",
        r#"{"timestamp":3,"name":"env.temperature","value":123,"meta":{}}"#,
        "\n",
    );

    let table = load(Source::bytes(input)).unwrap();
    let values: Vec<&Value> = table.values().collect();
    assert_eq!(
        values,
        vec![
            &Value::Float(21.74),
            &Value::Str("26.09".to_string()),
            &Value::Int(123)
        ]
    );
    assert_eq!(table.column_type("value"), Some(ColumnType::Mixed));
}

#[test]
fn test_malformed_line_is_a_decode_error() {
    let dir = TempDir::new().unwrap();
    let path = write_plain(
        dir.path(),
        "broken.ndjson",
        &format!("{}{{\"timestamp\": 1, \"name\": \n", TEMPERATURE),
    );

    let err = load(path).unwrap_err();
    assert!(err.is_decode());
    assert!(matches!(err, ClientError::Decode { line: Some(4), .. }));
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = TempDir::new().unwrap();
    let err = load(dir.path().join("nope.ndjson")).unwrap_err();
    assert!(matches!(err, ClientError::Io { .. }));
}
