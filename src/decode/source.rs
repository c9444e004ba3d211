//! Input sources for the decoder
//!
//! A source is a file path, an arbitrary reader, or an in-memory buffer.
//! Gzip framing is unwrapped when the path ends in `.gz` or when the stream
//! starts with the gzip magic bytes.

use flate2::bufread::MultiGzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader, Cursor, Read};
use std::path::{Path, PathBuf};

use crate::error::{ClientError, ClientResult};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Where a saved or live response is read from
pub enum Source {
    /// A file on disk; `.gz` files are decompressed
    Path(PathBuf),
    /// Any byte stream
    Reader(Box<dyn Read>),
    /// An in-memory buffer
    Bytes(Vec<u8>),
}

impl Source {
    /// Wrap an arbitrary reader
    pub fn from_reader<R: Read + 'static>(reader: R) -> Self {
        Source::Reader(Box::new(reader))
    }

    /// Wrap in-memory bytes or text
    pub fn bytes(data: impl Into<Vec<u8>>) -> Self {
        Source::Bytes(data.into())
    }

    /// Short description for logs
    pub fn describe(&self) -> String {
        match self {
            Source::Path(path) => path.display().to_string(),
            Source::Reader(_) => "<reader>".to_string(),
            Source::Bytes(data) => format!("<{} bytes>", data.len()),
        }
    }

    /// Open the source as a buffered line reader
    pub fn open(self) -> ClientResult<Box<dyn BufRead>> {
        match self {
            Source::Path(path) => {
                let file = File::open(&path).map_err(|e| ClientError::Io {
                    path: path.clone(),
                    source: e,
                })?;
                wrap_stream(file, has_gz_suffix(&path))
            }
            Source::Reader(reader) => wrap_stream(reader, false),
            Source::Bytes(data) => wrap_stream(Cursor::new(data), false),
        }
    }
}

impl std::fmt::Debug for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Source({})", self.describe())
    }
}

impl From<PathBuf> for Source {
    fn from(path: PathBuf) -> Self {
        Source::Path(path)
    }
}

impl From<&Path> for Source {
    fn from(path: &Path) -> Self {
        Source::Path(path.to_path_buf())
    }
}

impl From<&PathBuf> for Source {
    fn from(path: &PathBuf) -> Self {
        Source::Path(path.clone())
    }
}

/// Strings are paths, matching how saved responses are usually referenced
impl From<&str> for Source {
    fn from(path: &str) -> Self {
        Source::Path(PathBuf::from(path))
    }
}

impl From<Vec<u8>> for Source {
    fn from(data: Vec<u8>) -> Self {
        Source::Bytes(data)
    }
}

impl From<&[u8]> for Source {
    fn from(data: &[u8]) -> Self {
        Source::Bytes(data.to_vec())
    }
}

fn has_gz_suffix(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("gz"))
        .unwrap_or(false)
}

/// Buffer a raw byte stream, unwrapping gzip when forced or when the magic bytes are present
pub(crate) fn wrap_stream<'a, R: Read + 'a>(
    reader: R,
    force_gzip: bool,
) -> ClientResult<Box<dyn BufRead + 'a>> {
    let mut buffered = BufReader::new(reader);

    let head = buffered
        .fill_buf()
        .map_err(|e| ClientError::decode(None, format!("stream read failed: {}", e)))?;

    // A zero-byte body is empty even when it is labelled gzip
    if head.is_empty() {
        return Ok(Box::new(buffered));
    }

    if force_gzip || head.starts_with(&GZIP_MAGIC) {
        tracing::trace!("unwrapping gzip stream");
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(buffered))))
    } else {
        Ok(Box::new(buffered))
    }
}
