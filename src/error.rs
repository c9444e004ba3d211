//! Client error types
//!
//! Every failure the query/load pipeline can raise. Nothing here is retried
//! or swallowed internally; callers decide what to do with each kind.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while querying or loading telemetry
#[derive(Error, Debug)]
pub enum ClientError {
    /// A start/end value is neither an absolute time nor a relative duration
    #[error("Invalid time expression '{input}': {reason}")]
    InvalidTimeExpression { input: String, reason: String },

    /// Both `head` and `tail` were supplied
    #[error("Conflicting limits: only one of `head` or `tail` can be provided")]
    ConflictingLimits,

    /// The request never produced a response (connect, timeout, TLS, ...)
    #[error("Transport error: {0}")]
    Transport(String),

    /// The server answered with a non-success status
    #[error("Transport error: server returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The response stream or file could not be decoded
    #[error("Decode error{}: {message}", line_suffix(.line))]
    Decode { line: Option<usize>, message: String },

    /// A local file could not be opened
    #[error("IO error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Writing a table out failed
    #[error("Write error: {0}")]
    Write(#[source] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ClientError {
    pub(crate) fn invalid_time(input: impl Into<String>, reason: impl Into<String>) -> Self {
        ClientError::InvalidTimeExpression {
            input: input.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn decode(line: Option<usize>, message: impl Into<String>) -> Self {
        ClientError::Decode {
            line,
            message: message.into(),
        }
    }

    /// True for failures where the request itself did not succeed
    pub fn is_transport(&self) -> bool {
        matches!(self, ClientError::Transport(_) | ClientError::Status { .. })
    }

    /// True for malformed or corrupt response data
    pub fn is_decode(&self) -> bool {
        matches!(self, ClientError::Decode { .. })
    }
}

fn line_suffix(line: &Option<usize>) -> String {
    line.map(|l| format!(" at line {}", l)).unwrap_or_default()
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return ClientError::Status {
                status: status.as_u16(),
                body: err.to_string(),
            };
        }
        if err.is_timeout() {
            ClientError::Transport(format!("request timed out: {}", err))
        } else if err.is_connect() {
            ClientError::Transport(format!("connection failed: {}", err))
        } else {
            ClientError::Transport(err.to_string())
        }
    }
}

/// Result type alias for client operations
pub type ClientResult<T> = Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ClientError::ConflictingLimits;
        assert_eq!(
            err.to_string(),
            "Conflicting limits: only one of `head` or `tail` can be provided"
        );

        let err = ClientError::invalid_time("yesterday-ish", "unrecognized unit");
        assert_eq!(
            err.to_string(),
            "Invalid time expression 'yesterday-ish': unrecognized unit"
        );
    }

    #[test]
    fn test_decode_display_with_and_without_line() {
        let err = ClientError::decode(Some(3), "missing field `name`");
        assert_eq!(err.to_string(), "Decode error at line 3: missing field `name`");

        let err = ClientError::decode(None, "invalid gzip header");
        assert_eq!(err.to_string(), "Decode error: invalid gzip header");
    }

    #[test]
    fn test_error_classification() {
        let status = ClientError::Status {
            status: 502,
            body: "bad gateway".to_string(),
        };
        assert!(status.is_transport());
        assert!(!status.is_decode());
        assert!(ClientError::Transport("refused".into()).is_transport());
        assert!(ClientError::decode(None, "x").is_decode());
        assert!(!ClientError::ConflictingLimits.is_transport());
    }
}
