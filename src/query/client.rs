//! Data API Client
//!
//! Blocking HTTP transport for the query endpoint. One call is one POST and
//! one streamed decode pass over the response body.

use reqwest::blocking::Client;
use reqwest::header::{ACCEPT_ENCODING, CONTENT_ENCODING, CONTENT_TYPE};
use std::io::{BufRead, Write};
use std::time::Duration;

use crate::config::ClientConfig;
use crate::decode::{load_reader, wrap_stream, Table};
use crate::error::{ClientError, ClientResult};
use crate::query::descriptor::Query;

/// Query API client
pub struct DataClient {
    client: Client,
    config: ClientConfig,
}

impl DataClient {
    /// Create a new client with the given configuration
    pub fn new(config: ClientConfig) -> ClientResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| ClientError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// Create a client around an already configured HTTP client
    pub fn with_http_client(config: ClientConfig, client: Client) -> Self {
        Self { client, config }
    }

    /// Get the current configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Run a query and decode the response into a table
    pub fn query(&self, query: &Query) -> ClientResult<Table> {
        let reader = self.send(query)?;
        let table = load_reader(reader)?;

        tracing::info!(
            rows = table.len(),
            columns = table.columns().len(),
            "Query complete"
        );
        Ok(table)
    }

    /// Run a query and copy the decompressed response to `writer` without decoding it.
    /// The output can later be read back with [`crate::load`].
    pub fn query_to_writer<W: Write>(&self, query: &Query, mut writer: W) -> ClientResult<u64> {
        let mut reader = self.send(query)?;
        let bytes = std::io::copy(&mut reader, &mut writer)
            .map_err(|e| ClientError::decode(None, format!("failed to copy response: {}", e)))?;
        writer.flush().map_err(ClientError::Write)?;

        tracing::info!(bytes, "Saved query response");
        Ok(bytes)
    }

    /// Send the request and return the (decompressed) body as a line reader
    fn send(&self, query: &Query) -> ClientResult<Box<dyn BufRead>> {
        let descriptor = query.descriptor()?;
        let body = descriptor.to_json()?;
        let endpoint = query.endpoint_override().unwrap_or(&self.config.endpoint);

        tracing::debug!(
            endpoint = %endpoint,
            body = %String::from_utf8_lossy(&body),
            "Sending query"
        );

        let response = self
            .client
            .post(endpoint)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT_ENCODING, "gzip")
            .body(body)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "Query rejected by server");
            return Err(ClientError::Status {
                status: status.as_u16(),
                body: text.trim().to_string(),
            });
        }

        let gzip = response
            .headers()
            .get(CONTENT_ENCODING)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_ascii_lowercase().contains("gzip"))
            .unwrap_or(false);

        tracing::debug!(status = status.as_u16(), gzip, "Streaming response");
        wrap_stream(response, gzip)
    }
}

/// Run a query against the default endpoint (or the query's own endpoint override)
pub fn query(query: &Query) -> ClientResult<Table> {
    DataClient::new(ClientConfig::default())?.query(query)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_ENDPOINT;

    #[test]
    fn test_default_config() {
        let client = DataClient::new(ClientConfig::default()).unwrap();
        assert_eq!(client.config().endpoint, DEFAULT_ENDPOINT);
    }

    #[test]
    fn test_conflicting_limits_before_network() {
        // Nothing listens on port 9 of a reserved documentation address.
        let q = Query::new("-1h")
            .head(1)
            .tail(1)
            .endpoint("http://192.0.2.1:9/api/v1/query");
        let err = query(&q).unwrap_err();
        assert!(matches!(err, ClientError::ConflictingLimits));
    }

    #[test]
    fn test_invalid_time_before_network() {
        let q = Query::new("whenever").endpoint("http://192.0.2.1:9/api/v1/query");
        let err = query(&q).unwrap_err();
        assert!(matches!(err, ClientError::InvalidTimeExpression { .. }));
    }
}
