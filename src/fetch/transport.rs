//! Transport Module
//!
//! Network collaborator: turns a source identifier into a byte stream.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::FetchError;

// == Traits ==
/// Produces a byte stream for a source identifier.
///
/// Any failure is a [`FetchError::Transport`]; retry policy belongs to the
/// caller.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn open(&self, identifier: &str) -> Result<Box<dyn ByteStream>, FetchError>;
}

/// Pull-based body of a transport response.
#[async_trait]
pub trait ByteStream: Send {
    /// Next chunk, or `None` at end of stream.
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, FetchError>;
}

// == HTTP Transport ==
/// Transport over HTTP(S) using reqwest.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Creates a transport whose requests time out after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn open(&self, identifier: &str) -> Result<Box<dyn ByteStream>, FetchError> {
        let url = reqwest::Url::parse(identifier)
            .map_err(|e| FetchError::Transport(format!("malformed URL {}: {}", identifier, e)))?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?
            .error_for_status()
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        Ok(Box::new(HttpBody { response }))
    }
}

struct HttpBody {
    response: reqwest::Response,
}

#[async_trait]
impl ByteStream for HttpBody {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, FetchError> {
        self.response
            .chunk()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))
    }
}
