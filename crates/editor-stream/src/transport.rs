use std::fmt;
use std::pin::Pin;
use std::time::Duration;

use futures::StreamExt as _;
use tracing::debug;

use crate::errors::{SetupError, StreamError};
use crate::model::ProviderKind;
use crate::parser::error_message;

/// Raw response body as it arrives from the provider.
pub type ByteStream =
    Pin<Box<dyn futures::Stream<Item = Result<bytes::Bytes, StreamError>> + Send + 'static>>;

/// Everything needed to open one streaming call.
#[derive(Clone, PartialEq)]
pub struct StreamRequest {
    pub provider: ProviderKind,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: serde_json::Value,
}

impl StreamRequest {
    /// Returns the value of the first header named `name` (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

impl fmt::Debug for StreamRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let header_names: Vec<&str> = self.headers.iter().map(|(k, _)| k.as_str()).collect();
        f.debug_struct("StreamRequest")
            .field("provider", &self.provider)
            .field("url", &self.url)
            .field("headers", &header_names)
            .finish_non_exhaustive()
    }
}

/// Opens streaming calls. The seam between the read loop and the network.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Sends `request` and returns the response body stream.
    ///
    /// Fails when the call cannot be established or the status is not 2xx.
    async fn open(&self, request: &StreamRequest) -> Result<ByteStream, StreamError>;
}

/// `reqwest`-backed transport.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Builds a client that gives up when connecting takes longer than
    /// `timeout` or when the body goes quiet for longer than `timeout`.
    ///
    /// A stream that keeps producing output is never cut off.
    pub fn new(timeout: Duration) -> Result<Self, SetupError> {
        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .read_timeout(timeout)
            .build()
            .map_err(|e| SetupError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Wraps an existing client (shared connection pool, proxies, ...).
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl Transport for ReqwestTransport {
    async fn open(&self, request: &StreamRequest) -> Result<ByteStream, StreamError> {
        let provider = request.provider;
        let mut http_req = self.client.post(&request.url);
        for (name, value) in &request.headers {
            http_req = http_req.header(name.as_str(), value.as_str());
        }
        let http_req = http_req.json(&request.body);

        let response = http_req.send().await.map_err(|e| {
            StreamError::transport(provider, format!("{provider} request failed: {e}"))
        })?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(StreamError::status(
                provider,
                status.as_u16(),
                describe_error_body(&body),
            ));
        }
        debug!(
            event = "transport.stream_opened",
            domain = "transport",
            provider = %provider,
            status = status.as_u16()
        );

        let stream = response.bytes_stream().map(move |chunk| {
            chunk.map_err(|e| {
                StreamError::transport(provider, format!("{provider} streaming read failed: {e}"))
            })
        });
        Ok(Box::pin(stream))
    }
}

/// Picks the provider's own message out of an error body when it is JSON.
pub(crate) fn describe_error_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "<empty body>".to_string();
    }
    // Some providers wrap the error object in a one-element array.
    let value = match serde_json::from_str::<serde_json::Value>(trimmed) {
        Ok(serde_json::Value::Array(mut items)) if !items.is_empty() => items.swap_remove(0),
        Ok(value) => value,
        Err(_) => return trimmed.to_string(),
    };
    error_message(&value)
        .map(ToOwned::to_owned)
        .unwrap_or_else(|| trimmed.to_string())
}
