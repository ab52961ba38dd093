use bytes::Bytes;
use futures::TryStreamExt;
use reqwest::Client;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderValue};
use std::time::Duration;
use tracing::info;

use crate::config::ApiConfig;
use crate::error::{ClientError, Result};
use crate::transport::{ByteStream, Transport, TransportFuture};

/// reqwest-backed transport for the Anthropic Messages endpoint
pub struct HttpTransport {
    client: Client,
    url: String,
}

impl HttpTransport {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let mut api_key = HeaderValue::from_str(&config.api_key)
            .map_err(|e| ClientError::ConfigError(format!("Invalid API key header: {}", e)))?;
        api_key.set_sensitive(true);
        headers.insert("x-api-key", api_key);
        headers.insert(
            "anthropic-version",
            HeaderValue::from_str(&config.version).map_err(|e| {
                ClientError::ConfigError(format!("Invalid API version header: {}", e))
            })?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| {
                ClientError::ConfigError(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            url: config.messages_url(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Transport for HttpTransport {
    fn send(&self, body: Bytes, stream: bool) -> TransportFuture {
        let url = self.url.clone();
        let client = self.client.clone();

        Box::pin(async move { Self::send_impl(url, body, client, stream).await })
    }

    fn name(&self) -> &str {
        "Anthropic"
    }
}

impl HttpTransport {
    async fn send_impl(url: String, body: Bytes, client: Client, stream: bool) -> Result<ByteStream> {
        info!(bytes = body.len(), url = %url, stream, "Sending messages request");

        let accept = if stream {
            "text/event-stream"
        } else {
            "application/json"
        };

        let response = client
            .post(&url)
            .header(ACCEPT, accept)
            .body(body)
            .send()
            .await
            .map_err(|e| ClientError::connection(format!("Messages request failed: {}", e)))?;

        let status = response.status();
        info!(status = %status, "Messages endpoint responded");

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(ClientError::from_status(status.as_u16(), error_body));
        }

        Ok(Box::pin(response.bytes_stream().map_err(ClientError::from)))
    }
}
