pub mod http;

pub use http::HttpTransport;

use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use tracing::debug;

use crate::config::{ClientConfig, DefaultsConfig};
use crate::error::{ClientError, Result};
use crate::models::request::{MessageRequest, MessageRequestBuilder};
use crate::models::response::Message;
use crate::streaming::{ChunkStream, MessageStream};
use crate::transport::{ByteStream, Transport};

/// Stream returned by [`Client::stream`]
pub type ResponseStream = MessageStream<ChunkStream<ByteStream>>;

/// Messages API client over an injected [`Transport`]
pub struct Client<T: Transport = HttpTransport> {
    transport: T,
    defaults: DefaultsConfig,
}

impl Client<HttpTransport> {
    /// Build an HTTP-backed client from validated configuration
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        config.validate()?;
        let transport = HttpTransport::new(&config.api)?;
        Ok(Self::with_defaults(transport, config.defaults.clone()))
    }
}

impl<T: Transport> Client<T> {
    pub fn new(transport: T) -> Self {
        Self::with_defaults(transport, DefaultsConfig::default())
    }

    pub fn with_defaults(transport: T, defaults: DefaultsConfig) -> Self {
        Self {
            transport,
            defaults,
        }
    }

    /// Request builder preloaded with the configured model and max_tokens
    pub fn request(&self) -> MessageRequestBuilder {
        MessageRequest::builder(self.defaults.model.clone()).max_tokens(self.defaults.max_tokens)
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Create a message and wait for the complete response
    pub async fn create(&self, request: &MessageRequest) -> Result<Message> {
        let body = Self::encode(request, false)?;
        let mut stream = self.transport.send(body, false).await?;

        let mut buf = BytesMut::new();
        while let Some(chunk) = stream.next().await {
            buf.extend_from_slice(&chunk?);
        }

        let message: Message =
            serde_json::from_slice(&buf).map_err(|e| ClientError::Transport {
                status: None,
                message: format!("Invalid response body: {}", e),
                body: Some(String::from_utf8_lossy(&buf).into_owned()),
            })?;
        debug!(
            id = %message.id,
            stop_reason = ?message.stop_reason,
            output_tokens = message.usage.output_tokens,
            "Message created"
        );
        Ok(message)
    }

    /// Open a streaming response.
    ///
    /// Nothing is decoded until the returned stream is polled.
    pub async fn stream(&self, request: &MessageRequest) -> Result<ResponseStream> {
        let body = Self::encode(request, true)?;
        let bytes = self.transport.send(body, true).await?;
        debug!(transport = self.transport.name(), model = request.model(), "Stream opened");

        Ok(MessageStream::attach(ChunkStream::new(bytes)))
    }

    fn encode(request: &MessageRequest, stream: bool) -> Result<Bytes> {
        let body = serde_json::to_vec(&request.with_stream(stream))
            .map_err(|e| ClientError::InvalidRequest(format!("Failed to encode request: {}", e)))?;
        Ok(Bytes::from(body))
    }
}
