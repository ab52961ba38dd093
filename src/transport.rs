use bytes::Bytes;
use futures::Stream;
use std::future::Future;
use std::pin::Pin;

use crate::error::Result;

/// Lazy response body from a transport, read incrementally until close
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// Type alias for the future returned by [`Transport::send`]
pub type TransportFuture = Pin<Box<dyn Future<Output = Result<ByteStream>> + Send>>;

/// HTTP collaborator that delivers a finished request body to the Messages endpoint
pub trait Transport: Send + Sync {
    /// POST the serialized request
    ///
    /// # Arguments
    /// * `body` - The JSON request body
    /// * `stream` - Whether the response is an event stream
    ///
    /// # Returns
    /// The response body as a byte stream. Non-2xx responses and connection
    /// failures resolve to [`ClientError::Transport`](crate::error::ClientError::Transport)
    /// before any byte is yielded.
    fn send(&self, body: Bytes, stream: bool) -> TransportFuture;

    /// Get the transport name for logging
    fn name(&self) -> &str;
}
