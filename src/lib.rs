//! # Claude Messages
//!
//! A client for the Anthropic Messages API built around an incremental
//! streaming response assembler.
//!
//! ## Overview
//!
//! A streamed response travels through three stages:
//! - **Transport** - an HTTP POST whose body arrives as a lazy byte stream
//! - **Event decoder** - SSE framing, then typed [`StreamChunk`]s
//! - **Accumulator** - rebuilds text, tool calls and usage while handing every
//!   chunk on to the caller
//!
//! Everything is pull-driven: a chunk is decoded only when the caller asks for
//! the next one.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use claude_messages::{Client, ClientConfig};
//! use futures::StreamExt;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ClientConfig::from_env()?;
//! let client = Client::from_config(&config)?;
//!
//! let request = client.request().user("Hello").build()?;
//! let mut stream = client.stream(&request).await?;
//! while let Some(chunk) = stream.next().await {
//!     if let Some(text) = chunk?.as_text_delta() {
//!         print!("{}", text);
//!     }
//! }
//!
//! let response = stream.final_response();
//! assert!(response.completed);
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`client`] - Client and the reqwest transport
//! - [`config`] - Configuration loading and validation
//! - [`error`] - Error types and handling
//! - [`metrics`] - Stream counters
//! - [`models`] - Request, response and stream chunk types
//! - [`streaming`] - SSE decoder and response accumulator
//! - [`transport`] - Transport seam
//! - [`validation`] - Request validation

pub mod client;
pub mod config;
pub mod error;
pub mod metrics;
pub mod models;
pub mod streaming;
pub mod transport;
pub mod validation;

pub use client::{Client, HttpTransport, ResponseStream};
pub use config::ClientConfig;
pub use error::{ClientError, ErrorKind, Result};
pub use models::{MessageRequest, StreamChunk};
pub use streaming::{AccumulatedResponse, MessageStream, StreamState, ToolCall};
pub use transport::{ByteStream, Transport};
