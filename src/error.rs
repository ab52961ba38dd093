use serde::Deserialize;
use thiserror::Error;

/// Top-level classification of a [`ClientError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// HTTP-level failure: non-2xx status, connection failure, timeout
    Transport,
    /// Malformed framing, payload decode failure or protocol-sequence violation
    Stream,
    /// Request rejected before dispatch
    Request,
    /// Configuration could not be loaded or is invalid
    Config,
}

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Transport error{}: {message}", .status.map(|s| format!(" ({})", s)).unwrap_or_default())]
    Transport {
        status: Option<u16>,
        message: String,
        body: Option<String>,
    },

    #[error("Stream decode error: {0}")]
    StreamDecode(String),

    #[error("Protocol sequence error: {event} for content block {index}: {reason}")]
    ProtocolSequence {
        index: usize,
        event: &'static str,
        reason: &'static str,
    },

    #[error("Protocol sequence error: {event}: {reason}")]
    MessageSequence {
        event: &'static str,
        reason: &'static str,
    },

    #[error("Tool argument parse error for {name}: {message}")]
    ToolArgumentParse { name: String, message: String },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Environment variable error: {0}")]
    EnvVarError(#[from] std::env::VarError),
}

pub type Result<T> = std::result::Result<T, ClientError>;

/// Error envelope returned by the API on non-2xx responses
#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(rename = "type")]
    error_type: String,
    message: String,
}

impl ClientError {
    /// Map a non-success HTTP response into a transport error.
    ///
    /// The raw body is always kept; when it carries the API error envelope
    /// the message is taken from it.
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        let message = match serde_json::from_str::<ApiErrorEnvelope>(&body) {
            Ok(envelope) => format!("{}: {}", envelope.error.error_type, envelope.error.message),
            Err(_) if body.trim().is_empty() => "empty response body".to_string(),
            Err(_) => "unrecognized error body".to_string(),
        };

        ClientError::Transport {
            status: Some(status),
            message,
            body: Some(body),
        }
    }

    /// Transport error without an HTTP status (connect failure, timeout, broken body)
    pub fn connection(message: impl Into<String>) -> Self {
        ClientError::Transport {
            status: None,
            message: message.into(),
            body: None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ClientError::Transport { .. } | ClientError::IoError(_) => ErrorKind::Transport,
            ClientError::StreamDecode(_)
            | ClientError::ProtocolSequence { .. }
            | ClientError::MessageSequence { .. }
            | ClientError::ToolArgumentParse { .. }
            | ClientError::JsonError(_) => ErrorKind::Stream,
            ClientError::InvalidRequest(_) => ErrorKind::Request,
            ClientError::ConfigError(_) | ClientError::EnvVarError(_) => ErrorKind::Config,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Transport { status, .. } => *status,
            _ => None,
        }
    }

    /// Whether a caller-side retry could reasonably succeed.
    ///
    /// Nothing in this crate retries; this is a hint for the caller's policy.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Transport { status: None, .. } => true,
            ClientError::Transport {
                status: Some(status),
                ..
            } => matches!(*status, 408 | 409 | 429 | 500..=599),
            _ => false,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        ClientError::Transport {
            status: e.status().map(|s| s.as_u16()),
            message: e.to_string(),
            body: None,
        }
    }
}
