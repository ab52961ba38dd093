use serde::Deserialize;

/// A decoded server-sent event from a streaming Messages response
#[derive(Debug, Clone, PartialEq)]
pub enum StreamChunk {
    MessageStart {
        id: String,
        model: String,
        input_tokens: u32,
    },
    ContentBlockStart {
        index: usize,
        block: BlockKind,
    },
    ContentBlockDelta {
        index: usize,
        delta: BlockDelta,
    },
    ContentBlockStop {
        index: usize,
    },
    MessageDelta {
        stop_reason: Option<String>,
        stop_sequence: Option<String>,
        output_tokens: Option<u32>,
    },
    MessageStop,
    Ping,
    /// In-band failure: an undecodable frame or an `error` event sent by the server
    Error {
        kind: ChunkErrorKind,
        message: String,
    },
    /// Event name this crate does not know, passed through untouched
    Unknown {
        event: String,
        data: serde_json::Value,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockKind {
    Text,
    ToolUse { id: String, name: String },
    Other(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum BlockDelta {
    Text(String),
    /// Raw fragment of a tool-call argument string, not valid JSON on its own
    InputJson(String),
    Other {
        kind: String,
        raw: serde_json::Value,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkErrorKind {
    /// The frame payload could not be parsed; the stream continues
    Decode,
    /// The server reported an error (e.g. `overloaded_error`); the stream ends
    Api { error_type: String },
}

impl StreamChunk {
    /// Whether no further chunks follow this one on the wire
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StreamChunk::MessageStop
                | StreamChunk::Error {
                    kind: ChunkErrorKind::Api { .. },
                    ..
                }
        )
    }

    pub fn is_decode_error(&self) -> bool {
        matches!(
            self,
            StreamChunk::Error {
                kind: ChunkErrorKind::Decode,
                ..
            }
        )
    }

    /// Text fragment carried by a text delta
    pub fn as_text_delta(&self) -> Option<&str> {
        match self {
            StreamChunk::ContentBlockDelta {
                delta: BlockDelta::Text(text),
                ..
            } => Some(text),
            _ => None,
        }
    }

    /// Wire name of the event this chunk was decoded from
    pub fn event_name(&self) -> &str {
        match self {
            StreamChunk::MessageStart { .. } => "message_start",
            StreamChunk::ContentBlockStart { .. } => "content_block_start",
            StreamChunk::ContentBlockDelta { .. } => "content_block_delta",
            StreamChunk::ContentBlockStop { .. } => "content_block_stop",
            StreamChunk::MessageDelta { .. } => "message_delta",
            StreamChunk::MessageStop => "message_stop",
            StreamChunk::Ping => "ping",
            StreamChunk::Error { .. } => "error",
            StreamChunk::Unknown { event, .. } => event,
        }
    }
}

// Wire payloads, one per event name

#[derive(Debug, Deserialize)]
pub(crate) struct MessageStartPayload {
    pub message: MessageStartBody,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MessageStartBody {
    pub id: String,
    pub model: String,
    #[serde(default)]
    pub usage: WireUsage,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct WireUsage {
    #[serde(default)]
    pub input_tokens: Option<u32>,
    #[serde(default)]
    pub output_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ContentBlockStartPayload {
    pub index: usize,
    pub content_block: WireContentBlock,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireContentBlock {
    #[serde(rename = "type")]
    pub block_type: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ContentBlockDeltaPayload {
    pub index: usize,
    pub delta: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ContentBlockStopPayload {
    pub index: usize,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MessageDeltaPayload {
    #[serde(default)]
    pub delta: MessageDeltaBody,
    #[serde(default)]
    pub usage: Option<WireUsage>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct MessageDeltaBody {
    #[serde(default)]
    pub stop_reason: Option<String>,
    #[serde(default)]
    pub stop_sequence: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorPayload {
    pub error: ErrorInfo,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorInfo {
    #[serde(rename = "type")]
    pub error_type: String,
    #[serde(default)]
    pub message: String,
}
