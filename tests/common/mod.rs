//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use std::sync::Mutex;

use bytes::Bytes;
use claude_messages::error::{ClientError, Result};
use claude_messages::streaming::format_event;
use claude_messages::transport::{Transport, TransportFuture};
use serde_json::{Value, json};

pub fn message_start(id: &str, input_tokens: u32) -> String {
    format_event(
        "message_start",
        &json!({
            "type": "message_start",
            "message": {
                "id": id,
                "type": "message",
                "role": "assistant",
                "model": "claude-sonnet-4-5",
                "content": [],
                "stop_reason": null,
                "stop_sequence": null,
                "usage": {"input_tokens": input_tokens, "output_tokens": 1}
            }
        }),
    )
}

pub fn text_block_start(index: usize) -> String {
    format_event(
        "content_block_start",
        &json!({
            "type": "content_block_start",
            "index": index,
            "content_block": {"type": "text", "text": ""}
        }),
    )
}

pub fn tool_block_start(index: usize, id: &str, name: &str) -> String {
    format_event(
        "content_block_start",
        &json!({
            "type": "content_block_start",
            "index": index,
            "content_block": {"type": "tool_use", "id": id, "name": name, "input": {}}
        }),
    )
}

pub fn text_delta(index: usize, text: &str) -> String {
    format_event(
        "content_block_delta",
        &json!({
            "type": "content_block_delta",
            "index": index,
            "delta": {"type": "text_delta", "text": text}
        }),
    )
}

pub fn json_delta(index: usize, partial: &str) -> String {
    format_event(
        "content_block_delta",
        &json!({
            "type": "content_block_delta",
            "index": index,
            "delta": {"type": "input_json_delta", "partial_json": partial}
        }),
    )
}

pub fn block_stop(index: usize) -> String {
    format_event(
        "content_block_stop",
        &json!({"type": "content_block_stop", "index": index}),
    )
}

pub fn message_delta(stop_reason: &str, output_tokens: u32) -> String {
    format_event(
        "message_delta",
        &json!({
            "type": "message_delta",
            "delta": {"stop_reason": stop_reason, "stop_sequence": null},
            "usage": {"output_tokens": output_tokens}
        }),
    )
}

pub fn message_stop() -> String {
    format_event("message_stop", &json!({"type": "message_stop"}))
}

pub fn ping() -> String {
    format_event("ping", &json!({"type": "ping"}))
}

/// One text block answering "Hello", then a normal end of turn
pub fn hello_stream() -> String {
    [
        message_start("msg_1", 10),
        text_block_start(0),
        text_delta(0, "Hel"),
        ping(),
        text_delta(0, "lo"),
        block_stop(0),
        message_delta("end_turn", 2),
        message_stop(),
    ]
    .concat()
}

/// One tool_use block whose arguments arrive in the given fragments
pub fn tool_stream(fragments: &[&str]) -> String {
    let mut wire = message_start("msg_tool", 30);
    wire.push_str(&tool_block_start(0, "toolu_1", "get_weather"));
    for fragment in fragments {
        wire.push_str(&json_delta(0, fragment));
    }
    wire.push_str(&block_stop(0));
    wire.push_str(&message_delta("tool_use", 12));
    wire.push_str(&message_stop());
    wire
}

/// Cut a wire string into pieces of at most `size` bytes, ignoring char boundaries
pub fn byte_chunks(wire: &str, size: usize) -> Vec<Vec<u8>> {
    wire.as_bytes().chunks(size).map(<[u8]>::to_vec).collect()
}

/// How the mock transport answers
#[derive(Debug, Clone)]
pub enum Reply {
    /// Non-2xx status with a body
    Status(u16, String),
    /// Body chunks, optionally followed by a connection failure
    Body {
        chunks: Vec<Bytes>,
        fail_with: Option<String>,
    },
}

impl Reply {
    pub fn body(wire: impl Into<String>) -> Self {
        Reply::Body {
            chunks: vec![Bytes::from(wire.into())],
            fail_with: None,
        }
    }

    pub fn body_then_error(wire: impl Into<String>, error: &str) -> Self {
        Reply::Body {
            chunks: vec![Bytes::from(wire.into())],
            fail_with: Some(error.to_string()),
        }
    }
}

/// In-memory transport that records every request body it is given
pub struct MockTransport {
    reply: Reply,
    requests: Mutex<Vec<(Value, bool)>>,
}

impl MockTransport {
    pub fn new(reply: Reply) -> Self {
        Self {
            reply,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<(Value, bool)> {
        self.requests.lock().unwrap().clone()
    }
}

impl Transport for MockTransport {
    fn send(&self, body: Bytes, stream: bool) -> TransportFuture {
        let value: Value = serde_json::from_slice(&body).unwrap();
        self.requests.lock().unwrap().push((value, stream));

        let reply = self.reply.clone();
        Box::pin(async move {
            match reply {
                Reply::Status(status, body) => Err(ClientError::from_status(status, body)),
                Reply::Body { chunks, fail_with } => {
                    let mut items: Vec<Result<Bytes>> = chunks.into_iter().map(Ok).collect();
                    if let Some(message) = fail_with {
                        items.push(Err(ClientError::connection(message)));
                    }
                    let stream: claude_messages::ByteStream =
                        Box::pin(futures::stream::iter(items));
                    Ok(stream)
                }
            }
        })
    }

    fn name(&self) -> &str {
        "mock"
    }
}
